//! Domain events emitted by the services after successful writes.
//!
//! Events flow through an mpsc channel into [`process_events`], which logs
//! them and republishes each as a row-level change on the broadcast
//! [`feed::ChangeFeed`] that view subscriptions listen on.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::RequestStatus;

pub mod feed;

use feed::{ChangeEvent, ChangeFeed, ChangeOp, TableKind};

/// The events the lifecycle engine can emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    RequestCreated(Uuid),
    RequestStatusChanged {
        request_id: Uuid,
        old_status: RequestStatus,
        new_status: RequestStatus,
    },
    /// A `Shipped → Received` flip performed by the auto-escalation rule.
    RequestEscalated(Uuid),
    CompletionLogged(Uuid),
}

impl Event {
    fn change(&self) -> ChangeEvent {
        match self {
            Event::RequestCreated(id) => ChangeEvent {
                table: TableKind::RefurbRequests,
                op: ChangeOp::Insert,
                id: *id,
            },
            Event::RequestStatusChanged { request_id, .. } => ChangeEvent {
                table: TableKind::RefurbRequests,
                op: ChangeOp::Update,
                id: *request_id,
            },
            Event::RequestEscalated(id) => ChangeEvent {
                table: TableKind::RefurbRequests,
                op: ChangeOp::Update,
                id: *id,
            },
            Event::CompletionLogged(id) => ChangeEvent {
                table: TableKind::DailyCompletions,
                op: ChangeOp::Insert,
                id: *id,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates the event channel plus its sender wrapper.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Processes incoming events and republishes them onto the change feed.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, feed: ChangeFeed) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::RequestCreated(id) => info!("Request created: {}", id),
            Event::RequestStatusChanged {
                request_id,
                old_status,
                new_status,
            } => info!(
                "Request {} status changed from '{}' to '{}'",
                request_id, old_status, new_status
            ),
            Event::RequestEscalated(id) => {
                info!("Request {} auto-escalated to Received", id)
            }
            Event::CompletionLogged(id) => info!("Completion logged: {}", id),
        }

        feed.publish(event.change());
    }

    warn!("Event processing loop has ended");
}

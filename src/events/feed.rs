//! Broadcast change feed and view subscriptions.
//!
//! The backing store's push feed is modeled as a broadcast channel of
//! row-level [`ChangeEvent`]s. A view subscribes through [`ChangeNotifier`];
//! the raw event only carries the changed row's primary key, so on a request
//! insert the notifier re-queries the joined record before invoking the
//! alert callback. Dropping the returned [`FeedSubscription`] tears the
//! listener down, so subscriptions never outlive their view.

use std::sync::Arc;

use sea_orm::{DatabaseConnection, EntityTrait};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::entities::{location, refurb_request, technician};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    RefurbRequests,
    DailyCompletions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
}

/// A row-level change notification. Carries only the primary key; consumers
/// re-query for joined data when they need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: TableKind,
    pub op: ChangeOp,
    pub id: Uuid,
}

/// Fan-out point for change events.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes a change. A send error only means no subscriber is
    /// currently listening, which is not a failure.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

/// A fully resolved summary for a newly inserted request, ready for a
/// user-facing alert.
#[derive(Debug, Clone)]
pub struct RequestAlert {
    pub request_id: Uuid,
    pub request_code: String,
    pub instrument_type: String,
    pub quantity_requested: i32,
    pub city: Option<String>,
    pub technician_name: Option<String>,
}

/// Handle for an active feed subscription. The listener task is aborted on
/// `unsubscribe` or drop.
#[derive(Debug)]
pub struct FeedSubscription {
    handle: JoinHandle<()>,
}

impl FeedSubscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Subscribes caller-supplied callbacks to the change feed.
#[derive(Clone)]
pub struct ChangeNotifier {
    feed: ChangeFeed,
    db: Arc<DatabaseConnection>,
}

impl ChangeNotifier {
    pub fn new(feed: ChangeFeed, db: Arc<DatabaseConnection>) -> Self {
        Self { feed, db }
    }

    /// Listens for request-table changes. On insert, resolves the joined
    /// record and invokes `on_alert` before the generic `on_refresh`; on
    /// update, invokes `on_refresh` only.
    ///
    /// Resolution is background enrichment: a failed lookup is logged and
    /// swallowed, and the refresh still fires.
    pub fn subscribe_requests<A, R>(&self, on_alert: A, on_refresh: R) -> FeedSubscription
    where
        A: Fn(RequestAlert) + Send + Sync + 'static,
        R: Fn() + Send + Sync + 'static,
    {
        let mut rx = self.feed.subscribe();
        let db = self.db.clone();
        let handle = tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("change feed subscriber lagged, skipped {} events", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if event.table != TableKind::RefurbRequests {
                    continue;
                }

                if event.op == ChangeOp::Insert {
                    match resolve_alert(&db, event.id).await {
                        Ok(Some(alert)) => on_alert(alert),
                        Ok(None) => {
                            warn!("inserted request {} not found during resolution", event.id)
                        }
                        Err(e) => warn!("failed to resolve request {}: {}", event.id, e),
                    }
                }

                on_refresh();
            }
        });
        FeedSubscription { handle }
    }

    /// Listens for completion inserts only.
    pub fn subscribe_completions<F>(&self, on_insert: F) -> FeedSubscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut rx = self.feed.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event)
                        if event.table == TableKind::DailyCompletions
                            && event.op == ChangeOp::Insert =>
                    {
                        on_insert()
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("change feed subscriber lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        FeedSubscription { handle }
    }
}

async fn resolve_alert(
    db: &DatabaseConnection,
    request_id: Uuid,
) -> Result<Option<RequestAlert>, sea_orm::DbErr> {
    let Some((request, loc)) = refurb_request::Entity::find_by_id(request_id)
        .find_also_related(location::Entity)
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let tech = technician::Entity::find_by_id(request.tech_id).one(db).await?;

    Ok(Some(RequestAlert {
        request_id: request.id,
        request_code: request.request_code,
        instrument_type: request.instrument_type,
        quantity_requested: request.quantity_requested,
        city: loc.map(|l| l.city),
        technician_name: tech.map(|t| t.name),
    }))
}

//! Request store: submission, filtered joined reads with auto-escalation,
//! and lifecycle transitions.

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    LoaderTrait, PaginatorTrait, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{
    location, refurb_request, technician, InstrumentCategory, Priority, RequestStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::lifecycle::escalation::{self, PendingEscalation};
use crate::lifecycle::{LifecycleDefinition, Stamp, TransitionPayload};
use crate::services::{activity, request_codes};
use crate::session::TechSession;

/// Filters for the request collection view.
#[derive(Debug, Clone, Default)]
pub struct RequestFilters {
    pub location_id: Option<Uuid>,
    pub tech_id: Option<Uuid>,
    pub status: Option<RequestStatus>,
    /// Hide requests already picked up (terminal in the shipping flow).
    pub exclude_picked_up: bool,
}

/// A request together with its joined reference data.
#[derive(Debug, Clone)]
pub struct RequestWithRefs {
    pub request: refurb_request::Model,
    pub location: Option<location::Model>,
    pub technician: Option<technician::Model>,
}

/// Submission payload. Category, brand and priority are only used by
/// fulfillment deployments but accepted everywhere.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRequestInput {
    #[validate(length(min = 1, max = 50, message = "Instrument type must be between 1 and 50 characters"))]
    pub instrument_type: String,
    pub category: Option<InstrumentCategory>,
    pub brand: Option<String>,
    #[validate(range(min = 1, max = 999, message = "Quantity must be between 1 and 999"))]
    pub quantity_requested: i32,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
}

/// Result of a committed transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub request: refurb_request::Model,
    /// Set when a fulfillment supplied a quantity different from what was
    /// requested. Operator-visible warning only; never blocks.
    pub quantity_mismatch: bool,
}

/// Service for managing refurb requests through their lifecycle.
#[derive(Clone)]
pub struct RequestService {
    db: Arc<DatabaseConnection>,
    lifecycle: &'static LifecycleDefinition,
    event_sender: EventSender,
}

impl RequestService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        lifecycle: &'static LifecycleDefinition,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            lifecycle,
            event_sender,
        }
    }

    pub fn lifecycle(&self) -> &'static LifecycleDefinition {
        self.lifecycle
    }

    /// Submits a new request on behalf of the session technician.
    ///
    /// The minted code rides on a count of the store-day prefix, which two
    /// concurrent submissions can read identically; the UNIQUE constraint on
    /// `request_code` turns the loser into a violation, retried exactly once
    /// with a recount before surfacing a conflict.
    #[instrument(skip(self, session, input), fields(store = %session.store_number))]
    pub async fn create_request(
        &self,
        session: &TechSession,
        input: CreateRequestInput,
    ) -> Result<refurb_request::Model, ServiceError> {
        input.validate()?;

        let mut attempts = 0;
        loop {
            let today = Utc::now().date_naive();
            let code = request_codes::next_code(&*self.db, &session.store_number, today).await?;

            match self.insert_request(session, &input, &code).await {
                Ok(request) => {
                    info!("Request {} created as '{}'", request.id, request.request_code);
                    self.emit(Event::RequestCreated(request.id)).await;
                    return Ok(request);
                }
                Err(e) if is_unique_violation(&e) && attempts == 0 => {
                    warn!("Request code '{}' collided, recounting once", code);
                    attempts += 1;
                }
                Err(e) if is_unique_violation(&e) => {
                    return Err(ServiceError::Conflict(format!(
                        "Request code '{}' was minted concurrently twice",
                        code
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn insert_request(
        &self,
        session: &TechSession,
        input: &CreateRequestInput,
        code: &str,
    ) -> Result<refurb_request::Model, DbErr> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let request = refurb_request::ActiveModel {
            id: Set(Uuid::new_v4()),
            request_code: Set(code.to_string()),
            location_id: Set(session.location_id),
            tech_id: Set(session.tech_id),
            category: Set(input.category),
            instrument_type: Set(input.instrument_type.clone()),
            brand: Set(input.brand.clone()),
            quantity_requested: Set(input.quantity_requested),
            quantity_fulfilled: Set(None),
            priority: Set(input.priority),
            status: Set(self.lifecycle.initial_status()),
            notes: Set(input.notes.clone()),
            fulfillment_notes: Set(None),
            fulfilled_by: Set(None),
            shipped_at: Set(None),
            expected_delivery: Set(None),
            started_at: Set(None),
            completed_at: Set(None),
            picked_up_at: Set(None),
            fulfilled_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let request = request.insert(&txn).await?;

        let details = json!({
            "request_code": request.request_code,
            "instrument_type": request.instrument_type,
            "quantity_requested": request.quantity_requested,
        });
        activity::append(&txn, request.id, "REQUEST_CREATED", details, &session.tech_name)
            .await
            .map_err(|e| DbErr::Custom(e.to_string()))?;

        txn.commit().await?;
        Ok(request)
    }

    /// Filtered, joined view of the request collection, newest first.
    ///
    /// The read carries the auto-escalation side effect: stale `Shipped`
    /// records are reconciled to `Received` and every resulting write is
    /// awaited before the records are handed back, so the caller never sees
    /// a state the store does not hold.
    #[instrument(skip(self))]
    pub async fn list_requests(
        &self,
        filters: RequestFilters,
    ) -> Result<Vec<RequestWithRefs>, ServiceError> {
        let mut query = refurb_request::Entity::find();

        if let Some(location_id) = filters.location_id {
            query = query.filter(refurb_request::Column::LocationId.eq(location_id));
        }
        if let Some(tech_id) = filters.tech_id {
            query = query.filter(refurb_request::Column::TechId.eq(tech_id));
        }
        if let Some(status) = filters.status {
            query = query.filter(refurb_request::Column::Status.eq(status));
        }
        if filters.exclude_picked_up {
            query = query.filter(refurb_request::Column::Status.ne(RequestStatus::PickedUp));
        }

        let requests = query
            .order_by_desc(refurb_request::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let (requests, pending) = escalation::reconcile(requests, Utc::now().date_naive());
        self.persist_escalations(&pending).await?;

        let locations = requests.load_one(location::Entity, &*self.db).await?;
        let technicians = requests.load_one(technician::Entity, &*self.db).await?;

        Ok(requests
            .into_iter()
            .zip(locations)
            .zip(technicians)
            .map(|((request, location), technician)| RequestWithRefs {
                request,
                location,
                technician,
            })
            .collect())
    }

    /// One request with its joined reference data. Runs the same
    /// reconciliation as the collection read.
    #[instrument(skip(self))]
    pub async fn get_request(&self, request_id: Uuid) -> Result<Option<RequestWithRefs>, ServiceError> {
        let Some(request) = refurb_request::Entity::find_by_id(request_id)
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };

        let (mut requests, pending) =
            escalation::reconcile(vec![request], Utc::now().date_naive());
        self.persist_escalations(&pending).await?;
        let request = requests.remove(0);

        let location = location::Entity::find_by_id(request.location_id)
            .one(&*self.db)
            .await?;
        let technician = technician::Entity::find_by_id(request.tech_id)
            .one(&*self.db)
            .await?;

        Ok(Some(RequestWithRefs {
            request,
            location,
            technician,
        }))
    }

    /// Per-record conditional writes for reconciled escalations. Each update
    /// is guarded on the row still being `Shipped`, so a concurrent reader
    /// running the same reconciliation cannot double-fire the transition.
    async fn persist_escalations(
        &self,
        pending: &[PendingEscalation],
    ) -> Result<(), ServiceError> {
        if pending.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let writes = pending.iter().map(|p| {
            let db = self.db.clone();
            let p = p.clone();
            async move {
                let result = refurb_request::Entity::update_many()
                    .col_expr(refurb_request::Column::Status, Expr::value(p.to))
                    .col_expr(refurb_request::Column::UpdatedAt, Expr::value(now))
                    .filter(refurb_request::Column::Id.eq(p.request_id))
                    .filter(refurb_request::Column::Status.eq(p.from))
                    .exec(&*db)
                    .await?;
                Ok::<_, DbErr>((p, result.rows_affected))
            }
        });

        for (p, rows_affected) in try_join_all(writes).await? {
            if rows_affected == 0 {
                // Lost the race to another reader; nothing to record.
                continue;
            }
            // Audit and notification are background enrichment on this path;
            // a failure here must not break the read.
            let action = format!("STATUS_CHANGED_TO_{}", p.to.action_suffix());
            let details = json!({ "from": p.from, "to": p.to, "auto": true });
            if let Err(e) =
                activity::append(&*self.db, p.request_id, &action, details, "system").await
            {
                warn!("failed to log escalation for request {}: {}", p.request_id, e);
            }
            self.emit(Event::RequestEscalated(p.request_id)).await;
        }
        Ok(())
    }

    /// Applies a lifecycle transition, stamping the timestamps the rule
    /// defines and appending the audit entry in the same transaction.
    #[instrument(skip(self, payload), fields(request_id = %request_id, to = %requested))]
    pub async fn transition_request(
        &self,
        request_id: Uuid,
        requested: RequestStatus,
        payload: TransitionPayload,
        performed_by: &str,
    ) -> Result<TransitionOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let request = refurb_request::Entity::find_by_id(request_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                error!("Request {} not found", request_id);
                ServiceError::NotFound(format!("Request {} not found", request_id))
            })?;

        let old_status = request.status;
        let rule = self
            .lifecycle
            .attempt_transition(old_status, requested, &payload)?;

        let quantity_mismatch = rule.to == RequestStatus::Fulfilled
            && payload.quantity_fulfilled != Some(request.quantity_requested);
        let quantity_requested = request.quantity_requested;

        let now = Utc::now();
        let mut active: refurb_request::ActiveModel = request.into();
        active.status = Set(rule.to);
        active.updated_at = Set(now);

        match rule.stamp {
            Stamp::Shipped => {
                active.shipped_at = Set(Some(now));
                active.expected_delivery = Set(payload.expected_delivery);
            }
            Stamp::Started => active.started_at = Set(Some(now)),
            Stamp::Completed => active.completed_at = Set(Some(now)),
            Stamp::PickedUp => active.picked_up_at = Set(Some(now)),
            Stamp::Fulfilled => {
                active.fulfilled_at = Set(Some(now));
                active.quantity_fulfilled = Set(payload.quantity_fulfilled);
                active.fulfilled_by = Set(payload.fulfilled_by.clone());
            }
            Stamp::None => {}
        }
        if payload.fulfillment_notes.is_some() {
            active.fulfillment_notes = Set(payload.fulfillment_notes.clone());
        }

        let updated = active.update(&txn).await?;

        let mut details = json!({ "from": old_status, "to": rule.to });
        if let Some(expected) = payload.expected_delivery {
            details["expected_delivery"] = json!(expected);
        }
        if let Some(quantity) = payload.quantity_fulfilled {
            details["quantity_fulfilled"] = json!(quantity);
            details["quantity_requested"] = json!(quantity_requested);
        }
        if let Some(by) = &payload.fulfilled_by {
            details["fulfilled_by"] = json!(by);
        }
        if let Some(notes) = &payload.fulfillment_notes {
            details["fulfillment_notes"] = json!(notes);
        }
        let action = format!("STATUS_CHANGED_TO_{}", rule.to.action_suffix());
        activity::append(&txn, request_id, &action, details, performed_by).await?;

        txn.commit().await?;

        info!(
            "Request {} transitioned from '{}' to '{}'",
            request_id, old_status, rule.to
        );
        if quantity_mismatch {
            warn!(
                "Request {} fulfilled {:?} of {} requested units",
                request_id, payload.quantity_fulfilled, quantity_requested
            );
        }
        self.emit(Event::RequestStatusChanged {
            request_id,
            old_status,
            new_status: rule.to,
        })
        .await;

        Ok(TransitionOutcome {
            request: updated,
            quantity_mismatch,
        })
    }

    /// Hub ships a request out to the repair bench.
    pub async fn ship_request(
        &self,
        request_id: Uuid,
        expected_delivery: chrono::NaiveDate,
        performed_by: &str,
    ) -> Result<TransitionOutcome, ServiceError> {
        let payload = TransitionPayload {
            expected_delivery: Some(expected_delivery),
            ..Default::default()
        };
        self.transition_request(request_id, RequestStatus::Shipped, payload, performed_by)
            .await
    }

    /// Technician starts working a received request.
    pub async fn start_work(
        &self,
        session: &TechSession,
        request_id: Uuid,
    ) -> Result<TransitionOutcome, ServiceError> {
        self.transition_request(
            request_id,
            RequestStatus::InProgress,
            TransitionPayload::default(),
            &session.tech_name,
        )
        .await
    }

    /// Technician finishes the work; the request is ready for pickup.
    pub async fn complete_work(
        &self,
        session: &TechSession,
        request_id: Uuid,
    ) -> Result<TransitionOutcome, ServiceError> {
        self.transition_request(
            request_id,
            RequestStatus::Complete,
            TransitionPayload::default(),
            &session.tech_name,
        )
        .await
    }

    /// Hub confirms the finished instruments were picked up.
    pub async fn confirm_pickup(
        &self,
        request_id: Uuid,
        performed_by: &str,
    ) -> Result<TransitionOutcome, ServiceError> {
        self.transition_request(
            request_id,
            RequestStatus::PickedUp,
            TransitionPayload::default(),
            performed_by,
        )
        .await
    }

    /// Operator takes a pending request in hand (fulfillment flow).
    pub async fn begin_fulfillment(
        &self,
        request_id: Uuid,
        performed_by: &str,
    ) -> Result<TransitionOutcome, ServiceError> {
        self.transition_request(
            request_id,
            RequestStatus::InProgress,
            TransitionPayload::default(),
            performed_by,
        )
        .await
    }

    /// Operator fulfills a request. A quantity short of (or beyond) the ask
    /// flags a mismatch on the outcome but goes through regardless.
    pub async fn fulfill_request(
        &self,
        request_id: Uuid,
        quantity_fulfilled: i32,
        fulfilled_by: &str,
        fulfillment_notes: Option<String>,
    ) -> Result<TransitionOutcome, ServiceError> {
        let payload = TransitionPayload {
            quantity_fulfilled: Some(quantity_fulfilled),
            fulfilled_by: Some(fulfilled_by.to_string()),
            fulfillment_notes,
            ..Default::default()
        };
        self.transition_request(request_id, RequestStatus::Fulfilled, payload, fulfilled_by)
            .await
    }

    /// Operator cancels an open request with a free-text reason.
    pub async fn cancel_request(
        &self,
        request_id: Uuid,
        reason: Option<String>,
        performed_by: &str,
    ) -> Result<TransitionOutcome, ServiceError> {
        let payload = TransitionPayload {
            fulfillment_notes: reason,
            ..Default::default()
        };
        self.transition_request(request_id, RequestStatus::Cancelled, payload, performed_by)
            .await
    }

    /// Count of requests in each state of the active lifecycle, zero
    /// included, in flow order. Backs the dashboard stat cards.
    #[instrument(skip(self))]
    pub async fn status_counts(&self) -> Result<Vec<(RequestStatus, u64)>, ServiceError> {
        let states = self.lifecycle.states();
        let counts = try_join_all(states.iter().map(|state| {
            let db = self.db.clone();
            let state = *state;
            async move {
                refurb_request::Entity::find()
                    .filter(refurb_request::Column::Status.eq(state))
                    .count(&*db)
                    .await
            }
        }))
        .await?;

        Ok(states.iter().copied().zip(counts).collect())
    }

    /// Event delivery is enrichment; a full channel must not fail the write
    /// that already committed.
    async fn emit(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!("failed to emit event: {}", e);
        }
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

//! Daily completion logging and reads.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, LoaderTrait,
    QueryFilter, QueryOrder,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{daily_completion, location, technician, InstrumentCategory};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::session::TechSession;

/// Filters for the completion log view.
#[derive(Debug, Clone, Default)]
pub struct CompletionFilters {
    pub location_id: Option<Uuid>,
    pub tech_id: Option<Uuid>,
    pub since: Option<NaiveDate>,
}

/// A completion together with its joined reference data.
#[derive(Debug, Clone)]
pub struct CompletionWithRefs {
    pub completion: daily_completion::Model,
    pub location: Option<location::Model>,
    pub technician: Option<technician::Model>,
}

/// Submission payload for one day's output on a single instrument line.
///
/// Both QC booleans must be set; the form enforces the same rule client-side
/// but the service is the authority.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LogCompletionInput {
    pub category: InstrumentCategory,
    #[validate(length(min = 1, max = 50, message = "Instrument type must be between 1 and 50 characters"))]
    pub instrument_type: String,
    #[validate(length(min = 1, max = 50, message = "Brand must be between 1 and 50 characters"))]
    pub brand: String,
    #[validate(range(min = 1, max = 999, message = "Quantity must be between 1 and 999"))]
    pub quantity_completed: i32,
    pub yellow_armband_applied: bool,
    pub qc_card_signed: bool,
    pub notes: Option<String>,
    /// Defaults to today when absent.
    pub completion_date: Option<NaiveDate>,
}

/// Service for the daily completion log.
#[derive(Clone)]
pub struct CompletionService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CompletionService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Logs one completed batch for the session technician.
    #[instrument(skip(self, session, input), fields(store = %session.store_number))]
    pub async fn log_completion(
        &self,
        session: &TechSession,
        input: LogCompletionInput,
    ) -> Result<daily_completion::Model, ServiceError> {
        input.validate()?;
        if !input.yellow_armband_applied || !input.qc_card_signed {
            return Err(ServiceError::ValidationError(
                "Both QC confirmations are required before logging a completion".to_string(),
            ));
        }

        let now = Utc::now();
        let completion = daily_completion::ActiveModel {
            id: Set(Uuid::new_v4()),
            location_id: Set(session.location_id),
            tech_id: Set(session.tech_id),
            category: Set(input.category),
            instrument_type: Set(input.instrument_type),
            brand: Set(input.brand),
            quantity_completed: Set(input.quantity_completed),
            yellow_armband_applied: Set(input.yellow_armband_applied),
            qc_card_signed: Set(input.qc_card_signed),
            notes: Set(input.notes),
            completion_date: Set(input.completion_date.unwrap_or_else(|| now.date_naive())),
            created_at: Set(now),
        };
        let completion = completion.insert(&*self.db).await?;

        info!(
            "Completion {} logged: {}x {} at store {}",
            completion.id, completion.quantity_completed, completion.instrument_type,
            session.store_number
        );
        if let Err(e) = self
            .event_sender
            .send(Event::CompletionLogged(completion.id))
            .await
        {
            warn!("failed to emit event: {}", e);
        }
        Ok(completion)
    }

    /// Filtered, joined view of the completion log, newest day first.
    #[instrument(skip(self))]
    pub async fn list_completions(
        &self,
        filters: CompletionFilters,
    ) -> Result<Vec<CompletionWithRefs>, ServiceError> {
        let mut query = daily_completion::Entity::find();

        if let Some(location_id) = filters.location_id {
            query = query.filter(daily_completion::Column::LocationId.eq(location_id));
        }
        if let Some(tech_id) = filters.tech_id {
            query = query.filter(daily_completion::Column::TechId.eq(tech_id));
        }
        if let Some(since) = filters.since {
            query = query.filter(daily_completion::Column::CompletionDate.gte(since));
        }

        let completions = query
            .order_by_desc(daily_completion::Column::CompletionDate)
            .order_by_desc(daily_completion::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let locations = completions.load_one(location::Entity, &*self.db).await?;
        let technicians = completions.load_one(technician::Entity, &*self.db).await?;

        Ok(completions
            .into_iter()
            .zip(locations)
            .zip(technicians)
            .map(|((completion, location), technician)| CompletionWithRefs {
                completion,
                location,
                technician,
            })
            .collect())
    }
}

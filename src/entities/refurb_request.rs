use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Request status enumeration.
///
/// This is the canonical superset across both deployment lifecycles; the
/// active `LifecycleDefinition` constrains which members are legal for a
/// given installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum RequestStatus {
    // Shipping lifecycle
    #[sea_orm(string_value = "Requested")]
    Requested,
    #[sea_orm(string_value = "Shipped")]
    Shipped,
    #[sea_orm(string_value = "Received")]
    Received,
    #[sea_orm(string_value = "Complete")]
    Complete,
    #[sea_orm(string_value = "Picked Up")]
    PickedUp,

    // Fulfillment lifecycle
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Fulfilled")]
    Fulfilled,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,

    // Shared by both lifecycles
    #[sea_orm(string_value = "In Progress")]
    InProgress,
}

impl RequestStatus {
    /// Suffix used when writing `STATUS_CHANGED_TO_<STATE>` audit actions.
    pub fn action_suffix(&self) -> &'static str {
        match self {
            RequestStatus::Requested => "REQUESTED",
            RequestStatus::Shipped => "SHIPPED",
            RequestStatus::Received => "RECEIVED",
            RequestStatus::InProgress => "IN_PROGRESS",
            RequestStatus::Complete => "COMPLETE",
            RequestStatus::PickedUp => "PICKED_UP",
            RequestStatus::Pending => "PENDING",
            RequestStatus::Fulfilled => "FULFILLED",
            RequestStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Requested => write!(f, "Requested"),
            RequestStatus::Shipped => write!(f, "Shipped"),
            RequestStatus::Received => write!(f, "Received"),
            RequestStatus::InProgress => write!(f, "In Progress"),
            RequestStatus::Complete => write!(f, "Complete"),
            RequestStatus::PickedUp => write!(f, "Picked Up"),
            RequestStatus::Pending => write!(f, "Pending"),
            RequestStatus::Fulfilled => write!(f, "Fulfilled"),
            RequestStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Request priority enumeration (fulfillment deployments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Priority {
    #[sea_orm(string_value = "Low")]
    Low,
    #[sea_orm(string_value = "Medium")]
    Medium,
    #[sea_orm(string_value = "High")]
    High,
    #[sea_orm(string_value = "Urgent")]
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
            Priority::Urgent => write!(f, "Urgent"),
        }
    }
}

/// Instrument category enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum InstrumentCategory {
    #[sea_orm(string_value = "Brass")]
    Brass,
    #[sea_orm(string_value = "Woodwinds")]
    Woodwinds,
    #[sea_orm(string_value = "Strings")]
    Strings,
}

impl fmt::Display for InstrumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentCategory::Brass => write!(f, "Brass"),
            InstrumentCategory::Woodwinds => write!(f, "Woodwinds"),
            InstrumentCategory::Strings => write!(f, "Strings"),
        }
    }
}

/// A refurbishment request moving through the lifecycle.
///
/// Mutated only through lifecycle transitions; never arbitrary field edits.
/// Timestamps are populated monotonically in transition order.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "refurb_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-readable code, `{store}-{YYYYMMDD}-{seq:04}`. Stable once issued.
    #[sea_orm(unique)]
    pub request_code: String,

    pub location_id: Uuid,
    pub tech_id: Uuid,

    pub category: Option<InstrumentCategory>,
    pub instrument_type: String,
    pub brand: Option<String>,

    pub quantity_requested: i32,
    pub quantity_fulfilled: Option<i32>,
    pub priority: Option<Priority>,

    pub status: RequestStatus,
    pub notes: Option<String>,
    pub fulfillment_notes: Option<String>,
    pub fulfilled_by: Option<String>,

    pub shipped_at: Option<DateTime<Utc>>,
    pub expected_delivery: Option<NaiveDate>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
    #[sea_orm(
        belongs_to = "super::technician::Entity",
        from = "Column::TechId",
        to = "super::technician::Column::Id"
    )]
    Technician,
    #[sea_orm(has_many = "super::activity_log::Entity")]
    ActivityLog,
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl Related<super::technician::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Technician.def()
    }
}

impl Related<super::activity_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::refurb_request::InstrumentCategory;

/// One technician's logged output for a single day and instrument line.
///
/// The submission form only allows creation when both QC booleans are checked,
/// but nothing downstream may rely on that; the aggregator tolerates any
/// stored value.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_completions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub location_id: Uuid,
    pub tech_id: Uuid,

    pub category: InstrumentCategory,
    pub instrument_type: String,
    pub brand: String,
    pub quantity_completed: i32,

    pub yellow_armband_applied: bool,
    pub qc_card_signed: bool,
    pub notes: Option<String>,

    pub completion_date: NaiveDate,
    pub created_at: DateTime<Utc>,
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

impl ActiveModelBehavior for ActiveModel {}

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A field store location. Reference data, created through an administrative
/// surface outside this crate.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "locations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub store_number: String,

    pub city: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::technician::Entity")]
    Technicians,
    #[sea_orm(has_many = "super::refurb_request::Entity")]
    RefurbRequests,
    #[sea_orm(has_many = "super::daily_completion::Entity")]
    DailyCompletions,
}

impl Related<super::technician::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Technicians.def()
    }
}

impl Related<super::refurb_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RefurbRequests.def()
    }
}

impl Related<super::daily_completion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DailyCompletions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

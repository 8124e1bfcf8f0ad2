use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A repair technician assigned to a store location.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "technicians")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,
    pub email: Option<String>,
    pub location_id: Uuid,

    /// Four-digit PIN used for lightweight identity verification at the
    /// portal. Not a credential; compared by equality only.
    pub pin: String,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Plain equality check. There is deliberately no hashing or lockout
    /// here; the PIN only scopes which technician a session belongs to.
    pub fn verify_pin(&self, pin: &str) -> bool {
        self.is_active && self.pin == pin
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
    #[sea_orm(has_many = "super::refurb_request::Entity")]
    RefurbRequests,
    #[sea_orm(has_many = "super::daily_completion::Entity")]
    DailyCompletions,
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
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

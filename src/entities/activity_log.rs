use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit trail. One entry per lifecycle transition; entries are
/// never mutated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub request_id: Uuid,

    /// e.g. `REQUEST_CREATED`, `STATUS_CHANGED_TO_FULFILLED`.
    pub action: String,

    /// Whatever transition fields were supplied, as JSON.
    pub details: Json,

    pub performed_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::refurb_request::Entity",
        from = "Column::RequestId",
        to = "super::refurb_request::Column::Id"
    )]
    RefurbRequest,
}

impl Related<super::refurb_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RefurbRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

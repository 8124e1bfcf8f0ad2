//! Append-only audit trail writes and reads.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::entities::activity_log;
use crate::errors::ServiceError;

/// Appends one audit entry. Callers performing a lifecycle transition pass
/// their open transaction so the entry commits atomically with the status
/// write.
pub async fn append<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
    action: &str,
    details: serde_json::Value,
    performed_by: &str,
) -> Result<activity_log::Model, ServiceError> {
    let entry = activity_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        request_id: Set(request_id),
        action: Set(action.to_string()),
        details: Set(details),
        performed_by: Set(performed_by.to_string()),
        created_at: Set(Utc::now()),
    };
    Ok(entry.insert(conn).await?)
}

/// Full trail for one request, oldest first.
pub async fn for_request<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
) -> Result<Vec<activity_log::Model>, ServiceError> {
    Ok(activity_log::Entity::find()
        .filter(activity_log::Column::RequestId.eq(request_id))
        .order_by_asc(activity_log::Column::CreatedAt)
        .all(conn)
        .await?)
}

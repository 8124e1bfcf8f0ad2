use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session descriptor issued by the excluded auth layer.
///
/// The engine never creates or validates one of these and never reads
/// ambient session state; callers thread it explicitly into every scoped
/// operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechSession {
    pub location_id: Uuid,
    pub tech_id: Uuid,
    pub tech_name: String,
    pub location_city: String,
    pub store_number: String,
}

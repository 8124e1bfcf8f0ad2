//! Human-readable request code generation.
//!
//! Codes look like `9397-20260115-0001`: store number, day, then a four-digit
//! sequence scoped to that store-day. The sequence is derived from a count of
//! existing codes with the same prefix, which is not atomic under concurrent
//! submissions; the request service closes that race with the UNIQUE
//! constraint on `request_code` plus a single recount-and-retry.

use chrono::NaiveDate;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

use crate::entities::refurb_request;
use crate::errors::ServiceError;

/// Store-day prefix shared by every code minted for `store_number` on `date`.
pub fn code_prefix(store_number: &str, date: NaiveDate) -> String {
    format!("{}-{}", store_number, date.format("%Y%m%d"))
}

/// Formats a full code. Sequences are zero-padded to four digits; a store-day
/// that somehow exceeds 9999 submissions widens rather than truncates.
pub fn format_code(store_number: &str, date: NaiveDate, sequence: u32) -> String {
    format!("{}-{:04}", code_prefix(store_number, date), sequence)
}

/// Next sequence for a store-day that already has `existing` codes.
pub fn next_sequence(existing: u64) -> u32 {
    existing as u32 + 1
}

/// Counts existing codes for the store-day and mints the next one.
pub async fn next_code<C: ConnectionTrait>(
    conn: &C,
    store_number: &str,
    date: NaiveDate,
) -> Result<String, ServiceError> {
    let prefix = code_prefix(store_number, date);
    let existing = refurb_request::Entity::find()
        .filter(refurb_request::Column::RequestCode.starts_with(&prefix))
        .count(conn)
        .await?;
    Ok(format_code(store_number, date, next_sequence(existing)))
}

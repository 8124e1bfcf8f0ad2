//! Lazy auto-escalation of stale in-transit requests.
//!
//! A request sitting in `Shipped` is advanced to `Received` once its expected
//! delivery date has elapsed. The rule fires on read, not on a timer, so the
//! read path carries a write side effect. That impurity is kept visible by
//! splitting the rule into two phases: a pure [`reconcile`] that computes the
//! escalated view plus the pending writes, and a persistence step owned by
//! the request service that awaits every write before the fetch returns.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::entities::{refurb_request, RequestStatus};

/// A conditional status write produced by [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEscalation {
    pub request_id: Uuid,
    pub from: RequestStatus,
    pub to: RequestStatus,
}

/// First phase: flips every `Shipped` record whose `expected_delivery` is on
/// or before `today` (date-only comparison) to `Received` in the returned
/// view, and emits one pending write per flipped record.
///
/// Idempotent: a record already escalated is no longer `Shipped`, so a second
/// pass produces no writes.
pub fn reconcile(
    records: Vec<refurb_request::Model>,
    today: NaiveDate,
) -> (Vec<refurb_request::Model>, Vec<PendingEscalation>) {
    let mut pending = Vec::new();
    let records = records
        .into_iter()
        .map(|mut record| {
            if is_due(&record, today) {
                pending.push(PendingEscalation {
                    request_id: record.id,
                    from: record.status,
                    to: RequestStatus::Received,
                });
                record.status = RequestStatus::Received;
            }
            record
        })
        .collect();
    (records, pending)
}

fn is_due(record: &refurb_request::Model, today: NaiveDate) -> bool {
    record.status == RequestStatus::Shipped
        && record
            .expected_delivery
            .map(|due| due <= today)
            .unwrap_or(false)
}

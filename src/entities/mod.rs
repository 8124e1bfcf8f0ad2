//! SeaORM entities for the refurb hub backing store.

pub mod activity_log;
pub mod daily_completion;
pub mod location;
pub mod refurb_request;
pub mod technician;

pub use refurb_request::{InstrumentCategory, Priority, RequestStatus};

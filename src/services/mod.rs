pub mod activity;
pub mod completions;
pub mod metrics;
pub mod request_codes;
pub mod requests;

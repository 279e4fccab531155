//! Utility functions for identifiers and timestamp handling.

pub mod timestamps;

pub use timestamps::{
    format_duration, iso_timestamp, now_utc, parse_host_timestamp, parse_schedule_time,
    Timestamp, TimestampError,
};

use uuid::Uuid;

/// Generates a new run identifier.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}

//! Wall clock access.

use std::time::{SystemTime, UNIX_EPOCH};

use types::Timestamp;

/// Current wall time in milliseconds since the Unix epoch.
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

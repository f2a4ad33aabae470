//! Injectable wall clock.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of the current time. Shared services take one so tests can move
/// time forward without sleeping.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The real UTC clock.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

//! Small shared helpers.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Throttles a repeated warning to at most once per window.
///
/// Handed to the source at construction rather than living in process-wide
/// static state, so two repository sources never share a throttle.
#[derive(Debug)]
pub struct RateLimitedWarner {
    window: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimitedWarner {
    pub fn new(window: Duration) -> Self {
        Self { window, last: Mutex::new(None) }
    }

    /// Returns true at most once per window; callers log only on true.
    pub fn should_warn(&self) -> bool {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.window => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

impl Default for RateLimitedWarner {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}

//! Per-source request pacing.
//!
//! Each source id gets its own lock and last-issue timestamp; pacing one
//! source never blocks fetches of another. The timestamp is recorded at the
//! moment a request is cleared to issue, not at completion.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Per-key rate limiter enforcing a minimum interval between request issues.
///
/// # Examples
///
/// ```
/// use talkless_ingest::rate_limit::RateLimiter;
///
/// # async fn example() {
/// let limiter = RateLimiter::new();
/// limiter.acquire("ap", 60).await; // first acquire returns immediately
/// # }
/// ```
#[derive(Default)]
pub struct RateLimiter {
    keys: Mutex<HashMap<String, Arc<Mutex<Option<Instant>>>>>,
}

impl RateLimiter {
    /// Create an empty limiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until a request for `key` may be issued, then record the issue
    /// time. `requests_per_minute == 0` disables pacing for the key.
    pub async fn acquire(&self, key: &str, requests_per_minute: u32) {
        if requests_per_minute == 0 {
            return;
        }
        let interval = Duration::from_secs_f64(60.0 / f64::from(requests_per_minute));

        // The outer lock only guards the key map; waiting happens under the
        // per-key lock so different sources pace independently.
        let slot = {
            let mut keys = self.keys.lock().await;
            keys.entry(key.to_string()).or_default().clone()
        };

        let mut last = slot.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + interval;
            let now = Instant::now();
            if ready_at > now {
                sleep(ready_at - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}

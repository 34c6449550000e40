//! Fixed-window request counting, kept in process memory.
//!
//! State lives in a map behind a mutex and is reset lazily when a key's
//! window elapses. This is best-effort and single-process: running more
//! than one server instance requires moving the counters into a shared
//! store with TTLs, not replicating this map.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    count: u32,
    reset_at: Instant,
}

/// Outcome of a single `check` call.
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: Instant,
}

#[derive(Clone, Default)]
pub struct RateLimiter {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request against `key`. The request that makes the count
    /// equal `max_requests` is still allowed; the next one in the same
    /// window is the first rejected.
    pub fn check(&self, key: &str, max_requests: u32, window: Duration) -> Decision {
        let mut entries = self.entries.lock();
        let now = Instant::now();

        match entries.get_mut(key) {
            Some(entry) if now < entry.reset_at => {
                entry.count += 1;
                Decision {
                    allowed: entry.count <= max_requests,
                    remaining: max_requests.saturating_sub(entry.count),
                    reset_at: entry.reset_at,
                }
            }
            _ => {
                let reset_at = now + window;
                entries.insert(key.to_string(), Entry { count: 1, reset_at });
                Decision {
                    allowed: true,
                    remaining: max_requests.saturating_sub(1),
                    reset_at,
                }
            }
        }
    }
}

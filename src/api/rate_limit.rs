//! Per-credential request spacing.
//!
//! The upstream service rate-limits per API token, so the gate keys on
//! clan id: consecutive requests for the same clan are spaced by at
//! least the configured window, while different clans never wait on
//! each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Minimum inter-request delay, per key.
pub struct RateGate {
    min_interval: Duration,
    slots: StdMutex<HashMap<i64, Arc<Mutex<Option<Instant>>>>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            slots: StdMutex::new(HashMap::new()),
        }
    }

    /// Wait until a request for `key` is allowed, then claim the slot.
    ///
    /// Holding the per-key lock across the sleep serializes same-key
    /// callers; the outer map lock is only held to fetch the slot.
    pub async fn wait(&self, key: i64) {
        let slot = {
            let mut slots = self.slots.lock().expect("rate gate lock poisoned");
            slots.entry(key).or_default().clone()
        };

        let mut last = slot.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_requests_are_spaced() {
        let gate = RateGate::new(Duration::from_millis(50));

        let start = Instant::now();
        gate.wait(776).await;
        gate.wait(776).await;

        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_different_keys_do_not_wait() {
        let gate = RateGate::new(Duration::from_millis(200));

        let start = Instant::now();
        gate.wait(776).await;
        gate.wait(801).await;

        // Only the first request per key claims a slot; no spacing applies.
        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let gate = RateGate::new(Duration::from_secs(5));

        let start = Instant::now();
        gate.wait(776).await;

        assert!(start.elapsed() < Duration::from_millis(100));
    }
}

//! Process-wide API-call budget
//!
//! A token bucket shared by every monitor task so the combined request rate
//! stays under the exchange limit.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket limiting calls per second across tasks
#[derive(Debug)]
pub struct ApiBudget {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl ApiBudget {
    /// Create a budget allowing `per_second` calls with bursts up to `burst`
    pub fn new(per_second: u32, burst: u32) -> Self {
        let capacity = burst.max(1) as f64;
        Self {
            capacity,
            refill_per_sec: per_second.max(1) as f64,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }

    /// Take one token, waiting until one is available
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                let missing = 1.0 - state.tokens;
                Duration::from_secs_f64(missing / self.refill_per_sec)
            };
            tracing::trace!(wait_ms = wait.as_millis() as u64, "API budget exhausted, waiting");
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::{assert_pending, task};

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_wait() {
        let budget = ApiBudget::new(2, 3);
        let start = Instant::now();
        for _ in 0..3 {
            budget.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        budget.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(499));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_over_time() {
        let budget = ApiBudget::new(2, 2);
        budget.acquire().await;
        budget.acquire().await;

        tokio::time::advance(Duration::from_secs(10)).await;
        let start = Instant::now();
        budget.acquire().await;
        budget.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        // capped at burst
        budget.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(499));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_token() {
        let budget = ApiBudget::new(1, 1);
        budget.acquire().await;

        let start = Instant::now();
        budget.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(999));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_bucket_parks_caller() {
        let budget = ApiBudget::new(1, 1);
        budget.acquire().await;

        let mut waiting = task::spawn(budget.acquire());
        assert_pending!(waiting.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_between_tasks() {
        let budget = Arc::new(ApiBudget::new(10, 4));
        let start = Instant::now();
        let mut handles = vec![];
        for _ in 0..4 {
            let budget = budget.clone();
            handles.push(tokio::spawn(async move { budget.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        budget.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(99));
    }
}

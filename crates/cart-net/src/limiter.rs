//! Sliding-window rate limiter shared by all pipelines in the process.
//!
//! Applied only to public endpoints. Tracks request timestamps over a
//! rolling window and a `retry_after_until` gate advanced by 429 responses;
//! `acquire` suspends until both allow another request.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep_until, Instant};

/// Rate limiter configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub capacity: usize,
    /// Window width
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // The ledger's documented public limit: 40 requests per 10 seconds.
        Self {
            capacity: 40,
            window: Duration::from_secs(10),
        }
    }
}

struct State {
    timestamps: VecDeque<Instant>,
    retry_after_until: Option<Instant>,
}

/// Shared rate gate for public endpoints.
pub struct RateGate {
    config: RateLimitConfig,
    state: Mutex<State>,
}

impl RateGate {
    /// Creates a gate with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                timestamps: VecDeque::new(),
                retry_after_until: None,
            }),
        }
    }

    /// Creates a gate with the default public limits.
    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    /// Advances the retry-after gate; requests block until the deadline.
    pub fn set_retry_after(&self, retry_after: Duration) {
        let until = Instant::now() + retry_after;
        let mut state = self.state.lock();
        match state.retry_after_until {
            Some(existing) if existing >= until => {}
            _ => state.retry_after_until = Some(until),
        }
    }

    /// Waits until a request slot is available, then claims it.
    pub async fn acquire(&self) {
        loop {
            match self.try_claim() {
                None => return,
                Some(until) => sleep_until(until).await,
            }
        }
    }

    /// Claims a slot now, or reports when to try again.
    fn try_claim(&self) -> Option<Instant> {
        let mut state = self.state.lock();
        let now = Instant::now();

        if let Some(until) = state.retry_after_until {
            if until > now {
                return Some(until);
            }
            state.retry_after_until = None;
        }

        while let Some(&front) = state.timestamps.front() {
            if now.duration_since(front) >= self.config.window {
                state.timestamps.pop_front();
            } else {
                break;
            }
        }

        if state.timestamps.len() < self.config.capacity {
            state.timestamps.push_back(now);
            None
        } else {
            state.timestamps.front().map(|t| *t + self.config.window)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_window_capacity_is_enforced() {
        let gate = RateGate::new(RateLimitConfig {
            capacity: 3,
            window: Duration::from_secs(10),
        });

        let start = Instant::now();
        for _ in 0..3 {
            gate.acquire().await;
        }
        // No waiting within capacity.
        assert_eq!(Instant::now(), start);

        // The fourth request waits for the window to roll.
        gate.acquire().await;
        assert!(Instant::now().duration_since(start) >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let gate = RateGate::new(RateLimitConfig {
            capacity: 2,
            window: Duration::from_secs(10),
        });

        gate.acquire().await;
        tokio::time::advance(Duration::from_secs(6)).await;
        gate.acquire().await;

        // First slot expires at t=10; the third acquire lands there.
        let before = Instant::now();
        gate.acquire().await;
        let waited = Instant::now().duration_since(before);
        assert!(waited >= Duration::from_secs(4));
        assert!(waited < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_blocks_requests() {
        let gate = RateGate::new(RateLimitConfig {
            capacity: 100,
            window: Duration::from_secs(10),
        });

        gate.set_retry_after(Duration::from_secs(5));
        let start = Instant::now();
        gate.acquire().await;
        assert!(Instant::now().duration_since(start) >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_does_not_shrink() {
        let gate = RateGate::with_defaults();
        gate.set_retry_after(Duration::from_secs(8));
        gate.set_retry_after(Duration::from_secs(1));

        let start = Instant::now();
        gate.acquire().await;
        assert!(Instant::now().duration_since(start) >= Duration::from_secs(8));
    }
}

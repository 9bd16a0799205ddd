//! Outbound request throttle owned by an LLM client

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Token bucket shared by clones of one client
#[derive(Clone)]
pub struct RateGate {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    per_second: u32,
}

impl RateGate {
    /// Allow `requests_per_second` calls per second, with no burst beyond that
    pub fn per_second(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
            per_second: rps.get(),
        }
    }

    /// Wait until the next call is allowed
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    pub fn per_second_limit(&self) -> u32 {
        self.per_second
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate")
            .field("per_second", &self.per_second)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_second_call_waits() {
        let gate = RateGate::per_second(1);
        let start = Instant::now();
        gate.acquire().await;
        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_zero_rate_falls_back_to_one() {
        let gate = RateGate::per_second(0);
        assert_eq!(gate.per_second_limit(), 1);
        gate.acquire().await;
    }
}

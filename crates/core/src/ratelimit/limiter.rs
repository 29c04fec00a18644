//! Per-service token-bucket rate limiting for upstream API calls.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Per-service request rates (requests per second).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ServiceRates {
    pub cost_explorer: f64,
    pub athena: f64,
    pub cloudwatch: f64,
    pub sts: f64,
}

impl Default for ServiceRates {
    /// Conservative defaults matching upstream service quotas.
    fn default() -> Self {
        Self { cost_explorer: 5.0, athena: 5.0, cloudwatch: 20.0, sts: 10.0 }
    }
}

/// Well-known service names used as limiter keys.
pub const SERVICE_COST_EXPLORER: &str = "CostExplorer";
pub const SERVICE_ATHENA: &str = "Athena";
pub const SERVICE_CLOUDWATCH: &str = "CloudWatch";
pub const SERVICE_STS: &str = "STS";

struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate: f64) -> Self {
        let capacity = rate.max(1.0);
        Self { tokens: capacity, capacity, refill_per_sec: rate, last_refill: Instant::now() }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Takes one token if available, otherwise returns how long to wait
    /// before one will be.
    fn try_take(&mut self) -> Option<Duration> {
        self.refill(Instant::now());
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return None;
        }
        let deficit = 1.0 - self.tokens;
        Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
    }
}

/// Rate-limits upstream API calls per service. Each bucket serializes token
/// issuance internally; unknown service names pass through unlimited.
pub struct ServiceLimiter {
    buckets: HashMap<&'static str, Mutex<TokenBucket>>,
}

impl ServiceLimiter {
    pub fn new(rates: ServiceRates) -> Self {
        let buckets = HashMap::from([
            (SERVICE_COST_EXPLORER, Mutex::new(TokenBucket::new(rates.cost_explorer))),
            (SERVICE_ATHENA, Mutex::new(TokenBucket::new(rates.athena))),
            (SERVICE_CLOUDWATCH, Mutex::new(TokenBucket::new(rates.cloudwatch))),
            (SERVICE_STS, Mutex::new(TokenBucket::new(rates.sts))),
        ]);
        Self { buckets }
    }

    /// Blocks cooperatively until a token is available for the named
    /// service. Cancellation-safe: dropping the future while waiting leaves
    /// no token consumed.
    pub async fn wait(&self, service: &str) {
        let Some(bucket) = self.buckets.get(service) else {
            return; // unknown service = no limit
        };
        loop {
            let delay = {
                let mut bucket = bucket.lock().await;
                bucket.try_take()
            };
            match delay {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }
}

impl Default for ServiceLimiter {
    fn default() -> Self {
        Self::new(ServiceRates::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{SERVICE_ATHENA, SERVICE_COST_EXPLORER, ServiceLimiter, ServiceRates};

    #[tokio::test]
    async fn unknown_service_passes_through() {
        let limiter = ServiceLimiter::default();
        // Must not block no matter how often it is called.
        for _ in 0..100 {
            limiter.wait("NotARealService").await;
        }
    }

    #[tokio::test]
    async fn burst_within_capacity_does_not_block() {
        let limiter = ServiceLimiter::new(ServiceRates {
            cost_explorer: 5.0,
            ..ServiceRates::default()
        });
        let start = tokio::time::Instant::now();
        for _ in 0..5 {
            limiter.wait(SERVICE_COST_EXPLORER).await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_bucket_waits_for_refill() {
        let limiter =
            ServiceLimiter::new(ServiceRates { athena: 2.0, ..ServiceRates::default() });

        // Drain the bucket.
        limiter.wait(SERVICE_ATHENA).await;
        limiter.wait(SERVICE_ATHENA).await;

        // The third call must wait roughly half a second at 2 r/s.
        let start = tokio::time::Instant::now();
        limiter.wait(SERVICE_ATHENA).await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(400), "waited {waited:?}");
    }

    #[tokio::test]
    async fn buckets_are_independent_per_service() {
        let limiter = ServiceLimiter::new(ServiceRates {
            cost_explorer: 1.0,
            cloudwatch: 20.0,
            ..ServiceRates::default()
        });
        limiter.wait(SERVICE_COST_EXPLORER).await;

        // CloudWatch bucket is untouched by CE exhaustion.
        let start = tokio::time::Instant::now();
        limiter.wait(super::SERVICE_CLOUDWATCH).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

/// Delay applied after every media download attempt
#[async_trait]
pub trait Throttle: Send + Sync {
    async fn pause(&self);
}

/// No delay between downloads
#[derive(Debug, Default, Clone, Copy)]
pub struct NoThrottle;

#[async_trait]
impl Throttle for NoThrottle {
    async fn pause(&self) {}
}

/// Sleep for a uniformly random duration within a range
#[derive(Debug, Clone, Copy)]
pub struct RandomThrottle {
    min: Duration,
    max: Duration,
}

impl RandomThrottle {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    /// Pick the next delay
    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

impl Default for RandomThrottle {
    /// Between half a second and ten seconds
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(10))
    }
}

#[async_trait]
impl Throttle for RandomThrottle {
    async fn pause(&self) {
        let delay = self.next_delay();
        debug!(delay_ms = delay.as_millis() as u64, "rate limiting");
        tokio::time::sleep(delay).await;
    }
}

//! How long each reply "thinks" before it is delivered

use rand::Rng;
use std::time::Duration;

/// Delay for the request with sequence number `seq`.
///
/// Delivery order never depends on the returned values; a policy is free
/// to give later requests shorter delays.
pub trait DelayPolicy: Send + Sync {
    fn delay_for(&self, seq: u64) -> Duration;
}

/// Same delay for every request
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl DelayPolicy for FixedDelay {
    fn delay_for(&self, _seq: u64) -> Duration {
        self.0
    }
}

/// `base` plus or minus a uniformly random offset of at most `jitter`
#[derive(Debug, Clone, Copy)]
pub struct JitteredDelay {
    pub base: Duration,
    pub jitter: Duration,
}

impl DelayPolicy for JitteredDelay {
    fn delay_for(&self, _seq: u64) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let spread = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let offset = rand::thread_rng().gen_range(0..=spread.saturating_mul(2));
        (self.base + Duration::from_millis(offset)).saturating_sub(self.jitter)
    }
}

impl<F> DelayPolicy for F
where
    F: Fn(u64) -> Duration + Send + Sync,
{
    fn delay_for(&self, seq: u64) -> Duration {
        self(seq)
    }
}

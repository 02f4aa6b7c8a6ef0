use std::time::Duration;

/// Reconnect backoff policy: exponential doubling with a bounded attempt
/// budget. Attempt `k` (1-based) waits `base_delay * 2^(k-1)`.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based), or `None` once
    /// the budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32 << (attempt - 1).min(31);
        Some(self.base_delay.saturating_mul(factor))
    }
}

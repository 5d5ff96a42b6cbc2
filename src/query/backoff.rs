use std::time::Duration;

/// Bounded exponential backoff used while polling a submitted query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            initial_delay: Duration::from_millis(1000),
            multiplier: 1.5,
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl PollPolicy {
    /// Wait after the zero-based `attempt`: `min(initial * multiplier^attempt, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay.as_millis() as f64;
        let cap = self.max_delay.as_millis() as f64;
        let ms = (initial * self.multiplier.powi(attempt.min(i32::MAX as u32) as i32)).min(cap);
        Duration::from_millis(ms as u64)
    }

    /// Sum of every wait taken when all attempts are used (no wait after the last).
    pub fn total_wait(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|n| self.delay_for(n))
            .sum()
    }
}

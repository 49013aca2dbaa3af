use std::time::Duration;

/// Largest accepted growth factor between two checks.
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// Delay schedule between status checks.
///
/// Starts at `initial`, is multiplied by `multiplier` after every check and is
/// capped at `max`. With a multiplier of 1.0 the interval stays fixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSchedule {
    initial: Duration,
    multiplier: f64,
    max: Duration,
}

impl PollSchedule {
    #[must_use]
    pub fn new(initial: Duration, multiplier: f64, max: Duration) -> Self {
        let multiplier =
            if multiplier.is_finite() { multiplier.clamp(1.0, MAX_BACKOFF_MULTIPLIER) } else { 1.0 };
        Self { initial, multiplier, max: max.max(initial) }
    }

    #[must_use]
    pub fn fixed(interval: Duration) -> Self {
        Self::new(interval, 1.0, interval)
    }

    #[must_use]
    pub const fn initial(&self) -> Duration {
        self.initial
    }

    /// Delay that follows `current`. A product too large for a `Duration`
    /// yields `max`.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier).map_or(self.max, |d| d.min(self.max))
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_schedule_never_changes() {
        let schedule = PollSchedule::default();
        let next = schedule.next_delay(schedule.initial());
        assert_eq!(next, Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_is_capped() {
        let schedule = PollSchedule::new(Duration::from_secs(30), 2.0, Duration::from_secs(100));
        let mut delay = schedule.initial();
        let mut seen = Vec::new();
        for _ in 0..4 {
            delay = schedule.next_delay(delay);
            seen.push(delay.as_secs());
        }
        assert_eq!(seen, vec![60, 100, 100, 100]);
    }

    #[test]
    fn test_huge_delays_saturate_at_max() {
        let schedule = PollSchedule::new(Duration::from_secs(60), 1e300, Duration::MAX);
        let next = schedule.next_delay(Duration::from_secs(u64::MAX));
        assert_eq!(next, Duration::MAX);

        let capped = PollSchedule::new(Duration::from_secs(60), 1e300, Duration::from_secs(300));
        assert_eq!(capped.next_delay(capped.initial()), Duration::from_secs(300));
    }

    #[test]
    fn test_multiplier_below_one_is_clamped() {
        let schedule = PollSchedule::new(Duration::from_secs(10), 0.5, Duration::from_secs(5));
        assert_eq!(schedule.next_delay(schedule.initial()), Duration::from_secs(10));
    }
}

//! Soft timers driven by a monotonic millisecond clock
//!
//! Timers never fire on their own. The owner asks which ones have expired
//! at a given instant and sleeps until the earliest deadline in between.

const MIN_PERIODIC_MS: u32 = 1;

/// Deadline-based software timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timer {
    period_ms: u32,
    deadline: Option<u64>,
    periodic: bool,
}

impl Timer {
    pub const fn one_shot(period_ms: u32) -> Self {
        Self {
            period_ms,
            deadline: None,
            periodic: false,
        }
    }

    pub const fn periodic(period_ms: u32) -> Self {
        Self {
            period_ms,
            deadline: None,
            periodic: true,
        }
    }

    /// Start counting from `now`. Restarts a running timer.
    ///
    /// A one-shot timer with a zero period is due at `now`. A periodic one
    /// is scheduled at least 1 ms out so that rearming always moves its
    /// deadline forward.
    pub fn start(&mut self, now: u64) {
        let period = if self.periodic {
            self.period_ms.max(MIN_PERIODIC_MS)
        } else {
            self.period_ms
        };
        self.deadline = Some(now + u64::from(period));
    }

    /// Same as [`Self::start`]; reads better when extending a deadline
    pub fn reset(&mut self, now: u64) {
        self.start(now);
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn period(&self) -> u32 {
        self.period_ms
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn is_expired(&self, now: u64) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }

    /// Consume an expiry: one-shot timers stop, periodic timers rearm
    pub fn take_expired(&mut self, now: u64) -> bool {
        if !self.is_expired(now) {
            return false;
        }
        if self.periodic {
            self.rearm(now);
        } else {
            self.stop();
        }
        true
    }

    /// Schedule the next period of a periodic timer from `now`
    pub fn rearm(&mut self, now: u64) {
        self.start(now);
    }

    /// Change the period without changing whether the timer runs
    ///
    /// A running timer restarts from `now` with the new period; a stopped
    /// one stays stopped.
    pub fn change_period(&mut self, period_ms: u32, now: u64) {
        self.period_ms = period_ms;
        if self.is_running() {
            self.start(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot() {
        let mut timer = Timer::one_shot(100);
        assert!(!timer.is_running());
        assert!(!timer.take_expired(1_000));

        timer.start(1_000);
        assert_eq!(timer.deadline(), Some(1_100));
        assert!(!timer.is_expired(1_099));
        assert!(timer.take_expired(1_100));
        assert!(!timer.is_running());
    }

    #[test]
    fn test_reset_extends_deadline() {
        let mut timer = Timer::one_shot(100);
        timer.start(0);
        timer.reset(80);
        assert!(!timer.is_expired(100));
        assert!(timer.is_expired(180));
    }

    #[test]
    fn test_periodic_rearms() {
        let mut timer = Timer::periodic(10);
        timer.start(0);
        assert!(timer.take_expired(12));
        assert_eq!(timer.deadline(), Some(22));
        assert!(timer.is_running());
    }

    #[test]
    fn test_zero_period() {
        let mut once = Timer::one_shot(0);
        once.start(500);
        assert!(once.take_expired(500));
        assert!(!once.is_running());

        let mut tick = Timer::periodic(100);
        tick.start(0);
        tick.change_period(0, 40);
        assert_eq!(tick.period(), 0);
        assert_eq!(tick.deadline(), Some(41));
        assert!(tick.take_expired(41));
        assert_eq!(tick.deadline(), Some(42));
        assert!(!tick.take_expired(41));
    }

    #[test]
    fn test_change_period_keeps_run_state() {
        let mut stopped = Timer::one_shot(100);
        stopped.change_period(500, 10);
        assert_eq!(stopped.period(), 500);
        assert!(!stopped.is_running());

        let mut running = Timer::one_shot(100);
        running.start(0);
        running.change_period(500, 50);
        assert_eq!(running.deadline(), Some(550));
    }
}

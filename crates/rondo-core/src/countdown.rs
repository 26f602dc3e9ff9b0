//! Phase countdown: the explicit time budget for the current phase.
//!
//! The countdown is decremented by the engine's tick, never recomputed from
//! wall-clock drift, so every observer of `remaining()` sees the same
//! monotonically non-increasing value. The wall clock only enters the
//! picture at restart, when the controller reconciles a persisted phase
//! against elapsed time and resumes the countdown with the leftover budget.

/// Tick-driven countdown for the active phase.
///
/// Remaining time is clamped at zero and only ever decreases within a
/// phase; a phase transition replaces the countdown with a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseCountdown {
    /// Seconds left in the current phase.
    remaining: u64,
    /// The full window this countdown started from.
    window: u64,
}

impl PhaseCountdown {
    /// Start a countdown with the full window budget.
    pub const fn start(window_secs: u64) -> Self {
        Self {
            remaining: window_secs,
            window: window_secs,
        }
    }

    /// Resume a countdown with a partial budget (restart reconciliation).
    ///
    /// The remaining budget is clamped to the window.
    pub const fn resume(window_secs: u64, remaining_secs: u64) -> Self {
        let remaining = if remaining_secs > window_secs {
            window_secs
        } else {
            remaining_secs
        };
        Self {
            remaining,
            window: window_secs,
        }
    }

    /// Advance the countdown by one simulated second.
    ///
    /// Returns the remaining budget after the tick, saturating at zero.
    pub const fn tick(&mut self) -> u64 {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining
    }

    /// Seconds left in the current phase (never negative).
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    /// The full window this countdown was started with.
    pub const fn window(&self) -> u64 {
        self.window
    }

    /// Whether the budget has reached zero.
    pub const fn is_expired(&self) -> bool {
        self.remaining == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_from_full_window() {
        let mut countdown = PhaseCountdown::start(3);
        assert_eq!(countdown.remaining(), 3);
        assert!(!countdown.is_expired());

        assert_eq!(countdown.tick(), 2);
        assert_eq!(countdown.tick(), 1);
        assert_eq!(countdown.tick(), 0);
        assert!(countdown.is_expired());
    }

    #[test]
    fn never_goes_negative() {
        let mut countdown = PhaseCountdown::start(1);
        assert_eq!(countdown.tick(), 0);
        assert_eq!(countdown.tick(), 0);
        assert_eq!(countdown.remaining(), 0);
    }

    #[test]
    fn is_non_increasing_within_a_phase() {
        let mut countdown = PhaseCountdown::start(10);
        let mut last = countdown.remaining();
        for _ in 0..15 {
            let now = countdown.tick();
            assert!(now <= last);
            last = now;
        }
    }

    #[test]
    fn resume_clamps_to_window() {
        let countdown = PhaseCountdown::resume(30, 12);
        assert_eq!(countdown.remaining(), 12);
        assert_eq!(countdown.window(), 30);

        let clamped = PhaseCountdown::resume(30, 99);
        assert_eq!(clamped.remaining(), 30);
    }

    #[test]
    fn zero_window_starts_expired() {
        let countdown = PhaseCountdown::start(0);
        assert!(countdown.is_expired());
    }
}

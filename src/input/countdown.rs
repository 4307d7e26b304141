//! Countdown Timer
//!
//! A decrementing clock that holds no clock of its own. The host calls
//! [`CountdownTimer::tick`] once per elapsed second (for example from a
//! `tokio::time::interval`).

/// Time-boxes a step. Once it reaches zero it stays expired until reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountdownTimer {
    total: u32,
    remaining: u32,
    armed: bool,
}

impl CountdownTimer {
    /// Creates a timer already armed with the given duration.
    pub fn started(duration_seconds: u32) -> Self {
        let mut timer = Self::default();
        timer.start(duration_seconds);
        timer
    }

    /// Arms the timer with `remaining = duration_seconds`.
    pub fn start(&mut self, duration_seconds: u32) {
        self.total = duration_seconds;
        self.remaining = duration_seconds;
        self.armed = duration_seconds > 0;
    }

    /// Re-arms from the given duration, clearing the expired state.
    pub fn reset(&mut self, duration_seconds: u32) {
        self.start(duration_seconds);
    }

    /// Decrements the remaining time by one second, clamped at zero.
    ///
    /// Returns true only on the tick that reaches zero, so callers can fire
    /// their expiry handling exactly once.
    pub fn tick(&mut self) -> bool {
        if !self.armed || self.remaining == 0 {
            return false;
        }

        self.remaining -= 1;
        if self.remaining == 0 {
            self.armed = false;
            return true;
        }
        false
    }

    /// True once the remaining time has reached zero.
    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    /// True while the timer is counting down.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Seconds left before expiry.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Duration the timer was last started with.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Fraction of time left in `[0.0, 1.0]`, as drawn by circular countdowns.
    pub fn progress(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.remaining as f32 / self.total as f32
    }
}

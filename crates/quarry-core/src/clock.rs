//! Tick clock for the Quarry simulation harness.
//!
//! The clock is the single source of truth for simulated time. It tracks
//! the current tick and the fixed simulated length of one tick, and hands
//! the allocator a [`TickContext`] each tick.
//!
//! All tick arithmetic is checked; the counter never wraps.

use std::time::Duration;

use quarry_alloc::TickContext;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// Invalid clock configuration (e.g. a zero-length tick).
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Simulated clock that advances once per recorded tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickClock {
    /// Current tick number (0-indexed).
    tick: u64,

    /// Simulated duration of one tick.
    tick_duration: Duration,
}

impl TickClock {
    /// Create a clock at tick 0.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `tick_duration` is zero.
    pub fn new(tick_duration: Duration) -> Result<Self, ClockError> {
        Self::from_parts(0, tick_duration)
    }

    /// Create a clock at an explicit tick (useful for tests and restoring
    /// a paused run).
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `tick_duration` is zero.
    pub fn from_parts(tick: u64, tick_duration: Duration) -> Result<Self, ClockError> {
        if tick_duration.is_zero() {
            return Err(ClockError::InvalidConfig {
                reason: "tick_duration must be greater than zero".to_owned(),
            });
        }
        Ok(Self {
            tick,
            tick_duration,
        })
    }

    /// Advance the clock by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// Return the current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Return the simulated duration of one tick.
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Simulated time elapsed since tick 0.
    pub fn elapsed(&self) -> Duration {
        let ticks = u32::try_from(self.tick).unwrap_or(u32::MAX);
        self.tick_duration.saturating_mul(ticks)
    }

    /// Build the allocator's view of the current tick.
    pub const fn context(&self, paused: bool, record_mode: bool) -> TickContext {
        TickContext {
            tick: self.tick,
            tick_duration: self.tick_duration,
            paused,
            record_mode,
        }
    }
}

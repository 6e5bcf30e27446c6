//! Per-tick context supplied by the world clock.

use std::time::Duration;

use crate::config::AllocationConfig;
use crate::error::AllocError;

/// What the world clock tells the allocator about the current tick.
///
/// A paused simulation, or one that is replaying recorded history, must
/// not mutate allocation state; [`is_suspended`](Self::is_suspended)
/// covers both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickContext {
    /// Current tick number.
    pub tick: u64,
    /// Fixed simulated duration of one tick.
    pub tick_duration: Duration,
    /// Whether the simulation is paused.
    pub paused: bool,
    /// `true` while recording live; `false` during playback or rewind.
    pub record_mode: bool,
}

impl TickContext {
    /// A live, unpaused context.
    pub const fn new(tick: u64, tick_duration: Duration) -> Self {
        Self {
            tick,
            tick_duration,
            paused: false,
            record_mode: true,
        }
    }

    /// Whether all allocation mutation is suspended this tick.
    pub const fn is_suspended(&self) -> bool {
        self.paused || !self.record_mode
    }
}

/// Values shared by every pass of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PassContext {
    /// Current tick.
    pub now: u64,
    /// Claim lifetime in ticks.
    pub ttl_ticks: u64,
}

impl PassContext {
    /// Resolve the claim TTL for this tick.
    pub fn new(ctx: &TickContext, config: &AllocationConfig) -> Result<Self, AllocError> {
        Ok(Self {
            now: ctx.tick,
            ttl_ticks: config.ttl_ticks(ctx.tick_duration)?,
        })
    }

    /// Deadline for a claim committed or refreshed now.
    pub const fn expiry(&self) -> u64 {
        self.now.saturating_add(self.ttl_ticks)
    }
}

//! Tick callback that logs periodic progress.

use quarry_core::runner::TickCallback;
use quarry_core::tick::{SimulationState, TickSummary};
use quarry_types::GroupStatus;
use tracing::{debug, info};

/// Logs a progress line every `interval` recorded ticks.
pub struct ProgressCallback {
    interval: u64,
    starved_peak: usize,
}

impl ProgressCallback {
    /// Create a callback; an interval of 0 disables progress lines.
    pub const fn new(interval: u64) -> Self {
        Self {
            interval,
            starved_peak: 0,
        }
    }

    /// Largest number of starved groups seen in one tick.
    pub const fn starved_peak(&self) -> usize {
        self.starved_peak
    }
}

impl TickCallback for ProgressCallback {
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState) {
        let starved = state
            .allocator
            .state()
            .groups()
            .filter(|(_, g)| matches!(g.status, GroupStatus::Starved { .. }))
            .count();
        self.starved_peak = self.starved_peak.max(starved);

        if summary.suspended() {
            debug!(tick = summary.tick, "Suspended tick");
            return;
        }
        if summary.tick.checked_rem(self.interval) != Some(0) {
            return;
        }

        let counts = summary.allocation.counts;
        info!(
            tick = summary.tick,
            open = counts.open,
            claimed = counts.claimed,
            in_progress = counts.in_progress,
            done = counts.done,
            starved,
            moving = summary.movement.moving,
            working = summary.movement.working,
            remaining_work = summary.remaining_work,
            "Progress"
        );
    }
}

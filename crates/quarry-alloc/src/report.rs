//! Per-tick allocation counters.

use serde::{Deserialize, Serialize};

/// Number of live tickets in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCounts {
    /// `Open` tickets.
    pub open: u32,
    /// `Claimed` tickets.
    pub claimed: u32,
    /// `InProgress` tickets.
    pub in_progress: u32,
    /// `Done` tickets not yet retired.
    pub done: u32,
    /// `Cancelled` tickets not yet retired.
    pub cancelled: u32,
}

/// Summary of what one allocation tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// The tick that ran.
    pub tick: u64,
    /// `true` when the tick was paused or in playback and nothing ran.
    pub suspended: bool,
    /// Tickets cancelled because their source vanished or changed.
    pub cancelled: u32,
    /// Claims that lapsed back to `Open`.
    pub expired: u32,
    /// Tickets finished because their source was exhausted.
    pub done: u32,
    /// Terminal tickets removed from the arena.
    pub retired: u32,
    /// Assignment records dropped because the worker disappeared.
    pub stale_workers: u32,
    /// New tickets published.
    pub spawned: u32,
    /// Primary claims committed.
    pub claimed: u32,
    /// Workers recruited into groups.
    pub recruited: u32,
    /// Group tickets promoted to `InProgress`.
    pub promoted: u32,
    /// Group tickets demoted back to `Claimed`.
    pub demoted: u32,
    /// Groups waiting with nobody left to recruit.
    pub starved: u32,
    /// Tickets attached to existing batches.
    pub attached: u32,
    /// Ticket states after the last pass.
    pub counts: TicketCounts,
}

impl TickReport {
    /// An empty report for `tick`.
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    /// A report for a tick in which allocation was suspended.
    pub fn suspended(tick: u64) -> Self {
        Self {
            tick,
            suspended: true,
            ..Self::default()
        }
    }
}

/// Increment a counter without overflow.
pub(crate) const fn bump(counter: &mut u32) {
    *counter = counter.saturating_add(1);
}

//! Tick cycle: one step of the harness loop.
//!
//! Each tick runs three phases:
//!
//! 1. **Allocate** -- build a [`TickContext`] from the clock and the
//!    operator flags, then run the allocator's five passes over the
//!    current [`WorldSnapshot`].
//! 2. **Move** -- hand the result to the [`WorkExecutor`], which walks
//!    workers, drains sources, renews claims, and releases workers.
//! 3. **Advance** -- step the clock.
//!
//! A paused or playback tick runs phase 1 in suspended mode (the allocator
//! reports `suspended` and mutates nothing) and skips phases 2 and 3.
//!
//! The tick cycle is deterministic given the same initial state and
//! executor.

use quarry_alloc::{AllocError, Allocator, TickContext, TickReport};
use quarry_types::WorldSnapshot;
use serde::Serialize;
use tracing::debug;

use crate::clock::{ClockError, TickClock};
use crate::movement::{MovementError, MovementSummary, WorkExecutor};

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// The allocator failed to run.
    #[error("allocation error: {source}")]
    Allocation {
        /// The underlying allocation error.
        #[from]
        source: AllocError,
    },

    /// The movement layer failed.
    #[error("movement error: {source}")]
    Movement {
        /// The underlying movement error.
        #[from]
        source: MovementError,
    },
}

/// Operator flags sampled at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickControl {
    /// Whether the run is paused.
    pub paused: bool,
    /// `true` while recording; `false` during playback.
    pub record_mode: bool,
}

impl TickControl {
    /// A live, recording tick.
    pub const LIVE: Self = Self {
        paused: false,
        record_mode: true,
    };
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// What the allocator did.
    pub allocation: TickReport,
    /// What the movement layer did (all zero when suspended).
    pub movement: MovementSummary,
    /// Work units left across all live sources after the tick.
    pub remaining_work: u64,
}

impl TickSummary {
    /// Whether the allocator was suspended.
    pub const fn suspended(&self) -> bool {
        self.allocation.suspended
    }

    /// Whether every source is drained and no ticket is live.
    pub const fn work_exhausted(&self) -> bool {
        let counts = &self.allocation.counts;
        !self.allocation.suspended
            && self.remaining_work == 0
            && counts.open == 0
            && counts.claimed == 0
            && counts.in_progress == 0
    }
}

/// The mutable simulation state passed through the tick cycle.
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// The tick clock.
    pub clock: TickClock,
    /// Sources and workers as the movement layer last left them.
    pub world: WorldSnapshot,
    /// Tickets, assignments, and groups.
    pub allocator: Allocator,
}

impl SimulationState {
    /// Bundle a world and an allocator at the clock's current tick.
    pub const fn new(clock: TickClock, world: WorldSnapshot, allocator: Allocator) -> Self {
        Self {
            clock,
            world,
            allocator,
        }
    }

    /// The allocator's view of the current tick under `control`.
    pub const fn context(&self, control: TickControl) -> TickContext {
        self.clock.context(control.paused, control.record_mode)
    }

    /// Work units left across all sources that are not depleted.
    pub fn remaining_work(&self) -> u64 {
        self.world
            .sources
            .values()
            .filter(|s| !s.is_exhausted())
            .map(|s| u64::from(s.remaining))
            .fold(0, u64::saturating_add)
    }
}

/// Execute one complete tick of the simulation.
///
/// # Errors
///
/// Returns [`TickError`] if the allocator, the executor, or the clock
/// fails. A failed tick leaves the clock where it was.
pub fn run_tick(
    state: &mut SimulationState,
    executor: &mut dyn WorkExecutor,
    control: TickControl,
) -> Result<TickSummary, TickError> {
    let ctx = state.context(control);

    // --- Phase 1: Allocate ---
    let allocation = state.allocator.run_tick(&state.world, &ctx)?;

    if allocation.suspended {
        debug!(
            tick = ctx.tick,
            paused = ctx.paused,
            record_mode = ctx.record_mode,
            "Tick suspended"
        );
        return Ok(TickSummary {
            tick: ctx.tick,
            allocation,
            movement: MovementSummary::default(),
            remaining_work: state.remaining_work(),
        });
    }

    // --- Phase 2: Move ---
    let movement = executor.advance(&mut state.world, &mut state.allocator, &ctx)?;

    // --- Phase 3: Advance ---
    state.clock.advance()?;

    debug!(
        tick = ctx.tick,
        moving = movement.moving,
        working = movement.working,
        drained = movement.drained,
        released = movement.released,
        "Movement complete"
    );

    Ok(TickSummary {
        tick: ctx.tick,
        allocation,
        movement,
        remaining_work: state.remaining_work(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use quarry_alloc::AllocationConfig;
    use quarry_types::{
        Position, ResourceType, SourceId, SourceKind, SourceSnapshot, WorkerId, WorkerRole,
        WorkerSnapshot,
    };

    use super::*;
    use crate::movement::StubExecutor;

    fn make_state() -> SimulationState {
        let mut world = WorldSnapshot::new();
        world.insert_source(SourceSnapshot::new(
            SourceId::from_u128(1),
            SourceKind::Pile,
            ResourceType::Wood,
            Position::new(1.0, 0.0),
            4,
        ));
        world.insert_worker(WorkerSnapshot::new(
            WorkerId::from_u128(10),
            Position::new(0.0, 0.0),
            WorkerRole::Hauler,
        ));
        SimulationState::new(
            TickClock::new(Duration::from_millis(500)).unwrap(),
            world,
            Allocator::new(AllocationConfig::default()).unwrap(),
        )
    }

    #[test]
    fn live_tick_advances_the_clock() {
        let mut state = make_state();
        let mut exec = StubExecutor::new(2.0, 2);

        let summary = run_tick(&mut state, &mut exec, TickControl::LIVE).unwrap();
        assert_eq!(summary.tick, 0);
        assert_eq!(summary.allocation.claimed, 1);
        assert_eq!(summary.movement.drained, 2);
        assert_eq!(summary.remaining_work, 2);
        assert_eq!(state.clock.tick(), 1);
    }

    #[test]
    fn suspended_tick_freezes_everything() {
        let mut state = make_state();
        let mut exec = StubExecutor::new(2.0, 2);
        let before = state.world.clone();

        for control in [
            TickControl {
                paused: true,
                record_mode: true,
            },
            TickControl {
                paused: false,
                record_mode: false,
            },
        ] {
            let summary = run_tick(&mut state, &mut exec, control).unwrap();
            assert!(summary.suspended());
            assert!(!summary.work_exhausted());
            assert_eq!(summary.movement, MovementSummary::default());
        }
        assert_eq!(state.clock.tick(), 0);
        assert_eq!(state.world, before);
        assert!(state.allocator.state().tickets().is_empty());
    }

    #[test]
    fn drained_world_reports_exhaustion() {
        let mut state = make_state();
        let mut exec = StubExecutor::new(2.0, 2);

        let mut last = None;
        for _ in 0..6 {
            last = Some(run_tick(&mut state, &mut exec, TickControl::LIVE).unwrap());
        }
        let last = last.unwrap();
        assert_eq!(last.remaining_work, 0);
        assert!(last.work_exhausted());
    }
}

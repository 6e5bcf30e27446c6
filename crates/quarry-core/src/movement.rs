//! The movement seam: what happens to workers between allocation ticks.
//!
//! The allocator only publishes assignments. Something else has to walk
//! workers to their targets, drain the sources they work, send progress
//! heartbeats, and release workers whose tickets finished. In a full game
//! that is the job state machine; here it is the [`WorkExecutor`] trait.
//!
//! [`StubExecutor`] is a straight-line implementation good enough to drive
//! the allocator end to end. It does no pathfinding: a worker moves
//! directly toward its primary target at a fixed speed.

use quarry_alloc::{AllocError, Allocator, TickContext};
use quarry_types::{JobPhase, Position, SourceId, TicketId, TicketState, WorkerId, WorldSnapshot};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::HarnessConfig;

/// Errors raised by the movement layer.
#[derive(Debug, thiserror::Error)]
pub enum MovementError {
    /// The allocator rejected a heartbeat.
    #[error("allocation error: {source}")]
    Allocation {
        /// The underlying allocation error.
        #[from]
        source: AllocError,
    },
}

/// What the movement layer did during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementSummary {
    /// Workers walking toward a target.
    pub moving: u32,
    /// Workers standing at their target and working it.
    pub working: u32,
    /// Group members waiting for the group to fill.
    pub waiting: u32,
    /// Work units drained from sources.
    pub drained: u32,
    /// Claims refreshed through a progress heartbeat.
    pub renewed: u32,
    /// Workers released after their ticket finished.
    pub released: u32,
}

/// Drives workers between allocation ticks.
///
/// Called once per recorded tick, after the allocator has run. Implementors
/// may mutate worker positions and phases and source amounts in `world`,
/// and talk back to the allocator through [`Allocator::renew_claim`] and
/// [`Allocator::release_worker`].
pub trait WorkExecutor {
    /// Advance every worker by one tick.
    ///
    /// # Errors
    ///
    /// Returns [`MovementError`] if the allocator rejects a call.
    fn advance(
        &mut self,
        world: &mut WorldSnapshot,
        allocator: &mut Allocator,
        ctx: &TickContext,
    ) -> Result<MovementSummary, MovementError>;
}

/// What one worker should do this tick.
#[derive(Debug, Clone, Copy)]
enum Plan {
    /// No primary ticket.
    Idle,
    /// The primary ticket finished or was retired.
    Release,
    /// Nothing to do until the allocator catches up.
    Stall,
    /// Walk to a group target and wait there without renewing.
    Wait { target: Position },
    /// Walk to the target, then work it. Only the group assignee drains.
    Work {
        ticket: TicketId,
        source: SourceId,
        target: Position,
        drains: bool,
    },
}

/// Straight-line movement with a fixed speed and work rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StubExecutor {
    speed: f32,
    work_rate: u32,
}

impl StubExecutor {
    /// Create an executor.
    pub const fn new(speed: f32, work_rate: u32) -> Self {
        Self { speed, work_rate }
    }

    /// Create an executor from the harness section of the config.
    pub const fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.worker_speed, config.work_rate)
    }
}

impl WorkExecutor for StubExecutor {
    fn advance(
        &mut self,
        world: &mut WorldSnapshot,
        allocator: &mut Allocator,
        ctx: &TickContext,
    ) -> Result<MovementSummary, MovementError> {
        let mut summary = MovementSummary::default();
        let workers: Vec<WorkerId> = world.workers.keys().copied().collect();

        for id in workers {
            match plan(world, allocator, id) {
                Plan::Idle => set_phase(world, id, JobPhase::Idle),
                Plan::Release => {
                    if allocator.release_worker(id, ctx) {
                        summary.released = summary.released.saturating_add(1);
                        debug!(worker = %id, "Released worker from finished ticket");
                    }
                    set_phase(world, id, JobPhase::Idle);
                }
                Plan::Stall => {}
                Plan::Wait { target } => {
                    let phase = if walk(world, id, target, self.speed) {
                        JobPhase::Gathering
                    } else {
                        JobPhase::Navigating
                    };
                    set_phase(world, id, phase);
                    summary.waiting = summary.waiting.saturating_add(1);
                }
                Plan::Work {
                    ticket,
                    source,
                    target,
                    drains,
                } => {
                    if walk(world, id, target, self.speed) {
                        set_phase(world, id, JobPhase::Gathering);
                        summary.working = summary.working.saturating_add(1);
                        if drains {
                            let drained = drain(world, source, self.work_rate);
                            summary.drained = summary.drained.saturating_add(drained);
                        }
                    } else {
                        set_phase(world, id, JobPhase::Navigating);
                        summary.moving = summary.moving.saturating_add(1);
                    }
                    if allocator.renew_claim(id, ticket, ctx)? {
                        summary.renewed = summary.renewed.saturating_add(1);
                    }
                }
            }
        }

        Ok(summary)
    }
}

fn plan(world: &WorldSnapshot, allocator: &Allocator, id: WorkerId) -> Plan {
    let state = allocator.state();
    let Some(ticket_id) = state.primary_of(id) else {
        return Plan::Idle;
    };
    let Some(ticket) = state.ticket(ticket_id).filter(|t| !t.state.is_terminal()) else {
        return Plan::Release;
    };
    let Some(source) = world.source(ticket.source()) else {
        // Cleanup cancels it next tick.
        return Plan::Stall;
    };
    let target = source.position;

    match (ticket.state, ticket.is_quorum_gated()) {
        (TicketState::Claimed, true) => Plan::Wait { target },
        (TicketState::InProgress, _) => Plan::Work {
            ticket: ticket_id,
            source: source.id,
            target,
            drains: ticket.assignee == Some(id),
        },
        (TicketState::Claimed, false) if ticket.assignee == Some(id) => Plan::Work {
            ticket: ticket_id,
            source: source.id,
            target,
            drains: true,
        },
        _ => Plan::Stall,
    }
}

/// Move `worker` toward `target`. Returns `true` once it stands there.
fn walk(world: &mut WorldSnapshot, worker: WorkerId, target: Position, speed: f32) -> bool {
    let Some(w) = world.workers.get_mut(&worker) else {
        return false;
    };
    let (next, arrived) = step_toward(w.position, target, speed);
    w.position = next;
    arrived
}

/// Take up to one tick of work out of `source`. Returns the amount.
fn drain(world: &mut WorldSnapshot, source: SourceId, work_rate: u32) -> u32 {
    let Some(s) = world.sources.get_mut(&source) else {
        return 0;
    };
    let taken = s.remaining.min(work_rate);
    s.remaining = s.remaining.saturating_sub(taken);
    if s.remaining == 0 {
        s.depleted = true;
    }
    taken
}

fn set_phase(world: &mut WorldSnapshot, worker: WorkerId, phase: JobPhase) {
    if let Some(w) = world.workers.get_mut(&worker) {
        w.phase = phase;
    }
}

/// One straight-line step of at most `speed` from `from` toward `to`.
fn step_toward(from: Position, to: Position, speed: f32) -> (Position, bool) {
    let dist = from.distance(to);
    if dist <= speed {
        return (to, true);
    }
    let t = speed / dist;
    let next = Position::new(
        (to.x - from.x).mul_add(t, from.x),
        (to.y - from.y).mul_add(t, from.y),
    );
    (next, false)
}

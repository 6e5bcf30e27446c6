//! The allocation pipeline and the operations the movement layer calls.

use quarry_types::{TicketId, TicketState, WorkerId, WorldSnapshot};
use tracing::{debug, info};

use crate::config::AllocationConfig;
use crate::context::{PassContext, TickContext};
use crate::error::AllocError;
use crate::report::TickReport;
use crate::state::AllocationState;
use crate::{batch, claim, cleanup, group, spawner};

/// Owns the allocation state and runs the five passes once per tick.
///
/// Passes run to completion in a fixed order: cleanup, spawner, claim,
/// group assembly, batch attach. Nothing inside a tick is random, so the
/// same snapshots and contexts always produce the same assignments.
#[derive(Debug, Clone)]
pub struct Allocator {
    config: AllocationConfig,
    state: AllocationState,
}

impl Allocator {
    /// Create an allocator after validating `config`.
    pub fn new(config: AllocationConfig) -> Result<Self, AllocError> {
        config.validate()?;
        Ok(Self {
            config,
            state: AllocationState::new(),
        })
    }

    /// The validated configuration.
    pub const fn config(&self) -> &AllocationConfig {
        &self.config
    }

    /// Read-only view of tickets, assignments, and groups.
    pub const fn state(&self) -> &AllocationState {
        &self.state
    }

    /// Run one allocation tick against `world`.
    ///
    /// A paused or playback context mutates nothing and yields a report
    /// marked `suspended`.
    pub fn run_tick(
        &mut self,
        world: &WorldSnapshot,
        ctx: &TickContext,
    ) -> Result<TickReport, AllocError> {
        if ctx.is_suspended() {
            debug!(tick = ctx.tick, paused = ctx.paused, "Allocation suspended");
            return Ok(TickReport::suspended(ctx.tick));
        }

        let pass = PassContext::new(ctx, &self.config)?;
        let mut report = TickReport::new(ctx.tick);

        cleanup::run(&mut self.state, world, &self.config, &pass, &mut report);
        spawner::run(&mut self.state, world, &self.config, &pass, &mut report);
        claim::run(&mut self.state, world, &pass, &mut report);
        group::run(&mut self.state, world, &self.config, &pass, &mut report);
        batch::run(&mut self.state, world, &self.config, &pass, &mut report);

        report.counts = self.state.counts();

        info!(
            tick = report.tick,
            spawned = report.spawned,
            claimed = report.claimed,
            expired = report.expired,
            cancelled = report.cancelled,
            promoted = report.promoted,
            attached = report.attached,
            open = report.counts.open,
            held = report.counts.claimed.saturating_add(report.counts.in_progress),
            "Allocation tick complete"
        );

        Ok(report)
    }

    /// Progress heartbeat from the movement layer.
    ///
    /// Refreshes the claim expiry of a held ticket when `worker` is its
    /// assignee or a member of its group. Returns `false` when nothing was
    /// renewed.
    pub fn renew_claim(
        &mut self,
        worker: WorkerId,
        ticket: TicketId,
        ctx: &TickContext,
    ) -> Result<bool, AllocError> {
        if ctx.is_suspended() {
            return Ok(false);
        }
        let pass = PassContext::new(ctx, &self.config)?;

        let member = self
            .state
            .groups
            .get(&ticket)
            .is_some_and(|g| g.contains(worker));
        let Some(t) = self.state.tickets.get_mut(ticket) else {
            return Ok(false);
        };
        if !t.state.is_held() || !(t.assignee == Some(worker) || member) {
            return Ok(false);
        }
        t.claim_expiry = Some(pass.expiry());
        Ok(true)
    }

    /// Drop every obligation `worker` holds.
    ///
    /// Ordinary tickets it held go back to `Open`. In a group, the next
    /// member takes over as assignee; a group left empty reopens its
    /// ticket. Returns `true` if the worker held anything.
    pub fn release_worker(&mut self, worker: WorkerId, ctx: &TickContext) -> bool {
        if ctx.is_suspended() {
            return false;
        }
        let now = ctx.tick;
        let assignment = self.state.assignments.remove(&worker);
        let mut released = assignment.is_some();

        let held: Vec<TicketId> = assignment
            .iter()
            .flat_map(|a| a.primary_ticket.iter().chain(a.batch_tickets.iter()))
            .copied()
            .collect();

        for id in held {
            let successor = match self.state.groups.get_mut(&id) {
                Some(group) => {
                    group.members.retain(|w| *w != worker);
                    Some(group.members.first().copied())
                }
                None => None,
            };
            let Some(t) = self.state.tickets.get_mut(id) else {
                continue;
            };
            if !t.state.is_held() || t.assignee != Some(worker) {
                continue;
            }
            match successor {
                Some(Some(next)) => {
                    t.assignee = Some(next);
                    debug!(ticket = %id, from = %worker, to = %next, "Group assignee handed over");
                }
                Some(None) | None => {
                    t.transition(TicketState::Open, now);
                    self.state.groups.remove(&id);
                    debug!(ticket = %id, worker = %worker, "Released ticket reopened");
                }
            }
        }

        for group in self.state.groups.values_mut() {
            let before = group.members.len();
            group.members.retain(|w| *w != worker);
            released |= group.members.len() != before;
        }

        released
    }
}

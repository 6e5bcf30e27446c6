//! Allocation state: the ticket arena, worker assignments, and group
//! memberships.
//!
//! All three tables are owned here and written only by the passes and the
//! [`Allocator`] operations. The movement layer reads them through the
//! accessors below.
//!
//! [`Allocator`]: crate::Allocator

use std::collections::BTreeMap;

use quarry_types::{
    GroupMembership, Ticket, TicketId, TicketState, WorkerAssignment, WorkerId,
};

use tracing::debug;

use crate::arena::TicketArena;
use crate::context::PassContext;
use crate::report::TicketCounts;

/// Tickets, assignments, and group memberships.
#[derive(Debug, Clone, Default)]
pub struct AllocationState {
    pub(crate) tickets: TicketArena,
    pub(crate) assignments: BTreeMap<WorkerId, WorkerAssignment>,
    pub(crate) groups: BTreeMap<TicketId, GroupMembership>,
}

impl AllocationState {
    /// Empty state.
    pub const fn new() -> Self {
        Self {
            tickets: TicketArena::new(),
            assignments: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }

    /// The ticket arena.
    pub const fn tickets(&self) -> &TicketArena {
        &self.tickets
    }

    /// Look up a ticket by handle.
    pub fn ticket(&self, id: TicketId) -> Option<&Ticket> {
        self.tickets.get(id)
    }

    /// A worker's obligations, if it holds any.
    pub fn assignment(&self, worker: WorkerId) -> Option<&WorkerAssignment> {
        self.assignments.get(&worker)
    }

    /// Every worker holding obligations, in identity order.
    pub fn assignments(&self) -> impl Iterator<Item = (&WorkerId, &WorkerAssignment)> {
        self.assignments.iter()
    }

    /// Group membership of a quorum-gated ticket.
    pub fn group(&self, ticket: TicketId) -> Option<&GroupMembership> {
        self.groups.get(&ticket)
    }

    /// Every live group, in ticket order.
    pub fn groups(&self) -> impl Iterator<Item = (&TicketId, &GroupMembership)> {
        self.groups.iter()
    }

    /// The worker's primary ticket.
    pub fn primary_of(&self, worker: WorkerId) -> Option<TicketId> {
        self.assignments
            .get(&worker)
            .and_then(|a| a.primary_ticket)
    }

    /// Whether the worker can be handed a new primary ticket.
    pub fn is_unassigned(&self, worker: WorkerId) -> bool {
        self.primary_of(worker).is_none()
    }

    /// Tally tickets by state.
    pub fn counts(&self) -> TicketCounts {
        let mut counts = TicketCounts::default();
        for ticket in self.tickets.iter() {
            let slot = match ticket.state {
                TicketState::Open => &mut counts.open,
                TicketState::Claimed => &mut counts.claimed,
                TicketState::InProgress => &mut counts.in_progress,
                TicketState::Done => &mut counts.done,
                TicketState::Cancelled => &mut counts.cancelled,
            };
            *slot = slot.saturating_add(1);
        }
        counts
    }

    /// Bind an `Open` ticket to `worker` as its primary ticket.
    pub(crate) fn commit_claim(
        &mut self,
        ticket: TicketId,
        worker: WorkerId,
        pass: &PassContext,
    ) -> bool {
        let Some(t) = self.tickets.get_mut(ticket) else {
            return false;
        };
        if t.state != TicketState::Open {
            return false;
        }
        t.transition(TicketState::Claimed, pass.now);
        t.assignee = Some(worker);
        t.claim_expiry = Some(pass.expiry());
        self.assign_primary(worker, ticket, pass.now);
        true
    }

    /// Point a worker's primary ticket at `ticket`.
    pub(crate) fn assign_primary(&mut self, worker: WorkerId, ticket: TicketId, now: u64) {
        let entry = self.assignments.entry(worker).or_default();
        entry.primary_ticket = Some(ticket);
        entry.commit_tick = now;
    }

    /// Claim an `Open` ticket for `worker` and append it to its batch.
    pub(crate) fn attach_batch(
        &mut self,
        worker: WorkerId,
        ticket: TicketId,
        pass: &PassContext,
    ) -> bool {
        let Some(t) = self.tickets.get_mut(ticket) else {
            return false;
        };
        if t.state != TicketState::Open {
            return false;
        }
        t.transition(TicketState::Claimed, pass.now);
        t.assignee = Some(worker);
        t.claim_expiry = Some(pass.expiry());
        self.assignments
            .entry(worker)
            .or_default()
            .batch_tickets
            .push(ticket);
        true
    }

    /// Drop batch entries the worker no longer holds.
    ///
    /// Returns the surviving batch length and its summed work.
    pub(crate) fn refresh_batch(&mut self, worker: WorkerId) -> (usize, u32) {
        let Some(assignment) = self.assignments.get_mut(&worker) else {
            return (0, 0);
        };
        let tickets = &self.tickets;
        assignment.batch_tickets.retain(|id| {
            tickets
                .get(*id)
                .is_some_and(|t| t.state == TicketState::Claimed && t.assignee == Some(worker))
        });
        let work = assignment
            .batch_tickets
            .iter()
            .filter_map(|id| tickets.get(*id))
            .fold(0_u32, |acc, t| acc.saturating_add(t.work_amount));
        (assignment.batch_tickets.len(), work)
    }

    /// Whether `worker` may keep `ticket` as its primary ticket.
    ///
    /// Terminal tickets stay referenced until the movement layer releases
    /// the worker; a lapsed or retired ticket does not.
    pub(crate) fn holds_primary(&self, worker: WorkerId, ticket: TicketId) -> bool {
        let Some(t) = self.tickets.get(ticket) else {
            return false;
        };
        t.state.is_terminal()
            || (t.state.is_held()
                && (t.assignee == Some(worker)
                    || self.groups.get(&ticket).is_some_and(|g| g.contains(worker))))
    }

    /// Scrub every worker's obligations and drop empty assignment records.
    ///
    /// A worker that lost its primary ticket also gives up its batch: the
    /// batch tickets it still holds go back to `Open`.
    pub(crate) fn scrub_assignments(&mut self, now: u64) {
        let workers: Vec<WorkerId> = self.assignments.keys().copied().collect();
        for worker in workers {
            let lost = self
                .primary_of(worker)
                .is_some_and(|primary| !self.holds_primary(worker, primary));
            if lost {
                self.drop_batch(worker, now);
                if let Some(assignment) = self.assignments.get_mut(&worker) {
                    assignment.primary_ticket = None;
                }
            }
            let _ = self.refresh_batch(worker);
        }
        self.assignments.retain(|_, a| !a.is_free());
    }

    /// Reopen every batch ticket `worker` still holds and empty its batch.
    fn drop_batch(&mut self, worker: WorkerId, now: u64) {
        let Some(assignment) = self.assignments.get_mut(&worker) else {
            return;
        };
        for id in assignment.batch_tickets.drain(..) {
            if let Some(t) = self.tickets.get_mut(id)
                && t.state == TicketState::Claimed
                && t.assignee == Some(worker)
            {
                t.transition(TicketState::Open, now);
                debug!(ticket = %id, worker = %worker, "Primary lost, batch ticket reopened");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use quarry_types::{ResourceType, SourceId, SourceKind, TicketKey, TicketKind};

    use super::*;

    fn open_ticket(state: &mut AllocationState, source: u128, work: u32) -> TicketId {
        state
            .tickets
            .insert_with(|id| Ticket {
                id,
                key: TicketKey {
                    source: SourceId::from_u128(source),
                    resource: ResourceType::Stone,
                    kind: TicketKind::Gather {
                        origin: SourceKind::Pile,
                    },
                },
                state: TicketState::Open,
                assignee: None,
                claim_expiry: None,
                last_state_change_tick: 0,
                required_workers: 1,
                min_workers: 1,
                heavy: None,
                work_amount: work,
            })
            .unwrap_or(TicketId::from_parts(u32::MAX, 0))
    }

    const PASS: PassContext = PassContext {
        now: 3,
        ttl_ticks: 5,
    };

    #[test]
    fn commit_claim_binds_both_sides() {
        let mut state = AllocationState::new();
        let ticket = open_ticket(&mut state, 1, 10);
        let worker = WorkerId::from_u128(7);

        assert!(state.commit_claim(ticket, worker, &PASS));
        let t = state.ticket(ticket);
        assert_eq!(t.map(|t| t.state), Some(TicketState::Claimed));
        assert_eq!(t.and_then(|t| t.claim_expiry), Some(8));
        assert_eq!(state.primary_of(worker), Some(ticket));
        assert_eq!(state.assignment(worker).map(|a| a.commit_tick), Some(3));

        // A claimed ticket cannot be claimed again.
        assert!(!state.commit_claim(ticket, WorkerId::from_u128(8), &PASS));
    }

    #[test]
    fn refresh_batch_drops_lost_tickets() {
        let mut state = AllocationState::new();
        let worker = WorkerId::from_u128(1);
        let a = open_ticket(&mut state, 1, 10);
        let b = open_ticket(&mut state, 2, 15);
        assert!(state.attach_batch(worker, a, &PASS));
        assert!(state.attach_batch(worker, b, &PASS));
        assert_eq!(state.refresh_batch(worker), (2, 25));

        if let Some(t) = state.tickets.get_mut(a) {
            t.transition(TicketState::Open, 4);
        }
        assert_eq!(state.refresh_batch(worker), (1, 15));
    }

    #[test]
    fn scrub_removes_empty_records() {
        let mut state = AllocationState::new();
        let worker = WorkerId::from_u128(1);
        let a = open_ticket(&mut state, 1, 10);
        assert!(state.attach_batch(worker, a, &PASS));
        let _ = state.tickets.remove(a);

        state.scrub_assignments(9);
        assert!(state.assignment(worker).is_none());
    }

    #[test]
    fn scrub_clears_lapsed_primary() {
        let mut state = AllocationState::new();
        let worker = WorkerId::from_u128(1);
        let a = open_ticket(&mut state, 1, 10);
        assert!(state.commit_claim(a, worker, &PASS));

        state.scrub_assignments(9);
        assert_eq!(state.primary_of(worker), Some(a));

        if let Some(t) = state.tickets.get_mut(a) {
            t.transition(TicketState::Open, 8);
        }
        state.scrub_assignments(9);
        assert!(state.is_unassigned(worker));
        assert!(state.assignment(worker).is_none());
    }

    #[test]
    fn lost_primary_reopens_the_batch() {
        let mut state = AllocationState::new();
        let worker = WorkerId::from_u128(1);
        let primary = open_ticket(&mut state, 1, 10);
        let extra = open_ticket(&mut state, 2, 10);
        assert!(state.commit_claim(primary, worker, &PASS));
        assert!(state.attach_batch(worker, extra, &PASS));

        if let Some(t) = state.tickets.get_mut(primary) {
            t.transition(TicketState::Open, 8);
        }
        state.scrub_assignments(9);

        let t = state.ticket(extra);
        assert_eq!(t.map(|t| t.state), Some(TicketState::Open));
        assert_eq!(t.and_then(|t| t.assignee), None);
        assert_eq!(t.map(|t| t.last_state_change_tick), Some(9));
        assert!(state.assignment(worker).is_none());
    }

    #[test]
    fn scrub_keeps_terminal_primary_for_release() {
        let mut state = AllocationState::new();
        let worker = WorkerId::from_u128(1);
        let a = open_ticket(&mut state, 1, 10);
        assert!(state.commit_claim(a, worker, &PASS));
        if let Some(t) = state.tickets.get_mut(a) {
            t.transition(TicketState::Cancelled, 4);
        }

        state.scrub_assignments(9);
        assert_eq!(state.primary_of(worker), Some(a));
    }

    #[test]
    fn counts_by_state() {
        let mut state = AllocationState::new();
        let a = open_ticket(&mut state, 1, 10);
        let _ = open_ticket(&mut state, 2, 10);
        assert!(state.commit_claim(a, WorkerId::from_u128(1), &PASS));
        let counts = state.counts();
        assert_eq!(counts.open, 1);
        assert_eq!(counts.claimed, 1);
        assert_eq!(counts.done, 0);
    }
}

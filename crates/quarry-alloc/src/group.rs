//! Group assembly for quorum-gated tickets.
//!
//! A ticket that needs several workers, or a heavy item that needs enough
//! combined carry capacity, is claimed by one worker like any other. This
//! pass then grows a membership around that claim, recruiting idle workers
//! near the target until the quorum is met, and only then lets the ticket
//! move to `InProgress`.
//!
//! A group that cannot fill keeps its claim. Its status turns `Starved`
//! and the claim TTL eventually reverts the ticket to `Open`.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use quarry_types::{
    GroupMembership, GroupStatus, SourceSnapshot, Ticket, TicketId, TicketKey, TicketState,
    WorkerId, WorkerSnapshot, WorldSnapshot,
};

use crate::capacity::{aggregate_capacity, quorum};
use crate::config::AllocationConfig;
use crate::context::PassContext;
use crate::report::{TickReport, bump};
use crate::select::nearest;
use crate::state::AllocationState;

/// Run the group assembly pass.
pub(crate) fn run(
    state: &mut AllocationState,
    world: &WorldSnapshot,
    config: &AllocationConfig,
    pass: &PassContext,
    report: &mut TickReport,
) {
    let mut gated: Vec<(TicketKey, TicketId)> = state
        .tickets
        .iter()
        .filter(|t| t.state.is_held() && t.is_quorum_gated())
        .map(|t| (t.key, t.id))
        .collect();
    gated.sort_unstable();

    let mut taken: BTreeSet<WorkerId> = BTreeSet::new();

    for (key, id) in gated {
        let Some(source) = world.source(key.source) else {
            continue;
        };
        let Some(ticket) = state.tickets.get(id).cloned() else {
            continue;
        };
        assemble(state, world, config, pass, report, &mut taken, &ticket, source);
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    state: &mut AllocationState,
    world: &WorldSnapshot,
    config: &AllocationConfig,
    pass: &PassContext,
    report: &mut TickReport,
    taken: &mut BTreeSet<WorkerId>,
    ticket: &Ticket,
    source: &SourceSnapshot,
) {
    let id = ticket.id;
    let previous = state.groups.remove(&id).unwrap_or_default();
    let mut group = prune(state, world, id, ticket.assignee, previous);

    if group.members.is_empty() {
        // Nobody left to carry it; the claim runs out on its own.
        if ticket.state == TicketState::InProgress {
            demote(state, id, pass, report);
        }
        return;
    }

    let needed = quorum(ticket, config);
    let exhausted = recruit(
        state, world, config, pass, report, taken, ticket, source, needed, &mut group,
    );

    let ready = member_count(&group) >= needed
        && ticket
            .heavy
            .is_none_or(|heavy| capacity_of(&group, world, config) >= heavy.item_mass);

    if let Some(t) = state.tickets.get_mut(id) {
        t.assignee = group.members.first().copied();
    }

    group.status = if ready {
        if ticket.state == TicketState::Claimed
            && let Some(t) = state.tickets.get_mut(id)
        {
            t.transition(TicketState::InProgress, pass.now);
            t.claim_expiry = Some(pass.expiry());
            bump(&mut report.promoted);
            debug!(ticket = %id, members = group.members.len(), "Group ready, ticket in progress");
        }
        GroupStatus::Ready
    } else {
        if ticket.state == TicketState::InProgress {
            demote(state, id, pass, report);
        }
        if exhausted {
            let since_tick = match group.status {
                GroupStatus::Starved { since_tick } => since_tick,
                GroupStatus::Assembling | GroupStatus::Ready => {
                    warn!(
                        ticket = %id,
                        members = group.members.len(),
                        needed,
                        "Group starved, no recruits left in range"
                    );
                    pass.now
                }
            };
            bump(&mut report.starved);
            GroupStatus::Starved { since_tick }
        } else {
            GroupStatus::Assembling
        }
    };

    state.groups.insert(id, group);
}

/// Drop members that no longer hold the ticket and put the assignee first.
///
/// A pruned assignee is replaced by the first surviving member.
fn prune(
    state: &AllocationState,
    world: &WorldSnapshot,
    id: TicketId,
    assignee: Option<WorkerId>,
    previous: GroupMembership,
) -> GroupMembership {
    let holds = |w: WorkerId| world.workers.contains_key(&w) && state.primary_of(w) == Some(id);

    let mut group = GroupMembership {
        members: Vec::with_capacity(previous.members.len().saturating_add(1)),
        status: previous.status,
    };
    if let Some(a) = assignee.filter(|a| holds(*a)) {
        group.add(a);
    }
    for w in previous.members {
        if holds(w) {
            group.add(w);
        } else {
            debug!(ticket = %id, worker = %w, "Pruned group member");
        }
    }
    group
}

/// Recruit nearby workers into `group`.
///
/// Stops at the quorum, except that heavy items keep recruiting while the
/// group cannot lift them, up to `group_max_workers`. Returns `true` if
/// recruiting stopped with the group still short and unable to grow.
#[allow(clippy::too_many_arguments)]
fn recruit(
    state: &mut AllocationState,
    world: &WorldSnapshot,
    config: &AllocationConfig,
    pass: &PassContext,
    report: &mut TickReport,
    taken: &mut BTreeSet<WorkerId>,
    ticket: &Ticket,
    source: &SourceSnapshot,
    needed: u32,
    group: &mut GroupMembership,
) -> bool {
    loop {
        let count = member_count(group);
        let shortfall = ticket
            .heavy
            .is_some_and(|heavy| capacity_of(group, world, config) < heavy.item_mass);
        if count >= needed && !shortfall {
            return false;
        }
        if count >= config.group_max_workers {
            return true;
        }

        let candidates = world.workers.values().filter(|w| {
            w.is_available()
                && !taken.contains(&w.id)
                && state.is_unassigned(w.id)
                && w.role.can_work(ticket.origin(), ticket.resource())
                && w.position.within(source.position, config.assembly_radius)
        });
        let Some(recruit) = nearest(candidates, |w| {
            (w.position.distance_squared(source.position), w.id)
        }) else {
            return true;
        };

        group.add(recruit.id);
        taken.insert(recruit.id);
        state.assign_primary(recruit.id, ticket.id, pass.now);
        bump(&mut report.recruited);
        debug!(ticket = %ticket.id, worker = %recruit.id, "Recruited into group");
    }
}

fn demote(state: &mut AllocationState, id: TicketId, pass: &PassContext, report: &mut TickReport) {
    if let Some(t) = state.tickets.get_mut(id) {
        t.transition(TicketState::Claimed, pass.now);
        t.claim_expiry = Some(pass.expiry());
        bump(&mut report.demoted);
        debug!(ticket = %id, "Group fell below quorum, ticket back to claimed");
    }
}

fn member_count(group: &GroupMembership) -> u32 {
    u32::try_from(group.members.len()).unwrap_or(u32::MAX)
}

/// Cohesion-scaled capacity of the members still in the world.
fn capacity_of(group: &GroupMembership, world: &WorldSnapshot, config: &AllocationConfig) -> Decimal {
    let members: Vec<&WorkerSnapshot> = group
        .members
        .iter()
        .filter_map(|w| world.worker(*w))
        .collect();
    aggregate_capacity(&members, config)
}

#[cfg(test)]
mod tests {
    use quarry_types::{
        HeavyLoad, Position, ResourceType, SourceId, SourceKind, TicketKind, WorkerRole,
    };
    use rust_decimal_macros::dec;

    use super::*;

    const SOURCE: SourceId = SourceId::from_u128(1);

    fn neutral_config() -> AllocationConfig {
        AllocationConfig {
            cohesion_min: dec!(1),
            cohesion_max: dec!(1),
            cohesion_size_bonus: dec!(0),
            ..AllocationConfig::default()
        }
    }

    fn world_with(haulers: &[(u128, f32)]) -> WorldSnapshot {
        let mut world = WorldSnapshot::new();
        world.insert_source(SourceSnapshot::new(
            SOURCE,
            SourceKind::Pile,
            ResourceType::Stone,
            Position::new(0.0, 0.0),
            1,
        ));
        for &(n, x) in haulers {
            world.insert_worker(WorkerSnapshot::new(
                WorkerId::from_u128(n),
                Position::new(x, 0.0),
                WorkerRole::Hauler,
            ));
        }
        world
    }

    fn claimed_heavy(state: &mut AllocationState, mass: Decimal, assignee: u128) -> TicketId {
        let worker = WorkerId::from_u128(assignee);
        let id = state
            .tickets
            .insert_with(|id| Ticket {
                id,
                key: TicketKey {
                    source: SOURCE,
                    resource: ResourceType::Stone,
                    kind: TicketKind::Gather {
                        origin: SourceKind::Pile,
                    },
                },
                state: TicketState::Claimed,
                assignee: Some(worker),
                claim_expiry: Some(7),
                last_state_change_tick: 1,
                required_workers: 2,
                min_workers: 2,
                heavy: Some(HeavyLoad { item_mass: mass }),
                work_amount: 1,
            })
            .unwrap_or(TicketId::from_parts(u32::MAX, 0));
        state.assign_primary(worker, id, 1);
        id
    }

    fn assemble_at(
        state: &mut AllocationState,
        world: &WorldSnapshot,
        config: &AllocationConfig,
        now: u64,
    ) -> TickReport {
        let mut report = TickReport::new(now);
        let pass = PassContext { now, ttl_ticks: 6 };
        run(state, world, config, &pass, &mut report);
        report
    }

    fn state_of(state: &AllocationState, id: TicketId) -> Option<TicketState> {
        state.ticket(id).map(|t| t.state)
    }

    #[test]
    fn recruits_nearest_until_ready() {
        let world = world_with(&[(1, 0.0), (2, 5.0), (3, 1.0), (4, 3.0)]);
        let mut state = AllocationState::new();
        let id = claimed_heavy(&mut state, dec!(300), 1);

        let report = assemble_at(&mut state, &world, &neutral_config(), 2);
        assert_eq!(report.recruited, 2);
        assert_eq!(report.promoted, 1);
        assert_eq!(state_of(&state, id), Some(TicketState::InProgress));
        assert_eq!(state.ticket(id).and_then(|t| t.claim_expiry), Some(8));

        let members = state.group(id).map(|g| g.members.clone()).unwrap_or_default();
        assert_eq!(
            members,
            vec![WorkerId::from_u128(1), WorkerId::from_u128(3), WorkerId::from_u128(4)]
        );
        assert_eq!(state.primary_of(WorkerId::from_u128(3)), Some(id));
        assert!(state.is_unassigned(WorkerId::from_u128(2)));
        assert_eq!(state.group(id).map(|g| g.status), Some(GroupStatus::Ready));
    }

    #[test]
    fn short_group_starves_and_stays_claimed() {
        let world = world_with(&[(1, 0.0), (2, 1.0)]);
        let mut state = AllocationState::new();
        let id = claimed_heavy(&mut state, dec!(300), 1);

        let report = assemble_at(&mut state, &world, &neutral_config(), 2);
        assert_eq!(report.starved, 1);
        assert_eq!(state_of(&state, id), Some(TicketState::Claimed));
        assert_eq!(
            state.group(id).map(|g| g.status),
            Some(GroupStatus::Starved { since_tick: 2 })
        );

        // Starvation keeps its original tick.
        let _ = assemble_at(&mut state, &world, &neutral_config(), 3);
        assert_eq!(
            state.group(id).map(|g| g.status),
            Some(GroupStatus::Starved { since_tick: 2 })
        );
    }

    #[test]
    fn recruits_outside_radius_are_ignored() {
        let world = world_with(&[(1, 0.0), (2, 1.0), (3, 40.0)]);
        let mut state = AllocationState::new();
        let id = claimed_heavy(&mut state, dec!(300), 1);

        let _ = assemble_at(&mut state, &world, &neutral_config(), 2);
        assert_eq!(state_of(&state, id), Some(TicketState::Claimed));
        assert!(state.is_unassigned(WorkerId::from_u128(3)));
    }

    #[test]
    fn weak_workers_extend_the_group() {
        let mut world = world_with(&[(1, 0.0), (2, 1.0), (3, 2.0), (4, 3.0), (5, 4.0)]);
        for w in world.workers.values_mut() {
            w.carry_capacity = Some(dec!(80));
        }
        let mut state = AllocationState::new();
        let id = claimed_heavy(&mut state, dec!(300), 1);

        // Quorum is 3, but 3 * 80 < 300, so a fourth joins.
        let report = assemble_at(&mut state, &world, &neutral_config(), 2);
        assert_eq!(report.recruited, 3);
        assert_eq!(state_of(&state, id), Some(TicketState::InProgress));
        assert_eq!(state.group(id).map(|g| g.members.len()), Some(4));
    }

    #[test]
    fn losing_a_member_demotes() {
        let mut world = world_with(&[(1, 0.0), (2, 1.0), (3, 2.0)]);
        let mut state = AllocationState::new();
        let id = claimed_heavy(&mut state, dec!(300), 1);
        let _ = assemble_at(&mut state, &world, &neutral_config(), 2);
        assert_eq!(state_of(&state, id), Some(TicketState::InProgress));

        world.workers.remove(&WorkerId::from_u128(3));
        let report = assemble_at(&mut state, &world, &neutral_config(), 4);
        assert_eq!(report.demoted, 1);
        assert_eq!(state_of(&state, id), Some(TicketState::Claimed));
        assert_eq!(state.ticket(id).and_then(|t| t.claim_expiry), Some(10));
    }

    #[test]
    fn pruned_assignee_is_replaced() {
        let mut world = world_with(&[(1, 0.0), (2, 1.0), (3, 2.0)]);
        let mut state = AllocationState::new();
        let id = claimed_heavy(&mut state, dec!(300), 1);
        let _ = assemble_at(&mut state, &world, &neutral_config(), 2);

        world.workers.remove(&WorkerId::from_u128(1));
        let _ = assemble_at(&mut state, &world, &neutral_config(), 3);
        assert_eq!(
            state.ticket(id).and_then(|t| t.assignee),
            Some(WorkerId::from_u128(2))
        );
        assert_eq!(
            state.group(id).and_then(|g| g.members.first().copied()),
            Some(WorkerId::from_u128(2))
        );
    }
}

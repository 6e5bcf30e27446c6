//! Core data model: tickets, assignments, group memberships, and the
//! per-tick world snapshot.
//!
//! Tickets, assignments, and memberships are owned by the allocator.
//! Everything in [`WorldSnapshot`] is owned by external collaborators and
//! copied in once per tick.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{GroupStatus, JobPhase, ResourceType, SourceKind, TicketState, WorkerRole};
use crate::ids::{SourceId, TicketId, WorkerId};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point on the simulation plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Position {
    /// Create a position.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`.
    ///
    /// Candidate ranking compares squared distances, which orders the same
    /// as true distance without the square root.
    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Whether `other` lies within `radius` of this point (inclusive).
    pub fn within(self, other: Self, radius: f32) -> bool {
        self.distance_squared(other) <= radius * radius
    }
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

/// The kind of work a ticket represents.
///
/// Only gathering exists today; new kinds extend this enum and are handled
/// by pattern matching in the passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TicketKind {
    /// Harvest or pick up material from a source.
    Gather {
        /// Whether the source is a node or a pile.
        origin: SourceKind,
    },
}

impl TicketKind {
    /// Source kind the ticket was spawned from.
    pub const fn origin(self) -> SourceKind {
        match self {
            Self::Gather { origin } => origin,
        }
    }
}

/// Dedup key: at most one non-terminal ticket exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketKey {
    /// The source the work comes from.
    pub source: SourceId,
    /// The resource produced.
    pub resource: ResourceType,
    /// The kind of work.
    pub kind: TicketKind,
}

/// A single item too heavy for one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeavyLoad {
    /// Mass that the group's aggregate capacity must reach.
    pub item_mass: Decimal,
}

/// A unit of publishable work tied to one source and resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Arena handle.
    pub id: TicketId,
    /// Dedup key.
    pub key: TicketKey,
    /// Lifecycle state.
    pub state: TicketState,
    /// Committed primary worker. Set only while `Claimed` or `InProgress`.
    pub assignee: Option<WorkerId>,
    /// Tick at or after which a `Claimed` ticket reverts to `Open`.
    pub claim_expiry: Option<u64>,
    /// Tick of the most recent state transition.
    pub last_state_change_tick: u64,
    /// Workers the job asks for.
    pub required_workers: u32,
    /// Workers the job cannot start without.
    pub min_workers: u32,
    /// Present when the ticket is a single heavy item carried jointly.
    pub heavy: Option<HeavyLoad>,
    /// Remaining effort or volume.
    pub work_amount: u32,
}

impl Ticket {
    /// The source this ticket draws from.
    pub const fn source(&self) -> SourceId {
        self.key.source
    }

    /// The resource this ticket produces.
    pub const fn resource(&self) -> ResourceType {
        self.key.resource
    }

    /// Kind of source the ticket was spawned from.
    pub const fn origin(&self) -> SourceKind {
        self.key.kind.origin()
    }

    /// Whether the ticket goes through group assembly.
    pub const fn is_quorum_gated(&self) -> bool {
        self.required_workers > 1 || self.heavy.is_some()
    }

    /// Whether `worker` currently holds this ticket.
    pub fn is_held_by(&self, worker: WorkerId) -> bool {
        self.state.is_held() && self.assignee == Some(worker)
    }

    /// Move to `state` at `tick`, keeping the assignee invariant.
    ///
    /// Leaving the held states clears the assignee and the claim expiry.
    pub fn transition(&mut self, state: TicketState, tick: u64) {
        self.state = state;
        self.last_state_change_tick = tick;
        if !state.is_held() {
            self.assignee = None;
            self.claim_expiry = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Assignments and groups
// ---------------------------------------------------------------------------

/// A worker's obligations as seen by the movement layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAssignment {
    /// The ticket the worker committed to, if any.
    pub primary_ticket: Option<TicketId>,
    /// Tick at which the primary ticket was committed.
    pub commit_tick: u64,
    /// Extra tickets attached opportunistically.
    pub batch_tickets: Vec<TicketId>,
}

impl WorkerAssignment {
    /// Whether the worker holds nothing.
    pub const fn is_free(&self) -> bool {
        self.primary_ticket.is_none() && self.batch_tickets.is_empty()
    }

    /// Total obligations (primary plus batch).
    pub fn obligations(&self) -> usize {
        usize::from(self.primary_ticket.is_some()).saturating_add(self.batch_tickets.len())
    }
}

/// Membership list of a quorum-gated ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    /// Ordered, duplicate-free members. The assignee comes first.
    pub members: Vec<WorkerId>,
    /// Observable assembly status.
    pub status: GroupStatus,
}

impl GroupMembership {
    /// An empty group in the `Assembling` state.
    pub const fn new() -> Self {
        Self {
            members: Vec::new(),
            status: GroupStatus::Assembling,
        }
    }

    /// Whether `worker` is a member.
    pub fn contains(&self, worker: WorkerId) -> bool {
        self.members.contains(&worker)
    }

    /// Add `worker` if absent. Returns `true` if it was added.
    pub fn add(&mut self, worker: WorkerId) -> bool {
        if self.contains(worker) {
            return false;
        }
        self.members.push(worker);
        true
    }
}

impl Default for GroupMembership {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// World snapshot (input surface)
// ---------------------------------------------------------------------------

/// A harvestable source as reported by the depletion bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSnapshot {
    /// Source identity.
    pub id: SourceId,
    /// Node or pile.
    pub kind: SourceKind,
    /// Resource produced.
    pub resource: ResourceType,
    /// Where workers go to work it.
    pub position: Position,
    /// Remaining amount.
    pub remaining: u32,
    /// Explicit depletion flag.
    pub depleted: bool,
    /// Mass of the item when the source is a single item.
    pub item_mass: Option<Decimal>,
    /// Explicit worker requirement for multi-worker jobs.
    pub required_workers: Option<u32>,
}

impl SourceSnapshot {
    /// A plain source with the given remaining amount.
    pub const fn new(
        id: SourceId,
        kind: SourceKind,
        resource: ResourceType,
        position: Position,
        remaining: u32,
    ) -> Self {
        Self {
            id,
            kind,
            resource,
            position,
            remaining,
            depleted: false,
            item_mass: None,
            required_workers: None,
        }
    }

    /// Whether the source has nothing left to give.
    pub const fn is_exhausted(&self) -> bool {
        self.depleted || self.remaining == 0
    }
}

/// A worker as reported by the movement and personality systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    /// Worker identity.
    pub id: WorkerId,
    /// Current position.
    pub position: Position,
    /// Work role.
    pub role: WorkerRole,
    /// Current job phase.
    pub phase: JobPhase,
    /// Whether needs and schedule allow seeking work this tick.
    pub eligible: bool,
    /// Personal carry stat; overrides the base carry capacity when set.
    pub carry_capacity: Option<Decimal>,
    /// Multiplier applied to carry capacity.
    pub capacity_scale: Decimal,
    /// Offset added after scaling.
    pub capacity_offset: Decimal,
    /// Order/discipline trait in `[0, 1]`.
    pub discipline: Decimal,
}

impl WorkerSnapshot {
    /// An idle, eligible worker with neutral modifiers.
    pub const fn new(id: WorkerId, position: Position, role: WorkerRole) -> Self {
        Self {
            id,
            position,
            role,
            phase: JobPhase::Idle,
            eligible: true,
            carry_capacity: None,
            capacity_scale: Decimal::ONE,
            capacity_offset: Decimal::ZERO,
            discipline: Decimal::from_parts(5, 0, 0, false, 1),
        }
    }

    /// Whether the worker can be handed a new primary ticket this tick.
    pub fn is_available(&self) -> bool {
        self.eligible && self.phase == JobPhase::Idle
    }
}

/// Everything the allocator reads about the world for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Live sources by identity.
    pub sources: BTreeMap<SourceId, SourceSnapshot>,
    /// Live workers by identity.
    pub workers: BTreeMap<WorkerId, WorkerSnapshot>,
}

impl WorldSnapshot {
    /// An empty snapshot.
    pub const fn new() -> Self {
        Self {
            sources: BTreeMap::new(),
            workers: BTreeMap::new(),
        }
    }

    /// Insert or replace a source.
    pub fn insert_source(&mut self, source: SourceSnapshot) {
        self.sources.insert(source.id, source);
    }

    /// Insert or replace a worker.
    pub fn insert_worker(&mut self, worker: WorkerSnapshot) {
        self.workers.insert(worker.id, worker);
    }

    /// Look up a source.
    pub fn source(&self, id: SourceId) -> Option<&SourceSnapshot> {
        self.sources.get(&id)
    }

    /// Look up a worker.
    pub fn worker(&self, id: WorkerId) -> Option<&WorkerSnapshot> {
        self.workers.get(&id)
    }
}

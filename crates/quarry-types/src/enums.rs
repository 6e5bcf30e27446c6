//! Enumeration types for the allocation data model.

use serde::{Deserialize, Serialize};

/// A harvestable resource type.
///
/// Gatherers specialize in exactly one of these; haulers carry any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Lumber from trees.
    Wood,
    /// Raw stone from outcrops.
    Stone,
    /// Ore from veins.
    Ore,
    /// Clay from riverbanks.
    Clay,
    /// Plant fiber.
    Fiber,
    /// Forage (berries, roots).
    Food,
    /// Fresh water.
    Water,
}

impl ResourceType {
    /// Every resource type, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Wood,
        Self::Stone,
        Self::Ore,
        Self::Clay,
        Self::Fiber,
        Self::Food,
        Self::Water,
    ];
}

/// What kind of harvestable entity a source is.
///
/// Nodes are worked in place by gatherers; piles are loose material that
/// haulers pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A resource node (tree, outcrop, vein).
    Node,
    /// A pile of loose material or a single dropped item.
    Pile,
}

/// Lifecycle state of a ticket.
///
/// `Done` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    /// Published and waiting for a worker.
    Open,
    /// Bound to a worker under a time-boxed claim.
    Claimed,
    /// A quorum-gated ticket whose group is assembled and working.
    InProgress,
    /// The source was exhausted.
    Done,
    /// The source vanished or no longer matches the ticket.
    Cancelled,
}

impl TicketState {
    /// `true` for `Done` and `Cancelled`.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    /// `true` when a worker holds the ticket (`Claimed` or `InProgress`).
    pub const fn is_held(self) -> bool {
        matches!(self, Self::Claimed | Self::InProgress)
    }
}

/// Work role of a worker, used for role compatibility in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    /// Carries loose material from piles. Never works nodes.
    Hauler,
    /// Works resource nodes of its specialization. Never hauls piles.
    Gatherer(ResourceType),
}

impl WorkerRole {
    /// Whether a worker with this role may take a ticket on a source of the
    /// given kind and resource type.
    pub fn can_work(self, origin: SourceKind, resource: ResourceType) -> bool {
        match (self, origin) {
            (Self::Hauler, SourceKind::Pile) => true,
            (Self::Gatherer(specialty), SourceKind::Node) => specialty == resource,
            _ => false,
        }
    }
}

/// Phase of a worker's external job state machine.
///
/// Owned by the movement layer; the allocator only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Not doing anything.
    Idle,
    /// Walking toward a source.
    Navigating,
    /// Working a source.
    Gathering,
    /// Carrying a load to storage.
    Delivering,
}

impl JobPhase {
    /// Whether a worker in this phase may still pick up batch work.
    pub const fn accepts_batch(self) -> bool {
        matches!(self, Self::Idle | Self::Navigating)
    }
}

/// Observable assembly status of a quorum-gated ticket's group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum GroupStatus {
    /// Still recruiting; candidates were available this tick.
    Assembling,
    /// Quorum or capacity unmet and nobody left to recruit.
    Starved {
        /// Tick at which the group first ran out of candidates.
        since_tick: u64,
    },
    /// Quorum and capacity met; the ticket is `InProgress`.
    Ready,
}

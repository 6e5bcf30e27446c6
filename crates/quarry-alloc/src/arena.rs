//! Generational arena holding every ticket.
//!
//! Slots are reused after a ticket is retired. Each reuse bumps the slot
//! generation, so a [`TicketId`] issued for the old occupant no longer
//! resolves. Iteration follows slot order, which is stable for the life of
//! a ticket.

use quarry_types::{Ticket, TicketId};

use crate::error::AllocError;

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    ticket: Option<Ticket>,
}

/// Arena of tickets addressed by generational [`TicketId`]s.
#[derive(Debug, Clone, Default)]
pub struct TicketArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl TicketArena {
    /// An empty arena.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Number of live tickets.
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Whether the arena holds no tickets.
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Insert a ticket built from its freshly issued id.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::ArenaFull`] when no slot index is left.
    pub fn insert_with(
        &mut self,
        build: impl FnOnce(TicketId) -> Ticket,
    ) -> Result<TicketId, AllocError> {
        let capacity = self.slots.len();
        let id = if let Some(index) = self.free.pop() {
            let slot = usize::try_from(index)
                .ok()
                .and_then(|i| self.slots.get_mut(i))
                .ok_or(AllocError::ArenaFull { capacity })?;
            let id = TicketId::from_parts(index, slot.generation);
            slot.ticket = Some(build(id));
            id
        } else {
            let index = u32::try_from(capacity)
                .ok()
                .ok_or(AllocError::ArenaFull { capacity })?;
            let id = TicketId::from_parts(index, 0);
            self.slots.push(Slot {
                generation: 0,
                ticket: Some(build(id)),
            });
            id
        };
        self.live = self.live.saturating_add(1);
        Ok(id)
    }

    /// Look up a live ticket.
    pub fn get(&self, id: TicketId) -> Option<&Ticket> {
        let slot = self.slots.get(usize::try_from(id.index()).ok()?)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.ticket.as_ref()
    }

    /// Look up a live ticket mutably.
    pub fn get_mut(&mut self, id: TicketId) -> Option<&mut Ticket> {
        let slot = self.slots.get_mut(usize::try_from(id.index()).ok()?)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.ticket.as_mut()
    }

    /// Whether `id` resolves to a live ticket.
    pub fn contains(&self, id: TicketId) -> bool {
        self.get(id).is_some()
    }

    /// Retire a ticket, freeing its slot for reuse.
    pub fn remove(&mut self, id: TicketId) -> Option<Ticket> {
        let slot = self.slots.get_mut(usize::try_from(id.index()).ok()?)?;
        if slot.generation != id.generation() {
            return None;
        }
        let ticket = slot.ticket.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.live = self.live.saturating_sub(1);
        Some(ticket)
    }

    /// Iterate live tickets in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Ticket> {
        self.slots.iter().filter_map(|slot| slot.ticket.as_ref())
    }

    /// Iterate live tickets mutably in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Ticket> {
        self.slots.iter_mut().filter_map(|slot| slot.ticket.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use quarry_types::{ResourceType, SourceId, SourceKind, TicketKey, TicketKind, TicketState};

    use super::*;

    fn ticket(id: TicketId, source: u128) -> Ticket {
        Ticket {
            id,
            key: TicketKey {
                source: SourceId::from_u128(source),
                resource: ResourceType::Wood,
                kind: TicketKind::Gather {
                    origin: SourceKind::Node,
                },
            },
            state: TicketState::Open,
            assignee: None,
            claim_expiry: None,
            last_state_change_tick: 0,
            required_workers: 1,
            min_workers: 1,
            heavy: None,
            work_amount: 5,
        }
    }

    #[test]
    fn insert_and_get() {
        let mut arena = TicketArena::new();
        let id = arena.insert_with(|id| ticket(id, 1));
        assert!(id.is_ok());
        let id = id.unwrap_or(TicketId::from_parts(u32::MAX, 0));
        assert_eq!(arena.get(id).map(|t| t.id), Some(id));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn stale_id_does_not_resolve_after_reuse() {
        let mut arena = TicketArena::new();
        let first = arena
            .insert_with(|id| ticket(id, 1))
            .unwrap_or(TicketId::from_parts(u32::MAX, 0));
        assert!(arena.remove(first).is_some());
        assert!(arena.is_empty());

        let second = arena
            .insert_with(|id| ticket(id, 2))
            .unwrap_or(TicketId::from_parts(u32::MAX, 0));
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(arena.get(first).is_none());
        assert!(arena.remove(first).is_none());
        assert_eq!(
            arena.get(second).map(|t| t.key.source),
            Some(SourceId::from_u128(2))
        );
    }

    #[test]
    fn iteration_skips_retired_slots() {
        let mut arena = TicketArena::new();
        let ids: Vec<TicketId> = (1..=3)
            .filter_map(|n| arena.insert_with(|id| ticket(id, n)).ok())
            .collect();
        if let Some(&middle) = ids.get(1) {
            let _ = arena.remove(middle);
        }
        let sources: Vec<SourceId> = arena.iter().map(|t| t.key.source).collect();
        assert_eq!(
            sources,
            vec![SourceId::from_u128(1), SourceId::from_u128(3)]
        );
    }
}

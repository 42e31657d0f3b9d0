//! Fixed-capacity slot arena mapping global ids to local indices.
//!
//! Arbiters keep their three agents in a `SlotArena<AgentId, _>` of capacity
//! [`SLOTS_PER_ARBITER`], and agents keep their `N` arbiters in a
//! `SlotArena<FieldId, _>` of capacity `N`. The local index assigned at
//! registration is the slot (arbiter side) or field index (agent side) used by
//! the memory structures.
//!
//! [`SLOTS_PER_ARBITER`]: crate::board::SLOTS_PER_ARBITER

use std::collections::BTreeMap;
use std::fmt::Display;

/// Errors that can occur when registering into a [`SlotArena`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    /// Every slot is already taken by a different id.
    #[error("slot arena full: cannot register {id}, all {capacity} slots are taken")]
    Full {
        /// Display form of the id that could not be registered.
        id: String,
        /// The arena's fixed capacity.
        capacity: usize,
    },
}

/// A fixed-size array of slots plus an id-to-index map.
#[derive(Debug, Clone)]
pub struct SlotArena<Id, T> {
    indices: BTreeMap<Id, usize>,
    slots: Vec<(Id, T)>,
    capacity: usize,
}

impl<Id, T> SlotArena<Id, T>
where
    Id: Ord + Copy + Display,
{
    /// Create an empty arena that accepts at most `capacity` distinct ids.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            indices: BTreeMap::new(),
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Register `value` under `id` and return its local index.
    ///
    /// Registering an id that is already known replaces the stored value and
    /// keeps the original index.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::Full`] if `id` is new and every slot is taken.
    pub fn register(&mut self, id: Id, value: T) -> Result<usize, ArenaError> {
        if let Some(&index) = self.indices.get(&id) {
            if let Some(slot) = self.slots.get_mut(index) {
                slot.1 = value;
            }
            return Ok(index);
        }
        if self.is_full() {
            return Err(ArenaError::Full {
                id: id.to_string(),
                capacity: self.capacity,
            });
        }
        let index = self.slots.len();
        self.slots.push((id, value));
        self.indices.insert(id, index);
        Ok(index)
    }

    /// Local index of a registered id.
    pub fn index_of(&self, id: Id) -> Option<usize> {
        self.indices.get(&id).copied()
    }

    /// Value stored at a local index.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).map(|(_, value)| value)
    }

    /// Id registered at a local index.
    pub fn id_at(&self, index: usize) -> Option<Id> {
        self.slots.get(index).map(|(id, _)| *id)
    }

    /// Value stored for a global id.
    pub fn get_by_id(&self, id: Id) -> Option<&T> {
        self.index_of(id).and_then(|index| self.get(index))
    }

    /// Whether no further distinct id can be registered.
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over `(index, id, value)` in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Id, &T)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, (id, value))| (index, *id, value))
    }
}

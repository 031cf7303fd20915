//! Entity Identifiers
//!
//! Drawable entities are referenced by generational index, never by live
//! reference. Each slot carries a generation counter that increments when
//! the slot is reused, so a stale id held by a viewport restriction list or
//! a depth-clipping plane can never silently match a new entity — it simply
//! stops resolving, and the rule that held it becomes inert.

use serde::{Serialize, Deserialize};

/// A stable identifier for a drawable entity.
///
/// Two ids with the same index but different generations refer to different
/// entities. Ids are cheap to copy and hash; they are the only way the
/// display-list engine refers to scene objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Index into the entity storage
    index: u32,
    /// Generation counter - increments when the slot is reused
    generation: u32,
}

impl Entity {
    /// Should only be called by [`EntityAllocator`].
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index, used to address the sparse property stores.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of this id.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Allocates and tracks entity lifetimes.
///
/// Freed slots are reused with an incremented generation, invalidating any
/// ids that still point at them.
pub struct EntityAllocator {
    /// Generation counter for each slot
    generations: Vec<u32>,
    /// Free slots available for reuse (LIFO for cache friendliness)
    free_indices: Vec<u32>,
    /// Next fresh index if no free slots are available
    next_fresh: u32,
    /// Number of currently alive entities
    alive_count: u32,
}

impl EntityAllocator {
    /// Create a new allocator with no entities.
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            free_indices: Vec::new(),
            next_fresh: 0,
            alive_count: 0,
        }
    }

    /// Allocate a new entity id.
    pub fn allocate(&mut self) -> Entity {
        self.alive_count += 1;

        if let Some(index) = self.free_indices.pop() {
            // Reuse a freed slot - generation was already incremented on free
            Entity::new(index, self.generations[index as usize])
        } else {
            let index = self.next_fresh;
            self.next_fresh += 1;
            self.generations.push(0);
            Entity::new(index, 0)
        }
    }

    /// Free an entity, making its slot available for reuse.
    /// Returns true if the entity was alive and is now freed.
    pub fn free(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }

        // Increment generation to invalidate existing references
        self.generations[entity.index as usize] += 1;
        self.free_indices.push(entity.index);
        self.alive_count -= 1;
        true
    }

    /// Check if an entity id still resolves.
    pub fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.index as usize;
        idx < self.generations.len() && self.generations[idx] == entity.generation
    }

    /// Number of currently alive entities.
    pub fn alive_count(&self) -> u32 {
        self.alive_count
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

//! Sparse Property Storage
//!
//! Each drawable property (position, draw state, render layer, ...) lives in
//! its own sparse array keyed by entity slot index. For display lists of
//! tens to low hundreds of entities, simple sparse storage beats anything
//! cleverer and is far easier to reason about.

use super::entity::Entity;

/// Sparse storage for a single property type.
///
/// Uses `Option<T>` so entities without the property leave holes. The index
/// is the entity's slot index (not generation); liveness is checked by the
/// scene before handing out values.
pub struct PropertyStorage<T> {
    /// Sparse array indexed by entity.index()
    data: Vec<Option<T>>,
}

impl<T> PropertyStorage<T> {
    /// Create empty storage.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Ensure storage can hold an entity at the given index.
    fn ensure_capacity(&mut self, index: usize) {
        if index >= self.data.len() {
            self.data.resize_with(index + 1, || None);
        }
    }

    /// Insert a value for an entity, replacing any existing one.
    pub fn insert(&mut self, entity: Entity, value: T) {
        let idx = entity.index() as usize;
        self.ensure_capacity(idx);
        self.data[idx] = Some(value);
    }

    /// Remove an entity's value, returning it if it existed.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let idx = entity.index() as usize;
        if idx < self.data.len() {
            self.data[idx].take()
        } else {
            None
        }
    }

    /// Get a reference to an entity's value.
    pub fn get(&self, entity: Entity) -> Option<&T> {
        let idx = entity.index() as usize;
        self.data.get(idx).and_then(|opt| opt.as_ref())
    }

    /// Get a mutable reference to an entity's value.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        let idx = entity.index() as usize;
        self.data.get_mut(idx).and_then(|opt| opt.as_mut())
    }

    /// Check if an entity has this property.
    pub fn contains(&self, entity: Entity) -> bool {
        let idx = entity.index() as usize;
        idx < self.data.len() && self.data[idx].is_some()
    }

    /// Clear the property from an entity slot.
    /// Called when an entity is despawned.
    pub fn clear_slot(&mut self, index: u32) {
        let idx = index as usize;
        if idx < self.data.len() {
            self.data[idx] = None;
        }
    }
}

impl<T> Default for PropertyStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut storage: PropertyStorage<i32> = PropertyStorage::new();
        let entity = Entity::new(5, 0);

        storage.insert(entity, 42);
        assert_eq!(storage.get(entity), Some(&42));
        assert!(storage.contains(entity));
    }

    #[test]
    fn test_remove() {
        let mut storage: PropertyStorage<i32> = PropertyStorage::new();
        let entity = Entity::new(3, 0);

        storage.insert(entity, 100);
        let removed = storage.remove(entity);
        assert_eq!(removed, Some(100));
        assert!(!storage.contains(entity));
    }

    #[test]
    fn test_sparse_storage() {
        let mut storage: PropertyStorage<i32> = PropertyStorage::new();

        // Insert at index 100 without filling 0-99
        let entity = Entity::new(100, 0);
        storage.insert(entity, 999);

        assert_eq!(storage.get(entity), Some(&999));
        assert!(!storage.contains(Entity::new(50, 0)));
    }
}

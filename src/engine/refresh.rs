//! Transform Refresh Deduplication
//!
//! After lists are settled for a tick, every entity that appears in at
//! least one viewport's list gets its transform/bounding-box refreshed -
//! exactly once, even when it shows up in several viewports. Refreshing
//! twice is wasted work; refreshing zero times leaves a visibly stale
//! bounding box.

use std::collections::HashSet;
use std::sync::Arc;

use crate::scene::{Entity, Scene};

use super::cache::DisplayList;

/// The transform/bounding-box refresh hook, implemented by the surrounding
/// rendering layer. Invoked once per visible entity per tick.
pub trait RefreshSink {
    fn refresh(&mut self, scene: &Scene, entity: Entity);
}

/// Ensures each visible entity is refreshed exactly once per tick.
pub(crate) struct MatrixRefreshCoordinator {
    seen: HashSet<Entity>,
}

impl MatrixRefreshCoordinator {
    pub fn new() -> Self {
        Self { seen: HashSet::new() }
    }

    /// Refresh the union of this tick's lists. The dedup set is cleared at
    /// the start of every tick, never carried across ticks.
    pub fn run(
        &mut self,
        scene: &Scene,
        sink: &mut dyn RefreshSink,
        lists: &[Arc<DisplayList>],
    ) {
        self.seen.clear();
        for list in lists {
            for &entity in list.entities() {
                if self.seen.insert(entity) {
                    sink.refresh(scene, entity);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSink {
        refreshed: Vec<Entity>,
    }

    impl RefreshSink for CountingSink {
        fn refresh(&mut self, _scene: &Scene, entity: Entity) {
            self.refreshed.push(entity);
        }
    }

    #[test]
    fn test_entity_in_two_lists_refreshed_once() {
        let mut scene = Scene::new();
        let shared = scene.spawn();
        let only_a = scene.spawn();

        let list_a = Arc::new(DisplayList::from_entities(vec![shared, only_a], 1));
        let list_b = Arc::new(DisplayList::from_entities(vec![shared], 1));

        let mut coordinator = MatrixRefreshCoordinator::new();
        let mut sink = CountingSink { refreshed: Vec::new() };
        coordinator.run(&scene, &mut sink, &[list_a, list_b]);

        assert_eq!(sink.refreshed, vec![shared, only_a]);
    }

    #[test]
    fn test_dedup_set_resets_each_tick() {
        let mut scene = Scene::new();
        let e = scene.spawn();
        let list = Arc::new(DisplayList::from_entities(vec![e], 1));

        let mut coordinator = MatrixRefreshCoordinator::new();
        let mut sink = CountingSink { refreshed: Vec::new() };
        coordinator.run(&scene, &mut sink, &[list.clone()]);
        coordinator.run(&scene, &mut sink, &[list]);

        // A new tick refreshes again: dedup is within a tick, not across
        assert_eq!(sink.refreshed, vec![e, e]);
    }
}

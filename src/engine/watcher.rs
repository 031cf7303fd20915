//! Entity Watching
//!
//! The watcher holds one subscription record per *reachable* entity: an
//! entity in the current room (background, object list, area proxies), in
//! the overlay set, or an ancestor of one of those - an off-list ancestor's
//! visibility still gates its descendants, so it must be watched too.
//!
//! Each record also carries the chained sprite subscription: the sprite
//! shown by the entity's active animation frame. Advancing a frame re-chains
//! the record to the new sprite, tearing down the old link first, so sprite
//! position changes only dirty the caches while their sprite is actually
//! displayed.
//!
//! Any watched change raises the engine's single coarse dirty flag - one
//! change invalidates every viewport's cache. That is deliberate: it trades
//! a little recomputation for a much simpler invalidation argument.

use std::collections::{HashMap, HashSet};

use log::trace;

use crate::scene::event::SceneEvent;
use crate::scene::{Entity, Scene, SpriteId};

/// Active subscriptions for one watched entity.
#[derive(Debug)]
struct SubscriptionRecord {
    /// The chained subscription to the current animation frame's sprite.
    sprite: Option<SpriteId>,
}

/// What routing one scene event through the watcher concluded.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WatchOutcome {
    /// The caches no longer reflect entity state.
    pub dirty: bool,
    /// The reachable set may have changed; a resync is needed.
    pub resync: bool,
}

/// Tracks change subscriptions for every reachable entity.
pub(crate) struct EntityWatcher {
    records: HashMap<Entity, SubscriptionRecord>,
    /// Refcounted chained sprite subscriptions (two watched entities may
    /// animate with the same sprite).
    sprite_refs: HashMap<SpriteId, usize>,
}

impl EntityWatcher {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            sprite_refs: HashMap::new(),
        }
    }

    /// Create a subscription record for an entity. A second watch of the
    /// same entity is a no-op: there is exactly one record per entity.
    pub fn watch(&mut self, scene: &Scene, entity: Entity) {
        if self.records.contains_key(&entity) {
            return;
        }
        let sprite = scene.current_sprite(entity);
        if let Some(id) = sprite {
            *self.sprite_refs.entry(id).or_insert(0) += 1;
        }
        trace!("watch {entity:?} (sprite chain: {sprite:?})");
        self.records.insert(entity, SubscriptionRecord { sprite });
    }

    /// Release an entity's subscriptions, including the chained sprite
    /// subscription. Idempotent: teardown ordering across removal cascades
    /// is not guaranteed by callers, so a second call must be safe.
    pub fn unwatch(&mut self, entity: Entity) -> bool {
        match self.records.remove(&entity) {
            Some(record) => {
                if let Some(id) = record.sprite {
                    self.release_sprite(id);
                }
                trace!("unwatch {entity:?}");
                true
            }
            None => false,
        }
    }

    pub fn is_watched(&self, entity: Entity) -> bool {
        self.records.contains_key(&entity)
    }

    fn watches_sprite(&self, sprite: SpriteId) -> bool {
        self.sprite_refs.contains_key(&sprite)
    }

    #[cfg(test)]
    pub fn watched_count(&self) -> usize {
        self.records.len()
    }

    /// Route one drained scene event. Events about unwatched entities are
    /// no-ops, never errors - a change can race the teardown that makes its
    /// entity unreachable.
    pub fn note(&mut self, scene: &Scene, event: &SceneEvent) -> WatchOutcome {
        match *event {
            SceneEvent::EntityChanged { entity } => WatchOutcome {
                dirty: self.is_watched(entity),
                resync: false,
            },
            SceneEvent::ParentChanged { child } => {
                // The ancestor chain changed; previously covered ancestors
                // may have dropped out and new ones appeared.
                let watched = self.is_watched(child);
                WatchOutcome { dirty: watched, resync: watched }
            }
            SceneEvent::AnimationChanged { entity } => {
                if self.is_watched(entity) {
                    self.rechain(scene, entity);
                    WatchOutcome { dirty: true, resync: false }
                } else {
                    WatchOutcome::default()
                }
            }
            SceneEvent::SpriteChanged { sprite } => WatchOutcome {
                dirty: self.watches_sprite(sprite),
                resync: false,
            },
            SceneEvent::StructureChanged => WatchOutcome { dirty: true, resync: true },
            SceneEvent::EntityDespawned { entity } => {
                let was_watched = self.unwatch(entity);
                WatchOutcome { dirty: was_watched, resync: was_watched }
            }
            // Viewport events are routed by the engine, which knows which
            // viewports are registered.
            SceneEvent::ViewportChanged { .. } | SceneEvent::ViewportRemoved { .. } => {
                WatchOutcome::default()
            }
        }
    }

    /// Re-chain the sprite subscription to the entity's *current* sprite,
    /// tearing down the previous link first.
    fn rechain(&mut self, scene: &Scene, entity: Entity) {
        let current = scene.current_sprite(entity);
        if let Some(record) = self.records.get_mut(&entity) {
            if record.sprite == current {
                return;
            }
            let old = record.sprite;
            record.sprite = current;
            if let Some(id) = current {
                *self.sprite_refs.entry(id).or_insert(0) += 1;
            }
            if let Some(id) = old {
                self.release_sprite(id);
            }
        }
    }

    fn release_sprite(&mut self, sprite: SpriteId) {
        if let Some(count) = self.sprite_refs.get_mut(&sprite) {
            *count -= 1;
            if *count == 0 {
                self.sprite_refs.remove(&sprite);
            }
        }
    }

    /// Rebuild the watched set against what is currently reachable, watching
    /// newcomers and releasing entities that dropped out. The diff keeps the
    /// invariant: exactly one record per reachable entity, none for
    /// unreachable ones.
    pub fn resync(&mut self, scene: &Scene) {
        let desired = reachable_set(scene);

        let stale: Vec<Entity> = self
            .records
            .keys()
            .copied()
            .filter(|e| !desired.contains(e))
            .collect();
        for entity in stale {
            self.unwatch(entity);
        }

        for entity in desired {
            self.watch(scene, entity);
        }
    }

    /// Drop every subscription (used when the engine is torn down).
    pub fn clear(&mut self) {
        self.records.clear();
        self.sprite_refs.clear();
    }
}

/// Everything reachable from the current room and the overlay set, plus the
/// ancestor chains of all of it. Dead ids are not reachable.
fn reachable_set(scene: &Scene) -> HashSet<Entity> {
    let mut set = HashSet::new();

    let add = |set: &mut HashSet<Entity>, entity: Entity| {
        if !scene.is_alive(entity) || !set.insert(entity) {
            return;
        }
        let mut cursor = scene.parent(entity);
        while let Some(ancestor) = cursor {
            if !set.insert(ancestor) {
                break;
            }
            cursor = scene.parent(ancestor);
        }
    };

    if let Some(room_id) = scene.current_room() {
        if let Some(room) = scene.room(room_id) {
            if let Some(background) = room.background() {
                add(&mut set, background);
            }
            for &object in room.objects() {
                add(&mut set, object);
            }
            for area in room.areas() {
                if let Some(proxy) = area.proxy {
                    add(&mut set, proxy);
                }
            }
        }
    }

    for &entity in scene.overlay() {
        add(&mut set, entity);
    }

    set
}

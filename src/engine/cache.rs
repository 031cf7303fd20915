//! Display-List Cache
//!
//! One cached, sorted entity list per registered viewport, plus the single
//! coarse dirty flag that invalidates all of them at once.
//!
//! Lists are published as whole-value `Arc` replacements into a shared map,
//! never mutated in place. A render-context read racing an update-context
//! rebuild therefore observes either the old or the new list in full - that
//! whole-value swap, not a lock around the rebuild, is the concurrency
//! invariant the renderer leans on. The map lock guards only the pointer
//! exchange.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::scene::{Entity, Scene, ViewportId, ViewportSettings};

use super::order::{draw_order, DrawKey};
use super::visibility::is_visible;

/// The ordered sequence of drawable entities for one viewport, one frame.
/// Back-to-front: the first entity draws first (furthest back).
#[derive(Debug)]
pub struct DisplayList {
    entities: Vec<Entity>,
    generation: u64,
}

impl DisplayList {
    pub(crate) fn from_entities(entities: Vec<Entity>, generation: u64) -> Self {
        Self { entities, generation }
    }

    /// Entities in draw order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Which rebuild produced this list. Lists served from cache keep their
    /// generation; a fresh value means a rebuild happened.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// State shared between the cache (update context) and readers (render
/// context).
struct SharedLists {
    lists: RwLock<HashMap<ViewportId, Arc<DisplayList>>>,
    dirty: AtomicBool,
}

/// Cloneable, `Send + Sync` handle for the render context.
///
/// Reads return the last published list and never rebuild, never touch the
/// scene, and never block on a rebuild in progress beyond the brief map
/// access.
#[derive(Clone)]
pub struct DisplayListReader {
    shared: Arc<SharedLists>,
}

impl DisplayListReader {
    /// The last published list for a viewport, if one has been built.
    pub fn display_list(&self, viewport: ViewportId) -> Option<Arc<DisplayList>> {
        self.shared.lists.read().get(&viewport).cloned()
    }
}

/// Per-viewport cache of the last computed, sorted entity lists.
pub(crate) struct DisplayListCache {
    shared: Arc<SharedLists>,
    /// Registration order; also the deterministic rebuild order.
    registered: Vec<ViewportId>,
    /// Bumped once per rebuild pass.
    generation: u64,
    /// Handed out for viewports that have no published list yet.
    empty: Arc<DisplayList>,
}

impl DisplayListCache {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SharedLists {
                lists: RwLock::new(HashMap::new()),
                dirty: AtomicBool::new(false),
            }),
            registered: Vec::new(),
            generation: 0,
            empty: Arc::new(DisplayList::from_entities(Vec::new(), 0)),
        }
    }

    pub fn reader(&self) -> DisplayListReader {
        DisplayListReader { shared: Arc::clone(&self.shared) }
    }

    pub fn mark_dirty(&self) {
        self.shared.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.dirty.load(Ordering::Acquire)
    }

    pub fn is_registered(&self, viewport: ViewportId) -> bool {
        self.registered.contains(&viewport)
    }

    /// Start tracking a viewport. Returns false if it was already
    /// registered. The caches go dirty so the next rebuild covers it.
    pub fn register(&mut self, viewport: ViewportId) -> bool {
        if self.is_registered(viewport) {
            return false;
        }
        self.registered.push(viewport);
        self.mark_dirty();
        true
    }

    /// Stop tracking a viewport and drop its published list. Returns false
    /// if it was not registered.
    pub fn deregister(&mut self, viewport: ViewportId) -> bool {
        let before = self.registered.len();
        self.registered.retain(|&vp| vp != viewport);
        if self.registered.len() == before {
            return false;
        }
        self.shared.lists.write().remove(&viewport);
        true
    }

    pub fn registered(&self) -> &[ViewportId] {
        &self.registered
    }

    /// The current list for a viewport: the published one, or the shared
    /// empty list if nothing has been built for it yet.
    pub fn get(&self, viewport: ViewportId) -> Arc<DisplayList> {
        self.shared
            .lists
            .read()
            .get(&viewport)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.empty))
    }

    /// This tick's lists for relevant registered viewports (the refresh
    /// union).
    pub fn relevant_lists(&self, scene: &Scene) -> Vec<Arc<DisplayList>> {
        let lists = self.shared.lists.read();
        self.registered
            .iter()
            .filter(|&&vp| scene.viewport_relevant(vp))
            .filter_map(|vp| lists.get(vp).cloned())
            .collect()
    }

    /// Rebuild every registered relevant viewport's list.
    ///
    /// The dirty flag is cleared *before* any work: a change arriving during
    /// the rebuild re-marks it and is captured by the next tick instead of
    /// being lost. Irrelevant viewports keep their last published list.
    pub fn rebuild_all(&mut self, scene: &Scene) {
        self.shared.dirty.store(false, Ordering::Release);
        self.generation += 1;

        for &viewport in &self.registered {
            if !scene.viewport_relevant(viewport) {
                continue;
            }
            let Some(settings) = scene.viewport_settings(viewport) else {
                // Viewport died without a deregistration; keep the last
                // good list rather than failing the rebuild.
                continue;
            };

            let list = build_list(scene, viewport, settings, self.generation);
            debug!(
                "rebuilt display list for {viewport:?}: {} entities (gen {})",
                list.len(),
                self.generation
            );
            self.shared.lists.write().insert(viewport, Arc::new(list));
        }
    }

    /// Drop everything published and every registration.
    pub fn clear(&mut self) {
        self.registered.clear();
        self.shared.lists.write().clear();
    }
}

/// Gather candidates per the viewport's display settings, filter, and
/// stable-sort into draw order.
fn build_list(
    scene: &Scene,
    viewport: ViewportId,
    settings: &ViewportSettings,
    generation: u64,
) -> DisplayList {
    let mut keyed: Vec<(DrawKey, Entity)> = Vec::new();
    let mut seen: Vec<Entity> = Vec::new();

    // An entity reachable through two paths still appears once, at its
    // first discovery position.
    fn consider(
        scene: &Scene,
        viewport: ViewportId,
        settings: &ViewportSettings,
        entity: Entity,
        key: Option<DrawKey>,
        seen: &mut Vec<Entity>,
        keyed: &mut Vec<(DrawKey, Entity)>,
    ) {
        if seen.contains(&entity) {
            return;
        }
        seen.push(entity);
        if is_visible(scene, entity, viewport, settings) {
            keyed.push((key.unwrap_or_else(|| DrawKey::of(scene, entity)), entity));
        }
    }

    if settings.show_room() {
        if let Some(room) = scene.current_room().and_then(|id| scene.room(id)) {
            if let Some(background) = room.background() {
                // The background is the backdrop: it draws before everything
                // in the room regardless of its own layer and depth, so it
                // gets a sentinel key that sorts ahead of any real one.
                let backdrop = DrawKey { layer: i32::MIN, z: f32::INFINITY };
                consider(scene, viewport, settings, background, Some(backdrop), &mut seen, &mut keyed);
            }
            for &object in room.objects() {
                consider(scene, viewport, settings, object, None, &mut seen, &mut keyed);
            }
            for area in room.areas() {
                if let Some(proxy) = area.proxy {
                    consider(scene, viewport, settings, proxy, None, &mut seen, &mut keyed);
                }
            }
        }
    }

    if settings.show_overlay() {
        for &entity in scene.overlay() {
            consider(scene, viewport, settings, entity, None, &mut seen, &mut keyed);
        }
    }

    // Stable: discovery order is the final tie-break
    keyed.sort_by(|a, b| draw_order(&a.0, &b.0));

    DisplayList::from_entities(keyed.into_iter().map(|(_, e)| e).collect(), generation)
}

//! Display-List Engine
//!
//! Decides, every tick and for every registered viewport, which drawable
//! entities are visible and in what order they must be drawn, and keeps
//! that decision cached until something that could change it actually
//! changes.
//!
//! Two entry points, one per execution context:
//!
//! - [`DisplayListEngine::update`] - the update context calls this once per
//!   simulation tick. It drains scene change events, rebuilds the caches if
//!   anything dirtied them (or a room transition forces it), and runs the
//!   transform-refresh pass over the union of this tick's lists.
//! - [`DisplayListEngine::display_list`] - the full read: lazily registers
//!   unseen viewports and rebuilds if dirty, but never refreshes transforms,
//!   keeping reads side-effect-light.
//!
//! A concurrent render thread uses the [`DisplayListReader`] handle instead,
//! which only ever sees whole published lists.

mod cache;
mod order;
mod refresh;
mod visibility;
mod watcher;

pub use cache::{DisplayList, DisplayListReader};
pub use refresh::RefreshSink;

use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use crate::scene::event::SceneEvent;
use crate::scene::{Scene, ViewportId};

use cache::DisplayListCache;
use refresh::MatrixRefreshCoordinator;
use watcher::EntityWatcher;

/// Integration bugs upstream: misuse of the engine's registration API.
/// Everything else this subsystem encounters degrades instead of failing -
/// a bad frame is acceptable, a render-loop error is not.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("viewport {0:?} is already registered")]
    ViewportAlreadyRegistered(ViewportId),

    #[error("viewport {0:?} does not exist in the scene")]
    UnknownViewport(ViewportId),

    #[error("viewport {0:?} is not registered")]
    ViewportNotRegistered(ViewportId),
}

/// The display-list engine. Owned by the update context; render-context
/// reads go through [`reader`](DisplayListEngine::reader) handles.
pub struct DisplayListEngine {
    watcher: EntityWatcher,
    cache: DisplayListCache,
    coordinator: MatrixRefreshCoordinator,
}

impl DisplayListEngine {
    pub fn new() -> Self {
        Self {
            watcher: EntityWatcher::new(),
            cache: DisplayListCache::new(),
            coordinator: MatrixRefreshCoordinator::new(),
        }
    }

    /// A cloneable handle for the render context. Reads return the last
    /// published list for a viewport and never rebuild.
    pub fn reader(&self) -> DisplayListReader {
        self.cache.reader()
    }

    /// Explicitly start tracking a viewport. Registration also happens
    /// lazily on the first [`display_list`](Self::display_list) read;
    /// registering twice is reported as an integration bug.
    pub fn register_viewport(
        &mut self,
        scene: &Scene,
        viewport: ViewportId,
    ) -> Result<(), EngineError> {
        if !scene.has_viewport(viewport) {
            return Err(EngineError::UnknownViewport(viewport));
        }
        if !self.cache.register(viewport) {
            warn!("viewport {viewport:?} registered twice");
            return Err(EngineError::ViewportAlreadyRegistered(viewport));
        }
        // Deregistering the last viewport released every subscription, so a
        // fresh registration must re-cover whatever is reachable now.
        self.watcher.resync(scene);
        Ok(())
    }

    /// Stop tracking a viewport: its cache entry is dropped and, when it was
    /// the last registered viewport, every entity subscription is released
    /// with it so nothing keeps watching a scene no one displays.
    pub fn deregister_viewport(&mut self, viewport: ViewportId) -> Result<(), EngineError> {
        if !self.cache.deregister(viewport) {
            warn!("deregistering unknown viewport {viewport:?}");
            return Err(EngineError::ViewportNotRegistered(viewport));
        }
        if self.cache.registered().is_empty() {
            self.watcher.clear();
        }
        Ok(())
    }

    /// The ordered, back-to-front entity list for a viewport.
    ///
    /// Processes pending scene changes first, so a mutation made earlier in
    /// the same tick is reflected. If anything is dirty, *every* registered
    /// viewport's list is rebuilt, not just the requested one. Never runs
    /// the transform-refresh pass.
    pub fn display_list(
        &mut self,
        scene: &mut Scene,
        viewport: ViewportId,
    ) -> Result<Arc<DisplayList>, EngineError> {
        if !scene.has_viewport(viewport) {
            return Err(EngineError::UnknownViewport(viewport));
        }

        self.poll(scene);

        if !self.cache.is_registered(viewport) {
            debug!("lazily registering viewport {viewport:?} on first read");
            self.cache.register(viewport);
            // First contact with the scene: make sure subscriptions cover
            // whatever is already reachable.
            self.watcher.resync(scene);
        }

        if self.cache.is_dirty() {
            self.cache.rebuild_all(scene);
        }

        Ok(self.cache.get(viewport))
    }

    /// Tick-driven entry point; call exactly once per simulation tick.
    ///
    /// Re-evaluates dirtiness (a room transition in progress forces a
    /// rebuild even when nothing is marked), then refreshes the transform of
    /// every entity present in at least one relevant viewport's list -
    /// exactly once each, however many lists it appears in.
    pub fn update(&mut self, scene: &mut Scene, sink: &mut dyn RefreshSink) {
        self.poll(scene);

        if self.cache.is_dirty() || scene.render_preparation() {
            self.cache.rebuild_all(scene);
        }

        let lists = self.cache.relevant_lists(scene);
        self.coordinator.run(scene, sink, &lists);
    }

    /// Drain and route pending scene events through the watcher, marking
    /// the caches dirty and resyncing subscriptions as needed.
    fn poll(&mut self, scene: &mut Scene) {
        let events = scene.drain_events();
        if events.is_empty() {
            return;
        }

        let mut needs_resync = false;
        for event in &events {
            match *event {
                SceneEvent::ViewportChanged { viewport } => {
                    if self.cache.is_registered(viewport) {
                        self.cache.mark_dirty();
                    }
                }
                SceneEvent::ViewportRemoved { viewport } => {
                    if self.cache.deregister(viewport) {
                        self.cache.mark_dirty();
                        if self.cache.registered().is_empty() {
                            self.watcher.clear();
                        }
                    }
                }
                _ => {
                    let outcome = self.watcher.note(scene, event);
                    if outcome.dirty {
                        self.cache.mark_dirty();
                    }
                    needs_resync |= outcome.resync;
                }
            }
        }

        if needs_resync {
            self.watcher.resync(scene);
        }
    }
}

impl Default for DisplayListEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{
        Animation, DepthClippingPlane, Entity, RenderLayer, Sprite, ViewportSettings,
    };

    /// Counts refresh calls per entity.
    struct CountingSink {
        refreshed: Vec<Entity>,
    }

    impl CountingSink {
        fn new() -> Self {
            Self { refreshed: Vec::new() }
        }

        fn count(&self, entity: Entity) -> usize {
            self.refreshed.iter().filter(|&&e| e == entity).count()
        }
    }

    impl RefreshSink for CountingSink {
        fn refresh(&mut self, _scene: &Scene, entity: Entity) {
            self.refreshed.push(entity);
        }
    }

    struct NullSink;

    impl RefreshSink for NullSink {
        fn refresh(&mut self, _scene: &Scene, _entity: Entity) {}
    }

    /// Room with background B (layer 0, Z=0), objects O1 and O2 (layer 0,
    /// Z=5), overlay element U (layer 10, Z=0).
    fn concrete_scenario() -> (Scene, ViewportId, Entity, Entity, Entity, Entity) {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut scene = Scene::new();
        let room = scene.add_room();

        let b = scene.spawn_at(0.0, 0.0, 0.0);
        let o1 = scene.spawn_at(0.0, 0.0, 5.0);
        let o2 = scene.spawn_at(0.0, 0.0, 5.0);
        let u = scene.spawn_at(0.0, 0.0, 0.0);
        scene.set_layer(u, RenderLayer::independent(10));

        scene.set_background(room, Some(b));
        scene.add_object(room, o1);
        scene.add_object(room, o2);
        scene.set_current_room(room);
        scene.add_overlay(u);

        let vp = scene.add_viewport(ViewportSettings::new());
        (scene, vp, b, o1, o2, u)
    }

    #[test]
    fn test_concrete_scenario_order() {
        let (mut scene, vp, b, o1, o2, u) = concrete_scenario();
        let mut engine = DisplayListEngine::new();

        let list = engine.display_list(&mut scene, vp).unwrap();
        assert_eq!(list.entities(), &[b, o1, o2, u]);

        // Toggling O1 off removes exactly O1 on the next read
        scene.set_visible(o1, false);
        engine.update(&mut scene, &mut NullSink);
        let list = engine.display_list(&mut scene, vp).unwrap();
        assert_eq!(list.entities(), &[b, o2, u]);
    }

    #[test]
    fn test_painter_order_within_layer() {
        let mut scene = Scene::new();
        let room = scene.add_room();
        let far = scene.spawn_at(0.0, 0.0, 9.0);
        let mid = scene.spawn_at(0.0, 0.0, 5.0);
        let near = scene.spawn_at(0.0, 0.0, 1.0);
        // Added out of depth order on purpose
        scene.add_object(room, mid);
        scene.add_object(room, near);
        scene.add_object(room, far);
        scene.set_current_room(room);
        let vp = scene.add_viewport(ViewportSettings::new());

        let mut engine = DisplayListEngine::new();
        let list = engine.display_list(&mut scene, vp).unwrap();

        // Higher Z is further back and draws earlier
        assert_eq!(list.entities(), &[far, mid, near]);
    }

    #[test]
    fn test_stability_without_mutation() {
        let (mut scene, vp, ..) = concrete_scenario();
        let mut engine = DisplayListEngine::new();

        engine.update(&mut scene, &mut NullSink);
        let first = engine.display_list(&mut scene, vp).unwrap();
        engine.update(&mut scene, &mut NullSink);
        let second = engine.display_list(&mut scene, vp).unwrap();

        // No dirty signal in between: the very same list is served
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.generation(), second.generation());
    }

    #[test]
    fn test_invalidation_on_each_watched_property() {
        let (mut scene, vp, _b, o1, ..) = concrete_scenario();
        let mut engine = DisplayListEngine::new();
        let baseline = engine.display_list(&mut scene, vp).unwrap();

        let mutations: Vec<Box<dyn Fn(&mut Scene)>> = vec![
            Box::new(move |s| s.set_z(o1, 1.0)),
            Box::new(move |s| s.set_x(o1, 2.0)),
            Box::new(move |s| s.set_visible(o1, false)),
            Box::new(move |s| s.set_visible(o1, true)),
            Box::new(move |s| s.set_enabled(o1, false)),
            Box::new(move |s| s.set_enabled(o1, true)),
            Box::new(move |s| s.set_layer(o1, RenderLayer::new(2))),
        ];

        let mut previous = baseline;
        for mutate in mutations {
            mutate(&mut scene);
            let list = engine.display_list(&mut scene, vp).unwrap();
            // Each watched change produces a fresh rebuild
            assert!(list.generation() > previous.generation());
            previous = list;
        }
    }

    #[test]
    fn test_reparenting_invalidates_and_inherits_visibility() {
        let (mut scene, vp, b, o1, o2, u) = concrete_scenario();
        let mut engine = DisplayListEngine::new();
        engine.display_list(&mut scene, vp).unwrap();

        // Parent O2 under a hidden off-list holder
        let holder = scene.spawn();
        scene.set_visible(holder, false);
        scene.set_parent(o2, holder);

        let list = engine.display_list(&mut scene, vp).unwrap();
        assert_eq!(list.entities(), &[b, o1, u]);
    }

    #[test]
    fn test_frame_advance_reorders_by_sprite_depth() {
        let mut scene = Scene::new();
        let room = scene.add_room();
        let anchor = scene.spawn_at(0.0, 0.0, 5.0);
        let walker = scene.spawn_at(0.0, 0.0, 9.0); // nominally far back

        let flat = scene.add_sprite(Sprite::new(0.0));
        let close = scene.add_sprite(Sprite::with_z(0.0, 1.0));
        scene.set_animation(walker, Animation::new(vec![flat, close]));

        scene.add_object(room, anchor);
        scene.add_object(room, walker);
        scene.set_current_room(room);
        let vp = scene.add_viewport(ViewportSettings::new());

        let mut engine = DisplayListEngine::new();
        let list = engine.display_list(&mut scene, vp).unwrap();
        assert_eq!(list.entities(), &[walker, anchor]);

        // The next frame's sprite carries Z=1, pulling the walker in front
        scene.advance_frame(walker);
        let list = engine.display_list(&mut scene, vp).unwrap();
        assert_eq!(list.entities(), &[anchor, walker]);
    }

    #[test]
    fn test_chained_sprite_position_change_invalidates() {
        let mut scene = Scene::new();
        let room = scene.add_room();
        let walker = scene.spawn_at(0.0, 0.0, 5.0);
        let s = scene.add_sprite(Sprite::new(0.0));
        scene.set_animation(walker, Animation::new(vec![s]));
        scene.add_object(room, walker);
        scene.set_current_room(room);
        let vp = scene.add_viewport(ViewportSettings::new());

        let mut engine = DisplayListEngine::new();
        let before = engine.display_list(&mut scene, vp).unwrap();

        scene.set_sprite_x(s, 4.0);
        let after = engine.display_list(&mut scene, vp).unwrap();
        assert!(after.generation() > before.generation());
    }

    #[test]
    fn test_near_plane_scenario() {
        let mut scene = Scene::new();
        let room = scene.add_room();
        let reference = scene.spawn_at(0.0, 0.0, 5.0);
        let behind = scene.spawn_at(0.0, 0.0, 8.0);
        let in_front = scene.spawn_at(0.0, 0.0, 2.0);
        scene.add_object(room, reference);
        scene.add_object(room, behind);
        scene.add_object(room, in_front);
        scene.set_current_room(room);

        let vp = scene.add_viewport(ViewportSettings::new());
        scene.set_near_plane(vp, Some(DepthClippingPlane::new(reference)));

        let mut engine = DisplayListEngine::new();
        let list = engine.display_list(&mut scene, vp).unwrap();

        // Entities strictly behind the reference are clipped; the reference
        // itself stays (clip_reference = false)
        assert_eq!(list.entities(), &[reference, in_front]);
    }

    #[test]
    fn test_refresh_dedup_across_viewports() {
        let (mut scene, vp_a, b, o1, o2, u) = concrete_scenario();
        let vp_b = scene.add_viewport(ViewportSettings::new());

        let mut engine = DisplayListEngine::new();
        engine.display_list(&mut scene, vp_a).unwrap();
        engine.display_list(&mut scene, vp_b).unwrap();

        let mut sink = CountingSink::new();
        engine.update(&mut scene, &mut sink);

        // Present in both viewports' lists, refreshed exactly once
        for entity in [b, o1, o2, u] {
            assert_eq!(sink.count(entity), 1);
        }
    }

    #[test]
    fn test_display_list_never_refreshes_transforms() {
        let (mut scene, vp, ..) = concrete_scenario();
        let mut engine = DisplayListEngine::new();

        // Reads alone must not trigger the refresh pass; only update() does
        engine.display_list(&mut scene, vp).unwrap();
        engine.display_list(&mut scene, vp).unwrap();

        let mut sink = CountingSink::new();
        engine.update(&mut scene, &mut sink);
        assert_eq!(sink.refreshed.len(), 4);
    }

    #[test]
    fn test_show_flags_select_candidates() {
        let (mut scene, _, b, o1, o2, u) = concrete_scenario();
        let room_only = scene.add_viewport(ViewportSettings::room_only());
        let overlay_only = scene.add_viewport(ViewportSettings::overlay_only());

        let mut engine = DisplayListEngine::new();
        let room_list = engine.display_list(&mut scene, room_only).unwrap();
        assert_eq!(room_list.entities(), &[b, o1, o2]);

        let overlay_list = engine.display_list(&mut scene, overlay_only).unwrap();
        assert_eq!(overlay_list.entities(), &[u]);
    }

    #[test]
    fn test_room_transition_forces_rebuild() {
        let (mut scene, vp, ..) = concrete_scenario();
        let mut engine = DisplayListEngine::new();
        let before = engine.display_list(&mut scene, vp).unwrap();

        // Nothing dirty, but a transition is in progress
        scene.set_render_preparation(true);
        engine.update(&mut scene, &mut NullSink);
        let during = engine.display_list(&mut scene, vp).unwrap();
        assert!(during.generation() > before.generation());

        scene.set_render_preparation(false);
        engine.update(&mut scene, &mut NullSink);
        let after = engine.display_list(&mut scene, vp).unwrap();
        assert!(Arc::ptr_eq(&during, &after));
    }

    #[test]
    fn test_room_switch_shows_new_room_contents() {
        let (mut scene, vp, b, o1, o2, u) = concrete_scenario();
        let other = scene.add_room();
        let tenant = scene.spawn_at(0.0, 0.0, 3.0);
        scene.add_object(other, tenant);

        let mut engine = DisplayListEngine::new();
        let list = engine.display_list(&mut scene, vp).unwrap();
        assert_eq!(list.entities(), &[b, o1, o2, u]);

        scene.set_current_room(other);
        let list = engine.display_list(&mut scene, vp).unwrap();
        assert_eq!(list.entities(), &[tenant, u]);

        // The old room's entities are no longer watched: changing one does
        // not invalidate
        scene.set_z(o1, 1.0);
        let unchanged = engine.display_list(&mut scene, vp).unwrap();
        assert!(Arc::ptr_eq(&list, &unchanged));
    }

    #[test]
    fn test_despawn_drops_entity_from_lists() {
        let (mut scene, vp, b, o1, o2, u) = concrete_scenario();
        let mut engine = DisplayListEngine::new();
        engine.display_list(&mut scene, vp).unwrap();

        scene.despawn(o1);
        let list = engine.display_list(&mut scene, vp).unwrap();
        assert_eq!(list.entities(), &[b, o2, u]);
    }

    #[test]
    fn test_registration_misuse_is_reported() {
        let (mut scene, vp, ..) = concrete_scenario();
        let mut engine = DisplayListEngine::new();

        assert!(engine.register_viewport(&scene, vp).is_ok());
        assert_eq!(
            engine.register_viewport(&scene, vp),
            Err(EngineError::ViewportAlreadyRegistered(vp))
        );

        assert!(engine.deregister_viewport(vp).is_ok());
        assert_eq!(
            engine.deregister_viewport(vp),
            Err(EngineError::ViewportNotRegistered(vp))
        );

        scene.remove_viewport(vp);
        assert_eq!(
            engine.display_list(&mut scene, vp).unwrap_err(),
            EngineError::UnknownViewport(vp)
        );
    }

    #[test]
    fn test_reregistration_restores_invalidation() {
        let (mut scene, vp, b, o1, o2, u) = concrete_scenario();
        let mut engine = DisplayListEngine::new();
        engine.register_viewport(&scene, vp).unwrap();
        let list = engine.display_list(&mut scene, vp).unwrap();
        assert_eq!(list.entities(), &[b, o1, o2, u]);

        // Dropping the last viewport releases every subscription; a fresh
        // explicit registration must re-establish them, or later changes
        // would never dirty the caches again.
        engine.deregister_viewport(vp).unwrap();
        engine.register_viewport(&scene, vp).unwrap();

        scene.set_visible(o1, false);
        engine.update(&mut scene, &mut NullSink);
        let list = engine.display_list(&mut scene, vp).unwrap();
        assert_eq!(list.entities(), &[b, o2, u]);
    }

    #[test]
    fn test_viewport_settings_change_invalidates() {
        let (mut scene, vp, b, o1, o2, u) = concrete_scenario();
        let mut engine = DisplayListEngine::new();
        engine.display_list(&mut scene, vp).unwrap();

        scene.restrict(vp, o2);
        let list = engine.display_list(&mut scene, vp).unwrap();
        assert_eq!(list.entities(), &[b, o1, u]);

        scene.set_show_overlay(vp, false);
        let list = engine.display_list(&mut scene, vp).unwrap();
        assert_eq!(list.entities(), &[b, o1]);
    }

    #[test]
    fn test_reader_handle_tracks_published_lists() {
        let (mut scene, vp, b, o1, o2, u) = concrete_scenario();
        let mut engine = DisplayListEngine::new();
        let reader = engine.reader();

        assert!(reader.display_list(vp).is_none());

        engine.display_list(&mut scene, vp).unwrap();
        let list = reader.display_list(vp).expect("published after build");
        assert_eq!(list.entities(), &[b, o1, o2, u]);

        engine.deregister_viewport(vp).unwrap();
        assert!(reader.display_list(vp).is_none());
    }
}

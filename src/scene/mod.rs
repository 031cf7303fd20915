//! Scene Model
//!
//! The scene is the explicit context object the display-list engine
//! observes: an entity arena with sparse property stores, a sprite store,
//! rooms, the overlay (UI) entity set, and per-viewport display settings.
//! Nothing here reaches into ambient global state - the engine only touches
//! the scene it is handed.
//!
//! Every mutator that could change what a display list contains emits a
//! [`SceneEvent`](event::SceneEvent) into a single queue, which the engine
//! drains once per tick. Mutation is therefore routed through `Scene`
//! methods rather than exposed fields; the stores stay private so a change
//! can never bypass invalidation.

pub mod entity;
pub mod storage;
pub(crate) mod event;
pub mod components;
pub mod sprite;
pub mod room;
pub mod clipping;
pub mod viewport;

pub use entity::Entity;
pub use components::{Position, DrawState, RenderLayer, ViewportAnchor};
pub use sprite::{Animation, Sprite, SpriteId};
pub use room::{Area, AreaKind, Room, RoomId};
pub use clipping::{DepthClipping, DepthClippingPlane};
pub use viewport::{Camera, ViewportId, ViewportSettings};

use log::warn;

use entity::EntityAllocator;
use event::{EventQueue, SceneEvent};
use sprite::SpriteStore;
use storage::PropertyStorage;
use viewport::ViewportState;

/// The scene/state provider: everything the display-list engine observes.
pub struct Scene {
    entities: EntityAllocator,

    // Per-entity property stores, sparse by slot index.
    positions: PropertyStorage<Position>,
    states: PropertyStorage<DrawState>,
    layers: PropertyStorage<RenderLayer>,
    parents: PropertyStorage<Entity>,
    children: PropertyStorage<Vec<Entity>>,
    anchors: PropertyStorage<ViewportAnchor>,
    animations: PropertyStorage<Animation>,

    sprites: SpriteStore,

    rooms: Vec<Room>,
    current_room: Option<RoomId>,
    overlay: Vec<Entity>,

    viewports: Vec<Option<ViewportState>>,

    /// Set while a new room is being prepared for rendering; forces the next
    /// rebuild even when no individual entity has changed.
    render_preparation: bool,

    events: EventQueue<SceneEvent>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self {
            entities: EntityAllocator::new(),
            positions: PropertyStorage::new(),
            states: PropertyStorage::new(),
            layers: PropertyStorage::new(),
            parents: PropertyStorage::new(),
            children: PropertyStorage::new(),
            anchors: PropertyStorage::new(),
            animations: PropertyStorage::new(),
            sprites: SpriteStore::new(),
            rooms: Vec::new(),
            current_room: None,
            overlay: Vec::new(),
            viewports: Vec::new(),
            render_preparation: false,
            events: EventQueue::new(),
        }
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Spawn a new drawable entity with default properties (origin, visible,
    /// enabled, layer 0).
    pub fn spawn(&mut self) -> Entity {
        let entity = self.entities.allocate();
        self.positions.insert(entity, Position::default());
        self.states.insert(entity, DrawState::default());
        self.layers.insert(entity, RenderLayer::default());
        entity
    }

    /// Spawn an entity at a position.
    pub fn spawn_at(&mut self, x: f32, y: f32, z: f32) -> Entity {
        let entity = self.spawn();
        self.positions.insert(entity, Position::new(x, y, z));
        entity
    }

    /// Despawn an entity and, recursively, its children.
    ///
    /// Room object lists, the overlay set, restriction lists and clipping
    /// planes may still hold the dead id afterwards; consumers skip ids that
    /// no longer resolve, and planes referencing one become inert.
    pub fn despawn(&mut self, entity: Entity) {
        if !self.entities.free(entity) {
            return; // already dead
        }

        // Remove from the parent's children list
        if let Some(parent) = self.parents.remove(entity) {
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.retain(|&e| e != entity);
            }
        }

        // Recursively despawn children
        if let Some(child_list) = self.children.remove(entity) {
            for child in child_list {
                self.despawn(child);
            }
        }

        let idx = entity.index();
        self.positions.clear_slot(idx);
        self.states.clear_slot(idx);
        self.layers.clear_slot(idx);
        self.anchors.clear_slot(idx);
        self.animations.clear_slot(idx);

        self.events.send(SceneEvent::EntityDespawned { entity });
    }

    /// Check if an entity id still resolves.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of alive entities.
    pub fn entity_count(&self) -> u32 {
        self.entities.alive_count()
    }

    // =========================================================================
    // Position
    // =========================================================================

    pub fn position(&self, entity: Entity) -> Option<Position> {
        if !self.is_alive(entity) {
            return None;
        }
        self.positions.get(entity).copied()
    }

    /// Nominal depth of an entity (0 for dead or positionless ids).
    pub fn z(&self, entity: Entity) -> f32 {
        self.position(entity).map(|p| p.z).unwrap_or(0.0)
    }

    pub fn set_x(&mut self, entity: Entity, x: f32) {
        if !self.is_alive(entity) {
            return;
        }
        if let Some(pos) = self.positions.get_mut(entity) {
            if pos.x != x {
                pos.x = x;
                self.events.send(SceneEvent::EntityChanged { entity });
            }
        }
    }

    /// Y does not participate in draw ordering, so no change event is
    /// emitted for it.
    pub fn set_y(&mut self, entity: Entity, y: f32) {
        if !self.is_alive(entity) {
            return;
        }
        if let Some(pos) = self.positions.get_mut(entity) {
            pos.y = y;
        }
    }

    pub fn set_z(&mut self, entity: Entity, z: f32) {
        if !self.is_alive(entity) {
            return;
        }
        if let Some(pos) = self.positions.get_mut(entity) {
            if pos.z != z {
                pos.z = z;
                self.events.send(SceneEvent::EntityChanged { entity });
            }
        }
    }

    // =========================================================================
    // Visibility flags
    // =========================================================================

    /// Own visibility flag (dead ids read as not visible). Effective
    /// visibility additionally requires every ancestor visible and enabled.
    pub fn visible(&self, entity: Entity) -> bool {
        self.is_alive(entity)
            && self.states.get(entity).map(|s| s.visible).unwrap_or(false)
    }

    /// Own enabled flag (dead ids read as disabled).
    pub fn enabled(&self, entity: Entity) -> bool {
        self.is_alive(entity)
            && self.states.get(entity).map(|s| s.enabled).unwrap_or(false)
    }

    pub fn set_visible(&mut self, entity: Entity, visible: bool) {
        if !self.is_alive(entity) {
            return;
        }
        if let Some(state) = self.states.get_mut(entity) {
            if state.visible != visible {
                state.visible = visible;
                self.events.send(SceneEvent::EntityChanged { entity });
            }
        }
    }

    pub fn set_enabled(&mut self, entity: Entity, enabled: bool) {
        if !self.is_alive(entity) {
            return;
        }
        if let Some(state) = self.states.get_mut(entity) {
            if state.enabled != enabled {
                state.enabled = enabled;
                self.events.send(SceneEvent::EntityChanged { entity });
            }
        }
    }

    // =========================================================================
    // Render layer
    // =========================================================================

    /// The entity's render layer (layer 0 for dead or unlayered ids).
    pub fn layer(&self, entity: Entity) -> RenderLayer {
        if !self.is_alive(entity) {
            return RenderLayer::default();
        }
        self.layers.get(entity).copied().unwrap_or_default()
    }

    pub fn set_layer(&mut self, entity: Entity, layer: RenderLayer) {
        if !self.is_alive(entity) {
            return;
        }
        if self.layers.get(entity) != Some(&layer) {
            self.layers.insert(entity, layer);
            self.events.send(SceneEvent::EntityChanged { entity });
        }
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        if !self.is_alive(entity) {
            return None;
        }
        self.parents.get(entity).copied()
    }

    pub fn children(&self, entity: Entity) -> &[Entity] {
        self.children.get(entity).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Set an entity's parent. Refuses (and returns false) when either id is
    /// dead or the edge would create a cycle, so ancestor walks always
    /// terminate.
    pub fn set_parent(&mut self, child: Entity, parent: Entity) -> bool {
        if !self.is_alive(child) || !self.is_alive(parent) || child == parent {
            return false;
        }

        // Walk up from the prospective parent; finding the child means the
        // edge would close a loop.
        let mut cursor = Some(parent);
        while let Some(e) = cursor {
            if e == child {
                warn!("refusing reparent: {child:?} is an ancestor of {parent:?}");
                return false;
            }
            cursor = self.parents.get(e).copied();
        }

        // Remove from the old parent's children list
        if let Some(old_parent) = self.parents.get(child).copied() {
            if let Some(siblings) = self.children.get_mut(old_parent) {
                siblings.retain(|&e| e != child);
            }
        }

        self.parents.insert(child, parent);
        if let Some(children) = self.children.get_mut(parent) {
            children.push(child);
        } else {
            self.children.insert(parent, vec![child]);
        }

        self.events.send(SceneEvent::ParentChanged { child });
        true
    }

    /// Detach an entity from its parent (make it a root).
    pub fn clear_parent(&mut self, child: Entity) {
        if !self.is_alive(child) {
            return;
        }
        if let Some(old_parent) = self.parents.remove(child) {
            if let Some(siblings) = self.children.get_mut(old_parent) {
                siblings.retain(|&e| e != child);
            }
            self.events.send(SceneEvent::ParentChanged { child });
        }
    }

    // =========================================================================
    // Viewport anchoring
    // =========================================================================

    pub fn anchor(&self, entity: Entity) -> Option<ViewportAnchor> {
        if !self.is_alive(entity) {
            return None;
        }
        self.anchors.get(entity).copied()
    }

    /// Anchor an entity to a viewport. Membership depends on the anchor, so
    /// this counts as a structural change.
    pub fn set_anchor(&mut self, entity: Entity, anchor: ViewportAnchor) {
        if !self.is_alive(entity) {
            return;
        }
        self.anchors.insert(entity, anchor);
        self.events.send(SceneEvent::StructureChanged);
    }

    pub fn clear_anchor(&mut self, entity: Entity) {
        if !self.is_alive(entity) {
            return;
        }
        if self.anchors.remove(entity).is_some() {
            self.events.send(SceneEvent::StructureChanged);
        }
    }

    // =========================================================================
    // Sprites and animation
    // =========================================================================

    pub fn add_sprite(&mut self, sprite: Sprite) -> SpriteId {
        self.sprites.add(sprite)
    }

    pub fn sprite(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.get(id)
    }

    pub fn set_sprite_x(&mut self, id: SpriteId, x: f32) {
        if let Some(sprite) = self.sprites.get_mut(id) {
            if sprite.x != x {
                sprite.x = x;
                self.events.send(SceneEvent::SpriteChanged { sprite: id });
            }
        }
    }

    pub fn set_sprite_z(&mut self, id: SpriteId, z: Option<f32>) {
        if let Some(sprite) = self.sprites.get_mut(id) {
            if sprite.z != z {
                sprite.z = z;
                self.events.send(SceneEvent::SpriteChanged { sprite: id });
            }
        }
    }

    pub fn animation(&self, entity: Entity) -> Option<&Animation> {
        if !self.is_alive(entity) {
            return None;
        }
        self.animations.get(entity)
    }

    /// The sprite shown by the entity's active animation frame, if any.
    pub fn current_sprite(&self, entity: Entity) -> Option<SpriteId> {
        self.animation(entity).and_then(|a| a.current_sprite())
    }

    pub fn set_animation(&mut self, entity: Entity, animation: Animation) {
        if !self.is_alive(entity) {
            return;
        }
        self.animations.insert(entity, animation);
        self.events.send(SceneEvent::AnimationChanged { entity });
    }

    pub fn clear_animation(&mut self, entity: Entity) {
        if !self.is_alive(entity) {
            return;
        }
        if self.animations.remove(entity).is_some() {
            self.events.send(SceneEvent::AnimationChanged { entity });
        }
    }

    /// Advance the entity's animation to its next frame (wrapping).
    pub fn advance_frame(&mut self, entity: Entity) {
        if !self.is_alive(entity) {
            return;
        }
        if let Some(animation) = self.animations.get_mut(entity) {
            animation.advance();
            self.events.send(SceneEvent::AnimationChanged { entity });
        }
    }

    /// Jump the entity's animation to a specific frame.
    pub fn set_frame(&mut self, entity: Entity, frame: usize) {
        if !self.is_alive(entity) {
            return;
        }
        if let Some(animation) = self.animations.get_mut(entity) {
            if animation.frame() != frame {
                animation.set_frame(frame);
                self.events.send(SceneEvent::AnimationChanged { entity });
            }
        }
    }

    // =========================================================================
    // Rooms
    // =========================================================================

    pub fn add_room(&mut self) -> RoomId {
        let id = RoomId(self.rooms.len() as u32);
        self.rooms.push(Room::new());
        id
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id.0 as usize)
    }

    pub fn current_room(&self) -> Option<RoomId> {
        self.current_room
    }

    pub fn set_current_room(&mut self, id: RoomId) {
        if self.room(id).is_none() {
            warn!("set_current_room: unknown room {id:?}");
            return;
        }
        if self.current_room != Some(id) {
            self.current_room = Some(id);
            self.events.send(SceneEvent::StructureChanged);
        }
    }

    pub fn set_background(&mut self, id: RoomId, background: Option<Entity>) {
        if let Some(room) = self.rooms.get_mut(id.0 as usize) {
            if room.background != background {
                room.background = background;
                self.events.send(SceneEvent::StructureChanged);
            }
        }
    }

    /// Append an object to a room's object list. Insertion order is the
    /// discovery order used for draw-order tie-breaking.
    pub fn add_object(&mut self, id: RoomId, entity: Entity) {
        if let Some(room) = self.rooms.get_mut(id.0 as usize) {
            if !room.objects.contains(&entity) {
                room.objects.push(entity);
                self.events.send(SceneEvent::StructureChanged);
            }
        }
    }

    pub fn remove_object(&mut self, id: RoomId, entity: Entity) {
        if let Some(room) = self.rooms.get_mut(id.0 as usize) {
            let before = room.objects.len();
            room.objects.retain(|&e| e != entity);
            if room.objects.len() != before {
                self.events.send(SceneEvent::StructureChanged);
            }
        }
    }

    /// Add a walkable/scaling area, optionally with a debug-draw proxy.
    pub fn add_area(&mut self, id: RoomId, kind: AreaKind, proxy: Option<Entity>) {
        if let Some(room) = self.rooms.get_mut(id.0 as usize) {
            room.areas.push(Area { kind, proxy });
            if proxy.is_some() {
                self.events.send(SceneEvent::StructureChanged);
            }
        }
    }

    // =========================================================================
    // Overlay (UI) set
    // =========================================================================

    /// Overlay entities in insertion order.
    pub fn overlay(&self) -> &[Entity] {
        &self.overlay
    }

    pub fn add_overlay(&mut self, entity: Entity) {
        if !self.overlay.contains(&entity) {
            self.overlay.push(entity);
            self.events.send(SceneEvent::StructureChanged);
        }
    }

    pub fn remove_overlay(&mut self, entity: Entity) {
        let before = self.overlay.len();
        self.overlay.retain(|&e| e != entity);
        if self.overlay.len() != before {
            self.events.send(SceneEvent::StructureChanged);
        }
    }

    // =========================================================================
    // Viewports
    // =========================================================================

    pub fn add_viewport(&mut self, settings: ViewportSettings) -> ViewportId {
        let id = ViewportId(self.viewports.len() as u32);
        self.viewports.push(Some(ViewportState::new(settings)));
        id
    }

    pub fn remove_viewport(&mut self, id: ViewportId) {
        if let Some(slot) = self.viewports.get_mut(id.0 as usize) {
            if slot.take().is_some() {
                self.events.send(SceneEvent::ViewportRemoved { viewport: id });
            }
        }
    }

    pub fn has_viewport(&self, id: ViewportId) -> bool {
        self.viewport_state(id).is_some()
    }

    pub fn viewport_settings(&self, id: ViewportId) -> Option<&ViewportSettings> {
        self.viewport_state(id).map(|state| &state.settings)
    }

    pub fn camera(&self, id: ViewportId) -> Option<Camera> {
        self.viewport_state(id).map(|state| state.camera)
    }

    /// Camera movement changes how a list is drawn, not what it contains,
    /// so it emits no event.
    pub fn set_camera(&mut self, id: ViewportId, camera: Camera) {
        if let Some(state) = self.viewport_state_mut(id) {
            state.camera = camera;
        }
    }

    /// The "is this viewport currently relevant" predicate.
    pub fn viewport_relevant(&self, id: ViewportId) -> bool {
        self.viewport_state(id).map(|state| state.relevant).unwrap_or(false)
    }

    pub fn set_viewport_relevant(&mut self, id: ViewportId, relevant: bool) {
        if let Some(state) = self.viewport_state_mut(id) {
            if state.relevant != relevant {
                state.relevant = relevant;
                self.events.send(SceneEvent::ViewportChanged { viewport: id });
            }
        }
    }

    pub fn set_show_room(&mut self, id: ViewportId, show: bool) {
        if let Some(state) = self.viewport_state_mut(id) {
            if state.settings.show_room != show {
                state.settings.show_room = show;
                self.events.send(SceneEvent::ViewportChanged { viewport: id });
            }
        }
    }

    pub fn set_show_overlay(&mut self, id: ViewportId, show: bool) {
        if let Some(state) = self.viewport_state_mut(id) {
            if state.settings.show_overlay != show {
                state.settings.show_overlay = show;
                self.events.send(SceneEvent::ViewportChanged { viewport: id });
            }
        }
    }

    /// Exclude an entity from a viewport regardless of its visibility.
    pub fn restrict(&mut self, id: ViewportId, entity: Entity) {
        if let Some(state) = self.viewport_state_mut(id) {
            if state.settings.restriction.insert(entity) {
                self.events.send(SceneEvent::ViewportChanged { viewport: id });
            }
        }
    }

    pub fn unrestrict(&mut self, id: ViewportId, entity: Entity) {
        if let Some(state) = self.viewport_state_mut(id) {
            if state.settings.restriction.remove(&entity) {
                self.events.send(SceneEvent::ViewportChanged { viewport: id });
            }
        }
    }

    pub fn set_near_plane(&mut self, id: ViewportId, plane: Option<DepthClippingPlane>) {
        if let Some(state) = self.viewport_state_mut(id) {
            state.settings.clipping.near = plane;
            self.events.send(SceneEvent::ViewportChanged { viewport: id });
        }
    }

    pub fn set_far_plane(&mut self, id: ViewportId, plane: Option<DepthClippingPlane>) {
        if let Some(state) = self.viewport_state_mut(id) {
            state.settings.clipping.far = plane;
            self.events.send(SceneEvent::ViewportChanged { viewport: id });
        }
    }

    fn viewport_state(&self, id: ViewportId) -> Option<&ViewportState> {
        self.viewports.get(id.0 as usize).and_then(|slot| slot.as_ref())
    }

    fn viewport_state_mut(&mut self, id: ViewportId) -> Option<&mut ViewportState> {
        self.viewports.get_mut(id.0 as usize).and_then(|slot| slot.as_mut())
    }

    /// Ids of all live viewports.
    pub fn viewport_ids(&self) -> impl Iterator<Item = ViewportId> + '_ {
        self.viewports
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(idx, _)| ViewportId(idx as u32))
    }

    // =========================================================================
    // Room transition
    // =========================================================================

    /// Mark (or clear) the "preparing new room for rendering" state. While
    /// set, every tick rebuilds the display lists even if nothing else is
    /// dirty - the transition itself can make previously irrelevant
    /// contents relevant without any individual entity changing.
    pub fn set_render_preparation(&mut self, preparing: bool) {
        self.render_preparation = preparing;
    }

    pub fn render_preparation(&self) -> bool {
        self.render_preparation
    }

    // =========================================================================
    // Events (engine-internal)
    // =========================================================================

    pub(crate) fn drain_events(&mut self) -> Vec<SceneEvent> {
        self.events.drain().collect()
    }

    #[cfg(test)]
    pub(crate) fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_defaults() {
        let mut scene = Scene::new();
        let e = scene.spawn();

        assert!(scene.is_alive(e));
        assert!(scene.visible(e));
        assert!(scene.enabled(e));
        assert_eq!(scene.layer(e), RenderLayer::default());
        assert_eq!(scene.z(e), 0.0);
    }

    #[test]
    fn test_despawn_cascades_through_children() {
        let mut scene = Scene::new();
        let parent = scene.spawn();
        let child = scene.spawn();
        let grandchild = scene.spawn();
        assert!(scene.set_parent(child, parent));
        assert!(scene.set_parent(grandchild, child));

        scene.despawn(parent);
        assert!(!scene.is_alive(parent));
        assert!(!scene.is_alive(child));
        assert!(!scene.is_alive(grandchild));
        assert_eq!(scene.entity_count(), 0);
    }

    #[test]
    fn test_reparent_cycle_refused() {
        let mut scene = Scene::new();
        let a = scene.spawn();
        let b = scene.spawn();
        let c = scene.spawn();
        assert!(scene.set_parent(b, a));
        assert!(scene.set_parent(c, b));

        // a -> b -> c; making a a child of c would close a loop
        assert!(!scene.set_parent(a, c));
        assert!(!scene.set_parent(a, a));
        assert_eq!(scene.parent(a), None);
    }

    #[test]
    fn test_setters_emit_only_on_change() {
        let mut scene = Scene::new();
        let e = scene.spawn();
        scene.drain_events();

        scene.set_visible(e, true); // already true
        scene.set_z(e, 0.0); // already 0
        assert!(!scene.has_pending_events());

        scene.set_visible(e, false);
        scene.set_z(e, 4.0);
        assert_eq!(scene.drain_events().len(), 2);
    }

    #[test]
    fn test_dead_entity_setters_are_noops() {
        let mut scene = Scene::new();
        let e = scene.spawn();
        scene.despawn(e);
        scene.drain_events();

        scene.set_visible(e, false);
        scene.set_z(e, 10.0);
        scene.set_layer(e, RenderLayer::new(3));
        assert!(!scene.has_pending_events());
        assert_eq!(scene.position(e), None);
    }

    #[test]
    fn test_room_object_order_is_insertion_order() {
        let mut scene = Scene::new();
        let room = scene.add_room();
        let a = scene.spawn();
        let b = scene.spawn();
        scene.add_object(room, a);
        scene.add_object(room, b);
        scene.add_object(room, a); // duplicate ignored

        assert_eq!(scene.room(room).unwrap().objects(), &[a, b]);
    }

    #[test]
    fn test_animation_frame_advance_changes_current_sprite() {
        let mut scene = Scene::new();
        let s0 = scene.add_sprite(Sprite::new(0.0));
        let s1 = scene.add_sprite(Sprite::with_z(0.0, 2.5));
        let e = scene.spawn();
        scene.set_animation(e, Animation::new(vec![s0, s1]));

        assert_eq!(scene.current_sprite(e), Some(s0));
        scene.advance_frame(e);
        assert_eq!(scene.current_sprite(e), Some(s1));
    }

    #[test]
    fn test_viewport_removal() {
        let mut scene = Scene::new();
        let vp = scene.add_viewport(ViewportSettings::new());
        assert!(scene.has_viewport(vp));

        scene.remove_viewport(vp);
        assert!(!scene.has_viewport(vp));
        assert!(scene.viewport_settings(vp).is_none());
    }
}

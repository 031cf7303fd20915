//! playbill: a display-list engine for 2D room/overlay scenes
//!
//! Decides, every tick and for every active viewport, which drawable
//! entities are visible and in what order they must be drawn - and keeps
//! that decision cheap by invalidating it only when something that could
//! change it actually changes.
//!
//! The moving parts:
//! - [`Scene`]: entity arena, rooms, overlay set, viewports - the explicit
//!   context object the engine observes. Every mutator emits a change event.
//! - [`DisplayListEngine`]: drains change events, maintains per-entity
//!   subscriptions, rebuilds per-viewport sorted lists when dirty, and runs
//!   the once-per-tick transform-refresh pass.
//! - [`DisplayListReader`]: a cloneable handle the render thread reads
//!   whole published lists through, without locks around the rebuild.
//!
//! ```
//! use playbill::{DisplayListEngine, RefreshSink, Scene, ViewportSettings};
//!
//! struct NoRefresh;
//! impl RefreshSink for NoRefresh {
//!     fn refresh(&mut self, _: &playbill::Scene, _: playbill::Entity) {}
//! }
//!
//! let mut scene = Scene::new();
//! let room = scene.add_room();
//! let hero = scene.spawn_at(10.0, 20.0, 5.0);
//! scene.add_object(room, hero);
//! scene.set_current_room(room);
//! let viewport = scene.add_viewport(ViewportSettings::new());
//!
//! let mut engine = DisplayListEngine::new();
//! engine.update(&mut scene, &mut NoRefresh);
//! let list = engine.display_list(&mut scene, viewport).unwrap();
//! assert_eq!(list.entities(), &[hero]);
//! ```

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod engine;
pub mod scene;

pub use engine::{DisplayList, DisplayListEngine, DisplayListReader, EngineError, RefreshSink};
pub use scene::{
    Animation, Area, AreaKind, Camera, DepthClipping, DepthClippingPlane, DrawState, Entity,
    Position, RenderLayer, Room, RoomId, Scene, Sprite, SpriteId, ViewportAnchor, ViewportId,
    ViewportSettings,
};

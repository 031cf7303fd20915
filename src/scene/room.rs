//! Rooms
//!
//! A room owns a background image-object, a list of free objects, and a set
//! of walkable/scaling areas. Areas may expose a debug-draw proxy entity so
//! their masks can be visualized; proxies join the room's display-list
//! candidates like any other object and are filtered by their own
//! visibility flags.
//!
//! Rooms hold entity *ids*, not entities. An id that has stopped resolving
//! (its entity was despawned) is simply skipped when candidates are
//! gathered.

use serde::{Serialize, Deserialize};

use super::entity::Entity;

/// Identifier for a room in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub(crate) u32);

/// What an area is for. Only relevant to surrounding layers (movement,
/// scaling); the display-list engine cares only about the debug proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AreaKind {
    Walkable,
    Scaling,
}

/// A walkable or scaling area inside a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Area {
    pub kind: AreaKind,
    /// Debug-draw proxy entity, shown when mask visualization is on.
    pub proxy: Option<Entity>,
}

/// A room: background, free objects, areas.
#[derive(Debug, Default)]
pub struct Room {
    pub(crate) background: Option<Entity>,
    pub(crate) objects: Vec<Entity>,
    pub(crate) areas: Vec<Area>,
}

impl Room {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The room's current background image-object, if any.
    pub fn background(&self) -> Option<Entity> {
        self.background
    }

    /// Free objects, in the order they were added (discovery order for
    /// draw-order tie-breaking).
    pub fn objects(&self) -> &[Entity] {
        &self.objects
    }

    /// The room's areas.
    pub fn areas(&self) -> &[Area] {
        &self.areas
    }
}

//! Viewports
//!
//! A viewport is a named view of the scene with its own camera, display
//! settings, and depth-clipping rules. The display-list engine keeps one
//! cached list per viewport it has been asked about; a viewport's settings
//! are mutated through the scene so changes reach the engine's dirty
//! tracking.

use std::collections::HashSet;

use serde::{Serialize, Deserialize};

use super::clipping::DepthClipping;
use super::entity::Entity;

/// Identifier for a viewport in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewportId(pub(crate) u32);

/// World-to-viewport transform. The engine only stores and hands this out;
/// camera movement never invalidates display lists (it changes how a list
/// is drawn, not what it contains).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, scale_x: 1.0, scale_y: 1.0, rotation: 0.0 }
    }
}

/// What a viewport displays and what it filters out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewportSettings {
    /// Include the current room's background, objects and area proxies.
    pub(crate) show_room: bool,
    /// Include the overlay (UI) entity set.
    pub(crate) show_overlay: bool,
    /// Entities excluded from this viewport regardless of visibility.
    pub(crate) restriction: HashSet<Entity>,
    /// Near/far depth-clipping planes.
    pub(crate) clipping: DepthClipping,
}

impl ViewportSettings {
    /// Settings that show everything: room and overlay, no restrictions,
    /// no clipping.
    pub fn new() -> Self {
        Self {
            show_room: true,
            show_overlay: true,
            restriction: HashSet::new(),
            clipping: DepthClipping::default(),
        }
    }

    /// Room contents only (a cutscene letterbox view, for example).
    pub fn room_only() -> Self {
        Self { show_overlay: false, ..Self::new() }
    }

    /// Overlay entities only (a dedicated UI viewport).
    pub fn overlay_only() -> Self {
        Self { show_room: false, ..Self::new() }
    }

    pub fn show_room(&self) -> bool {
        self.show_room
    }

    pub fn show_overlay(&self) -> bool {
        self.show_overlay
    }

    pub fn restriction(&self) -> &HashSet<Entity> {
        &self.restriction
    }

    pub fn clipping(&self) -> &DepthClipping {
        &self.clipping
    }
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the scene holds per viewport.
#[derive(Debug)]
pub(crate) struct ViewportState {
    pub settings: ViewportSettings,
    pub camera: Camera,
    /// Whether this viewport is currently worth rebuilding for. An
    /// irrelevant viewport keeps its last published list untouched.
    pub relevant: bool,
}

impl ViewportState {
    pub fn new(settings: ViewportSettings) -> Self {
        Self { settings, camera: Camera::default(), relevant: true }
    }
}

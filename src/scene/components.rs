//! Drawable Properties
//!
//! Plain data attached to entities. Behavior lives in the engine; these
//! structs only carry the attributes the display-list engine consumes.

use serde::{Serialize, Deserialize};

use super::viewport::ViewportId;

// =============================================================================
// Spatial
// =============================================================================

/// World position of an entity. Z is the depth used for draw ordering
/// (lower Z is closer to the camera and draws later, i.e. on top).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

// =============================================================================
// Visibility
// =============================================================================

/// Own visibility flags. Effective visibility also requires every ancestor
/// to be visible and enabled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DrawState {
    pub visible: bool,
    pub enabled: bool,
}

impl Default for DrawState {
    fn default() -> Self {
        Self { visible: true, enabled: true }
    }
}

// =============================================================================
// Layering
// =============================================================================

/// A coarse drawing bucket with its own Z ordering scope.
///
/// Higher indices draw later (on top). Layers flagged with independent
/// resolution render in their own coordinate space (typically UI) and are
/// exempt from room-space depth clipping unless a plane names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderLayer {
    pub index: i32,
    pub independent_resolution: bool,
}

impl RenderLayer {
    pub fn new(index: i32) -> Self {
        Self { index, independent_resolution: false }
    }

    pub fn independent(index: i32) -> Self {
        Self { index, independent_resolution: true }
    }
}

impl Default for RenderLayer {
    fn default() -> Self {
        Self::new(0)
    }
}

// =============================================================================
// Viewport binding
// =============================================================================

/// Binds an entity to one viewport.
///
/// With `ignore_others` set, the entity is excluded from every viewport
/// except the one it is anchored to (a HUD element that must not show up in
/// a minimap viewport, for example).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ViewportAnchor {
    pub viewport: ViewportId,
    pub ignore_others: bool,
}

//! Sprites and Animations
//!
//! An animated entity displays one sprite at a time; advancing the active
//! frame swaps which sprite is shown. A sprite may carry its own depth, and
//! when it does, that depth takes precedence over the entity's nominal Z in
//! draw ordering - a walking character whose frames bob up and down can
//! shift its draw order mid-animation. This is why the watcher chains a
//! subscription to the *current* sprite and re-chains on every frame
//! advance.

use serde::{Serialize, Deserialize};

/// Identifier for a sprite in the scene's sprite store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpriteId(pub(crate) u32);

/// A single displayable image with optional draw-order overrides.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Sprite {
    /// Horizontal offset applied to the owning entity.
    pub x: f32,
    /// Depth override. When set, this replaces the owning entity's Z in the
    /// draw-order key for as long as the sprite is the active frame.
    pub z: Option<f32>,
}

impl Sprite {
    pub fn new(x: f32) -> Self {
        Self { x, z: None }
    }

    pub fn with_z(x: f32, z: f32) -> Self {
        Self { x, z: Some(z) }
    }
}

/// Flat sprite storage. Sprites are assets: they are added as content loads
/// and never freed mid-session, so a plain Vec suffices.
#[derive(Debug, Default)]
pub(crate) struct SpriteStore {
    sprites: Vec<Sprite>,
}

impl SpriteStore {
    pub fn new() -> Self {
        Self { sprites: Vec::new() }
    }

    pub fn add(&mut self, sprite: Sprite) -> SpriteId {
        let id = SpriteId(self.sprites.len() as u32);
        self.sprites.push(sprite);
        id
    }

    pub fn get(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: SpriteId) -> Option<&mut Sprite> {
        self.sprites.get_mut(id.0 as usize)
    }
}

/// An entity's animation: an ordered frame list and the active frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Animation {
    frames: Vec<SpriteId>,
    current: usize,
}

impl Animation {
    /// Create an animation starting on its first frame.
    /// An empty frame list yields an animation with no current sprite.
    pub fn new(frames: Vec<SpriteId>) -> Self {
        Self { frames, current: 0 }
    }

    /// The sprite shown by the active frame, if any.
    pub fn current_sprite(&self) -> Option<SpriteId> {
        self.frames.get(self.current).copied()
    }

    /// Advance to the next frame, wrapping at the end.
    pub(crate) fn advance(&mut self) {
        if !self.frames.is_empty() {
            self.current = (self.current + 1) % self.frames.len();
        }
    }

    /// Jump to a specific frame. Out-of-range indices are clamped.
    pub(crate) fn set_frame(&mut self, frame: usize) {
        if !self.frames.is_empty() {
            self.current = frame.min(self.frames.len() - 1);
        }
    }

    pub fn frame(&self) -> usize {
        self.current
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

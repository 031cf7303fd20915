//! Depth Clipping
//!
//! A viewport may register up to one near and one far clipping plane, each
//! anchored to a reference entity. A near plane excludes entities ordered
//! strictly behind its reference; a far plane excludes those strictly in
//! front. A plane whose reference entity has left the scene is inert - it
//! clips nothing rather than erroring.

use serde::{Serialize, Deserialize};

use super::entity::Entity;

/// One clipping plane anchored to a reference entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthClippingPlane {
    /// The entity the plane compares against.
    pub reference: Entity,
    /// Whether the reference entity itself is clipped by its own plane.
    pub clip_reference: bool,
    /// Layer indices the plane applies to. `None` means every layer that is
    /// not flagged independent-resolution.
    pub layers: Option<Vec<i32>>,
}

impl DepthClippingPlane {
    pub fn new(reference: Entity) -> Self {
        Self { reference, clip_reference: false, layers: None }
    }

    pub fn clipping_reference(reference: Entity) -> Self {
        Self { reference, clip_reference: true, layers: None }
    }

    pub fn for_layers(reference: Entity, layers: Vec<i32>) -> Self {
        Self { reference, clip_reference: false, layers: Some(layers) }
    }

    /// Whether the plane applies to a layer, given its index and
    /// independent-resolution flag.
    pub(crate) fn applies_to_layer(&self, index: i32, independent: bool) -> bool {
        match &self.layers {
            Some(layers) => layers.contains(&index),
            // Independent-resolution layers carry their own depth scope and
            // are only clipped when a plane names them explicitly.
            None => !independent,
        }
    }
}

/// A viewport's clipping configuration: at most one near and one far plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepthClipping {
    pub(crate) near: Option<DepthClippingPlane>,
    pub(crate) far: Option<DepthClippingPlane>,
}

impl DepthClipping {
    pub fn near(&self) -> Option<&DepthClippingPlane> {
        self.near.as_ref()
    }

    pub fn far(&self) -> Option<&DepthClippingPlane> {
        self.far.as_ref()
    }
}

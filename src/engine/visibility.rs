//! Visibility Filtering
//!
//! Decides, per viewport, whether a candidate entity belongs in the display
//! list. An entity is excluded when:
//!
//! - its id no longer resolves (dangling room/overlay entries are skipped);
//! - its own, or any ancestor's, visible/enabled flag is off;
//! - the viewport's restriction list names it;
//! - it is anchored to a different viewport with `ignore_others`;
//! - one of the viewport's depth-clipping planes clips it.

use std::cmp::Ordering;

use crate::scene::{DepthClippingPlane, Entity, Scene, ViewportId, ViewportSettings};

use super::order::{draw_order, DrawKey};

/// Which side of the reference a plane clips.
#[derive(Debug, Clone, Copy)]
enum PlaneSide {
    /// Near plane: clips entities ordered strictly behind the reference.
    Near,
    /// Far plane: clips entities ordered strictly in front of it.
    Far,
}

/// Full per-viewport inclusion test.
pub(crate) fn is_visible(
    scene: &Scene,
    entity: Entity,
    viewport: ViewportId,
    settings: &ViewportSettings,
) -> bool {
    if !effectively_visible(scene, entity) {
        return false;
    }

    if settings.restriction().contains(&entity) {
        return false;
    }

    if let Some(anchor) = scene.anchor(entity) {
        if anchor.ignore_others && anchor.viewport != viewport {
            return false;
        }
    }

    let clipping = settings.clipping();
    if let Some(plane) = clipping.near() {
        if plane_clips(scene, entity, plane, PlaneSide::Near) {
            return false;
        }
    }
    if let Some(plane) = clipping.far() {
        if plane_clips(scene, entity, plane, PlaneSide::Far) {
            return false;
        }
    }

    true
}

/// Own flags plus every ancestor's. The parent chain is cycle-free by
/// construction (`Scene::set_parent` refuses cycles), so this walk
/// terminates.
pub(crate) fn effectively_visible(scene: &Scene, entity: Entity) -> bool {
    if !scene.visible(entity) || !scene.enabled(entity) {
        return false;
    }
    let mut cursor = scene.parent(entity);
    while let Some(ancestor) = cursor {
        if !scene.visible(ancestor) || !scene.enabled(ancestor) {
            return false;
        }
        cursor = scene.parent(ancestor);
    }
    true
}

fn plane_clips(
    scene: &Scene,
    entity: Entity,
    plane: &DepthClippingPlane,
    side: PlaneSide,
) -> bool {
    // A plane whose reference left the scene is inert
    if !scene.is_alive(plane.reference) {
        return false;
    }

    // The reference obeys its own flag rather than the comparison
    if entity == plane.reference {
        return plane.clip_reference;
    }

    let layer = scene.layer(entity);
    if !plane.applies_to_layer(layer.index, layer.independent_resolution) {
        return false;
    }

    let entity_key = DrawKey::of(scene, entity);
    let reference_key = DrawKey::of(scene, plane.reference);
    match side {
        PlaneSide::Near => draw_order(&entity_key, &reference_key) == Ordering::Less,
        PlaneSide::Far => draw_order(&entity_key, &reference_key) == Ordering::Greater,
    }
}

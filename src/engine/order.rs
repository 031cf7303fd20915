//! Draw Ordering
//!
//! Display lists are back-to-front (painter's algorithm). The key, most to
//! least significant:
//!
//! 1. render-layer index, ascending - higher layers draw later, on top;
//! 2. within a layer, depth Z, descending - *lower* Z is closer to the
//!    camera and draws later;
//! 3. insertion/discovery order - the sort is stable, so equal-key entities
//!    never swap between ticks (no flicker for overlapping equal-depth
//!    sprites).
//!
//! When the entity's active animation frame shows a sprite that carries its
//! own depth, the sprite's depth replaces the entity's nominal Z.

use std::cmp::Ordering;

use crate::scene::{Entity, Scene};

/// The explicit part of an entity's draw-order key (the implicit part is
/// discovery order, supplied by sort stability).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DrawKey {
    pub layer: i32,
    pub z: f32,
}

impl DrawKey {
    /// Compute the key for an entity as it would draw right now.
    pub fn of(scene: &Scene, entity: Entity) -> DrawKey {
        let layer = scene.layer(entity).index;
        let z = effective_z(scene, entity);
        DrawKey { layer, z }
    }
}

/// The depth an entity draws at: the active sprite's depth when it defines
/// one, the entity's nominal Z otherwise.
pub(crate) fn effective_z(scene: &Scene, entity: Entity) -> f32 {
    if let Some(sprite_id) = scene.current_sprite(entity) {
        if let Some(sprite) = scene.sprite(sprite_id) {
            if let Some(z) = sprite.z {
                return z;
            }
        }
    }
    scene.z(entity)
}

/// Total order over draw keys; `Less` draws earlier (further back).
/// `total_cmp` keeps the relation total even for non-finite depths.
pub(crate) fn draw_order(a: &DrawKey, b: &DrawKey) -> Ordering {
    a.layer.cmp(&b.layer).then_with(|| b.z.total_cmp(&a.z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Animation, RenderLayer, Sprite};

    fn key(layer: i32, z: f32) -> DrawKey {
        DrawKey { layer, z }
    }

    #[test]
    fn test_higher_layer_draws_later() {
        assert_eq!(draw_order(&key(0, 0.0), &key(10, 0.0)), Ordering::Less);
        assert_eq!(draw_order(&key(10, 0.0), &key(0, 0.0)), Ordering::Greater);
    }

    #[test]
    fn test_lower_z_draws_later_within_layer() {
        // Z=5 is further from the camera than Z=1, so it draws first
        assert_eq!(draw_order(&key(0, 5.0), &key(0, 1.0)), Ordering::Less);
        assert_eq!(draw_order(&key(0, 1.0), &key(0, 5.0)), Ordering::Greater);
    }

    #[test]
    fn test_layer_outranks_z() {
        assert_eq!(draw_order(&key(0, -100.0), &key(1, 100.0)), Ordering::Less);
    }

    #[test]
    fn test_equal_keys_tie() {
        assert_eq!(draw_order(&key(2, 3.0), &key(2, 3.0)), Ordering::Equal);
    }

    #[test]
    fn test_sprite_depth_takes_precedence() {
        let mut scene = Scene::new();
        let e = scene.spawn_at(0.0, 0.0, 5.0);
        scene.set_layer(e, RenderLayer::new(1));

        // No animation: nominal Z
        assert_eq!(DrawKey::of(&scene, e), key(1, 5.0));

        // Active sprite with its own depth overrides
        let s = scene.add_sprite(Sprite::with_z(0.0, 1.25));
        scene.set_animation(e, Animation::new(vec![s]));
        assert_eq!(DrawKey::of(&scene, e), key(1, 1.25));
    }

    #[test]
    fn test_sprite_without_depth_falls_back_to_entity_z() {
        let mut scene = Scene::new();
        let e = scene.spawn_at(0.0, 0.0, 7.0);
        let s = scene.add_sprite(Sprite::new(3.0));
        scene.set_animation(e, Animation::new(vec![s]));

        assert_eq!(effective_z(&scene, e), 7.0);
    }
}

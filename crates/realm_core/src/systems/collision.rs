//! Player-vs-world collision. Static colliders are boxes rebuilt from the
//! world every tick; other avatars are planar circles.

use std::collections::BTreeSet;

use glam::Vec3;
use tracing::debug;

use crate::app::geometry::{is_finite_vec3, planar, rotate_y, Aabb};
use crate::app::{ColliderData, ColliderShape, EntityId, SimEvent, SimEventBus, Transform, World};
use crate::content::ModelHandle;

/// Clearance left between a pushed-out actor and the face it was pushed to.
pub const COLLISION_EPSILON: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionConfig {
    /// Half extents of the moving actor's box; the box rests on its position.
    pub actor_half_extents: Vec3,
    pub actor_radius: f32,
    /// Bit per collider layer; solids on layers outside the mask do not block.
    pub blocking_layers: u32,
    pub max_resolve_passes: u32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            actor_half_extents: Vec3::new(0.3, 0.9, 0.3),
            actor_radius: 0.4,
            blocking_layers: u32::MAX,
            max_resolve_passes: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveCollider {
    pub entity_id: EntityId,
    pub bounds: Aabb,
    pub shape: ColliderShape,
    pub is_trigger: bool,
    pub layer: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicCollider {
    pub id: u64,
    pub position: Vec3,
    pub radius: f32,
}

/// World-space box of one collider component. Mesh-bounds colliders use the
/// loaded model's bounds when available and the component size otherwise.
/// Only yaw is applied; the result stays axis-aligned.
pub fn collider_world_bounds(
    transform: &Transform,
    collider: &ColliderData,
    model: &ModelHandle,
) -> Aabb {
    let local_size = match (collider.shape, model.info()) {
        (ColliderShape::MeshBounds, Some(info)) => info.bounds,
        _ => collider.effective_size(),
    };
    let yaw = transform.yaw();
    let half = local_size * transform.scale.abs() * 0.5;
    let (sin, cos) = (yaw.sin().abs(), yaw.cos().abs());
    let rotated_half = Vec3::new(
        half.x * cos + half.z * sin,
        half.y,
        half.x * sin + half.z * cos,
    );
    let center = transform.position + rotate_y(collider.offset * transform.scale, yaw);
    Aabb {
        min: center - rotated_half,
        max: center + rotated_half,
    }
}

#[derive(Debug, Default)]
pub struct CollisionSystem {
    config: CollisionConfig,
    colliders: Vec<ActiveCollider>,
    dynamic: Vec<DynamicCollider>,
    active_triggers: BTreeSet<EntityId>,
}

impl CollisionSystem {
    pub fn new(config: CollisionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    /// Rebuilds every enabled collider's world box from current transforms.
    pub fn update_colliders(&mut self, world: &World) {
        self.colliders.clear();
        for entity in world.entities() {
            for collider in entity
                .enabled_components()
                .filter_map(|component| component.collider())
            {
                let bounds = collider_world_bounds(&entity.transform, collider, &entity.model);
                if !is_finite_vec3(bounds.min) || !is_finite_vec3(bounds.max) {
                    debug!(entity_id = entity.id.0, "collider_skipped_non_finite");
                    continue;
                }
                self.colliders.push(ActiveCollider {
                    entity_id: entity.id,
                    bounds,
                    shape: collider.shape,
                    is_trigger: collider.is_trigger,
                    layer: collider.layer,
                });
            }
        }

        // Triggers that vanished while occupied are dropped without an exit.
        let colliders = &self.colliders;
        self.active_triggers.retain(|id| {
            colliders
                .iter()
                .any(|collider| collider.is_trigger && collider.entity_id == *id)
        });
    }

    pub fn set_dynamic_colliders(&mut self, dynamic: impl IntoIterator<Item = DynamicCollider>) {
        self.dynamic.clear();
        self.dynamic.extend(
            dynamic
                .into_iter()
                .filter(|collider| is_finite_vec3(collider.position) && collider.radius > 0.0),
        );
    }

    pub fn colliders(&self) -> &[ActiveCollider] {
        &self.colliders
    }

    pub fn active_triggers(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.active_triggers.iter().copied()
    }

    pub fn clear(&mut self) {
        self.colliders.clear();
        self.dynamic.clear();
        self.active_triggers.clear();
    }

    pub fn actor_bounds(&self, position: Vec3) -> Aabb {
        let half = self.config.actor_half_extents;
        Aabb {
            min: Vec3::new(position.x - half.x, position.y, position.z - half.z),
            max: Vec3::new(position.x + half.x, position.y + 2.0 * half.y, position.z + half.z),
        }
    }

    fn blocks(&self, collider: &ActiveCollider) -> bool {
        !collider.is_trigger
            && self.config.blocking_layers & (1u32 << u32::from(collider.layer.min(31))) != 0
    }

    pub fn intersects_solid(&self, bounds: &Aabb) -> bool {
        self.colliders
            .iter()
            .any(|collider| self.blocks(collider) && collider.bounds.intersects(bounds))
    }

    /// Moves the actor from `current` toward `desired`, firing trigger edges
    /// and pushing it out of solid boxes and other avatars.
    pub fn resolve_collision(
        &mut self,
        current: Vec3,
        desired: Vec3,
        events: &mut SimEventBus,
    ) -> Vec3 {
        if !is_finite_vec3(desired) {
            return current;
        }

        self.update_trigger_membership(desired, events);

        let mut position = desired;
        for dynamic in &self.dynamic {
            let offset = planar(position - dynamic.position);
            let distance = offset.length();
            let min_distance = self.config.actor_radius + dynamic.radius;
            if distance >= min_distance || distance <= f32::EPSILON {
                continue;
            }
            position += offset / distance * (min_distance - distance);
        }

        // Solid boxes go last; the result never overlaps one.
        for _ in 0..self.config.max_resolve_passes.max(1) {
            let mut moved = false;
            for collider in self.colliders.iter().filter(|collider| self.blocks(collider)) {
                let actor = self.actor_bounds(position);
                if !actor.intersects(&collider.bounds) {
                    continue;
                }
                position = self.push_out_of_box(position, &actor, &collider.bounds);
                moved = true;
            }
            if !moved {
                break;
            }
        }

        position
    }

    fn update_trigger_membership(&mut self, position: Vec3, events: &mut SimEventBus) {
        let actor = self.actor_bounds(position);
        let touching: BTreeSet<EntityId> = self
            .colliders
            .iter()
            .filter(|collider| collider.is_trigger && collider.bounds.intersects(&actor))
            .map(|collider| collider.entity_id)
            .collect();

        for entity_id in touching.difference(&self.active_triggers) {
            events.emit(SimEvent::TriggerEnter {
                entity_id: *entity_id,
            });
        }
        for entity_id in self.active_triggers.difference(&touching) {
            events.emit(SimEvent::TriggerExit {
                entity_id: *entity_id,
            });
        }
        self.active_triggers = touching;
    }

    /// Resolves along whichever of X or Z penetrates less, snapping to the
    /// face plus epsilon.
    fn push_out_of_box(&self, position: Vec3, actor: &Aabb, solid: &Aabb) -> Vec3 {
        let overlap = actor.overlap(solid);
        let half = self.config.actor_half_extents;
        let center = solid.center();
        let mut resolved = position;
        if overlap.x < overlap.z {
            resolved.x = if position.x < center.x {
                solid.min.x - half.x - COLLISION_EPSILON
            } else {
                solid.max.x + half.x + COLLISION_EPSILON
            };
        } else {
            resolved.z = if position.z < center.z {
                solid.min.z - half.z - COLLISION_EPSILON
            } else {
                solid.max.z + half.z + COLLISION_EPSILON
            };
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::app::{Component, ComponentKind};
    use crate::content::ModelInfo;

    fn box_collider(size: Vec3, is_trigger: bool) -> Component {
        Component::new(ComponentKind::Collider(ColliderData {
            shape: ColliderShape::Box,
            size: Some(size),
            offset: Vec3::new(0.0, size.y * 0.5, 0.0),
            is_trigger,
            layer: 0,
        }))
    }

    fn system_with(world: &World) -> CollisionSystem {
        let mut system = CollisionSystem::new(CollisionConfig::default());
        system.update_colliders(world);
        system
    }

    #[test]
    fn world_bounds_apply_offset_scale_and_yaw() {
        let collider = ColliderData {
            shape: ColliderShape::Box,
            size: Some(Vec3::new(2.0, 1.0, 4.0)),
            offset: Vec3::new(1.0, 0.0, 0.0),
            is_trigger: false,
            layer: 0,
        };
        let transform = Transform {
            position: Vec3::new(10.0, 0.0, 0.0),
            rotation: Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            scale: Vec3::new(2.0, 1.0, 1.0),
        };
        let bounds = collider_world_bounds(&transform, &collider, &ModelHandle::Placeholder);
        let center = bounds.center();
        let size = bounds.size();
        assert!((center - Vec3::new(10.0, 0.0, -2.0)).length() < 1e-4);
        assert!((size - Vec3::new(4.0, 1.0, 4.0)).length() < 1e-4);
    }

    #[test]
    fn mesh_bounds_use_model_once_loaded() {
        let collider = ColliderData {
            shape: ColliderShape::MeshBounds,
            size: None,
            ..ColliderData::default()
        };
        let transform = Transform::default();
        let placeholder = collider_world_bounds(&transform, &collider, &ModelHandle::Placeholder);
        assert_eq!(placeholder.size(), Vec3::ONE);

        let ready = ModelHandle::Ready(Arc::new(ModelInfo {
            bounds: Vec3::new(3.0, 2.0, 1.0),
            animation_clips: Vec::new(),
        }));
        let loaded = collider_world_bounds(&transform, &collider, &ready);
        assert_eq!(loaded.size(), Vec3::new(3.0, 2.0, 1.0));
    }

    #[test]
    fn actor_is_pushed_out_along_smaller_overlap() {
        let mut world = World::default();
        world
            .spawn(
                "prop.wall",
                Transform::at(Vec3::ZERO),
                vec![box_collider(Vec3::new(2.0, 2.0, 10.0), false)],
            )
            .expect("spawn");
        let mut system = system_with(&world);
        let mut events = SimEventBus::default();

        let resolved =
            system.resolve_collision(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(-0.9, 0.0, 0.5), &mut events);
        assert!((resolved.x - (-1.0 - 0.3 - COLLISION_EPSILON)).abs() < 1e-5);
        assert!((resolved.z - 0.5).abs() < 1e-6);
        assert!(!system.intersects_solid(&system.actor_bounds(resolved)));
    }

    #[test]
    fn resolved_actor_never_overlaps_solids_in_a_corner() {
        let mut world = World::default();
        world
            .spawn(
                "prop.wall",
                Transform::at(Vec3::new(0.0, 0.0, -2.0)),
                vec![box_collider(Vec3::new(6.0, 2.0, 1.0), false)],
            )
            .expect("north wall");
        world
            .spawn(
                "prop.wall",
                Transform::at(Vec3::new(2.0, 0.0, 0.0)),
                vec![box_collider(Vec3::new(1.0, 2.0, 6.0), false)],
            )
            .expect("east wall");
        let mut system = system_with(&world);
        let mut events = SimEventBus::default();

        for desired in [
            Vec3::new(1.4, 0.0, -1.4),
            Vec3::new(1.6, 0.0, -1.6),
            Vec3::new(0.0, 0.0, -1.7),
            Vec3::new(1.7, 0.0, 0.0),
        ] {
            let resolved = system.resolve_collision(Vec3::ZERO, desired, &mut events);
            assert!(
                !system.intersects_solid(&system.actor_bounds(resolved)),
                "actor overlaps a wall at {resolved:?} (desired {desired:?})"
            );
        }
    }

    #[test]
    fn triggers_fire_enter_and_exit_once_per_crossing() {
        let mut world = World::default();
        let zone = world
            .spawn(
                "zone.trigger",
                Transform::at(Vec3::new(5.0, 0.0, 0.0)),
                vec![box_collider(Vec3::new(2.0, 2.0, 2.0), true)],
            )
            .expect("spawn");
        let mut system = system_with(&world);
        let mut events = SimEventBus::default();

        let mut position = Vec3::ZERO;
        for _ in 0..100 {
            let desired = position + Vec3::new(0.1, 0.0, 0.0);
            position = system.resolve_collision(position, desired, &mut events);
        }
        assert!(position.x > 9.9, "triggers never block movement");
        assert_eq!(
            events.drain(),
            vec![
                SimEvent::TriggerEnter { entity_id: zone },
                SimEvent::TriggerExit { entity_id: zone },
            ]
        );
    }

    #[test]
    fn disabled_collider_is_ignored() {
        let mut world = World::default();
        let mut component = box_collider(Vec3::splat(2.0), false);
        component.enabled = false;
        world
            .spawn("prop.crate", Transform::default(), vec![component])
            .expect("spawn");
        let system = system_with(&world);
        assert!(system.colliders().is_empty());
    }

    #[test]
    fn dynamic_colliders_push_out_and_skip_coincident_centers() {
        let mut system = CollisionSystem::new(CollisionConfig::default());
        system.set_dynamic_colliders([DynamicCollider {
            id: 1,
            position: Vec3::ZERO,
            radius: 0.4,
        }]);
        let mut events = SimEventBus::default();

        let resolved =
            system.resolve_collision(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.5, 0.0, 0.0), &mut events);
        assert!((resolved.x - 0.8).abs() < 1e-5);

        let coincident = system.resolve_collision(Vec3::X, Vec3::ZERO, &mut events);
        assert_eq!(coincident, Vec3::ZERO);
        assert!(coincident.is_finite());
    }

    #[test]
    fn actor_bounds_rest_on_feet() {
        let system = CollisionSystem::new(CollisionConfig::default());
        let bounds = system.actor_bounds(Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(bounds.min.y, 0.0);
        assert!((bounds.max.y - 1.8).abs() < 1e-6);
        assert!((bounds.min.x - 0.7).abs() < 1e-6);
    }

    #[test]
    fn avatar_against_wall_cannot_push_actor_into_it() {
        let mut world = World::default();
        world
            .spawn("prop.wall", Transform::default(), vec![box_collider(Vec3::new(2.0, 2.0, 2.0), false)])
            .expect("spawn");
        let mut system = system_with(&world);
        system.set_dynamic_colliders([DynamicCollider {
            id: 1,
            position: Vec3::new(1.4, 0.0, 0.0),
            radius: 0.4,
        }]);
        let mut events = SimEventBus::default();

        // The avatar alone would shove the actor back to x = 0.6, inside the wall.
        let resolved =
            system.resolve_collision(Vec3::new(3.0, 0.0, 0.0), Vec3::new(1.5, 0.0, 0.0), &mut events);
        assert!(resolved.is_finite());
        assert!(!system.intersects_solid(&system.actor_bounds(resolved)));
    }

    #[test]
    fn non_finite_desired_position_keeps_current() {
        let mut system = CollisionSystem::new(CollisionConfig::default());
        let mut events = SimEventBus::default();
        let current = Vec3::new(1.0, 0.0, 1.0);
        assert_eq!(
            system.resolve_collision(current, Vec3::new(f32::NAN, 0.0, 0.0), &mut events),
            current
        );
    }

    #[test]
    fn removed_trigger_is_dropped_silently() {
        let mut world = World::default();
        let zone = world
            .spawn(
                "zone.trigger",
                Transform::default(),
                vec![box_collider(Vec3::splat(4.0), true)],
            )
            .expect("spawn");
        let mut system = system_with(&world);
        let mut events = SimEventBus::default();
        system.resolve_collision(Vec3::ZERO, Vec3::ZERO, &mut events);
        assert_eq!(system.active_triggers().collect::<Vec<_>>(), vec![zone]);

        world.remove(zone);
        system.update_colliders(&world);
        events.drain();
        system.resolve_collision(Vec3::ZERO, Vec3::ZERO, &mut events);
        assert!(events.drain().is_empty());
    }
}

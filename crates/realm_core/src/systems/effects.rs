//! Turns collider and light components into live effects and keeps them
//! glued to their entity's transform. Every other component type is read by
//! other systems or is inert metadata.

use std::collections::{BTreeMap, HashMap};

use glam::Vec3;
use tracing::debug;

use crate::app::geometry::rotate_y;
use crate::app::{ColliderShape, Entity, EntityId, LightKind, Transform, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKind {
    ColliderVolume,
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeGeometry {
    Box { size: Vec3 },
    Sphere { radius: f32 },
    Capsule { radius: f32, height: f32 },
}

/// Debug wireframe for one collider component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugVolume {
    pub geometry: VolumeGeometry,
    pub is_trigger: bool,
    pub local_offset: Vec3,
    pub world_position: Vec3,
    pub world_rotation: Vec3,
    pub world_scale: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSource {
    pub light_type: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
    pub range: f32,
    pub spot_angle: f32,
    pub cast_shadow: bool,
    pub local_offset: Vec3,
    pub world_position: Vec3,
    pub world_rotation: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EffectPayload {
    ColliderVolumes(Vec<DebugVolume>),
    Lights(Vec<LightSource>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub entity_id: EntityId,
    pub payload: EffectPayload,
    pub visible: bool,
    /// Changes only when the effect is rebuilt from components.
    pub generation: u64,
}

impl Effect {
    pub fn kind(&self) -> EffectKind {
        match self.payload {
            EffectPayload::ColliderVolumes(_) => EffectKind::ColliderVolume,
            EffectPayload::Lights(_) => EffectKind::Light,
        }
    }

    fn follow(&mut self, transform: &Transform) {
        let yaw = transform.yaw();
        match &mut self.payload {
            EffectPayload::ColliderVolumes(volumes) => {
                for volume in volumes {
                    volume.world_position = transform.position
                        + rotate_y(volume.local_offset * transform.scale, yaw);
                    volume.world_rotation = transform.rotation;
                    volume.world_scale = transform.scale;
                }
            }
            EffectPayload::Lights(lights) => {
                for light in lights {
                    light.world_position = transform.position
                        + rotate_y(light.local_offset * transform.scale, yaw);
                    light.world_rotation = transform.rotation;
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct EffectRuntime {
    effects: BTreeMap<(EntityId, EffectKind), Effect>,
    /// Component revision and model readiness each entity was last built from.
    processed: HashMap<EntityId, (u64, bool)>,
    colliders_visible: bool,
    next_generation: u64,
}

impl Default for EffectRuntime {
    fn default() -> Self {
        Self {
            effects: BTreeMap::new(),
            processed: HashMap::new(),
            colliders_visible: true,
            next_generation: 0,
        }
    }
}

impl EffectRuntime {
    /// Creates or replaces this entity's effects from its enabled components.
    /// A kind with no enabled components loses its effect.
    pub fn process_components(&mut self, entity: &Entity) {
        let mut volumes = Vec::new();
        let mut lights = Vec::new();
        for component in entity.enabled_components() {
            if let Some(collider) = component.collider() {
                let size = match (collider.shape, entity.model.info()) {
                    (ColliderShape::MeshBounds, Some(info)) => info.bounds,
                    _ => collider.effective_size(),
                };
                let geometry = match collider.shape {
                    ColliderShape::Box | ColliderShape::MeshBounds => VolumeGeometry::Box { size },
                    ColliderShape::Sphere => VolumeGeometry::Sphere {
                        radius: size.max_element() * 0.5,
                    },
                    ColliderShape::Capsule => VolumeGeometry::Capsule {
                        radius: size.x.max(size.z) * 0.5,
                        height: size.y,
                    },
                };
                volumes.push(DebugVolume {
                    geometry,
                    is_trigger: collider.is_trigger,
                    local_offset: collider.offset,
                    world_position: Vec3::ZERO,
                    world_rotation: Vec3::ZERO,
                    world_scale: Vec3::ONE,
                });
            } else if let Some(light) = component.light() {
                lights.push(LightSource {
                    light_type: light.light_type,
                    color: light.color,
                    intensity: light.intensity,
                    range: light.range,
                    spot_angle: light.spot_angle,
                    cast_shadow: light.cast_shadow,
                    local_offset: light.offset,
                    world_position: Vec3::ZERO,
                    world_rotation: Vec3::ZERO,
                });
            }
        }

        let colliders_visible = self.colliders_visible;
        self.replace_effect(
            entity,
            EffectKind::ColliderVolume,
            (!volumes.is_empty()).then_some(EffectPayload::ColliderVolumes(volumes)),
            colliders_visible,
        );
        self.replace_effect(
            entity,
            EffectKind::Light,
            (!lights.is_empty()).then_some(EffectPayload::Lights(lights)),
            true,
        );
        self.processed
            .insert(entity.id, (entity.revision(), entity.model.is_ready()));
    }

    fn replace_effect(
        &mut self,
        entity: &Entity,
        kind: EffectKind,
        payload: Option<EffectPayload>,
        visible: bool,
    ) {
        let key = (entity.id, kind);
        let Some(payload) = payload else {
            self.effects.remove(&key);
            return;
        };
        let generation = self.next_generation;
        self.next_generation = self.next_generation.saturating_add(1);
        let mut effect = Effect {
            entity_id: entity.id,
            payload,
            visible,
            generation,
        };
        effect.follow(&entity.transform);
        self.effects.insert(key, effect);
    }

    /// Processes entities that are new, whose component list changed, or
    /// whose model finished loading, and forgets entities that left the world.
    pub fn process_world(&mut self, world: &World) {
        for entity in world.entities() {
            let current = (entity.revision(), entity.model.is_ready());
            let up_to_date = self
                .processed
                .get(&entity.id)
                .is_some_and(|built_from| *built_from == current);
            if !up_to_date {
                debug!(entity_id = entity.id.0, revision = entity.revision(), "effects_rebuilt");
                self.process_components(entity);
            }
        }

        let stale: Vec<EntityId> = self
            .processed
            .keys()
            .copied()
            .filter(|id| !world.contains(*id))
            .collect();
        for id in stale {
            self.remove_object(id);
        }
    }

    /// Moves every live effect to its entity's current transform.
    pub fn sync_helpers(&mut self, world: &World) {
        for ((entity_id, _), effect) in &mut self.effects {
            if let Some(entity) = world.find_entity(*entity_id) {
                effect.follow(&entity.transform);
            }
        }
    }

    pub fn remove_object(&mut self, entity_id: EntityId) {
        self.effects.remove(&(entity_id, EffectKind::ColliderVolume));
        self.effects.remove(&(entity_id, EffectKind::Light));
        self.processed.remove(&entity_id);
    }

    /// Toggles visibility of collider volumes in place.
    pub fn set_colliders_visible(&mut self, visible: bool) {
        self.colliders_visible = visible;
        for effect in self.effects.values_mut() {
            if effect.kind() == EffectKind::ColliderVolume {
                effect.visible = visible;
            }
        }
    }

    pub fn colliders_visible(&self) -> bool {
        self.colliders_visible
    }

    pub fn effect(&self, entity_id: EntityId, kind: EffectKind) -> Option<&Effect> {
        self.effects.get(&(entity_id, kind))
    }

    pub fn effects(&self) -> impl Iterator<Item = &Effect> {
        self.effects.values()
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    pub fn clear(&mut self) {
        self.effects.clear();
        self.processed.clear();
    }
}

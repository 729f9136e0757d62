//! Declarative per-entity data. Components carry no behavior; the collision
//! system, effect runtime, AI system and UI layers interpret them.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Collider,
    Light,
    ParticleEmitter,
    Npc,
    Interactable,
    Trigger,
    Shop,
    Door,
}

impl ComponentType {
    pub const ALL: [ComponentType; 8] = [
        ComponentType::Collider,
        ComponentType::Light,
        ComponentType::ParticleEmitter,
        ComponentType::Npc,
        ComponentType::Interactable,
        ComponentType::Trigger,
        ComponentType::Shop,
        ComponentType::Door,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collider => "collider",
            Self::Light => "light",
            Self::ParticleEmitter => "particle_emitter",
            Self::Npc => "npc",
            Self::Interactable => "interactable",
            Self::Trigger => "trigger",
            Self::Shop => "shop",
            Self::Door => "door",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|component_type| component_type.as_str() == name)
    }

    /// Multi-instance types may appear any number of times on one entity.
    pub fn is_multi_instance(self) -> bool {
        matches!(self, Self::Collider | Self::Light | Self::ParticleEmitter)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    #[error("component '{kind}' may appear only once per entity")]
    DuplicateSingleton { kind: ComponentType },
    #[error("unknown component type '{type_name}'")]
    UnknownType { type_name: String },
    #[error("malformed '{type_name}' component: {message}")]
    Malformed { type_name: String, message: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColliderShape {
    #[default]
    Box,
    Sphere,
    Capsule,
    #[serde(alias = "mesh")]
    MeshBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColliderData {
    #[serde(default)]
    pub shape: ColliderShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Vec3>,
    #[serde(default)]
    pub offset: Vec3,
    #[serde(default)]
    pub is_trigger: bool,
    #[serde(default)]
    pub layer: u8,
}

impl Default for ColliderData {
    fn default() -> Self {
        Self {
            shape: ColliderShape::Box,
            size: Some(Vec3::ONE),
            offset: Vec3::ZERO,
            is_trigger: false,
            layer: 0,
        }
    }
}

impl ColliderData {
    /// Missing or degenerate sizes fall back to a unit box.
    pub fn effective_size(&self) -> Vec3 {
        self.size
            .filter(|size| {
                size.x.is_finite()
                    && size.y.is_finite()
                    && size.z.is_finite()
                    && size.cmpgt(Vec3::ZERO).all()
            })
            .unwrap_or(Vec3::ONE)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    #[default]
    Point,
    Spot,
    Directional,
    Ambient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightData {
    #[serde(default)]
    pub light_type: LightKind,
    #[serde(default = "default_light_color")]
    pub color: [f32; 3],
    #[serde(default = "default_light_intensity")]
    pub intensity: f32,
    #[serde(default = "default_light_range")]
    pub range: f32,
    /// Cone half-angle in degrees; spot lights only.
    #[serde(default = "default_spot_angle")]
    pub spot_angle: f32,
    #[serde(default)]
    pub cast_shadow: bool,
    #[serde(default)]
    pub offset: Vec3,
}

impl Default for LightData {
    fn default() -> Self {
        Self {
            light_type: LightKind::Point,
            color: default_light_color(),
            intensity: default_light_intensity(),
            range: default_light_range(),
            spot_angle: default_spot_angle(),
            cast_shadow: false,
            offset: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticleEmitterData {
    #[serde(default)]
    pub preset: String,
    #[serde(default = "default_emission_rate")]
    pub rate: f32,
    #[serde(default)]
    pub offset: Vec3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attitude {
    Hostile,
    #[default]
    Neutral,
    Friendly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpcBehavior {
    #[default]
    Stationary,
    Patrol,
    Wander,
    Follow,
    Flee,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub attitude: Attitude,
    #[serde(default)]
    pub behavior: NpcBehavior,
    #[serde(default = "default_patrol_radius")]
    pub patrol_radius: f32,
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
    #[serde(default = "default_detection_range")]
    pub detection_range: f32,
    #[serde(default = "default_attack_range")]
    pub attack_range: f32,
    #[serde(default = "default_attack_damage")]
    pub attack_damage: f32,
    #[serde(default = "default_attack_cooldown")]
    pub attack_cooldown: f32,
    #[serde(default = "default_max_health")]
    pub max_health: f32,
    #[serde(default)]
    pub defense: f32,
}

impl Default for NpcData {
    fn default() -> Self {
        Self {
            name: String::new(),
            attitude: Attitude::Neutral,
            behavior: NpcBehavior::Stationary,
            patrol_radius: default_patrol_radius(),
            move_speed: default_move_speed(),
            detection_range: default_detection_range(),
            attack_range: default_attack_range(),
            attack_damage: default_attack_damage(),
            attack_cooldown: default_attack_cooldown(),
            max_health: default_max_health(),
            defense: 0.0,
        }
    }
}

impl NpcData {
    /// Hostile NPCs that stand or patrol run the chase/attack machine.
    /// Every other combination runs its behavior loop only.
    pub fn runs_combat_machine(&self) -> bool {
        self.attitude == Attitude::Hostile
            && matches!(self.behavior, NpcBehavior::Stationary | NpcBehavior::Patrol)
    }

    /// Replaces non-finite or negative tuning values with defaults.
    pub fn sanitized(&self) -> Self {
        fn non_negative(value: f32, fallback: f32) -> f32 {
            if value.is_finite() && value >= 0.0 {
                value
            } else {
                fallback
            }
        }
        fn positive(value: f32, fallback: f32) -> f32 {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        }

        Self {
            name: self.name.clone(),
            attitude: self.attitude,
            behavior: self.behavior,
            patrol_radius: non_negative(self.patrol_radius, default_patrol_radius()),
            move_speed: non_negative(self.move_speed, default_move_speed()),
            detection_range: non_negative(self.detection_range, default_detection_range()),
            attack_range: non_negative(self.attack_range, default_attack_range()),
            attack_damage: non_negative(self.attack_damage, default_attack_damage()),
            attack_cooldown: non_negative(self.attack_cooldown, default_attack_cooldown()),
            max_health: positive(self.max_health, default_max_health()),
            defense: non_negative(self.defense, 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractableData {
    #[serde(default = "default_prompt")]
    pub prompt: String,
    #[serde(default = "default_interaction_range")]
    pub interaction_range: f32,
}

impl Default for InteractableData {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            interaction_range: default_interaction_range(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerData {
    #[serde(default)]
    pub event: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopData {
    #[serde(default)]
    pub shop_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoorData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_map: Option<String>,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentKind {
    Collider(ColliderData),
    Light(LightData),
    ParticleEmitter(ParticleEmitterData),
    Npc(NpcData),
    Interactable(InteractableData),
    Trigger(TriggerData),
    Shop(ShopData),
    Door(DoorData),
}

impl ComponentKind {
    pub fn component_type(&self) -> ComponentType {
        match self {
            Self::Collider(_) => ComponentType::Collider,
            Self::Light(_) => ComponentType::Light,
            Self::ParticleEmitter(_) => ComponentType::ParticleEmitter,
            Self::Npc(_) => ComponentType::Npc,
            Self::Interactable(_) => ComponentType::Interactable,
            Self::Trigger(_) => ComponentType::Trigger,
            Self::Shop(_) => ComponentType::Shop,
            Self::Door(_) => ComponentType::Door,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: ComponentKind,
}

impl Component {
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            enabled: true,
            kind,
        }
    }

    pub fn disabled(kind: ComponentKind) -> Self {
        Self {
            enabled: false,
            kind,
        }
    }

    pub fn component_type(&self) -> ComponentType {
        self.kind.component_type()
    }

    /// Loose-data boundary: accepts a JSON record selected by its `type`
    /// string. Missing fields take defaults, unknown types are rejected.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ComponentError> {
        let type_name = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| ComponentError::Malformed {
                type_name: "<missing>".to_string(),
                message: "component record has no string 'type' field".to_string(),
            })?;
        if ComponentType::from_name(&type_name).is_none() {
            return Err(ComponentError::UnknownType { type_name });
        }
        serde_json::from_value::<Component>(value).map_err(|error| ComponentError::Malformed {
            type_name,
            message: error.to_string(),
        })
    }

    pub fn collider(&self) -> Option<&ColliderData> {
        match &self.kind {
            ComponentKind::Collider(data) => Some(data),
            _ => None,
        }
    }

    pub fn light(&self) -> Option<&LightData> {
        match &self.kind {
            ComponentKind::Light(data) => Some(data),
            _ => None,
        }
    }

    pub fn npc(&self) -> Option<&NpcData> {
        match &self.kind {
            ComponentKind::Npc(data) => Some(data),
            _ => None,
        }
    }

    pub fn interactable(&self) -> Option<&InteractableData> {
        match &self.kind {
            ComponentKind::Interactable(data) => Some(data),
            _ => None,
        }
    }
}

/// Enforces the one-per-entity rule for singleton component types.
pub fn validate_components(components: &[Component]) -> Result<(), ComponentError> {
    let mut seen = Vec::<ComponentType>::with_capacity(components.len());
    for component in components {
        let kind = component.component_type();
        if kind.is_multi_instance() {
            continue;
        }
        if seen.contains(&kind) {
            return Err(ComponentError::DuplicateSingleton { kind });
        }
        seen.push(kind);
    }
    Ok(())
}

pub fn components_from_json(
    values: Vec<serde_json::Value>,
) -> Result<Vec<Component>, ComponentError> {
    let components = values
        .into_iter()
        .map(Component::from_json)
        .collect::<Result<Vec<_>, _>>()?;
    validate_components(&components)?;
    Ok(components)
}

fn default_enabled() -> bool {
    true
}

fn default_light_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_light_intensity() -> f32 {
    1.0
}

fn default_light_range() -> f32 {
    10.0
}

fn default_spot_angle() -> f32 {
    45.0
}

fn default_emission_rate() -> f32 {
    10.0
}

fn default_patrol_radius() -> f32 {
    5.0
}

fn default_move_speed() -> f32 {
    2.0
}

fn default_detection_range() -> f32 {
    8.0
}

fn default_attack_range() -> f32 {
    1.5
}

fn default_attack_damage() -> f32 {
    10.0
}

fn default_attack_cooldown() -> f32 {
    2.0
}

fn default_max_health() -> f32 {
    100.0
}

fn default_prompt() -> String {
    "Interact".to_string()
}

fn default_interaction_range() -> f32 {
    2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collider_without_size_falls_back_to_unit_box() {
        let component =
            Component::from_json(json!({ "type": "collider", "shape": "box" })).expect("collider");
        let collider = component.collider().expect("collider data");
        assert_eq!(collider.size, None);
        assert_eq!(collider.effective_size(), Vec3::ONE);
        assert!(component.enabled);
    }

    #[test]
    fn degenerate_collider_size_falls_back_to_unit_box() {
        let collider = ColliderData {
            size: Some(Vec3::new(0.0, 2.0, 1.0)),
            ..ColliderData::default()
        };
        assert_eq!(collider.effective_size(), Vec3::ONE);
    }

    #[test]
    fn npc_fields_default_to_idle_stationary() {
        let component = Component::from_json(json!({ "type": "npc" })).expect("npc");
        let npc = component.npc().expect("npc data");
        assert_eq!(npc.behavior, NpcBehavior::Stationary);
        assert_eq!(npc.attitude, Attitude::Neutral);
        assert_eq!(npc.detection_range, 8.0);
        assert_eq!(npc.attack_range, 1.5);
        assert!(!npc.runs_combat_machine());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = Component::from_json(json!({ "type": "teleporter" })).expect_err("unknown");
        assert_eq!(
            err,
            ComponentError::UnknownType {
                type_name: "teleporter".to_string()
            }
        );
    }

    #[test]
    fn missing_type_is_malformed() {
        let err = Component::from_json(json!({ "enabled": true })).expect_err("missing type");
        assert!(matches!(err, ComponentError::Malformed { .. }));
    }

    #[test]
    fn wrong_field_type_is_malformed() {
        let err = Component::from_json(json!({ "type": "light", "intensity": "bright" }))
            .expect_err("bad field");
        match err {
            ComponentError::Malformed { type_name, .. } => assert_eq!(type_name, "light"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn duplicate_singleton_is_rejected_but_multi_instance_is_allowed() {
        let lights_and_colliders = vec![
            Component::new(ComponentKind::Collider(ColliderData::default())),
            Component::new(ComponentKind::Collider(ColliderData::default())),
            Component::new(ComponentKind::Light(LightData::default())),
            Component::new(ComponentKind::Light(LightData::default())),
            Component::new(ComponentKind::Npc(NpcData::default())),
        ];
        assert!(validate_components(&lights_and_colliders).is_ok());

        let two_npcs = vec![
            Component::new(ComponentKind::Npc(NpcData::default())),
            Component::disabled(ComponentKind::Npc(NpcData::default())),
        ];
        assert_eq!(
            validate_components(&two_npcs),
            Err(ComponentError::DuplicateSingleton {
                kind: ComponentType::Npc
            })
        );
    }

    #[test]
    fn serialized_component_uses_type_tag_and_camel_case_fields() {
        let component = Component::new(ComponentKind::Collider(ColliderData {
            shape: ColliderShape::MeshBounds,
            size: Some(Vec3::new(1.0, 2.0, 3.0)),
            offset: Vec3::ZERO,
            is_trigger: true,
            layer: 2,
        }));
        let value = serde_json::to_value(&component).expect("serialize");
        assert_eq!(value["type"], "collider");
        assert_eq!(value["shape"], "mesh_bounds");
        assert_eq!(value["isTrigger"], true);
        assert_eq!(value["enabled"], true);

        let back: Component = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, component);
    }

    #[test]
    fn sanitized_npc_replaces_invalid_tuning() {
        let npc = NpcData {
            move_speed: f32::NAN,
            detection_range: -3.0,
            max_health: 0.0,
            ..NpcData::default()
        };
        let clean = npc.sanitized();
        assert_eq!(clean.move_speed, 2.0);
        assert_eq!(clean.detection_range, 8.0);
        assert_eq!(clean.max_health, 100.0);
    }

    #[test]
    fn components_from_json_validates_the_whole_list() {
        let err = components_from_json(vec![
            json!({ "type": "trigger", "event": "a" }),
            json!({ "type": "trigger", "event": "b" }),
        ])
        .expect_err("duplicate trigger");
        assert_eq!(
            err,
            ComponentError::DuplicateSingleton {
                kind: ComponentType::Trigger
            }
        );
    }
}

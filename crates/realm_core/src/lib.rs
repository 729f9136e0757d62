//! Real-time entity simulation core: world model, collision, component
//! effects, NPC behavior and combat, advanced by [`Simulation::tick`].

pub mod app;
pub mod content;
pub mod systems;

pub use app::{
    clamp_delta, Attitude, ColliderData, ColliderShape, Component, ComponentError, ComponentKind,
    ComponentType, Entity, EntityId, InputAction, InputSnapshot, MetricsHandle, NpcBehavior,
    NpcData, Player, PlayerConfig, RemoteAvatar, SimConfig, SimEvent, SimEventBus, SimMode,
    Simulation, TickMetricsSnapshot, TickStage, Transform, World, WorldError,
};
pub use content::{
    load_catalog_from_path, parse_catalog, AssetCatalog, AssetDef, CatalogError,
    CatalogErrorCode, CatalogModelLoader, CompletionSender, ModelHandle, ModelInfo,
    ModelLoadError, ModelLoadRequest, ModelLoader, SaveError, SavedWorld,
};
pub use glam::Vec3;
pub use systems::{
    AiConfig, AiSystem, CollisionConfig, CombatantId, NpcState, SafeZone, Skill, SkillKind,
};

mod actors;
mod components;
mod events;
pub mod geometry;
mod input;
mod metrics;
mod simulation;
mod world;

pub use actors::{Player, PlayerConfig, RemoteAvatar};
pub use components::{
    components_from_json, validate_components, Attitude, ColliderData, ColliderShape, Component,
    ComponentError, ComponentKind, ComponentType, DoorData, InteractableData, LightData, LightKind,
    NpcBehavior, NpcData, ParticleEmitterData, ShopData, TriggerData,
};
pub use events::{SimEvent, SimEventBus, SimEventCounts, SimEventKind};
pub use input::{InputAction, InputSnapshot};
pub use metrics::{MetricsHandle, TickMetricsSnapshot};
pub use simulation::{
    clamp_delta, SimConfig, SimMode, Simulation, TickStage, DEFAULT_MAX_DELTA_SECONDS,
};
pub use world::{Entity, EntityId, EntityIdAllocator, Transform, World, WorldError};

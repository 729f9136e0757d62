mod ai;
mod collision;
mod combat;
mod effects;

pub use ai::{
    flee_target, move_towards, patrol_points, separation, AiConfig, AiSystem, NpcBrain, NpcState,
    SafeZone, Step,
};
pub use collision::{
    collider_world_bounds, ActiveCollider, CollisionConfig, CollisionSystem, DynamicCollider,
    COLLISION_EPSILON,
};
pub use combat::{
    compute_damage, default_skills, CombatSystem, Combatant, CombatantId, FloatingNumber, Skill,
    SkillKind, SkillState, Vitals, FLOATING_NUMBER_LIFETIME_SECONDS, MELEE_ARC_DOT_THRESHOLD,
};
pub use effects::{
    DebugVolume, Effect, EffectKind, EffectPayload, EffectRuntime, LightSource, VolumeGeometry,
};

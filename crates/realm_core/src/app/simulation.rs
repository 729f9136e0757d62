use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use glam::Vec3;
use tracing::{debug, info, warn};

use crate::content::{AssetCatalog, AssetStore, ModelLoader, SavedWorld};
use crate::systems::{
    default_skills, AiConfig, AiSystem, CollisionConfig, CollisionSystem, CombatSystem, Combatant,
    DynamicCollider, EffectRuntime, SafeZone, Skill,
};

use super::actors::{Player, PlayerConfig, RemoteAvatar};
use super::components::{components_from_json, Component};
use super::events::{SimEvent, SimEventBus};
use super::geometry::{is_finite_vec3, planar_distance};
use super::input::InputSnapshot;
use super::metrics::{MetricsAccumulator, MetricsHandle, TickPopulation};
use super::world::{EntityId, Transform, World, WorldError};

pub const DEFAULT_MAX_DELTA_SECONDS: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimMode {
    Play,
    #[default]
    Edit,
}

impl SimMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Edit => "edit",
        }
    }
}

/// Fixed order of work inside one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStage {
    CollisionRefresh,
    PlayerIntegration,
    CollisionResolution,
    InteractionScan,
    Ai,
    EffectSync,
    CombatTimers,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub max_delta_seconds: f32,
    pub ai_seed: u64,
    pub collision: CollisionConfig,
    pub ai: AiConfig,
    pub player: PlayerConfig,
    pub skills: Vec<Skill>,
    pub metrics_interval: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_delta_seconds: DEFAULT_MAX_DELTA_SECONDS,
            ai_seed: 0x5eed,
            collision: CollisionConfig::default(),
            ai: AiConfig::default(),
            player: PlayerConfig::default(),
            skills: default_skills(),
            metrics_interval: Duration::from_secs(1),
        }
    }
}

/// Clamps a frame delta into `[0, max_delta]`. Non-finite deltas count as 0.
pub fn clamp_delta(dt: f32, max_delta: f32) -> f32 {
    if !dt.is_finite() {
        return 0.0;
    }
    dt.clamp(0.0, max_delta.max(0.0))
}

/// Owns the world and every subsystem and advances them in a fixed order.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    world: World,
    catalog: AssetCatalog,
    assets: AssetStore,
    collision: CollisionSystem,
    effects: EffectRuntime,
    ai: AiSystem,
    combat: CombatSystem,
    player: Player,
    avatars: BTreeMap<u64, RemoteAvatar>,
    events: SimEventBus,
    focused_interactable: Option<EntityId>,
    mode: SimMode,
    last_tick_order: Vec<TickStage>,
    tick_count: u64,
    metrics: MetricsAccumulator,
    metrics_handle: MetricsHandle,
}

impl Simulation {
    pub fn new(config: SimConfig, catalog: AssetCatalog) -> Self {
        let collision = CollisionSystem::new(CollisionConfig {
            actor_half_extents: config.player.half_extents,
            actor_radius: config.player.radius,
            ..config.collision
        });
        Self {
            world: World::default(),
            catalog,
            assets: AssetStore::default(),
            collision,
            effects: EffectRuntime::default(),
            ai: AiSystem::new(config.ai, config.ai_seed),
            combat: CombatSystem::new(config.skills.clone()),
            player: Player::new(config.player),
            avatars: BTreeMap::new(),
            events: SimEventBus::default(),
            focused_interactable: None,
            mode: SimMode::Edit,
            last_tick_order: Vec::with_capacity(7),
            tick_count: 0,
            metrics: MetricsAccumulator::new(config.metrics_interval, Instant::now()),
            metrics_handle: MetricsHandle::default(),
            config,
        }
    }

    pub fn set_model_loader(&mut self, loader: Box<dyn ModelLoader>) {
        self.assets.set_loader(loader);
    }

    /// Advances the world one frame. `dt` is clamped to the configured
    /// maximum; play-only stages are skipped in edit mode.
    pub fn tick(&mut self, dt: f32, input: &InputSnapshot) {
        let started = Instant::now();
        let dt = clamp_delta(dt, self.config.max_delta_seconds);
        self.events.begin_tick();
        self.last_tick_order.clear();

        self.assets.poll(&mut self.world);
        self.ai.sync_registrations(&self.world);

        self.collision.update_colliders(&self.world);
        self.collision
            .set_dynamic_colliders(self.avatars.values().filter(|avatar| !avatar.is_dead()).map(
                |avatar| DynamicCollider {
                    id: avatar.id,
                    position: avatar.position,
                    radius: avatar.radius,
                },
            ));
        self.last_tick_order.push(TickStage::CollisionRefresh);

        if self.mode == SimMode::Play {
            self.player.regenerate(dt);
            let desired = self.player.desired_position(input, dt);
            if let Some(slot) = input.skill_pressed() {
                self.use_skill(slot);
            }
            self.last_tick_order.push(TickStage::PlayerIntegration);

            self.player.position =
                self.collision
                    .resolve_collision(self.player.position, desired, &mut self.events);
            self.last_tick_order.push(TickStage::CollisionResolution);

            self.scan_interactables(input.interact_pressed());
            self.last_tick_order.push(TickStage::InteractionScan);

            let player = (!self.player.is_dead()).then_some(self.player.position);
            self.ai.update(dt, &mut self.world, player, &mut self.events);
            self.apply_npc_attacks();
            self.last_tick_order.push(TickStage::Ai);
        }

        self.effects.process_world(&self.world);
        self.effects.sync_helpers(&self.world);
        self.last_tick_order.push(TickStage::EffectSync);

        self.combat.update(dt, &mut self.events);
        self.last_tick_order.push(TickStage::CombatTimers);

        self.events.finish_tick();
        self.tick_count = self.tick_count.saturating_add(1);

        let now = Instant::now();
        self.metrics.record_tick(
            now.saturating_duration_since(started),
            TickPopulation {
                entity_count: self.world.entity_count(),
                npc_count: self.ai.brain_count(),
                effect_count: self.effects.effect_count(),
            },
        );
        if let Some(snapshot) = self.metrics.maybe_snapshot(now) {
            self.metrics_handle.publish(snapshot);
        }
    }

    fn scan_interactables(&mut self, interact_pressed: bool) {
        let player = self.player.position;
        let nearest = self
            .world
            .entities()
            .iter()
            .filter_map(|entity| {
                let interactable = entity
                    .enabled_components()
                    .find_map(|component| component.interactable())?;
                let distance = planar_distance(entity.transform.position, player);
                (distance <= interactable.interaction_range).then_some((entity.id, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id);

        if nearest != self.focused_interactable {
            debug!(focused = ?nearest.map(|id| id.0), "interactable_focus_changed");
            self.focused_interactable = nearest;
        }
        if let (true, Some(entity_id)) = (interact_pressed, nearest) {
            info!(entity_id = entity_id.0, "interact");
            self.events.emit(SimEvent::Interact { entity_id });
        }
    }

    fn apply_npc_attacks(&mut self) {
        let attacks: Vec<(EntityId, f32)> = self
            .events
            .iter_emitted_this_tick()
            .filter_map(|event| match event {
                SimEvent::NpcAttack { entity_id, damage } => Some((*entity_id, *damage)),
                _ => None,
            })
            .collect();
        for (source, damage) in attacks {
            self.combat
                .apply_incoming_attack(source, damage, &mut self.player, &mut self.events);
        }
    }

    /// Activates a skill slot for the player against every NPC and remote
    /// avatar. Only succeeds in play mode.
    pub fn use_skill(&mut self, slot: usize) -> bool {
        if self.mode != SimMode::Play {
            return false;
        }
        let forward = self.player.forward();
        let mut targets: Vec<&mut dyn Combatant> = self
            .ai
            .brains_mut()
            .map(|brain| brain as &mut dyn Combatant)
            .chain(
                self.avatars
                    .values_mut()
                    .map(|avatar| avatar as &mut dyn Combatant),
            )
            .collect();
        self.combat.use_skill(
            slot,
            &mut self.player,
            forward,
            &mut targets,
            &mut self.events,
        )
    }

    /// Spawns an instance of a catalog asset with that asset's default
    /// components and starts loading its model.
    pub fn place_entity(&mut self, asset_id: &str, position: Vec3) -> Result<EntityId, WorldError> {
        let def = self
            .catalog
            .asset_def_by_name(asset_id)
            .ok_or_else(|| WorldError::UnknownAsset(asset_id.to_string()))?;
        let position = if is_finite_vec3(position) {
            position
        } else {
            warn!(asset_id, "non_finite_placement_replaced_with_origin");
            Vec3::ZERO
        };
        let id = self
            .world
            .spawn(&def.asset_id, Transform::at(position), def.components.clone())?;
        self.assets.request_model(id, asset_id);
        info!(entity_id = id.0, asset_id, "entity_placed");
        Ok(id)
    }

    pub fn remove_entity(&mut self, entity_id: EntityId) -> Result<(), WorldError> {
        self.world
            .remove(entity_id)
            .ok_or(WorldError::UnknownEntity(entity_id))?;
        self.effects.remove_object(entity_id);
        self.ai.unregister(entity_id);
        self.assets.forget(entity_id);
        if self.focused_interactable == Some(entity_id) {
            self.focused_interactable = None;
        }
        info!(entity_id = entity_id.0, "entity_removed");
        Ok(())
    }

    /// Replaces the whole world. The new world is built first; on error the
    /// current one is untouched.
    pub fn load_world(&mut self, saved: &SavedWorld) -> Result<(), WorldError> {
        let mut world = World::default();
        for entity in &saved.entities {
            world.insert_loaded(
                entity.id,
                &entity.asset_ref,
                entity.transform.to_transform(),
                entity.components.clone(),
            )?;
        }

        self.world = world;
        self.effects.clear();
        self.ai.clear();
        self.collision.clear();
        self.assets.forget_all();
        self.focused_interactable = None;
        let requests: Vec<(EntityId, String)> = self
            .world
            .entities()
            .iter()
            .map(|entity| (entity.id, entity.asset_ref.clone()))
            .collect();
        for (id, asset_ref) in requests {
            self.assets.request_model(id, &asset_ref);
        }
        self.ai.sync_registrations(&self.world);
        info!(entity_count = self.world.entity_count(), "world_loaded");
        Ok(())
    }

    pub fn serialize_world(&self) -> SavedWorld {
        SavedWorld::from_world(&self.world)
    }

    /// Replaces an entity's components. Rejected lists leave the entity as
    /// it was.
    pub fn set_entity_components(
        &mut self,
        entity_id: EntityId,
        components: Vec<Component>,
    ) -> Result<(), WorldError> {
        match self.world.set_components(entity_id, components) {
            Ok(()) => {
                debug!(entity_id = entity_id.0, "components_replaced");
                Ok(())
            }
            Err(error) => {
                warn!(entity_id = entity_id.0, error = %error, "components_rejected");
                Err(error)
            }
        }
    }

    /// Loose-data form of [`Simulation::set_entity_components`].
    pub fn set_entity_components_json(
        &mut self,
        entity_id: EntityId,
        values: Vec<serde_json::Value>,
    ) -> Result<(), WorldError> {
        if !self.world.contains(entity_id) {
            return Err(WorldError::UnknownEntity(entity_id));
        }
        let components = components_from_json(values).map_err(|source| {
            warn!(entity_id = entity_id.0, error = %source, "components_rejected");
            WorldError::InvalidComponents { entity_id, source }
        })?;
        self.set_entity_components(entity_id, components)
    }

    /// Switching into play makes every NPC's current position its home.
    pub fn set_mode(&mut self, mode: SimMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        self.effects.set_colliders_visible(mode == SimMode::Edit);
        if mode == SimMode::Play {
            self.ai.sync_registrations(&self.world);
            self.ai.rehome(&self.world);
        } else {
            self.focused_interactable = None;
        }
        info!(mode = mode.as_str(), "mode_changed");
    }

    pub fn mode(&self) -> SimMode {
        self.mode
    }

    pub fn set_safe_zone(&mut self, safe_zone: Option<SafeZone>) {
        self.ai.set_safe_zone(safe_zone);
    }

    pub fn upsert_remote_avatar(&mut self, id: u64, position: Vec3) {
        self.avatars
            .entry(id)
            .and_modify(|avatar| avatar.position = position)
            .or_insert_with(|| RemoteAvatar::new(id, position));
    }

    pub fn remove_remote_avatar(&mut self, id: u64) -> Option<RemoteAvatar> {
        self.avatars.remove(&id)
    }

    pub fn remote_avatar(&self, id: u64) -> Option<&RemoteAvatar> {
        self.avatars.get(&id)
    }

    pub fn teleport_player(&mut self, position: Vec3) {
        if is_finite_vec3(position) {
            self.player.position = position;
        }
    }

    pub fn respawn_player(&mut self) {
        self.player.respawn();
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain()
    }

    pub fn events(&self) -> &SimEventBus {
        &self.events
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn ai(&self) -> &AiSystem {
        &self.ai
    }

    pub fn combat(&self) -> &CombatSystem {
        &self.combat
    }

    pub fn collision(&self) -> &CollisionSystem {
        &self.collision
    }

    pub fn effects(&self) -> &EffectRuntime {
        &self.effects
    }

    pub fn focused_interactable(&self) -> Option<EntityId> {
        self.focused_interactable
    }

    pub fn last_tick_order(&self) -> &[TickStage] {
        &self.last_tick_order
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn pending_model_loads(&self) -> usize {
        self.assets.pending_count()
    }

    pub fn metrics_handle(&self) -> MetricsHandle {
        self.metrics_handle.clone()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::app::{
        Attitude, ColliderData, ComponentError, ComponentKind, InputAction, InteractableData,
        LightData, NpcBehavior, NpcData,
    };
    use crate::content::{parse_catalog, CatalogModelLoader, ModelHandle};
    use crate::systems::{CombatantId, EffectKind, NpcState};

    const CATALOG: &str = r#"
<AssetDefs>
  <AssetDef>
    <assetId>prop.wall</assetId>
    <model bounds="4 3 1" />
    <components>
      <collider shape="box" size="4 3 1" />
    </components>
  </AssetDef>
  <AssetDef>
    <assetId>zone.trigger</assetId>
    <components>
      <collider size="2 2 2" isTrigger="true" />
    </components>
  </AssetDef>
  <AssetDef>
    <assetId>prop.sign</assetId>
    <components>
      <interactable prompt="Read" interactionRange="2" />
    </components>
  </AssetDef>
  <AssetDef>
    <assetId>npc.guard</assetId>
    <model bounds="1 2 1" clips="Idle,Walk,Run,Attack01,Death" />
    <components>
      <npc name="Guard" attitude="hostile" behavior="stationary" detectionRange="8" />
    </components>
  </AssetDef>
  <AssetDef>
    <assetId>prop.lamp</assetId>
    <components>
      <light lightType="point" intensity="2" />
    </components>
  </AssetDef>
</AssetDefs>
"#;

    fn catalog() -> AssetCatalog {
        parse_catalog("test.xml", CATALOG).expect("test catalog")
    }

    fn play_sim() -> Simulation {
        let mut sim = Simulation::new(SimConfig::default(), catalog());
        sim.set_mode(SimMode::Play);
        sim
    }

    #[test]
    fn tick_runs_stages_in_fixed_order() {
        let mut sim = play_sim();
        sim.tick(0.016, &InputSnapshot::empty());
        assert_eq!(
            sim.last_tick_order(),
            &[
                TickStage::CollisionRefresh,
                TickStage::PlayerIntegration,
                TickStage::CollisionResolution,
                TickStage::InteractionScan,
                TickStage::Ai,
                TickStage::EffectSync,
                TickStage::CombatTimers,
            ]
        );
    }

    #[test]
    fn edit_mode_skips_player_and_ai() {
        let mut sim = Simulation::new(SimConfig::default(), catalog());
        let guard = sim
            .place_entity("npc.guard", Vec3::new(5.0, 0.0, 0.0))
            .expect("place guard");
        let input = InputSnapshot::empty().with_action_down(InputAction::MoveForward, true);
        sim.tick(0.05, &input);

        assert_eq!(
            sim.last_tick_order(),
            &[
                TickStage::CollisionRefresh,
                TickStage::EffectSync,
                TickStage::CombatTimers
            ]
        );
        assert_eq!(sim.player().position, Vec3::ZERO);
        assert_eq!(
            sim.ai().brain(guard).expect("guard brain").state,
            NpcState::Idle
        );
    }

    #[test]
    fn delta_is_clamped() {
        assert_eq!(clamp_delta(0.5, 0.1), 0.1);
        assert_eq!(clamp_delta(-1.0, 0.1), 0.0);
        assert_eq!(clamp_delta(f32::NAN, 0.1), 0.0);
        assert_eq!(clamp_delta(0.016, 0.1), 0.016);

        let mut sim = play_sim();
        let input = InputSnapshot::empty().with_action_down(InputAction::MoveRight, true);
        sim.tick(5.0, &input);
        assert!((sim.player().position.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn hostile_chases_then_returns_after_teleport() {
        let mut sim = play_sim();
        let guard = sim
            .place_entity("npc.guard", Vec3::new(5.0, 0.0, 0.0))
            .expect("place guard");
        sim.tick(0.016, &InputSnapshot::empty());
        assert_eq!(sim.ai().brain(guard).expect("brain").state, NpcState::Chase);

        sim.teleport_player(Vec3::new(100.0, 0.0, 0.0));
        sim.tick(0.016, &InputSnapshot::empty());
        assert_eq!(sim.ai().brain(guard).expect("brain").state, NpcState::Return);
    }

    #[test]
    fn npc_attacks_damage_the_player() {
        let mut sim = play_sim();
        let guard = sim
            .place_entity("npc.guard", Vec3::new(1.0, 0.0, 0.0))
            .expect("place guard");
        sim.tick(0.05, &InputSnapshot::empty());

        let events = sim.drain_events();
        assert!(events.contains(&SimEvent::NpcAttack {
            entity_id: guard,
            damage: 10.0
        }));
        // (10 + 0) * (1 - 5 / 105) rounds to 10.
        assert!(events.contains(&SimEvent::DamageReceived {
            source: guard,
            amount: 10
        }));
        assert_eq!(sim.player().vitals.health, 90.0);
    }

    #[test]
    fn player_is_pushed_out_of_walls() {
        let mut sim = play_sim();
        let wall = sim
            .place_entity("prop.wall", Vec3::new(0.0, 0.0, -2.0))
            .expect("place wall");
        let input = InputSnapshot::empty().with_action_down(InputAction::MoveForward, true);
        for _ in 0..60 {
            sim.tick(0.05, &input);
            let bounds = sim.collision().actor_bounds(sim.player().position);
            let blocked = sim
                .collision()
                .colliders()
                .iter()
                .filter(|collider| collider.entity_id == wall)
                .any(|collider| collider.bounds.intersects(&bounds));
            assert!(!blocked);
        }
        assert!(sim.player().position.z > -2.0);
    }

    #[test]
    fn trigger_fires_enter_and_exit_once() {
        let mut sim = play_sim();
        let zone = sim
            .place_entity("zone.trigger", Vec3::new(3.0, 0.0, 0.0))
            .expect("place trigger");
        let right = InputSnapshot::empty().with_action_down(InputAction::MoveRight, true);
        for _ in 0..60 {
            sim.tick(0.05, &right);
        }
        let events = sim.drain_events();
        let enters = events
            .iter()
            .filter(|event| **event == SimEvent::TriggerEnter { entity_id: zone })
            .count();
        let exits = events
            .iter()
            .filter(|event| **event == SimEvent::TriggerExit { entity_id: zone })
            .count();
        assert_eq!((enters, exits), (1, 1));
    }

    #[test]
    fn interact_press_targets_nearest_sign() {
        let mut sim = play_sim();
        let near = sim
            .place_entity("prop.sign", Vec3::new(1.0, 0.0, 0.0))
            .expect("near sign");
        sim.place_entity("prop.sign", Vec3::new(0.0, 0.0, 1.5))
            .expect("far sign");
        sim.place_entity("prop.sign", Vec3::new(10.0, 0.0, 0.0))
            .expect("distant sign");

        sim.tick(0.016, &InputSnapshot::empty());
        assert_eq!(sim.focused_interactable(), Some(near));
        assert!(sim.drain_events().is_empty());

        sim.tick(0.016, &InputSnapshot::empty().with_interact_pressed(true));
        assert_eq!(
            sim.drain_events(),
            vec![SimEvent::Interact { entity_id: near }]
        );
    }

    #[test]
    fn skill_press_hits_npc_and_respects_cooldown() {
        let mut sim = play_sim();
        // The player spawns facing -Z.
        let guard = sim
            .place_entity("npc.guard", Vec3::new(0.0, 0.0, -2.0))
            .expect("place guard");
        sim.set_entity_components(
            guard,
            vec![Component::new(ComponentKind::Npc(NpcData {
                attitude: Attitude::Neutral,
                ..NpcData::default()
            }))],
        )
        .expect("neutral guard");

        sim.tick(0.016, &InputSnapshot::empty().with_skill_pressed(Some(0)));
        let events = sim.drain_events();
        // (20 + 10 * 0.5) * (1 - 0 / 100) = 25
        assert!(events.contains(&SimEvent::DamageDealt {
            target: CombatantId::Npc(guard),
            amount: 25,
            slot: 0
        }));
        assert_eq!(
            sim.ai().brain(guard).expect("brain").vitals.health,
            75.0
        );

        assert!(!sim.use_skill(0));
        assert_eq!(
            sim.ai().brain(guard).expect("brain").vitals.health,
            75.0
        );
    }

    #[test]
    fn skills_are_unavailable_in_edit_mode() {
        let mut sim = Simulation::new(SimConfig::default(), catalog());
        assert!(!sim.use_skill(0));
    }

    #[test]
    fn world_round_trips_through_serialization() {
        let mut sim = Simulation::new(SimConfig::default(), catalog());
        let wall = sim
            .place_entity("prop.wall", Vec3::new(1.0, 0.0, 2.0))
            .expect("wall");
        sim.place_entity("npc.guard", Vec3::new(-3.0, 0.0, 4.0))
            .expect("guard");
        sim.set_entity_components(
            wall,
            vec![Component::disabled(ComponentKind::Collider(ColliderData::default()))],
        )
        .expect("disable collider");
        let saved = sim.serialize_world();

        let mut restored = Simulation::new(SimConfig::default(), catalog());
        restored.load_world(&saved).expect("load");
        assert_eq!(restored.serialize_world(), saved);

        let json = saved.to_json_pretty().expect("encode");
        let decoded = SavedWorld::from_json(&json).expect("decode");
        assert_eq!(decoded, saved);
    }

    #[test]
    fn loaded_world_never_reuses_ids() {
        let mut sim = Simulation::new(SimConfig::default(), catalog());
        let first = sim.place_entity("prop.sign", Vec3::ZERO).expect("sign");
        let second = sim.place_entity("prop.sign", Vec3::ONE).expect("sign");
        let saved = sim.serialize_world();

        let mut restored = Simulation::new(SimConfig::default(), catalog());
        restored.load_world(&saved).expect("load");
        let third = restored.place_entity("prop.sign", Vec3::ZERO).expect("sign");
        assert!(third > first && third > second);
    }

    #[test]
    fn failed_load_keeps_current_world() {
        let mut sim = Simulation::new(SimConfig::default(), catalog());
        let kept = sim.place_entity("prop.sign", Vec3::ZERO).expect("sign");
        let mut saved = sim.serialize_world();
        let mut duplicate = saved.entities[0].clone();
        duplicate.components = vec![
            Component::new(ComponentKind::Interactable(InteractableData::default())),
            Component::new(ComponentKind::Interactable(InteractableData::default())),
        ];
        duplicate.id = EntityId(99);
        saved.entities.push(duplicate);

        assert!(matches!(
            sim.load_world(&saved),
            Err(WorldError::InvalidComponents { .. })
        ));
        assert_eq!(sim.world().entity_count(), 1);
        assert!(sim.world().contains(kept));
    }

    #[test]
    fn rejected_components_keep_previous_state() {
        let mut sim = play_sim();
        let guard = sim
            .place_entity("npc.guard", Vec3::new(5.0, 0.0, 0.0))
            .expect("guard");
        sim.tick(0.016, &InputSnapshot::empty());
        let before = sim.world().find_entity(guard).expect("guard").components().to_vec();

        let error = sim
            .set_entity_components_json(
                guard,
                vec![json!({"type": "npc"}), json!({"type": "npc"})],
            )
            .expect_err("duplicate npc");
        assert!(matches!(
            error,
            WorldError::InvalidComponents {
                source: ComponentError::DuplicateSingleton { .. },
                ..
            }
        ));
        let error = sim
            .set_entity_components_json(guard, vec![json!({"type": "teleporter"})])
            .expect_err("unknown type");
        assert!(matches!(
            error,
            WorldError::InvalidComponents {
                source: ComponentError::UnknownType { .. },
                ..
            }
        ));

        let entity = sim.world().find_entity(guard).expect("guard");
        assert_eq!(entity.components(), before.as_slice());
        sim.tick(0.016, &InputSnapshot::empty());
        assert!(sim.ai().brain(guard).is_some());
    }

    #[test]
    fn component_changes_are_picked_up_next_tick() {
        let mut sim = Simulation::new(SimConfig::default(), catalog());
        let lamp = sim.place_entity("prop.lamp", Vec3::ZERO).expect("lamp");
        sim.tick(0.016, &InputSnapshot::empty());
        assert!(sim.effects().effect(lamp, EffectKind::Light).is_some());
        assert!(sim.ai().brain(lamp).is_none());

        sim.set_entity_components(
            lamp,
            vec![
                Component::new(ComponentKind::Light(LightData::default())),
                Component::new(ComponentKind::Collider(ColliderData::default())),
                Component::new(ComponentKind::Npc(NpcData {
                    behavior: NpcBehavior::Wander,
                    ..NpcData::default()
                })),
            ],
        )
        .expect("components");
        sim.tick(0.016, &InputSnapshot::empty());
        assert!(sim.effects().effect(lamp, EffectKind::ColliderVolume).is_some());
        assert_eq!(
            sim.ai().brain(lamp).expect("brain").state,
            NpcState::Wander
        );

        sim.remove_entity(lamp).expect("remove");
        assert_eq!(sim.effects().effect_count(), 0);
        assert!(sim.ai().brain(lamp).is_none());
        assert_eq!(
            sim.remove_entity(lamp),
            Err(WorldError::UnknownEntity(lamp))
        );
    }

    #[test]
    fn collider_volumes_only_visible_in_edit_mode() {
        let mut sim = Simulation::new(SimConfig::default(), catalog());
        let wall = sim.place_entity("prop.wall", Vec3::ZERO).expect("wall");
        sim.tick(0.016, &InputSnapshot::empty());
        let visible = |sim: &Simulation| {
            sim.effects()
                .effect(wall, EffectKind::ColliderVolume)
                .expect("volume")
                .visible
        };
        assert!(visible(&sim));
        sim.set_mode(SimMode::Play);
        assert!(!visible(&sim));
        sim.set_mode(SimMode::Edit);
        assert!(visible(&sim));
    }

    #[test]
    fn npc_runs_on_placeholder_until_model_arrives() {
        let mut sim = play_sim();
        let guard = sim
            .place_entity("npc.guard", Vec3::new(5.0, 0.0, 0.0))
            .expect("guard");
        sim.tick(0.016, &InputSnapshot::empty());
        assert!(matches!(
            sim.world().find_entity(guard).expect("guard").model,
            ModelHandle::Placeholder
        ));
        assert_eq!(sim.ai().brain(guard).expect("brain").state, NpcState::Chase);
        assert_eq!(sim.ai().brain(guard).expect("brain").animation, None);

        let mut loaded = play_sim();
        loaded.set_model_loader(Box::new(CatalogModelLoader::new(catalog())));
        let guard = loaded
            .place_entity("npc.guard", Vec3::new(5.0, 0.0, 0.0))
            .expect("guard");
        loaded.tick(0.016, &InputSnapshot::empty());
        assert!(loaded.world().find_entity(guard).expect("guard").model.is_ready());
        assert_eq!(
            loaded.ai().brain(guard).expect("brain").animation.as_deref(),
            Some("Run")
        );
    }

    #[test]
    fn remote_avatars_block_and_take_hits() {
        let mut sim = play_sim();
        sim.upsert_remote_avatar(7, Vec3::new(0.0, 0.0, -1.0));
        let forward = InputSnapshot::empty().with_action_down(InputAction::MoveForward, true);
        for _ in 0..10 {
            sim.tick(0.05, &forward);
        }
        let distance = planar_distance(sim.player().position, Vec3::new(0.0, 0.0, -1.0));
        assert!(distance >= 0.8 - 1e-3, "distance {distance}");

        assert!(sim.use_skill(0));
        assert!(sim.remote_avatar(7).expect("avatar").vitals.health < 100.0);
        assert!(sim.remove_remote_avatar(7).is_some());
    }

    #[test]
    fn unknown_asset_is_rejected() {
        let mut sim = Simulation::new(SimConfig::default(), catalog());
        assert_eq!(
            sim.place_entity("prop.missing", Vec3::ZERO),
            Err(WorldError::UnknownAsset("prop.missing".to_string()))
        );
        assert_eq!(sim.world().entity_count(), 0);
    }
}

//! One state machine per NPC. Hostile stationary/patrol NPCs run the
//! chase/attack machine; every other NPC runs its behavior loop.

mod safe_zone;
mod steering;

use std::collections::BTreeMap;
use std::f32::consts::TAU;
use std::fmt;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::app::geometry::{planar, planar_distance, yaw_towards};
use crate::app::{Attitude, EntityId, NpcBehavior, NpcData, SimEvent, SimEventBus, World};

use super::combat::{Combatant, CombatantId, Vitals};

pub use safe_zone::SafeZone;
pub use steering::{move_towards, separation, Step};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AiConfig {
    pub separation_radius: f32,
    pub arrival_distance: f32,
    pub home_arrival_distance: f32,
    /// Chase gives up beyond `detection_range * lose_target_factor`.
    pub lose_target_factor: f32,
    /// Attack falls back to chase beyond `attack_range * attack_exit_factor`.
    pub attack_exit_factor: f32,
    pub patrol_waypoints: usize,
    pub patrol_dwell_seconds: (f32, f32),
    pub wander_dwell_seconds: (f32, f32),
    pub follow_distance: f32,
    pub flee_distance: f32,
    pub flee_leash: f32,
    pub flee_speed_multiplier: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            separation_radius: 1.5,
            arrival_distance: 0.3,
            home_arrival_distance: 0.5,
            lose_target_factor: 1.5,
            attack_exit_factor: 1.5,
            patrol_waypoints: 4,
            patrol_dwell_seconds: (2.0, 4.0),
            wander_dwell_seconds: (1.0, 4.0),
            follow_distance: 3.0,
            flee_distance: 5.0,
            flee_leash: 15.0,
            flee_speed_multiplier: 1.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NpcState {
    Idle,
    Patrol,
    Chase,
    Attack,
    Return,
    Dead,
    Flee,
    Wander,
    Follow,
}

impl NpcState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Patrol => "patrol",
            Self::Chase => "chase",
            Self::Attack => "attack",
            Self::Return => "return",
            Self::Dead => "dead",
            Self::Flee => "flee",
            Self::Wander => "wander",
            Self::Follow => "follow",
        }
    }

    fn initial_for(behavior: NpcBehavior) -> Self {
        match behavior {
            NpcBehavior::Stationary | NpcBehavior::Flee => Self::Idle,
            NpcBehavior::Patrol => Self::Patrol,
            NpcBehavior::Wander => Self::Wander,
            NpcBehavior::Follow => Self::Follow,
        }
    }
}

impl fmt::Display for NpcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-NPC behavior state. Lives in the AI system, never on the entity.
#[derive(Debug, Clone)]
pub struct NpcBrain {
    pub entity_id: EntityId,
    pub state: NpcState,
    pub data: NpcData,
    pub start_position: Vec3,
    pub position: Vec3,
    pub yaw: f32,
    pub patrol_points: Vec<Vec3>,
    pub patrol_index: usize,
    pub wait_timer: f32,
    pub last_attack_at: Option<f64>,
    pub wander_target: Option<Vec3>,
    pub vitals: Vitals,
    /// Clip resolved against the loaded model, if any.
    pub animation: Option<String>,
    revision: u64,
    moving: bool,
}

impl NpcBrain {
    fn new(entity_id: EntityId, data: NpcData, position: Vec3, yaw: f32, revision: u64, config: &AiConfig) -> Self {
        let data = data.sanitized();
        Self {
            entity_id,
            state: NpcState::initial_for(data.behavior),
            patrol_points: patrol_points(position, data.patrol_radius, config.patrol_waypoints),
            start_position: position,
            position,
            yaw,
            patrol_index: 0,
            wait_timer: 0.0,
            last_attack_at: None,
            wander_target: None,
            vitals: Vitals::new(data.max_health, 0.0, data.attack_damage, data.defense),
            animation: None,
            revision,
            moving: false,
            data,
        }
    }

    fn is_hostile(&self) -> bool {
        self.data.attitude == Attitude::Hostile
    }

    fn reset_home(&mut self, config: &AiConfig) {
        self.start_position = self.position;
        self.patrol_points =
            patrol_points(self.position, self.data.patrol_radius, config.patrol_waypoints);
        self.patrol_index = 0;
        self.wait_timer = 0.0;
        self.wander_target = None;
        self.last_attack_at = None;
        if self.state != NpcState::Dead {
            self.state = NpcState::initial_for(self.data.behavior);
        }
    }
}

impl Combatant for NpcBrain {
    fn combatant_id(&self) -> CombatantId {
        CombatantId::Npc(self.entity_id)
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn vitals(&self) -> &Vitals {
        &self.vitals
    }

    fn vitals_mut(&mut self) -> &mut Vitals {
        &mut self.vitals
    }
}

/// Evenly spaced points on a circle around `center`, starting on +X.
pub fn patrol_points(center: Vec3, radius: f32, count: usize) -> Vec<Vec3> {
    let count = count.max(1);
    (0..count)
        .map(|index| {
            let angle = index as f32 * TAU / count as f32;
            center + Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius)
        })
        .collect()
}

struct TickContext<'a> {
    dt: f32,
    clock: f64,
    player: Option<Vec3>,
    safe_zone: Option<SafeZone>,
    config: &'a AiConfig,
    neighbors: &'a [(EntityId, Vec3)],
}

#[derive(Debug)]
pub struct AiSystem {
    config: AiConfig,
    brains: BTreeMap<EntityId, NpcBrain>,
    safe_zone: Option<SafeZone>,
    rng: StdRng,
    clock: f64,
}

impl AiSystem {
    pub fn new(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            brains: BTreeMap::new(),
            safe_zone: None,
            rng: StdRng::seed_from_u64(seed),
            clock: 0.0,
        }
    }

    pub fn set_safe_zone(&mut self, safe_zone: Option<SafeZone>) {
        self.safe_zone = safe_zone;
    }

    pub fn safe_zone(&self) -> Option<SafeZone> {
        self.safe_zone
    }

    pub fn brain(&self, entity_id: EntityId) -> Option<&NpcBrain> {
        self.brains.get(&entity_id)
    }

    pub fn brains(&self) -> impl Iterator<Item = &NpcBrain> {
        self.brains.values()
    }

    pub fn brains_mut(&mut self) -> impl Iterator<Item = &mut NpcBrain> {
        self.brains.values_mut()
    }

    pub fn brain_count(&self) -> usize {
        self.brains.len()
    }

    /// Registers entities that gained an enabled NPC component, refreshes
    /// those whose components changed, and drops the rest.
    pub fn sync_registrations(&mut self, world: &World) {
        let mut seen = Vec::with_capacity(self.brains.len());
        for entity in world.entities() {
            let Some(data) = entity
                .enabled_components()
                .find_map(|component| component.npc())
            else {
                continue;
            };
            seen.push(entity.id);
            match self.brains.get_mut(&entity.id) {
                Some(brain) if brain.revision == entity.revision() => {}
                Some(brain) => {
                    let health = brain.vitals.health;
                    let mut refreshed = NpcBrain::new(
                        entity.id,
                        data.clone(),
                        brain.start_position,
                        brain.yaw,
                        entity.revision(),
                        &self.config,
                    );
                    refreshed.position = entity.transform.position;
                    refreshed.vitals.health = health.min(refreshed.vitals.max_health);
                    if refreshed.vitals.is_dead() {
                        refreshed.state = NpcState::Dead;
                    }
                    debug!(entity_id = entity.id.0, "npc_refreshed");
                    *brain = refreshed;
                }
                None => {
                    debug!(entity_id = entity.id.0, behavior = ?data.behavior, "npc_registered");
                    self.brains.insert(
                        entity.id,
                        NpcBrain::new(
                            entity.id,
                            data.clone(),
                            entity.transform.position,
                            entity.transform.yaw(),
                            entity.revision(),
                            &self.config,
                        ),
                    );
                }
            }
        }
        self.brains.retain(|id, _| seen.contains(id));
    }

    /// Makes every NPC's current position its home and restarts its loop.
    pub fn rehome(&mut self, world: &World) {
        for brain in self.brains.values_mut() {
            if let Some(entity) = world.find_entity(brain.entity_id) {
                brain.position = entity.transform.position;
                brain.yaw = entity.transform.yaw();
            }
            brain.reset_home(&self.config);
        }
    }

    pub fn unregister(&mut self, entity_id: EntityId) {
        self.brains.remove(&entity_id);
    }

    pub fn clear(&mut self) {
        self.brains.clear();
        self.clock = 0.0;
    }

    /// Advances every NPC one step and writes the resulting transforms back
    /// to the world. `player` is `None` when there is nothing to react to.
    pub fn update(
        &mut self,
        dt: f32,
        world: &mut World,
        player: Option<Vec3>,
        events: &mut SimEventBus,
    ) {
        self.clock += f64::from(dt.max(0.0));

        for brain in self.brains.values_mut() {
            if let Some(entity) = world.find_entity(brain.entity_id) {
                brain.position = entity.transform.position;
            }
        }
        let neighbors: Vec<(EntityId, Vec3)> = self
            .brains
            .values()
            .filter(|brain| !brain.vitals.is_dead())
            .map(|brain| (brain.entity_id, brain.position))
            .collect();

        let context = TickContext {
            dt,
            clock: self.clock,
            player,
            safe_zone: self.safe_zone,
            config: &self.config,
            neighbors: &neighbors,
        };

        for brain in self.brains.values_mut() {
            brain.moving = false;
            step_brain(brain, &context, &mut self.rng, events);

            if let Some(entity) = world.find_entity_mut(brain.entity_id) {
                entity.transform.position = brain.position;
                entity.transform.rotation.y = brain.yaw;
                let wanted = animation_for(brain);
                brain.animation = entity
                    .model
                    .info()
                    .and_then(|info| info.clip(wanted))
                    .map(ToString::to_string);
            }
        }
    }
}

fn animation_for(brain: &NpcBrain) -> &'static str {
    match brain.state {
        NpcState::Dead => "death",
        NpcState::Attack => "attack",
        NpcState::Chase | NpcState::Flee if brain.moving => "run",
        _ if brain.moving => "walk",
        _ => "idle",
    }
}

fn transition(brain: &mut NpcBrain, to: NpcState, events: &mut SimEventBus) {
    if brain.state == to {
        return;
    }
    debug!(
        entity_id = brain.entity_id.0,
        from = brain.state.as_str(),
        to = to.as_str(),
        "npc_state_changed"
    );
    events.emit(SimEvent::NpcStateChanged {
        entity_id: brain.entity_id,
        from: brain.state,
        to,
    });
    brain.state = to;
}

fn step_brain(brain: &mut NpcBrain, ctx: &TickContext<'_>, rng: &mut StdRng, events: &mut SimEventBus) {
    if brain.vitals.is_dead() {
        transition(brain, NpcState::Dead, events);
        return;
    }
    if brain.data.runs_combat_machine() {
        step_hostile(brain, ctx, rng, events);
    } else {
        match brain.data.behavior {
            NpcBehavior::Patrol => step_patrol(brain, ctx, rng),
            NpcBehavior::Wander => step_wander(brain, ctx, rng),
            NpcBehavior::Follow => step_follow(brain, ctx),
            NpcBehavior::Flee => step_flee(brain, ctx, events),
            NpcBehavior::Stationary => {}
        }
    }
    if brain.is_hostile() {
        if let Some(zone) = ctx.safe_zone {
            let fallback = ctx.player.unwrap_or(brain.start_position);
            let outward = brain.position + (brain.position - fallback);
            brain.position = zone.push_outside(brain.position, outward);
        }
    }
}

fn walk(brain: &mut NpcBrain, target: Vec3, speed: f32, ctx: &TickContext<'_>) -> bool {
    let push = separation(
        brain.entity_id,
        brain.position,
        ctx.neighbors,
        ctx.config.separation_radius,
    );
    let step = move_towards(brain.position, target, speed, ctx.dt, push);
    brain.position = step.position;
    if let Some(yaw) = step.yaw {
        brain.yaw = yaw;
    }
    brain.moving |= step.moved;
    step.moved
}

fn face(brain: &mut NpcBrain, target: Vec3) {
    if let Some(yaw) = yaw_towards(target - brain.position) {
        brain.yaw = yaw;
    }
}

fn step_hostile(brain: &mut NpcBrain, ctx: &TickContext<'_>, rng: &mut StdRng, events: &mut SimEventBus) {
    let Some(player) = ctx.player else {
        match brain.state {
            NpcState::Chase | NpcState::Attack => begin_return(brain, ctx, events),
            NpcState::Return => step_return(brain, ctx, events),
            NpcState::Idle if brain.data.behavior == NpcBehavior::Patrol => {
                transition(brain, NpcState::Patrol, events);
                step_patrol(brain, ctx, rng);
            }
            NpcState::Patrol => step_patrol(brain, ctx, rng),
            _ => {}
        }
        return;
    };

    let distance = planar_distance(brain.position, player);
    let detection = brain.data.detection_range;
    let separated = ctx
        .safe_zone
        .is_some_and(|zone| zone.contains(player) && !zone.contains(brain.position));
    let border = ctx.safe_zone.map(|zone| {
        zone.border_point(player, brain.position, brain.position.y)
    });
    let at_border = separated
        && border.is_some_and(|point| {
            planar_distance(brain.position, point) <= ctx.config.arrival_distance
        });

    match brain.state {
        NpcState::Idle | NpcState::Patrol => {
            if distance <= detection {
                if at_border {
                    transition(brain, NpcState::Idle, events);
                    face(brain, player);
                } else {
                    transition(brain, NpcState::Chase, events);
                    chase(brain, player, border.filter(|_| separated), ctx, events);
                }
            } else if brain.state == NpcState::Idle && brain.data.behavior == NpcBehavior::Patrol {
                transition(brain, NpcState::Patrol, events);
                step_patrol(brain, ctx, rng);
            } else if brain.state == NpcState::Patrol {
                step_patrol(brain, ctx, rng);
            }
        }
        NpcState::Chase => {
            if distance > detection * ctx.config.lose_target_factor {
                begin_return(brain, ctx, events);
            } else {
                chase(brain, player, border.filter(|_| separated), ctx, events);
            }
        }
        NpcState::Attack => {
            if separated {
                transition(brain, NpcState::Idle, events);
                face(brain, player);
            } else if distance > brain.data.attack_range * ctx.config.attack_exit_factor {
                transition(brain, NpcState::Chase, events);
                chase(brain, player, None, ctx, events);
            } else {
                attack(brain, player, ctx, events);
            }
        }
        NpcState::Return => {
            if distance <= detection {
                transition(brain, NpcState::Chase, events);
                chase(brain, player, border.filter(|_| separated), ctx, events);
            } else {
                step_return(brain, ctx, events);
            }
        }
        NpcState::Dead | NpcState::Flee | NpcState::Wander | NpcState::Follow => {
            transition(brain, NpcState::initial_for(brain.data.behavior), events);
        }
    }
}

/// Chase movement for this tick. With a border target the NPC heads for the
/// zone edge and halts there facing the player.
fn chase(
    brain: &mut NpcBrain,
    player: Vec3,
    border: Option<Vec3>,
    ctx: &TickContext<'_>,
    events: &mut SimEventBus,
) {
    if let Some(border) = border {
        if planar_distance(brain.position, border) <= ctx.config.arrival_distance {
            transition(brain, NpcState::Idle, events);
            face(brain, player);
        } else {
            walk(brain, border, brain.data.move_speed, ctx);
        }
        return;
    }
    if planar_distance(brain.position, player) <= brain.data.attack_range {
        transition(brain, NpcState::Attack, events);
        attack(brain, player, ctx, events);
        return;
    }
    walk(brain, player, brain.data.move_speed, ctx);
}

/// Re-faces the player every tick; damage only lands once the cooldown since
/// the previous hit has elapsed.
fn attack(brain: &mut NpcBrain, player: Vec3, ctx: &TickContext<'_>, events: &mut SimEventBus) {
    face(brain, player);
    let cooldown = f64::from(brain.data.attack_cooldown);
    let ready = brain
        .last_attack_at
        .map_or(true, |last| ctx.clock - last >= cooldown);
    if ready {
        brain.last_attack_at = Some(ctx.clock);
        events.emit(SimEvent::NpcAttack {
            entity_id: brain.entity_id,
            damage: brain.data.attack_damage,
        });
    }
}

/// Where a returning NPC heads. A hostile home inside the safe zone is moved
/// out to the zone border.
fn home_target(brain: &NpcBrain, ctx: &TickContext<'_>) -> Vec3 {
    match ctx.safe_zone {
        Some(zone) if brain.is_hostile() && zone.contains(brain.start_position) => {
            zone.border_point(brain.start_position, brain.position, brain.start_position.y)
        }
        _ => brain.start_position,
    }
}

/// Enters `Return` and takes the first step home. Arrival is checked from
/// the next update on, so the state is always observable for a tick.
fn begin_return(brain: &mut NpcBrain, ctx: &TickContext<'_>, events: &mut SimEventBus) {
    transition(brain, NpcState::Return, events);
    let home = home_target(brain, ctx);
    walk(brain, home, brain.data.move_speed, ctx);
}

fn step_return(brain: &mut NpcBrain, ctx: &TickContext<'_>, events: &mut SimEventBus) {
    let home = home_target(brain, ctx);
    if planar_distance(brain.position, home) <= ctx.config.home_arrival_distance {
        transition(brain, NpcState::Idle, events);
        return;
    }
    walk(brain, home, brain.data.move_speed, ctx);
}

fn dwell(rng: &mut StdRng, (low, high): (f32, f32)) -> f32 {
    if high > low {
        rng.gen_range(low..high)
    } else {
        low.max(0.0)
    }
}

fn step_patrol(brain: &mut NpcBrain, ctx: &TickContext<'_>, rng: &mut StdRng) {
    if brain.wait_timer > 0.0 {
        brain.wait_timer = (brain.wait_timer - ctx.dt).max(0.0);
        return;
    }
    let Some(target) = brain.patrol_points.get(brain.patrol_index).copied() else {
        return;
    };
    if planar_distance(brain.position, target) <= ctx.config.arrival_distance {
        brain.patrol_index = (brain.patrol_index + 1) % brain.patrol_points.len();
        brain.wait_timer = dwell(rng, ctx.config.patrol_dwell_seconds);
        return;
    }
    walk(brain, target, brain.data.move_speed, ctx);
}

fn step_wander(brain: &mut NpcBrain, ctx: &TickContext<'_>, rng: &mut StdRng) {
    if brain.wait_timer > 0.0 {
        brain.wait_timer = (brain.wait_timer - ctx.dt).max(0.0);
        return;
    }
    let target = match brain.wander_target {
        Some(target) => target,
        None => {
            let angle = rng.gen_range(0.0..TAU);
            let radius = brain.data.patrol_radius * rng.gen_range(0.0f32..1.0).sqrt();
            let target = brain.start_position + Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius);
            brain.wander_target = Some(target);
            target
        }
    };
    if planar_distance(brain.position, target) <= ctx.config.arrival_distance {
        brain.wander_target = None;
        brain.wait_timer = dwell(rng, ctx.config.wander_dwell_seconds);
        return;
    }
    walk(brain, target, brain.data.move_speed, ctx);
}

fn step_follow(brain: &mut NpcBrain, ctx: &TickContext<'_>) {
    let Some(player) = ctx.player else {
        return;
    };
    if planar_distance(brain.position, player) > ctx.config.follow_distance {
        walk(brain, player, brain.data.move_speed, ctx);
    } else {
        face(brain, player);
    }
}

fn step_flee(brain: &mut NpcBrain, ctx: &TickContext<'_>, events: &mut SimEventBus) {
    let threat = ctx
        .player
        .filter(|player| planar_distance(brain.position, *player) <= brain.data.detection_range);
    let Some(player) = threat else {
        transition(brain, NpcState::Idle, events);
        return;
    };
    transition(brain, NpcState::Flee, events);
    let target = flee_target(brain.position, player, brain.start_position, ctx.config);
    let speed = brain.data.move_speed * ctx.config.flee_speed_multiplier;
    walk(brain, target, speed, ctx);
}

/// A point `flee_distance` straight away from the threat. If that leaves the
/// leash around home, a sideways point is tried, and failing that the naive
/// point is pulled back onto the leash circle.
pub fn flee_target(position: Vec3, threat: Vec3, home: Vec3, config: &AiConfig) -> Vec3 {
    let mut away = planar(position - threat).normalize_or_zero();
    if away == Vec3::ZERO {
        away = planar(position - home).normalize_or_zero();
    }
    if away == Vec3::ZERO {
        away = Vec3::X;
    }
    let within_leash = |point: Vec3| planar_distance(point, home) <= config.flee_leash;

    let naive = position + away * config.flee_distance;
    if within_leash(naive) {
        return naive;
    }
    let side = Vec3::new(-away.z, 0.0, away.x);
    for candidate in [position + side * config.flee_distance, position - side * config.flee_distance] {
        if within_leash(candidate) {
            return candidate;
        }
    }
    let from_home = planar(naive - home).normalize_or_zero();
    Vec3::new(
        home.x + from_home.x * config.flee_leash,
        position.y,
        home.z + from_home.z * config.flee_leash,
    )
}

use glam::Vec3;

use crate::systems::{Combatant, CombatantId, Vitals};

use super::geometry::{forward_from_yaw, yaw_towards};
use super::input::{InputAction, InputSnapshot};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerConfig {
    pub move_speed: f32,
    pub sprint_multiplier: f32,
    /// Half extents of the player's box; the box rests on `position.y`.
    pub half_extents: Vec3,
    /// Radius used against other avatars' circular colliders.
    pub radius: f32,
    pub max_health: f32,
    pub max_mana: f32,
    pub damage: f32,
    pub defense: f32,
    pub mana_regen_per_second: f32,
    pub spawn_position: Vec3,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            sprint_multiplier: 1.6,
            half_extents: Vec3::new(0.3, 0.9, 0.3),
            radius: 0.4,
            max_health: 100.0,
            max_mana: 100.0,
            damage: 10.0,
            defense: 5.0,
            mana_regen_per_second: 2.0,
            spawn_position: Vec3::ZERO,
        }
    }
}

/// The controlled avatar.
#[derive(Debug, Clone)]
pub struct Player {
    pub position: Vec3,
    pub yaw: f32,
    pub vitals: Vitals,
    config: PlayerConfig,
}

impl Player {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            position: config.spawn_position,
            yaw: std::f32::consts::PI,
            vitals: Vitals::new(config.max_health, config.max_mana, config.damage, config.defense),
            config,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Where the held move keys would take the player this tick. Turns the
    /// player to face the movement direction.
    pub fn desired_position(&mut self, input: &InputSnapshot, dt: f32) -> Vec3 {
        if self.vitals.is_dead() {
            return self.position;
        }
        let direction = input.move_direction();
        if direction == Vec3::ZERO {
            return self.position;
        }
        if let Some(yaw) = yaw_towards(direction) {
            self.yaw = yaw;
        }
        let mut speed = self.config.move_speed;
        if input.is_down(InputAction::Sprint) {
            speed *= self.config.sprint_multiplier;
        }
        self.position + direction * speed * dt
    }

    pub fn forward(&self) -> Vec3 {
        forward_from_yaw(self.yaw)
    }

    pub fn regenerate(&mut self, dt: f32) {
        if self.vitals.is_dead() {
            return;
        }
        self.vitals
            .restore_mana(self.config.mana_regen_per_second * dt);
    }

    pub fn respawn(&mut self) {
        *self = Self::new(self.config);
    }
}

impl Combatant for Player {
    fn combatant_id(&self) -> CombatantId {
        CombatantId::Player
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

/// Another live avatar sharing the scene. The surrounding application owns
/// its position; the core only collides with it and targets it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAvatar {
    pub id: u64,
    pub position: Vec3,
    pub radius: f32,
    pub vitals: Vitals,
}

impl RemoteAvatar {
    pub fn new(id: u64, position: Vec3) -> Self {
        Self {
            id,
            position,
            radius: 0.4,
            vitals: Vitals::new(100.0, 100.0, 10.0, 5.0),
        }
    }
}

impl Combatant for RemoteAvatar {
    fn combatant_id(&self) -> CombatantId {
        CombatantId::Avatar(self.id)
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

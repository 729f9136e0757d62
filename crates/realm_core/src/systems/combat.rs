//! Skill cooldowns, target selection and damage resolution for the
//! controlled player. Combatants are reached only through [`Combatant`].

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::geometry::planar;
use crate::app::{EntityId, SimEvent, SimEventBus};

/// Targets whose direction has a dot product with the caster's forward above
/// this value are inside the melee arc (about 168 degrees wide).
pub const MELEE_ARC_DOT_THRESHOLD: f32 = -0.2;
pub const FLOATING_NUMBER_LIFETIME_SECONDS: f32 = 1.0;
pub const FLOATING_NUMBER_RISE_PER_SECOND: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    Melee,
    Ranged,
    Heal,
    Buff,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skill {
    pub id: String,
    pub name: String,
    /// Negative values heal.
    pub damage: f32,
    pub mana_cost: f32,
    pub cooldown: f32,
    pub range: f32,
    pub kind: SkillKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkillState {
    pub current_cooldown: f32,
    pub ready: bool,
}

impl Default for SkillState {
    fn default() -> Self {
        Self {
            current_cooldown: 0.0,
            ready: true,
        }
    }
}

pub fn default_skills() -> Vec<Skill> {
    vec![
        Skill {
            id: "slash".to_string(),
            name: "Slash".to_string(),
            damage: 20.0,
            mana_cost: 0.0,
            cooldown: 1.0,
            range: 2.5,
            kind: SkillKind::Melee,
        },
        Skill {
            id: "fireball".to_string(),
            name: "Fireball".to_string(),
            damage: 35.0,
            mana_cost: 20.0,
            cooldown: 3.0,
            range: 15.0,
            kind: SkillKind::Ranged,
        },
        Skill {
            id: "heal".to_string(),
            name: "Heal".to_string(),
            damage: -30.0,
            mana_cost: 25.0,
            cooldown: 8.0,
            range: 0.0,
            kind: SkillKind::Heal,
        },
        Skill {
            id: "battle_cry".to_string(),
            name: "Battle Cry".to_string(),
            damage: 0.0,
            mana_cost: 15.0,
            cooldown: 20.0,
            range: 0.0,
            kind: SkillKind::Buff,
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CombatantId {
    Player,
    Npc(EntityId),
    Avatar(u64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vitals {
    pub health: f32,
    pub max_health: f32,
    pub mana: f32,
    pub max_mana: f32,
    pub damage: f32,
    pub defense: f32,
}

impl Vitals {
    pub fn new(max_health: f32, max_mana: f32, damage: f32, defense: f32) -> Self {
        Self {
            health: max_health,
            max_health,
            mana: max_mana,
            max_mana,
            damage,
            defense,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Returns true when this hit took the last of the health.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        if self.is_dead() {
            return false;
        }
        self.health = (self.health - amount as f32).max(0.0);
        self.is_dead()
    }

    pub fn heal(&mut self, amount: f32) {
        if self.is_dead() || !amount.is_finite() || amount <= 0.0 {
            return;
        }
        self.health = (self.health + amount).min(self.max_health);
    }

    pub fn restore_mana(&mut self, amount: f32) {
        if !amount.is_finite() || amount <= 0.0 {
            return;
        }
        self.mana = (self.mana + amount).min(self.max_mana);
    }

    pub fn spend_mana(&mut self, amount: f32) -> bool {
        if amount > self.mana {
            return false;
        }
        self.mana -= amount.max(0.0);
        true
    }
}

/// Capability contract for anything that can deal or receive damage.
pub trait Combatant {
    fn combatant_id(&self) -> CombatantId;
    fn position(&self) -> Vec3;
    fn vitals(&self) -> &Vitals;
    fn vitals_mut(&mut self) -> &mut Vitals;

    fn is_dead(&self) -> bool {
        self.vitals().is_dead()
    }

    fn take_damage(&mut self, amount: u32) -> bool {
        self.vitals_mut().take_damage(amount)
    }

    fn heal(&mut self, amount: f32) {
        self.vitals_mut().heal(amount);
    }
}

/// `max(1, round((base + caller_damage * 0.5) * (1 - def / (def + 100))))`.
pub fn compute_damage(skill_base_damage: f32, caller_damage: f32, defense: f32) -> u32 {
    let defense = if defense.is_nan() { 0.0 } else { defense.max(0.0) };
    let mitigation = 1.0 - defense / (defense + 100.0);
    let raw = ((skill_base_damage + caller_damage * 0.5) * mitigation).round();
    if !raw.is_finite() || raw < 1.0 {
        1
    } else {
        raw as u32
    }
}

/// A damage readout anchored in world space; UI projects it to the screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatingNumber {
    pub target: CombatantId,
    pub anchor: Vec3,
    pub amount: u32,
    pub age: f32,
}

impl FloatingNumber {
    pub fn position(&self) -> Vec3 {
        self.anchor + Vec3::Y * (self.age * FLOATING_NUMBER_RISE_PER_SECOND)
    }

    pub fn opacity(&self) -> f32 {
        (1.0 - self.age / FLOATING_NUMBER_LIFETIME_SECONDS).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct CombatSystem {
    skills: Vec<Skill>,
    states: Vec<SkillState>,
    floating_numbers: Vec<FloatingNumber>,
}

impl Default for CombatSystem {
    fn default() -> Self {
        Self::new(default_skills())
    }
}

impl CombatSystem {
    pub fn new(skills: Vec<Skill>) -> Self {
        let states = vec![SkillState::default(); skills.len()];
        Self {
            skills,
            states,
            floating_numbers: Vec::new(),
        }
    }

    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    pub fn skill_state(&self, slot: usize) -> Option<SkillState> {
        self.states.get(slot).copied()
    }

    pub fn floating_numbers(&self) -> &[FloatingNumber] {
        &self.floating_numbers
    }

    pub fn reset(&mut self) {
        self.states.fill(SkillState::default());
        self.floating_numbers.clear();
    }

    /// Activates a skill slot. Returns false without touching any state when
    /// the slot is cooling down or the caster lacks mana.
    pub fn use_skill(
        &mut self,
        slot: usize,
        caster: &mut dyn Combatant,
        forward: Vec3,
        targets: &mut [&mut dyn Combatant],
        events: &mut SimEventBus,
    ) -> bool {
        let (Some(skill), Some(state)) = (self.skills.get(slot), self.states.get(slot)) else {
            return false;
        };
        if !state.ready || state.current_cooldown > 0.0 || caster.is_dead() {
            return false;
        }
        if !caster.vitals_mut().spend_mana(skill.mana_cost) {
            return false;
        }
        let skill = skill.clone();
        self.states[slot] = SkillState {
            current_cooldown: skill.cooldown.max(0.0),
            ready: skill.cooldown <= 0.0,
        };
        events.emit(SimEvent::SkillUsed {
            slot,
            kind: skill.kind,
        });
        debug!(slot, skill = %skill.id, "skill_used");

        match skill.kind {
            SkillKind::Heal => caster.heal(skill.damage.abs()),
            SkillKind::Buff => {}
            SkillKind::Melee | SkillKind::Ranged => {
                self.perform_attack(slot, &skill, caster, forward, targets, events);
            }
        }
        true
    }

    /// Hits every live target in range (and, for melee, inside the facing
    /// arc). Returns how many targets were hit.
    pub fn perform_attack(
        &mut self,
        slot: usize,
        skill: &Skill,
        caster: &dyn Combatant,
        forward: Vec3,
        targets: &mut [&mut dyn Combatant],
        events: &mut SimEventBus,
    ) -> usize {
        let caster_id = caster.combatant_id();
        let caster_position = caster.position();
        let caster_damage = caster.vitals().damage;
        let forward = planar(forward).normalize_or_zero();

        let mut hits = 0usize;
        for target in targets.iter_mut() {
            if target.is_dead() || target.combatant_id() == caster_id {
                continue;
            }
            let offset = planar(target.position() - caster_position);
            if offset.length() > skill.range {
                continue;
            }
            if skill.kind == SkillKind::Melee {
                let direction = offset.normalize_or_zero();
                if direction != Vec3::ZERO
                    && forward != Vec3::ZERO
                    && direction.dot(forward) <= MELEE_ARC_DOT_THRESHOLD
                {
                    continue;
                }
            }

            let amount = compute_damage(skill.damage, caster_damage, target.vitals().defense);
            let killed = target.take_damage(amount);
            let target_id = target.combatant_id();
            events.emit(SimEvent::DamageDealt {
                target: target_id,
                amount,
                slot,
            });
            self.push_floating_number(target_id, target.position(), amount);
            if killed {
                events.emit(SimEvent::TargetKilled { target: target_id });
            }
            hits += 1;
        }
        hits
    }

    /// NPC attack landing on a combatant. NPC hits carry no caller bonus.
    pub fn apply_incoming_attack(
        &mut self,
        source: EntityId,
        base_damage: f32,
        target: &mut dyn Combatant,
        events: &mut SimEventBus,
    ) -> u32 {
        if target.is_dead() {
            return 0;
        }
        let amount = compute_damage(base_damage, 0.0, target.vitals().defense);
        let killed = target.take_damage(amount);
        events.emit(SimEvent::DamageReceived { source, amount });
        self.push_floating_number(target.combatant_id(), target.position(), amount);
        if killed {
            events.emit(SimEvent::TargetKilled {
                target: target.combatant_id(),
            });
        }
        amount
    }

    /// Advances cooldowns and readouts. No targeting happens here.
    pub fn update(&mut self, dt: f32, events: &mut SimEventBus) {
        for (slot, state) in self.states.iter_mut().enumerate() {
            if state.current_cooldown <= 0.0 {
                continue;
            }
            state.current_cooldown = (state.current_cooldown - dt).max(0.0);
            if state.current_cooldown == 0.0 {
                state.ready = true;
            }
            events.emit(SimEvent::SkillCooldown {
                slot,
                remaining: state.current_cooldown,
            });
        }

        for number in &mut self.floating_numbers {
            number.age += dt;
        }
        self.floating_numbers
            .retain(|number| number.age < FLOATING_NUMBER_LIFETIME_SECONDS);
    }

    fn push_floating_number(&mut self, target: CombatantId, anchor: Vec3, amount: u32) {
        self.floating_numbers.push(FloatingNumber {
            target,
            anchor,
            amount,
            age: 0.0,
        });
    }
}

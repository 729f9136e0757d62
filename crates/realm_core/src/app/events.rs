use crate::systems::{CombatantId, NpcState, SkillKind};

use super::world::EntityId;

/// Notifications for layers outside the core. They are queued in emission
/// order and handed out by `Simulation::drain_events`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    TriggerEnter {
        entity_id: EntityId,
    },
    TriggerExit {
        entity_id: EntityId,
    },
    Interact {
        entity_id: EntityId,
    },
    NpcStateChanged {
        entity_id: EntityId,
        from: NpcState,
        to: NpcState,
    },
    NpcAttack {
        entity_id: EntityId,
        damage: f32,
    },
    DamageDealt {
        target: CombatantId,
        amount: u32,
        slot: usize,
    },
    DamageReceived {
        source: EntityId,
        amount: u32,
    },
    SkillUsed {
        slot: usize,
        kind: SkillKind,
    },
    SkillCooldown {
        slot: usize,
        remaining: f32,
    },
    TargetKilled {
        target: CombatantId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEventKind {
    TriggerEnter,
    TriggerExit,
    Interact,
    NpcStateChanged,
    NpcAttack,
    DamageDealt,
    DamageReceived,
    SkillUsed,
    SkillCooldown,
    TargetKilled,
}

impl SimEvent {
    pub fn kind(&self) -> SimEventKind {
        match self {
            Self::TriggerEnter { .. } => SimEventKind::TriggerEnter,
            Self::TriggerExit { .. } => SimEventKind::TriggerExit,
            Self::Interact { .. } => SimEventKind::Interact,
            Self::NpcStateChanged { .. } => SimEventKind::NpcStateChanged,
            Self::NpcAttack { .. } => SimEventKind::NpcAttack,
            Self::DamageDealt { .. } => SimEventKind::DamageDealt,
            Self::DamageReceived { .. } => SimEventKind::DamageReceived,
            Self::SkillUsed { .. } => SimEventKind::SkillUsed,
            Self::SkillCooldown { .. } => SimEventKind::SkillCooldown,
            Self::TargetKilled { .. } => SimEventKind::TargetKilled,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimEventCounts {
    pub total: u32,
    pub trigger: u32,
    pub interact: u32,
    pub npc_state_changed: u32,
    pub npc_attack: u32,
    pub damage: u32,
    pub skill: u32,
    pub target_killed: u32,
}

impl SimEventCounts {
    fn record(&mut self, kind: SimEventKind) {
        self.total = self.total.saturating_add(1);
        match kind {
            SimEventKind::TriggerEnter | SimEventKind::TriggerExit => {
                self.trigger = self.trigger.saturating_add(1)
            }
            SimEventKind::Interact => self.interact = self.interact.saturating_add(1),
            SimEventKind::NpcStateChanged => {
                self.npc_state_changed = self.npc_state_changed.saturating_add(1)
            }
            SimEventKind::NpcAttack => self.npc_attack = self.npc_attack.saturating_add(1),
            SimEventKind::DamageDealt | SimEventKind::DamageReceived => {
                self.damage = self.damage.saturating_add(1)
            }
            SimEventKind::SkillUsed | SimEventKind::SkillCooldown => {
                self.skill = self.skill.saturating_add(1)
            }
            SimEventKind::TargetKilled => {
                self.target_killed = self.target_killed.saturating_add(1)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct SimEventBus {
    pending: Vec<SimEvent>,
    tick_start: usize,
    last_tick_counts: SimEventCounts,
}

impl SimEventBus {
    pub fn begin_tick(&mut self) {
        self.tick_start = self.pending.len();
    }

    pub fn emit(&mut self, event: SimEvent) {
        self.pending.push(event);
    }

    pub fn iter_emitted_this_tick(&self) -> impl Iterator<Item = &SimEvent> {
        self.pending[self.tick_start.min(self.pending.len())..].iter()
    }

    pub fn finish_tick(&mut self) {
        let mut counts = SimEventCounts::default();
        for event in self.iter_emitted_this_tick() {
            counts.record(event.kind());
        }
        self.last_tick_counts = counts;
    }

    pub fn last_tick_counts(&self) -> SimEventCounts {
        self.last_tick_counts
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn drain(&mut self) -> Vec<SimEvent> {
        self.tick_start = 0;
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_cover_only_the_finished_tick() {
        let mut bus = SimEventBus::default();
        bus.begin_tick();
        bus.emit(SimEvent::TriggerEnter {
            entity_id: EntityId(1),
        });
        bus.emit(SimEvent::Interact {
            entity_id: EntityId(2),
        });
        bus.finish_tick();
        assert_eq!(bus.last_tick_counts().total, 2);
        assert_eq!(bus.last_tick_counts().trigger, 1);

        bus.begin_tick();
        bus.emit(SimEvent::TriggerExit {
            entity_id: EntityId(1),
        });
        assert_eq!(bus.iter_emitted_this_tick().count(), 1);
        bus.finish_tick();
        assert_eq!(bus.last_tick_counts().total, 1);
        assert_eq!(bus.pending_len(), 3);
    }

    #[test]
    fn drain_preserves_emission_order() {
        let mut bus = SimEventBus::default();
        bus.begin_tick();
        bus.emit(SimEvent::TriggerEnter {
            entity_id: EntityId(5),
        });
        bus.emit(SimEvent::TriggerExit {
            entity_id: EntityId(5),
        });
        let drained = bus.drain();
        assert_eq!(
            drained,
            vec![
                SimEvent::TriggerEnter {
                    entity_id: EntityId(5)
                },
                SimEvent::TriggerExit {
                    entity_id: EntityId(5)
                },
            ]
        );
        assert_eq!(bus.pending_len(), 0);
        assert_eq!(bus.iter_emitted_this_tick().count(), 0);
    }
}

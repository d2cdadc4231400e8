use engine::{EntityId, Vec2};
use serde::Serialize;

use crate::agent::AgentState;
use crate::combat::{CombatRole, EffectKind};

/// Fire-and-forget notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CombatEvent {
    EffectApplied {
        target: EntityId,
        kind: EffectKind,
        magnitude: i32,
        duration_seconds: f32,
    },
    EffectExpired {
        target: EntityId,
        kind: EffectKind,
    },
    HitReaction {
        target: EntityId,
        amount: u32,
        remaining_health: u32,
    },
    Died {
        entity: EntityId,
        role: CombatRole,
    },
    ChallengeKill {
        challenge_id: String,
    },
    ChallengeCompleted {
        challenge_id: String,
    },
    AttackTelegraphed {
        attacker: EntityId,
    },
    AttackResolved {
        attacker: EntityId,
        hit: bool,
    },
    EnemyStateChanged {
        enemy: EntityId,
        from: AgentState,
        to: AgentState,
    },
    EnemySpawned {
        enemy: EntityId,
        def_name: String,
        challenge_id: Option<String>,
    },
    EnemyDespawned {
        enemy: EntityId,
    },
    LootDropped {
        source: EntityId,
        item: String,
        position: Vec2,
    },
    PlayerHealed {
        amount: u32,
        health: u32,
    },
    PlayerAttackDenied,
    ItemConsumed {
        item: String,
        applied: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatEventKind {
    EffectApplied,
    EffectExpired,
    HitReaction,
    Died,
    ChallengeKill,
    ChallengeCompleted,
    AttackTelegraphed,
    AttackResolved,
    EnemyStateChanged,
    EnemySpawned,
    EnemyDespawned,
    LootDropped,
    PlayerHealed,
    PlayerAttackDenied,
    ItemConsumed,
}

impl CombatEvent {
    pub fn kind(&self) -> CombatEventKind {
        match self {
            Self::EffectApplied { .. } => CombatEventKind::EffectApplied,
            Self::EffectExpired { .. } => CombatEventKind::EffectExpired,
            Self::HitReaction { .. } => CombatEventKind::HitReaction,
            Self::Died { .. } => CombatEventKind::Died,
            Self::ChallengeKill { .. } => CombatEventKind::ChallengeKill,
            Self::ChallengeCompleted { .. } => CombatEventKind::ChallengeCompleted,
            Self::AttackTelegraphed { .. } => CombatEventKind::AttackTelegraphed,
            Self::AttackResolved { .. } => CombatEventKind::AttackResolved,
            Self::EnemyStateChanged { .. } => CombatEventKind::EnemyStateChanged,
            Self::EnemySpawned { .. } => CombatEventKind::EnemySpawned,
            Self::EnemyDespawned { .. } => CombatEventKind::EnemyDespawned,
            Self::LootDropped { .. } => CombatEventKind::LootDropped,
            Self::PlayerHealed { .. } => CombatEventKind::PlayerHealed,
            Self::PlayerAttackDenied => CombatEventKind::PlayerAttackDenied,
            Self::ItemConsumed { .. } => CombatEventKind::ItemConsumed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CombatEventCounts {
    pub total: u32,
    pub effect_applied: u32,
    pub effect_expired: u32,
    pub hit_reaction: u32,
    pub died: u32,
    pub challenge_kill: u32,
    pub challenge_completed: u32,
    pub attack_telegraphed: u32,
    pub attack_resolved: u32,
    pub enemy_state_changed: u32,
    pub enemy_spawned: u32,
    pub enemy_despawned: u32,
    pub loot_dropped: u32,
    pub player_healed: u32,
    pub player_attack_denied: u32,
    pub item_consumed: u32,
}

impl CombatEventCounts {
    pub fn record(&mut self, kind: CombatEventKind) {
        self.total = self.total.saturating_add(1);
        let slot = match kind {
            CombatEventKind::EffectApplied => &mut self.effect_applied,
            CombatEventKind::EffectExpired => &mut self.effect_expired,
            CombatEventKind::HitReaction => &mut self.hit_reaction,
            CombatEventKind::Died => &mut self.died,
            CombatEventKind::ChallengeKill => &mut self.challenge_kill,
            CombatEventKind::ChallengeCompleted => &mut self.challenge_completed,
            CombatEventKind::AttackTelegraphed => &mut self.attack_telegraphed,
            CombatEventKind::AttackResolved => &mut self.attack_resolved,
            CombatEventKind::EnemyStateChanged => &mut self.enemy_state_changed,
            CombatEventKind::EnemySpawned => &mut self.enemy_spawned,
            CombatEventKind::EnemyDespawned => &mut self.enemy_despawned,
            CombatEventKind::LootDropped => &mut self.loot_dropped,
            CombatEventKind::PlayerHealed => &mut self.player_healed,
            CombatEventKind::PlayerAttackDenied => &mut self.player_attack_denied,
            CombatEventKind::ItemConsumed => &mut self.item_consumed,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Collects events until the presentation layer drains them.
#[derive(Debug, Default)]
pub struct EventBus {
    pending: Vec<CombatEvent>,
    last_update_counts: CombatEventCounts,
    current_update_counts: CombatEventCounts,
    totals: CombatEventCounts,
}

impl EventBus {
    pub fn emit(&mut self, event: CombatEvent) {
        let kind = event.kind();
        self.current_update_counts.record(kind);
        self.totals.record(kind);
        self.pending.push(event);
    }

    pub fn iter_pending(&self) -> impl Iterator<Item = &CombatEvent> {
        self.pending.iter()
    }

    pub fn drain(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn finish_update_rollover(&mut self) {
        self.last_update_counts = std::mem::take(&mut self.current_update_counts);
    }

    pub fn last_update_counts(&self) -> CombatEventCounts {
        self.last_update_counts
    }

    pub fn totals(&self) -> CombatEventCounts {
        self.totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_roll_over_per_update_and_accumulate_totals() {
        let mut bus = EventBus::default();
        bus.emit(CombatEvent::PlayerAttackDenied);
        bus.emit(CombatEvent::AttackTelegraphed {
            attacker: EntityId(3),
        });
        bus.finish_update_rollover();
        assert_eq!(bus.last_update_counts().total, 2);
        assert_eq!(bus.last_update_counts().player_attack_denied, 1);

        bus.emit(CombatEvent::PlayerAttackDenied);
        bus.finish_update_rollover();
        assert_eq!(bus.last_update_counts().total, 1);
        assert_eq!(bus.totals().player_attack_denied, 2);
        assert_eq!(bus.drain().len(), 3);
        assert_eq!(bus.iter_pending().count(), 0);
    }

    #[test]
    fn events_serialize_with_snake_case_tag() {
        let value = serde_json::to_value(CombatEvent::ChallengeKill {
            challenge_id: "arena".to_string(),
        })
        .expect("serialize");
        assert_eq!(value["event"], "challenge_kill");
        assert_eq!(value["challenge_id"], "arena");
    }
}

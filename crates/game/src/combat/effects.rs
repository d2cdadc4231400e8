//! Timed stat grants.
//!
//! Each application of an effect is an independent instance with its own
//! ledger modifier (or invincibility grant) and its own expiry timer, so
//! re-applying an effect stacks rather than refreshing. Expiry arrives as an
//! [`EffectExpiry`] payload through whatever timer action type the owner uses.

use std::collections::BTreeMap;

use engine::{EntityId, TimerHandle, TimerScheduler};
use serde::Serialize;
use tracing::{debug, info};

use super::combatant::Combatant;
use super::ledger::{ModifierHandle, StatKind};
use crate::events::{CombatEvent, EventBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Speed,
    Damage,
    Invincibility,
}

impl EffectKind {
    fn stat(self) -> Option<StatKind> {
        match self {
            Self::Speed => Some(StatKind::Speed),
            Self::Damage => Some(StatKind::Damage),
            Self::Invincibility => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EffectId(u64);

/// Timer payload that ends one effect instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectExpiry {
    pub owner: EntityId,
    pub effect: EffectId,
}

#[derive(Debug, Clone, Copy)]
struct ActiveEffect {
    kind: EffectKind,
    modifier: Option<ModifierHandle>,
    timer: TimerHandle,
}

#[derive(Debug)]
pub struct StatusEffectEngine {
    owner: EntityId,
    next_id: u64,
    active: BTreeMap<EffectId, ActiveEffect>,
}

impl StatusEffectEngine {
    pub fn new(owner: EntityId) -> Self {
        Self {
            owner,
            next_id: 0,
            active: BTreeMap::new(),
        }
    }

    pub fn add_speed<A: From<EffectExpiry>>(
        &mut self,
        target: &mut Combatant,
        timers: &mut TimerScheduler<A>,
        events: &mut EventBus,
        magnitude: i32,
        duration_seconds: f32,
    ) -> Option<EffectId> {
        self.apply(
            EffectKind::Speed,
            magnitude,
            duration_seconds,
            target,
            timers,
            events,
        )
    }

    pub fn add_damage<A: From<EffectExpiry>>(
        &mut self,
        target: &mut Combatant,
        timers: &mut TimerScheduler<A>,
        events: &mut EventBus,
        magnitude: i32,
        duration_seconds: f32,
    ) -> Option<EffectId> {
        self.apply(
            EffectKind::Damage,
            magnitude,
            duration_seconds,
            target,
            timers,
            events,
        )
    }

    pub fn add_invincibility<A: From<EffectExpiry>>(
        &mut self,
        target: &mut Combatant,
        timers: &mut TimerScheduler<A>,
        events: &mut EventBus,
        duration_seconds: f32,
    ) -> Option<EffectId> {
        self.apply(
            EffectKind::Invincibility,
            0,
            duration_seconds,
            target,
            timers,
            events,
        )
    }

    fn apply<A: From<EffectExpiry>>(
        &mut self,
        kind: EffectKind,
        magnitude: i32,
        duration_seconds: f32,
        target: &mut Combatant,
        timers: &mut TimerScheduler<A>,
        events: &mut EventBus,
    ) -> Option<EffectId> {
        if !target.is_alive() {
            debug!(target = ?target.id(), ?kind, "effect_skipped_dead_target");
            return None;
        }

        let modifier = match kind.stat() {
            Some(stat) => Some(target.ledger_mut().grant(stat, magnitude)),
            None => {
                target.grant_invincibility();
                None
            }
        };
        let effect = EffectId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        let timer = timers.schedule(
            duration_seconds,
            A::from(EffectExpiry {
                owner: self.owner,
                effect,
            }),
        );
        self.active.insert(
            effect,
            ActiveEffect {
                kind,
                modifier,
                timer,
            },
        );

        info!(
            target = ?self.owner,
            ?kind,
            magnitude,
            duration_seconds,
            "effect_applied"
        );
        events.emit(CombatEvent::EffectApplied {
            target: self.owner,
            kind,
            magnitude,
            duration_seconds,
        });
        Some(effect)
    }

    /// Ends one instance, undoing exactly what it granted. Returns false for
    /// instances that already ended.
    pub fn expire(
        &mut self,
        effect: EffectId,
        target: &mut Combatant,
        events: &mut EventBus,
    ) -> bool {
        let Some(active) = self.active.remove(&effect) else {
            return false;
        };
        Self::undo(active, target);
        debug!(target = ?self.owner, kind = ?active.kind, "effect_expired");
        events.emit(CombatEvent::EffectExpired {
            target: self.owner,
            kind: active.kind,
        });
        true
    }

    /// Drops every instance without firing expiry notifications.
    pub fn cancel_all<A>(&mut self, target: &mut Combatant, timers: &mut TimerScheduler<A>) -> usize {
        let cancelled = self.active.len();
        for (_, active) in std::mem::take(&mut self.active) {
            timers.cancel(active.timer);
            Self::undo(active, target);
        }
        target.clear_invincibility();
        cancelled
    }

    fn undo(active: ActiveEffect, target: &mut Combatant) {
        match active.modifier {
            Some(handle) => {
                target.ledger_mut().revoke(handle);
            }
            None => target.release_invincibility(),
        }
    }

    pub fn is_active(&self, kind: EffectKind) -> bool {
        self.active.values().any(|active| active.kind == kind)
    }

    pub fn active_count(&self, kind: EffectKind) -> usize {
        self.active
            .values()
            .filter(|active| active.kind == kind)
            .count()
    }

    /// Longest remaining time among active instances of `kind`.
    pub fn remaining<A>(&self, kind: EffectKind, timers: &TimerScheduler<A>) -> Option<f32> {
        self.active
            .values()
            .filter(|active| active.kind == kind)
            .filter_map(|active| timers.remaining(active.timer))
            .reduce(f32::max)
    }
}

#[cfg(test)]
mod tests {
    use engine::Vec2;

    use super::*;
    use crate::combat::{BaseStats, CombatRole};

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Expiry(EffectExpiry);

    impl From<EffectExpiry> for Expiry {
        fn from(value: EffectExpiry) -> Self {
            Self(value)
        }
    }

    struct Harness {
        target: Combatant,
        effects: StatusEffectEngine,
        timers: TimerScheduler<Expiry>,
        events: EventBus,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                target: Combatant::new(
                    EntityId(9),
                    CombatRole::Player,
                    BaseStats {
                        max_health: 10,
                        move_speed: 3.0,
                        damage: 1,
                    },
                    Vec2::ZERO,
                ),
                effects: StatusEffectEngine::new(EntityId(9)),
                timers: TimerScheduler::new(),
                events: EventBus::default(),
            }
        }

        fn advance(&mut self, dt: f32) {
            for fired in self.timers.advance(dt) {
                self.effects
                    .expire(fired.action.0.effect, &mut self.target, &mut self.events);
            }
        }
    }

    #[test]
    fn speed_boost_applies_immediately_and_expires() {
        let mut h = Harness::new();
        h.effects
            .add_speed(&mut h.target, &mut h.timers, &mut h.events, 5, 2.0)
            .expect("applied");
        assert!((h.target.effective(StatKind::Speed) - 8.0).abs() < f32::EPSILON);

        h.advance(1.9);
        assert!(h.effects.is_active(EffectKind::Speed));
        h.advance(0.2);
        assert!((h.target.effective(StatKind::Speed) - 3.0).abs() < f32::EPSILON);
        assert!(!h.effects.is_active(EffectKind::Speed));
    }

    #[test]
    fn overlapping_damage_grants_stack_and_expire_independently() {
        let mut h = Harness::new();
        h.effects
            .add_damage(&mut h.target, &mut h.timers, &mut h.events, 1, 3.0)
            .expect("first");
        h.advance(1.0);
        h.effects
            .add_damage(&mut h.target, &mut h.timers, &mut h.events, 1, 3.0)
            .expect("second");

        h.advance(1.5);
        assert_eq!(h.target.effective_damage(), 3);
        assert_eq!(h.effects.active_count(EffectKind::Damage), 2);
        h.advance(1.0);
        assert_eq!(h.target.effective_damage(), 2);
        h.advance(1.0);
        assert_eq!(h.target.effective_damage(), 1);
    }

    #[test]
    fn shorter_invincibility_does_not_cut_longer_one_short() {
        let mut h = Harness::new();
        h.effects
            .add_invincibility(&mut h.target, &mut h.timers, &mut h.events, 5.0)
            .expect("long");
        h.effects
            .add_invincibility(&mut h.target, &mut h.timers, &mut h.events, 1.0)
            .expect("short");

        h.advance(1.5);
        assert!(h.target.is_invincible());
        h.advance(4.0);
        assert!(!h.target.is_invincible());
    }

    #[test]
    fn remaining_reports_longest_instance() {
        let mut h = Harness::new();
        h.effects
            .add_speed(&mut h.target, &mut h.timers, &mut h.events, 1, 2.0)
            .expect("short");
        h.effects
            .add_speed(&mut h.target, &mut h.timers, &mut h.events, 1, 4.0)
            .expect("long");
        h.advance(1.0);
        let remaining = h
            .effects
            .remaining(EffectKind::Speed, &h.timers)
            .expect("active");
        assert!((remaining - 3.0).abs() < 1e-4);
        assert_eq!(h.effects.remaining(EffectKind::Damage, &h.timers), None);
    }

    #[test]
    fn applied_and_expired_notifications_are_emitted() {
        let mut h = Harness::new();
        h.effects
            .add_speed(&mut h.target, &mut h.timers, &mut h.events, 2, 0.5)
            .expect("applied");
        h.advance(1.0);
        let events = h.events.drain();
        assert!(matches!(
            events.as_slice(),
            [
                CombatEvent::EffectApplied {
                    kind: EffectKind::Speed,
                    magnitude: 2,
                    ..
                },
                CombatEvent::EffectExpired {
                    kind: EffectKind::Speed,
                    ..
                }
            ]
        ));
    }

    #[test]
    fn cancel_all_reverts_without_expiry_events() {
        let mut h = Harness::new();
        h.effects
            .add_speed(&mut h.target, &mut h.timers, &mut h.events, 4, 5.0)
            .expect("speed");
        h.effects
            .add_invincibility(&mut h.target, &mut h.timers, &mut h.events, 5.0)
            .expect("invincible");
        h.events.drain();

        assert_eq!(h.effects.cancel_all(&mut h.target, &mut h.timers), 2);
        assert_eq!(h.timers.pending_count(), 0);
        assert!(!h.target.is_invincible());
        assert!((h.target.effective(StatKind::Speed) - 3.0).abs() < f32::EPSILON);
        h.advance(10.0);
        assert!(h.events.drain().is_empty());
    }

    #[test]
    fn dead_target_gets_no_effect() {
        let mut h = Harness::new();
        h.target.shut_down_body();
        assert!(h
            .effects
            .add_damage(&mut h.target, &mut h.timers, &mut h.events, 3, 1.0)
            .is_none());
        assert_eq!(h.timers.pending_count(), 0);
    }
}

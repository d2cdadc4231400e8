//! Player controller: movement, the melee attack gauge and item use.
//!
//! The gauge holds up to `max_attack_points`. Each attack spends one and is
//! followed by a short `attack_cooldown` lockout. While the gauge is below
//! maximum a single recharge chain restores one point every `recharge_delay`.

use engine::{EntityId, ItemDef, PlayerDef, TimerHandle, TimerScheduler, Vec2};
use tracing::{debug, info};

use crate::combat::{
    take_damage, BaseStats, CombatRole, Combatant, DamageOutcome, EffectExpiry, EffectId,
    MeleeStrike, StatusEffectEngine,
};
use crate::events::{CombatEvent, EventBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerTimer {
    AttackReady,
    Recharge,
}

#[derive(Debug)]
pub struct Player {
    def: PlayerDef,
    combatant: Combatant,
    effects: StatusEffectEngine,
    facing: Vec2,
    move_input: Vec2,
    attack_points: u32,
    attack_ready: bool,
    cooldown: Option<TimerHandle>,
    recharge: Option<TimerHandle>,
    dead: bool,
}

impl Player {
    pub fn new(id: EntityId, def: PlayerDef, position: Vec2) -> Self {
        let combatant = Combatant::new(
            id,
            CombatRole::Player,
            BaseStats {
                max_health: def.max_health,
                move_speed: def.move_speed,
                damage: def.damage,
            },
            position,
        );
        Self {
            attack_points: def.max_attack_points,
            def,
            combatant,
            effects: StatusEffectEngine::new(id),
            facing: Vec2::RIGHT,
            move_input: Vec2::ZERO,
            attack_ready: true,
            cooldown: None,
            recharge: None,
            dead: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.combatant.id()
    }

    pub fn def(&self) -> &PlayerDef {
        &self.def
    }

    pub fn combatant(&self) -> &Combatant {
        &self.combatant
    }

    pub fn combatant_mut(&mut self) -> &mut Combatant {
        &mut self.combatant
    }

    pub fn effects(&self) -> &StatusEffectEngine {
        &self.effects
    }

    pub fn position(&self) -> Vec2 {
        self.combatant.position()
    }

    pub fn facing(&self) -> Vec2 {
        self.facing
    }

    pub fn attack_points(&self) -> u32 {
        self.attack_points
    }

    pub fn can_attack(&self) -> bool {
        !self.dead && self.attack_ready && self.attack_points > 0
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Inputs longer than one unit are normalized. Horizontal input turns the
    /// player; purely vertical input keeps the current facing.
    pub fn set_move_input(&mut self, input: Vec2) {
        if self.dead || !input.is_finite() {
            return;
        }
        self.move_input = if input.length_squared() > 1.0 {
            input.normalize_or_zero()
        } else {
            input
        };
        if input.x > 0.0 {
            self.facing = Vec2::RIGHT;
        } else if input.x < 0.0 {
            self.facing = Vec2::LEFT;
        }
    }

    pub fn physics_tick(&mut self, dt: f32) {
        if self.dead {
            return;
        }
        let steering = self.move_input != Vec2::ZERO;
        if steering {
            self.combatant
                .set_velocity(self.move_input * self.combatant.effective_speed());
        }
        self.combatant.integrate(dt, steering);
    }

    /// Spends a point and returns the swing to resolve. A swing during the
    /// cooldown lockout is dropped; one with an empty gauge is denied.
    pub fn try_attack<A: From<PlayerTimer>>(
        &mut self,
        timers: &mut TimerScheduler<A>,
        events: &mut EventBus,
    ) -> Option<MeleeStrike> {
        if self.dead {
            return None;
        }
        if !self.attack_ready {
            debug!("player_attack_on_cooldown");
            return None;
        }
        if self.attack_points == 0 {
            debug!("player_attack_denied");
            events.emit(CombatEvent::PlayerAttackDenied);
            return None;
        }

        self.attack_points -= 1;
        self.attack_ready = false;
        self.cooldown = Some(timers.schedule(
            self.def.attack_cooldown,
            A::from(PlayerTimer::AttackReady),
        ));
        self.ensure_recharge(timers);

        Some(MeleeStrike {
            attacker: self.id(),
            origin: self.position(),
            facing: self.facing,
            range: self.def.attack_range,
            damage: self.combatant.effective_damage(),
            knockback: self.def.knockback,
        })
    }

    pub fn on_attack_ready(&mut self) {
        self.cooldown = None;
        if !self.dead {
            self.attack_ready = true;
        }
    }

    pub fn on_recharge<A: From<PlayerTimer>>(&mut self, timers: &mut TimerScheduler<A>) {
        self.recharge = None;
        if self.dead {
            return;
        }
        if self.attack_points < self.def.max_attack_points {
            self.attack_points += 1;
        }
        self.ensure_recharge(timers);
    }

    fn ensure_recharge<A: From<PlayerTimer>>(&mut self, timers: &mut TimerScheduler<A>) {
        if self.recharge.is_none() && self.attack_points < self.def.max_attack_points {
            self.recharge = Some(timers.schedule(
                self.def.recharge_delay,
                A::from(PlayerTimer::Recharge),
            ));
        }
    }

    pub fn heal(&mut self, amount: u32, events: &mut EventBus) -> u32 {
        let restored = self.combatant.heal(amount);
        if restored > 0 {
            events.emit(CombatEvent::PlayerHealed {
                amount: restored,
                health: self.combatant.health().current(),
            });
        }
        restored
    }

    /// Applies every effect the item carries. Returns whether anything was
    /// applied.
    pub fn consume_item<A: From<EffectExpiry>>(
        &mut self,
        item: &ItemDef,
        timers: &mut TimerScheduler<A>,
        events: &mut EventBus,
    ) -> bool {
        if self.dead {
            debug!(item = %item.def_name, "item_ignored_dead_player");
            return false;
        }

        let mut applied = false;
        if item.hp_given > 0 {
            self.heal(item.hp_given, events);
            applied = true;
        }
        if item.speed_given != 0 && item.speed_duration > 0.0 {
            applied |= self
                .effects
                .add_speed(
                    &mut self.combatant,
                    timers,
                    events,
                    item.speed_given,
                    item.speed_duration,
                )
                .is_some();
        }
        if item.damage_given != 0 && item.damage_duration > 0.0 {
            applied |= self
                .effects
                .add_damage(
                    &mut self.combatant,
                    timers,
                    events,
                    item.damage_given,
                    item.damage_duration,
                )
                .is_some();
        }
        if item.gives_invincibility && item.invincibility_duration > 0.0 {
            applied |= self
                .effects
                .add_invincibility(
                    &mut self.combatant,
                    timers,
                    events,
                    item.invincibility_duration,
                )
                .is_some();
        }

        info!(item = %item.def_name, applied, "item_consumed");
        events.emit(CombatEvent::ItemConsumed {
            item: item.def_name.clone(),
            applied,
        });
        applied
    }

    pub fn expire_effect(&mut self, effect: EffectId, events: &mut EventBus) -> bool {
        self.effects.expire(effect, &mut self.combatant, events)
    }

    pub fn apply_damage<A>(
        &mut self,
        amount: u32,
        timers: &mut TimerScheduler<A>,
        events: &mut EventBus,
    ) -> DamageOutcome {
        let outcome = take_damage(&mut self.combatant, amount);
        self.react_to_hit(outcome, amount, timers, events);
        outcome
    }

    /// Follow-up for a hit already applied to the player's combatant.
    pub fn react_to_hit<A>(
        &mut self,
        outcome: DamageOutcome,
        amount: u32,
        timers: &mut TimerScheduler<A>,
        events: &mut EventBus,
    ) {
        match outcome {
            DamageOutcome::Ignored => {}
            DamageOutcome::Damaged { remaining } => events.emit(CombatEvent::HitReaction {
                target: self.id(),
                amount,
                remaining_health: remaining,
            }),
            DamageOutcome::Killed => {
                events.emit(CombatEvent::HitReaction {
                    target: self.id(),
                    amount,
                    remaining_health: 0,
                });
                self.die(timers, events);
            }
        }
    }

    /// Terminal. Pending attack timers and every active effect are dropped
    /// without expiry notifications.
    pub fn die<A>(&mut self, timers: &mut TimerScheduler<A>, events: &mut EventBus) -> bool {
        if self.dead {
            return false;
        }
        self.dead = true;
        self.move_input = Vec2::ZERO;
        self.attack_ready = false;
        for handle in [self.cooldown.take(), self.recharge.take()].into_iter().flatten() {
            timers.cancel(handle);
        }
        let cancelled = self.effects.cancel_all(&mut self.combatant, timers);
        self.combatant.shut_down_body();

        info!(player = ?self.id(), cancelled_effects = cancelled, "player_died");
        events.emit(CombatEvent::Died {
            entity: self.id(),
            role: CombatRole::Player,
        });
        true
    }
}

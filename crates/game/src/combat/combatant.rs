use engine::{EntityId, Vec2};
use serde::Serialize;

use super::ledger::{StatKind, StatLedger};

/// Fraction of knockback velocity shed per second while a body is not steering.
const VELOCITY_DAMPING_PER_SECOND: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatRole {
    Player,
    Enemy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    current: u32,
    max: u32,
}

impl Health {
    pub fn full(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn current(self) -> u32 {
        self.current
    }

    pub fn max(self) -> u32 {
        self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseStats {
    pub max_health: u32,
    pub move_speed: f32,
    pub damage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Dead bodies ignore impulses.
    pub immovable: bool,
    /// Disabled colliders are skipped by hit detection.
    pub collider_enabled: bool,
}

/// Anything with health that can deal or receive damage.
#[derive(Debug, Clone)]
pub struct Combatant {
    id: EntityId,
    role: CombatRole,
    health: Health,
    alive: bool,
    base: BaseStats,
    ledger: StatLedger,
    invincibility_grants: u32,
    body: Body,
}

impl Combatant {
    pub fn new(id: EntityId, role: CombatRole, base: BaseStats, position: Vec2) -> Self {
        Self {
            id,
            role,
            health: Health::full(base.max_health.max(1)),
            alive: true,
            base,
            ledger: StatLedger::default(),
            invincibility_grants: 0,
            body: Body {
                position,
                velocity: Vec2::ZERO,
                immovable: false,
                collider_enabled: true,
            },
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn role(&self) -> CombatRole {
        self.role
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn base(&self) -> BaseStats {
        self.base
    }

    pub fn ledger(&self) -> &StatLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut StatLedger {
        &mut self.ledger
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn position(&self) -> Vec2 {
        self.body.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.body.velocity
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.body.position = position;
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        if !self.body.immovable {
            self.body.velocity = velocity;
        }
    }

    pub fn apply_impulse(&mut self, impulse: Vec2) {
        if !self.body.immovable && impulse.is_finite() {
            self.body.velocity += impulse;
        }
    }

    /// `base + Σ active modifiers`, unclamped.
    pub fn effective(&self, kind: StatKind) -> f32 {
        let base = match kind {
            StatKind::Speed => self.base.move_speed,
            StatKind::Damage => self.base.damage as f32,
        };
        base + self.ledger.delta(kind) as f32
    }

    pub fn effective_speed(&self) -> f32 {
        self.effective(StatKind::Speed).max(0.0)
    }

    pub fn effective_damage(&self) -> u32 {
        let total = i64::from(self.base.damage) + self.ledger.delta(StatKind::Damage);
        total.clamp(0, i64::from(u32::MAX)) as u32
    }

    pub fn is_invincible(&self) -> bool {
        self.invincibility_grants > 0
    }

    pub fn grant_invincibility(&mut self) {
        self.invincibility_grants = self.invincibility_grants.saturating_add(1);
    }

    pub fn release_invincibility(&mut self) {
        self.invincibility_grants = self.invincibility_grants.saturating_sub(1);
    }

    pub(crate) fn clear_invincibility(&mut self) {
        self.invincibility_grants = 0;
    }

    /// Restores up to `amount` health and returns how much was restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        if !self.alive {
            return 0;
        }
        let healed = self.health.current.saturating_add(amount).min(self.health.max);
        let restored = healed - self.health.current;
        self.health.current = healed;
        restored
    }

    /// Lowers health, clamped at zero. Returns true when this call killed the
    /// combatant.
    pub(crate) fn lose_health(&mut self, amount: u32) -> bool {
        let before = self.health.current;
        self.health.current = before.saturating_sub(amount);
        if before > 0 && self.health.current == 0 {
            self.alive = false;
            return true;
        }
        false
    }

    /// Freezes the body: no velocity, no impulses, no hit detection.
    pub(crate) fn shut_down_body(&mut self) {
        self.alive = false;
        self.body.velocity = Vec2::ZERO;
        self.body.immovable = true;
        self.body.collider_enabled = false;
    }

    /// Moves the body by its velocity. Bodies that are not steering lose
    /// velocity over time so knockback settles.
    pub fn integrate(&mut self, dt_seconds: f32, steering: bool) {
        if self.body.immovable {
            return;
        }
        if !steering {
            let keep = (1.0 - VELOCITY_DAMPING_PER_SECOND * dt_seconds).max(0.0);
            self.body.velocity = self.body.velocity * keep;
        }
        self.body.position += self.body.velocity * dt_seconds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combatant() -> Combatant {
        Combatant::new(
            EntityId(1),
            CombatRole::Player,
            BaseStats {
                max_health: 10,
                move_speed: 3.0,
                damage: 2,
            },
            Vec2::ZERO,
        )
    }

    #[test]
    fn heal_clamps_to_max_and_ignores_dead() {
        let mut target = combatant();
        target.lose_health(4);
        assert_eq!(target.heal(10), 4);
        assert_eq!(target.health().current(), 10);

        target.lose_health(10);
        assert!(!target.is_alive());
        assert_eq!(target.heal(5), 0);
        assert_eq!(target.health().current(), 0);
    }

    #[test]
    fn effective_stats_follow_ledger() {
        let mut target = combatant();
        let handle = target.ledger_mut().grant(StatKind::Damage, -5);
        assert_eq!(target.effective(StatKind::Damage), -3.0);
        assert_eq!(target.effective_damage(), 0);
        target.ledger_mut().revoke(handle);
        assert_eq!(target.effective_damage(), 2);

        target.ledger_mut().grant(StatKind::Speed, 5);
        assert!((target.effective_speed() - 8.0).abs() < f32::EPSILON);
    }

    #[test]
    fn invincibility_is_counted() {
        let mut target = combatant();
        target.grant_invincibility();
        target.grant_invincibility();
        target.release_invincibility();
        assert!(target.is_invincible());
        target.release_invincibility();
        assert!(!target.is_invincible());
        target.release_invincibility();
        assert!(!target.is_invincible());
    }

    #[test]
    fn shut_down_body_ignores_impulses() {
        let mut target = combatant();
        target.apply_impulse(Vec2::new(1.0, 0.0));
        target.shut_down_body();
        assert_eq!(target.velocity(), Vec2::ZERO);
        target.apply_impulse(Vec2::new(5.0, 0.0));
        target.integrate(0.1, false);
        assert_eq!(target.position(), Vec2::ZERO);
        assert!(!target.body().collider_enabled);
    }

    #[test]
    fn damping_settles_knockback() {
        let mut target = combatant();
        target.apply_impulse(Vec2::new(4.0, 0.0));
        for _ in 0..20 {
            target.integrate(0.02, false);
        }
        assert!(target.velocity().length() < 0.2);
        assert!(target.position().x > 0.0);
    }
}

use engine::{EntityId, Vec2};
use tracing::debug;

use super::combatant::Combatant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Target was already dead or invincible. Nothing changed.
    Ignored,
    Damaged { remaining: u32 },
    /// Health crossed from above zero to zero on this hit.
    Killed,
}

impl DamageOutcome {
    pub fn landed(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

pub fn take_damage(target: &mut Combatant, amount: u32) -> DamageOutcome {
    if !target.is_alive() {
        debug!(target = ?target.id(), "damage_ignored_dead_target");
        return DamageOutcome::Ignored;
    }
    if target.is_invincible() {
        debug!(target = ?target.id(), amount, "damage_ignored_invincible");
        return DamageOutcome::Ignored;
    }
    if target.lose_health(amount) {
        DamageOutcome::Killed
    } else {
        DamageOutcome::Damaged {
            remaining: target.health().current(),
        }
    }
}

/// A melee swing covering the forward half-plane of `facing` out to `range`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeleeStrike {
    pub attacker: EntityId,
    pub origin: Vec2,
    pub facing: Vec2,
    pub range: f32,
    pub damage: u32,
    pub knockback: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikeHit {
    pub target: EntityId,
    pub outcome: DamageOutcome,
}

/// Applies `strike` to every live collider in the arc and pushes each hit
/// target away from the strike origin.
pub fn resolve_strike<'a>(
    strike: &MeleeStrike,
    candidates: impl IntoIterator<Item = &'a mut Combatant>,
) -> Vec<StrikeHit> {
    let range_sq = strike.range * strike.range;
    let mut hits = Vec::new();

    for target in candidates {
        if target.id() == strike.attacker || !target.body().collider_enabled {
            continue;
        }
        let position = target.position();
        if strike.origin.distance_squared(position) > range_sq {
            continue;
        }
        let direction = strike.origin.direction_to(position);
        if strike.facing.dot(direction) <= 0.0 {
            continue;
        }

        let outcome = take_damage(target, strike.damage);
        if outcome.landed() {
            target.apply_impulse(direction * strike.knockback);
        }
        hits.push(StrikeHit {
            target: target.id(),
            outcome,
        });
    }

    hits
}

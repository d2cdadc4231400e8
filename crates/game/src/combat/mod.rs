mod combatant;
mod effects;
mod ledger;
mod resolver;

pub use combatant::{BaseStats, Body, CombatRole, Combatant, Health};
pub use effects::{EffectExpiry, EffectId, EffectKind, StatusEffectEngine};
pub use ledger::{ModifierHandle, StatKind, StatLedger};
pub use resolver::{resolve_strike, take_damage, DamageOutcome, MeleeStrike, StrikeHit};

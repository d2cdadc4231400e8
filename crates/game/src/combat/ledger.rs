//! Additive stat modifiers.
//!
//! Every grant is kept under its own handle together with the magnitude that
//! was added. Revoking subtracts exactly that magnitude back out, so grants of
//! different sizes can overlap and expire in any order.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Speed,
    Damage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModifierHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveModifier {
    kind: StatKind,
    magnitude: i32,
}

#[derive(Debug, Default, Clone)]
pub struct StatLedger {
    next_handle: u64,
    active: BTreeMap<ModifierHandle, ActiveModifier>,
    speed_delta: i64,
    damage_delta: i64,
}

impl StatLedger {
    pub fn grant(&mut self, kind: StatKind, magnitude: i32) -> ModifierHandle {
        let handle = ModifierHandle(self.next_handle);
        self.next_handle = self.next_handle.saturating_add(1);
        self.active.insert(handle, ActiveModifier { kind, magnitude });
        *self.delta_mut(kind) += i64::from(magnitude);
        handle
    }

    /// Removes a grant and returns the magnitude taken back out. Unknown or
    /// already revoked handles are a no-op.
    pub fn revoke(&mut self, handle: ModifierHandle) -> Option<i32> {
        let modifier = self.active.remove(&handle)?;
        *self.delta_mut(modifier.kind) -= i64::from(modifier.magnitude);
        Some(modifier.magnitude)
    }

    /// Running total applied on top of the base stat.
    pub fn delta(&self, kind: StatKind) -> i64 {
        match kind {
            StatKind::Speed => self.speed_delta,
            StatKind::Damage => self.damage_delta,
        }
    }

    /// Sum recomputed from the active set. Always equal to [`StatLedger::delta`].
    pub fn active_sum(&self, kind: StatKind) -> i64 {
        self.active
            .values()
            .filter(|modifier| modifier.kind == kind)
            .map(|modifier| i64::from(modifier.magnitude))
            .sum()
    }

    pub fn active_count(&self, kind: StatKind) -> usize {
        self.active
            .values()
            .filter(|modifier| modifier.kind == kind)
            .count()
    }

    pub fn is_active(&self, handle: ModifierHandle) -> bool {
        self.active.contains_key(&handle)
    }

    fn delta_mut(&mut self, kind: StatKind) -> &mut i64 {
        match kind {
            StatKind::Speed => &mut self.speed_delta,
            StatKind::Damage => &mut self.damage_delta,
        }
    }
}

use std::f32::consts::TAU;

use engine::{DropDef, EnemyDef, Vec2};
use rand::Rng;
use tracing::debug;

/// Half-width of the square a dropped unit may land in around the death point.
const DROP_SCATTER: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct LootDrop {
    pub item: String,
    pub position: Vec2,
    pub impulse: Vec2,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LootTable {
    entries: Vec<DropDef>,
    drop_force: f32,
}

impl LootTable {
    pub fn new(entries: Vec<DropDef>, drop_force: f32) -> Self {
        Self {
            entries,
            drop_force,
        }
    }

    pub fn from_enemy_def(def: &EnemyDef) -> Self {
        Self::new(def.drops.clone(), def.drop_force)
    }

    pub fn entries(&self) -> &[DropDef] {
        &self.entries
    }

    /// Rolls every entry independently. An entry fires when a sample from
    /// `[0, 100)` is at or below its chance; a zero chance never fires.
    pub fn roll<R: Rng + ?Sized>(&self, origin: Vec2, rng: &mut R) -> Vec<LootDrop> {
        let mut drops = Vec::new();
        for entry in &self.entries {
            if entry.chance <= 0.0 {
                continue;
            }
            let sample = rng.gen_range(0.0..100.0f32);
            if sample > entry.chance {
                continue;
            }

            let low = entry.min.min(entry.max);
            let high = entry.min.max(entry.max);
            let quantity = rng.gen_range(low..=high);
            debug!(item = %entry.item, quantity, sample, "loot_entry_fired");
            for _ in 0..quantity {
                let offset = Vec2::new(
                    rng.gen_range(-DROP_SCATTER..=DROP_SCATTER),
                    rng.gen_range(-DROP_SCATTER..=DROP_SCATTER),
                );
                let angle = rng.gen_range(0.0..TAU);
                drops.push(LootDrop {
                    item: entry.item.clone(),
                    position: origin + offset,
                    impulse: Vec2::new(angle.cos(), angle.sin()) * self.drop_force,
                });
            }
        }
        drops
    }
}

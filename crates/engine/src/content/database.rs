use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerDef {
    pub def_name: String,
    pub max_health: u32,
    pub move_speed: f32,
    pub damage: u32,
    pub attack_range: f32,
    pub knockback: f32,
    pub attack_cooldown: f32,
    pub recharge_delay: f32,
    pub max_attack_points: u32,
}

impl PlayerDef {
    pub fn with_name(def_name: impl Into<String>) -> Self {
        Self {
            def_name: def_name.into(),
            max_health: 15,
            move_speed: 3.0,
            damage: 1,
            attack_range: 1.5,
            knockback: 5.0,
            attack_cooldown: 0.2,
            recharge_delay: 1.0,
            max_attack_points: 5,
        }
    }
}

/// One independent roll in an enemy's loot table.
#[derive(Debug, Clone, PartialEq)]
pub struct DropDef {
    pub item: String,
    /// Percentage in `[0, 100]`.
    pub chance: f32,
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnemyDef {
    pub def_name: String,
    pub label: String,
    pub max_health: u32,
    pub move_speed: f32,
    pub damage: u32,
    pub knockback: f32,
    pub attack_range: f32,
    pub detection_range: f32,
    pub return_range: f32,
    pub attack_cooldown: f32,
    pub telegraph_duration: f32,
    pub repath_interval: f32,
    pub waypoint_threshold: f32,
    pub despawn_delay: f32,
    pub drop_force: f32,
    pub drops: Vec<DropDef>,
}

impl EnemyDef {
    pub fn with_name(def_name: impl Into<String>) -> Self {
        let def_name = def_name.into();
        Self {
            label: def_name.clone(),
            def_name,
            max_health: 2,
            move_speed: 2.4,
            damage: 1,
            knockback: 0.0,
            attack_range: 1.2,
            detection_range: 7.0,
            return_range: 12.0,
            attack_cooldown: 2.0,
            telegraph_duration: 0.4,
            repath_interval: 0.5,
            waypoint_threshold: 0.25,
            despawn_delay: 3.0,
            drop_force: 5.0,
            drops: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemDef {
    pub def_name: String,
    pub label: String,
    pub hp_given: u32,
    pub speed_given: i32,
    pub speed_duration: f32,
    pub damage_given: i32,
    pub damage_duration: f32,
    pub gives_invincibility: bool,
    pub invincibility_duration: f32,
}

impl ItemDef {
    pub fn with_name(def_name: impl Into<String>) -> Self {
        let def_name = def_name.into();
        Self {
            label: def_name.clone(),
            def_name,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeDef {
    pub def_name: String,
    pub label: String,
    /// Enemy defNames, spawned in order.
    pub enemies: Vec<String>,
    pub spawn_delay: f32,
    pub delay_before_spawn: f32,
}

impl ChallengeDef {
    pub fn with_name(def_name: impl Into<String>) -> Self {
        let def_name = def_name.into();
        Self {
            label: def_name.clone(),
            def_name,
            enemies: Vec::new(),
            spawn_delay: 0.5,
            delay_before_spawn: 1.0,
        }
    }
}

/// Merged definitions from base content and every enabled mod.
#[derive(Debug, Default, Clone)]
pub struct DefDatabase {
    players: BTreeMap<String, PlayerDef>,
    enemies: BTreeMap<String, EnemyDef>,
    items: BTreeMap<String, ItemDef>,
    challenges: BTreeMap<String, ChallengeDef>,
    fingerprint: String,
}

impl DefDatabase {
    pub fn builder() -> DefDatabaseBuilder {
        DefDatabaseBuilder::default()
    }

    pub fn player_def(&self, name: &str) -> Option<&PlayerDef> {
        self.players.get(name)
    }

    pub fn enemy_def(&self, name: &str) -> Option<&EnemyDef> {
        self.enemies.get(name)
    }

    pub fn item_def(&self, name: &str) -> Option<&ItemDef> {
        self.items.get(name)
    }

    pub fn challenge_def(&self, name: &str) -> Option<&ChallengeDef> {
        self.challenges.get(name)
    }

    pub fn player_defs(&self) -> impl Iterator<Item = &PlayerDef> {
        self.players.values()
    }

    pub fn enemy_defs(&self) -> impl Iterator<Item = &EnemyDef> {
        self.enemies.values()
    }

    pub fn item_defs(&self) -> impl Iterator<Item = &ItemDef> {
        self.items.values()
    }

    pub fn challenge_defs(&self) -> impl Iterator<Item = &ChallengeDef> {
        self.challenges.values()
    }

    /// Lowercase hex SHA-256 over the loaded XML inputs; empty for databases
    /// assembled in code.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Assembles a database in code. Later inserts replace earlier ones by defName.
#[derive(Debug, Default)]
pub struct DefDatabaseBuilder {
    database: DefDatabase,
}

impl DefDatabaseBuilder {
    pub fn player(mut self, def: PlayerDef) -> Self {
        self.database.players.insert(def.def_name.clone(), def);
        self
    }

    pub fn enemy(mut self, def: EnemyDef) -> Self {
        self.database.enemies.insert(def.def_name.clone(), def);
        self
    }

    pub fn item(mut self, def: ItemDef) -> Self {
        self.database.items.insert(def.def_name.clone(), def);
        self
    }

    pub fn challenge(mut self, def: ChallengeDef) -> Self {
        self.database.challenges.insert(def.def_name.clone(), def);
        self
    }

    pub(crate) fn fingerprint(mut self, fingerprint: String) -> Self {
        self.database.fingerprint = fingerprint;
        self
    }

    pub fn build(self) -> DefDatabase {
        self.database
    }
}

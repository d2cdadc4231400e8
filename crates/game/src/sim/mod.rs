//! The headless combat simulation.
//!
//! One [`Simulation::update`] runs, in order: delivery of finished path
//! requests, every timer whose time has come, the frame tick, then as many
//! fixed physics ticks as the clock allows.

use std::collections::BTreeMap;
use std::time::Duration;

use engine::{
    DefDatabase, EntityId, EntityIdAllocator, FixedStepClock, LoopConfig, Tilemap,
    TimerScheduler, Vec2,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::agent::{AgentContext, AgentTimer, EnemyAgent};
use crate::challenge::{ChallengeTracker, CompletionCallback, KillOutcome};
use crate::combat::{resolve_strike, CombatRole, DamageOutcome, EffectExpiry, StrikeHit};
use crate::events::{CombatEvent, CombatEventCounts, EventBus};
use crate::loot::LootDrop;
use crate::nav::GridNavigator;
use crate::player::{Player, PlayerTimer};
use crate::services::{LineOfSight, PathService, TargetLookup, TargetSnapshot};

/// Half-width of the square challenge enemies spawn in around the origin.
const CHALLENGE_SPAWN_SCATTER: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub enum SimTimer {
    Effect(EffectExpiry),
    Agent(AgentTimer),
    Player(PlayerTimer),
    SpawnChallengeEnemy {
        challenge_id: String,
        enemy_def: String,
        origin: Vec2,
    },
}

impl From<EffectExpiry> for SimTimer {
    fn from(value: EffectExpiry) -> Self {
        Self::Effect(value)
    }
}

impl From<AgentTimer> for SimTimer {
    fn from(value: AgentTimer) -> Self {
        Self::Agent(value)
    }
}

impl From<PlayerTimer> for SimTimer {
    fn from(value: PlayerTimer) -> Self {
        Self::Player(value)
    }
}

#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub seed: u64,
    pub loop_config: LoopConfig,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            loop_config: LoopConfig::default(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("player def `{0}` is not defined")]
    UnknownPlayerDef(String),
    #[error("enemy def `{0}` is not defined")]
    UnknownEnemyDef(String),
    #[error("item def `{0}` is not defined")]
    UnknownItemDef(String),
    #[error("challenge def `{0}` is not defined")]
    UnknownChallengeDef(String),
}

/// What enemies see of the player for one dispatch.
struct PlayerDirectory {
    player: TargetSnapshot,
}

impl PlayerDirectory {
    fn of(player: &Player) -> Self {
        Self {
            player: TargetSnapshot {
                id: player.id(),
                position: player.position(),
                alive: !player.is_dead(),
            },
        }
    }
}

impl TargetLookup for PlayerDirectory {
    fn find_combatant_by_role(&self, role: CombatRole) -> Option<TargetSnapshot> {
        (role == CombatRole::Player).then_some(self.player)
    }

    fn combatant(&self, id: EntityId) -> Option<TargetSnapshot> {
        (id == self.player.id).then_some(self.player)
    }
}

pub struct Simulation {
    defs: DefDatabase,
    timers: TimerScheduler<SimTimer>,
    clock: FixedStepClock,
    ids: EntityIdAllocator,
    player: Player,
    enemies: BTreeMap<EntityId, EnemyAgent>,
    paths: Box<dyn PathService>,
    sight: Box<dyn LineOfSight>,
    challenges: ChallengeTracker,
    events: EventBus,
    drops: Vec<LootDrop>,
    rng: StdRng,
}

impl Simulation {
    pub fn new(
        defs: DefDatabase,
        player_def: &str,
        player_position: Vec2,
        paths: Box<dyn PathService>,
        sight: Box<dyn LineOfSight>,
        options: SimulationOptions,
    ) -> Result<Self, SetupError> {
        let def = defs
            .player_def(player_def)
            .cloned()
            .ok_or_else(|| SetupError::UnknownPlayerDef(player_def.to_string()))?;
        let mut ids = EntityIdAllocator::default();
        let player = Player::new(ids.allocate(), def, player_position);
        info!(
            player = ?player.id(),
            seed = options.seed,
            target_tps = options.loop_config.target_tps,
            "simulation_created"
        );

        Ok(Self {
            defs,
            timers: TimerScheduler::new(),
            clock: FixedStepClock::new(&options.loop_config),
            ids,
            player,
            enemies: BTreeMap::new(),
            paths,
            sight,
            challenges: ChallengeTracker::default(),
            events: EventBus::default(),
            drops: Vec::new(),
            rng: StdRng::seed_from_u64(options.seed),
        })
    }

    /// Navigation and sight lines both come from `tilemap`.
    pub fn on_tilemap(
        defs: DefDatabase,
        player_def: &str,
        player_position: Vec2,
        tilemap: &Tilemap,
        options: SimulationOptions,
    ) -> Result<Self, SetupError> {
        let navigator = GridNavigator::from_tilemap(tilemap);
        Self::new(
            defs,
            player_def,
            player_position,
            Box::new(navigator.clone()),
            Box::new(navigator),
            options,
        )
    }

    pub fn defs(&self) -> &DefDatabase {
        &self.defs
    }

    pub fn now(&self) -> f64 {
        self.timers.now()
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn enemy(&self, id: EntityId) -> Option<&EnemyAgent> {
        self.enemies.get(&id)
    }

    pub fn enemies(&self) -> impl Iterator<Item = &EnemyAgent> {
        self.enemies.values()
    }

    pub fn challenges(&self) -> &ChallengeTracker {
        &self.challenges
    }

    pub fn drops(&self) -> &[LootDrop] {
        &self.drops
    }

    pub fn pending_events(&self) -> impl Iterator<Item = &CombatEvent> {
        self.events.iter_pending()
    }

    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        self.events.drain()
    }

    pub fn last_update_counts(&self) -> CombatEventCounts {
        self.events.last_update_counts()
    }

    pub fn event_totals(&self) -> CombatEventCounts {
        self.events.totals()
    }

    pub fn update(&mut self, frame_dt: Duration) {
        let frame_dt = self.clock.clamp_frame_delta(frame_dt);
        let frame_seconds = frame_dt.as_secs_f32();

        self.deliver_paths();
        self.fire_timers(frame_seconds);
        for agent in self.enemies.values_mut() {
            agent.frame_tick(frame_seconds);
        }

        let plan = self.clock.accumulate(frame_dt);
        let fixed_dt = self.clock.fixed_dt_seconds();
        for _ in 0..plan.ticks_to_run {
            self.physics_tick(fixed_dt);
        }

        self.events.finish_update_rollover();
    }

    pub fn spawn_enemy(&mut self, def_name: &str, position: Vec2) -> Result<EntityId, SetupError> {
        self.spawn_enemy_tagged(def_name, position, None)
    }

    fn spawn_enemy_tagged(
        &mut self,
        def_name: &str,
        position: Vec2,
        challenge_id: Option<String>,
    ) -> Result<EntityId, SetupError> {
        let def = self
            .defs
            .enemy_def(def_name)
            .cloned()
            .ok_or_else(|| SetupError::UnknownEnemyDef(def_name.to_string()))?;
        let id = self.ids.allocate();
        let mut agent = EnemyAgent::new(id, def, position, challenge_id.clone());
        agent.start(&mut self.timers);
        self.enemies.insert(id, agent);

        info!(enemy = ?id, def = def_name, x = position.x, y = position.y, "enemy_spawned");
        self.events.emit(CombatEvent::EnemySpawned {
            enemy: id,
            def_name: def_name.to_string(),
            challenge_id,
        });
        Ok(id)
    }

    /// Registers the challenge and schedules its spawns. `Ok(false)` when a
    /// challenge with the same id is already running.
    pub fn start_challenge(
        &mut self,
        def_name: &str,
        origin: Vec2,
        on_complete: Option<CompletionCallback>,
    ) -> Result<bool, SetupError> {
        let def = self
            .defs
            .challenge_def(def_name)
            .cloned()
            .ok_or_else(|| SetupError::UnknownChallengeDef(def_name.to_string()))?;
        if let Some(missing) = def
            .enemies
            .iter()
            .find(|enemy| self.defs.enemy_def(enemy).is_none())
        {
            return Err(SetupError::UnknownEnemyDef(missing.clone()));
        }

        let enemy_count = u32::try_from(def.enemies.len()).unwrap_or(u32::MAX);
        if !self
            .challenges
            .register(def.def_name.clone(), enemy_count, on_complete)
        {
            return Ok(false);
        }
        for (index, enemy_def) in def.enemies.iter().enumerate() {
            let delay = def.delay_before_spawn + def.spawn_delay * index as f32;
            self.timers.schedule(
                delay,
                SimTimer::SpawnChallengeEnemy {
                    challenge_id: def.def_name.clone(),
                    enemy_def: enemy_def.clone(),
                    origin,
                },
            );
        }
        Ok(true)
    }

    pub fn set_player_move(&mut self, input: Vec2) {
        self.player.set_move_input(input);
    }

    /// Swings the player's weapon. Returns every collider the swing reached.
    pub fn player_attack(&mut self) -> Vec<StrikeHit> {
        let Some(strike) = self.player.try_attack(&mut self.timers, &mut self.events) else {
            return Vec::new();
        };
        let hits = resolve_strike(
            &strike,
            self.enemies.values_mut().map(EnemyAgent::combatant_mut),
        );
        debug!(hits = hits.len(), damage = strike.damage, "player_attack_resolved");
        for hit in &hits {
            self.after_enemy_hit(hit.target, hit.outcome, strike.damage);
        }
        hits
    }

    pub fn use_item(&mut self, item_def: &str) -> Result<bool, SetupError> {
        let item = self
            .defs
            .item_def(item_def)
            .cloned()
            .ok_or_else(|| SetupError::UnknownItemDef(item_def.to_string()))?;
        Ok(self
            .player
            .consume_item(&item, &mut self.timers, &mut self.events))
    }

    pub fn heal_player(&mut self, amount: u32) -> u32 {
        self.player.heal(amount, &mut self.events)
    }

    pub fn damage_player(&mut self, amount: u32) -> DamageOutcome {
        self.player
            .apply_damage(amount, &mut self.timers, &mut self.events)
    }

    pub fn damage_enemy(&mut self, id: EntityId, amount: u32) -> Option<DamageOutcome> {
        let directory = PlayerDirectory::of(&self.player);
        let agent = self.enemies.get_mut(&id)?;
        let mut ctx = AgentContext {
            timers: &mut self.timers,
            events: &mut self.events,
            paths: self.paths.as_mut(),
            sight: self.sight.as_ref(),
            targets: &directory,
        };
        let outcome = agent.apply_damage(amount, &mut ctx);
        if outcome == DamageOutcome::Killed {
            self.on_enemy_killed(id);
        }
        Some(outcome)
    }

    /// Runs the death transition directly. Returns false for unknown or
    /// already dead enemies.
    pub fn kill_enemy(&mut self, id: EntityId) -> bool {
        let directory = PlayerDirectory::of(&self.player);
        let Some(agent) = self.enemies.get_mut(&id) else {
            return false;
        };
        let mut ctx = AgentContext {
            timers: &mut self.timers,
            events: &mut self.events,
            paths: self.paths.as_mut(),
            sight: self.sight.as_ref(),
            targets: &directory,
        };
        let died = agent.die(&mut ctx);
        if died {
            self.on_enemy_killed(id);
        }
        died
    }

    fn after_enemy_hit(&mut self, id: EntityId, outcome: DamageOutcome, amount: u32) {
        let directory = PlayerDirectory::of(&self.player);
        let Some(agent) = self.enemies.get_mut(&id) else {
            return;
        };
        let mut ctx = AgentContext {
            timers: &mut self.timers,
            events: &mut self.events,
            paths: self.paths.as_mut(),
            sight: self.sight.as_ref(),
            targets: &directory,
        };
        agent.react_to_hit(outcome, amount, &mut ctx);
        if outcome == DamageOutcome::Killed {
            self.on_enemy_killed(id);
        }
    }

    /// Loot then challenge bookkeeping, once per death.
    fn on_enemy_killed(&mut self, id: EntityId) {
        let Some(agent) = self.enemies.get(&id) else {
            return;
        };
        let origin = agent.position();
        let challenge_id = agent.challenge_id().map(str::to_string);

        for drop in agent.loot_table().roll(origin, &mut self.rng) {
            info!(source = ?id, item = %drop.item, "loot_dropped");
            self.events.emit(CombatEvent::LootDropped {
                source: id,
                item: drop.item.clone(),
                position: drop.position,
            });
            self.drops.push(drop);
        }

        let Some(challenge_id) = challenge_id else {
            return;
        };
        self.events.emit(CombatEvent::ChallengeKill {
            challenge_id: challenge_id.clone(),
        });
        if self.challenges.on_enemy_killed(&challenge_id) == KillOutcome::Completed {
            self.events
                .emit(CombatEvent::ChallengeCompleted { challenge_id });
        }
    }

    fn deliver_paths(&mut self) {
        for completion in self.paths.poll_completed() {
            match self.enemies.get_mut(&completion.requester) {
                Some(agent) => {
                    agent.on_path_result(completion.ticket, completion.result, &mut self.events)
                }
                None => debug!(requester = ?completion.requester, "path_for_missing_agent"),
            }
        }
    }

    fn fire_timers(&mut self, dt: f32) {
        for fired in self.timers.advance(dt) {
            match fired.action {
                SimTimer::Effect(expiry) => {
                    if expiry.owner == self.player.id() {
                        self.player.expire_effect(expiry.effect, &mut self.events);
                    }
                }
                SimTimer::Player(PlayerTimer::AttackReady) => self.player.on_attack_ready(),
                SimTimer::Player(PlayerTimer::Recharge) => {
                    self.player.on_recharge(&mut self.timers)
                }
                SimTimer::Agent(AgentTimer::Repath(id)) => self.repath_enemy(id),
                SimTimer::Agent(AgentTimer::ResolveTelegraph(id)) => {
                    self.resolve_enemy_attack(id)
                }
                SimTimer::Agent(AgentTimer::Despawn(id)) => self.despawn_enemy(id),
                SimTimer::SpawnChallengeEnemy {
                    challenge_id,
                    enemy_def,
                    origin,
                } => {
                    let offset = Vec2::new(
                        self.rng
                            .gen_range(-CHALLENGE_SPAWN_SCATTER..=CHALLENGE_SPAWN_SCATTER),
                        self.rng
                            .gen_range(-CHALLENGE_SPAWN_SCATTER..=CHALLENGE_SPAWN_SCATTER),
                    );
                    if let Err(error) =
                        self.spawn_enemy_tagged(&enemy_def, origin + offset, Some(challenge_id))
                    {
                        warn!(%error, "challenge_spawn_failed");
                    }
                }
            }
        }
    }

    fn repath_enemy(&mut self, id: EntityId) {
        let directory = PlayerDirectory::of(&self.player);
        let Some(agent) = self.enemies.get_mut(&id) else {
            return;
        };
        let mut ctx = AgentContext {
            timers: &mut self.timers,
            events: &mut self.events,
            paths: self.paths.as_mut(),
            sight: self.sight.as_ref(),
            targets: &directory,
        };
        agent.on_repath(&mut ctx);
    }

    fn resolve_enemy_attack(&mut self, id: EntityId) {
        let directory = PlayerDirectory::of(&self.player);
        let Some(agent) = self.enemies.get_mut(&id) else {
            return;
        };
        let hit = match agent.resolve_telegraph(&directory) {
            Some(strike) => {
                let hits = resolve_strike(&strike, [self.player.combatant_mut()]);
                let mut landed = false;
                for hit in hits {
                    landed |= hit.outcome.landed();
                    self.player.react_to_hit(
                        hit.outcome,
                        strike.damage,
                        &mut self.timers,
                        &mut self.events,
                    );
                }
                landed
            }
            None => false,
        };
        self.events
            .emit(CombatEvent::AttackResolved { attacker: id, hit });
    }

    fn despawn_enemy(&mut self, id: EntityId) {
        if self.enemies.remove(&id).is_some() {
            self.paths.cancel(id);
            debug!(enemy = ?id, "enemy_despawned");
            self.events.emit(CombatEvent::EnemyDespawned { enemy: id });
        }
    }

    fn physics_tick(&mut self, dt: f32) {
        self.player.physics_tick(dt);
        let directory = PlayerDirectory::of(&self.player);
        for agent in self.enemies.values_mut() {
            let mut ctx = AgentContext {
                timers: &mut self.timers,
                events: &mut self.events,
                paths: self.paths.as_mut(),
                sight: self.sight.as_ref(),
                targets: &directory,
            };
            agent.physics_tick(&mut ctx, dt);
        }
    }
}

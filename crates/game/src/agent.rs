//! Per-enemy controller.
//!
//! Target selection and path requests run on the repath timer. Range checks,
//! attack starts and movement run on the fixed physics tick. Cooldown countdown
//! runs on the frame tick. An attack is two-phase: the telegraph starts on a
//! physics tick and a `ResolveTelegraph` timer later asks the agent for the
//! strike to land, if the target is still in reach.

use engine::{EnemyDef, EntityId, TimerHandle, TimerScheduler, Vec2};
use serde::Serialize;
use tracing::{debug, info};

use crate::combat::{
    take_damage, BaseStats, CombatRole, Combatant, DamageOutcome, MeleeStrike,
};
use crate::events::{CombatEvent, EventBus};
use crate::loot::LootTable;
use crate::services::{
    LayerMask, LineOfSight, PathError, PathService, PathTicket, TargetLookup, TargetSnapshot,
};

/// Share of the way velocity moves toward the desired velocity per physics tick.
const STEERING_BLEND: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Pursuing,
    Attacking,
    Returning,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentTimer {
    Repath(EntityId),
    ResolveTelegraph(EntityId),
    Despawn(EntityId),
}

/// Collaborators an agent needs while it thinks.
pub struct AgentContext<'a, A> {
    pub timers: &'a mut TimerScheduler<A>,
    pub events: &'a mut EventBus,
    pub paths: &'a mut dyn PathService,
    pub sight: &'a dyn LineOfSight,
    pub targets: &'a dyn TargetLookup,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct PathFollow {
    waypoints: Vec<Vec2>,
    cursor: usize,
}

impl PathFollow {
    fn replace(&mut self, waypoints: Vec<Vec2>) {
        self.waypoints = waypoints;
        self.cursor = 0;
    }

    fn clear(&mut self) {
        self.waypoints.clear();
        self.cursor = 0;
    }
}

#[derive(Debug)]
pub struct EnemyAgent {
    def: EnemyDef,
    combatant: Combatant,
    state: AgentState,
    spawn_position: Vec2,
    target: Option<EntityId>,
    path: PathFollow,
    pending_path: Option<PathTicket>,
    cooldown_remaining: f32,
    telegraph: Option<TimerHandle>,
    repath: Option<TimerHandle>,
    challenge_id: Option<String>,
    loot: LootTable,
}

impl EnemyAgent {
    pub fn new(id: EntityId, def: EnemyDef, position: Vec2, challenge_id: Option<String>) -> Self {
        let combatant = Combatant::new(
            id,
            CombatRole::Enemy,
            BaseStats {
                max_health: def.max_health,
                move_speed: def.move_speed,
                damage: def.damage,
            },
            position,
        );
        let loot = LootTable::from_enemy_def(&def);
        Self {
            def,
            combatant,
            state: AgentState::Idle,
            spawn_position: position,
            target: None,
            path: PathFollow::default(),
            pending_path: None,
            cooldown_remaining: 0.0,
            telegraph: None,
            repath: None,
            challenge_id,
            loot,
        }
    }

    pub fn id(&self) -> EntityId {
        self.combatant.id()
    }

    pub fn def(&self) -> &EnemyDef {
        &self.def
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn combatant(&self) -> &Combatant {
        &self.combatant
    }

    pub fn combatant_mut(&mut self) -> &mut Combatant {
        &mut self.combatant
    }

    pub fn position(&self) -> Vec2 {
        self.combatant.position()
    }

    pub fn spawn_position(&self) -> Vec2 {
        self.spawn_position
    }

    pub fn challenge_id(&self) -> Option<&str> {
        self.challenge_id.as_deref()
    }

    pub fn loot_table(&self) -> &LootTable {
        &self.loot
    }

    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown_remaining
    }

    pub fn is_telegraphing(&self) -> bool {
        self.telegraph.is_some()
    }

    pub fn waypoints(&self) -> &[Vec2] {
        &self.path.waypoints
    }

    pub fn is_dead(&self) -> bool {
        self.state == AgentState::Dead
    }

    /// Kicks off the repath loop; the first evaluation runs on the next tick.
    pub fn start<A: From<AgentTimer>>(&mut self, timers: &mut TimerScheduler<A>) {
        if self.repath.is_none() && !self.is_dead() {
            self.repath = Some(timers.schedule(0.0, A::from(AgentTimer::Repath(self.id()))));
        }
    }

    pub fn on_repath<A: From<AgentTimer>>(&mut self, ctx: &mut AgentContext<'_, A>) {
        self.repath = None;
        if self.is_dead() {
            return;
        }
        self.repath = Some(
            ctx.timers
                .schedule(self.def.repath_interval, A::from(AgentTimer::Repath(self.id()))),
        );

        if ctx.paths.is_busy(self.id()) {
            return;
        }

        if self.state == AgentState::Returning {
            self.request_path(ctx.paths, self.spawn_position);
            return;
        }
        if self.beyond_return_range() {
            self.begin_return(ctx);
            return;
        }

        let Some(target) = self.acquire_target(ctx.targets) else {
            self.hold_position(ctx.events);
            return;
        };
        let position = self.position();
        let in_detection = position.distance(target.position) <= self.def.detection_range;
        if in_detection && !ctx.sight.is_blocked(position, target.position, LayerMask::WALLS) {
            self.request_path(ctx.paths, target.position);
            if self.state == AgentState::Idle {
                self.set_state(AgentState::Pursuing, ctx.events);
            }
        } else {
            self.hold_position(ctx.events);
        }
    }

    /// Stale tickets (superseded by a newer request) are dropped.
    pub fn on_path_result(
        &mut self,
        ticket: PathTicket,
        result: Result<Vec<Vec2>, PathError>,
        events: &mut EventBus,
    ) {
        if self.pending_path != Some(ticket) {
            debug!(enemy = ?self.id(), ticket = ticket.0, "stale_path_result_ignored");
            return;
        }
        self.pending_path = None;
        if self.is_dead() {
            return;
        }

        match result {
            Ok(waypoints) => self.path.replace(waypoints),
            Err(error) => {
                debug!(enemy = ?self.id(), %error, "path_unavailable");
                self.path.clear();
                self.combatant.set_velocity(Vec2::ZERO);
                // A failed trip home holds in place; the repath timer retries it.
                if self.state == AgentState::Pursuing {
                    self.set_state(AgentState::Idle, events);
                }
            }
        }
    }

    pub fn physics_tick<A: From<AgentTimer>>(&mut self, ctx: &mut AgentContext<'_, A>, dt: f32) {
        if self.is_dead() {
            return;
        }
        if self.state != AgentState::Returning && self.beyond_return_range() {
            self.begin_return(ctx);
        }

        let steering = match self.state {
            AgentState::Returning => {
                let steering = self.follow_path();
                if self.position().distance(self.spawn_position) <= self.def.waypoint_threshold {
                    self.combatant.set_velocity(Vec2::ZERO);
                    self.path.clear();
                    self.set_state(AgentState::Idle, ctx.events);
                    false
                } else {
                    steering
                }
            }
            AgentState::Pursuing | AgentState::Attacking => {
                let reachable = self
                    .target
                    .and_then(|id| ctx.targets.combatant(id))
                    .filter(|target| target.alive)
                    .filter(|target| {
                        self.position().distance(target.position) <= self.def.attack_range
                    });
                match reachable {
                    Some(_) => {
                        self.set_state(AgentState::Attacking, ctx.events);
                        self.combatant.set_velocity(Vec2::ZERO);
                        if self.cooldown_remaining <= 0.0 && self.telegraph.is_none() {
                            self.begin_telegraph(ctx);
                        }
                        true
                    }
                    None => {
                        self.set_state(AgentState::Pursuing, ctx.events);
                        self.follow_path()
                    }
                }
            }
            AgentState::Idle | AgentState::Dead => false,
        };

        self.combatant.integrate(dt, steering);
    }

    pub fn frame_tick(&mut self, dt: f32) {
        if self.is_dead() {
            return;
        }
        self.cooldown_remaining = (self.cooldown_remaining - dt).max(0.0);
    }

    /// Ends the telegraph. Returns the strike to land when the target is still
    /// alive and in reach.
    pub fn resolve_telegraph(&mut self, targets: &dyn TargetLookup) -> Option<MeleeStrike> {
        self.telegraph = None;
        if self.is_dead() {
            return None;
        }
        let origin = self.position();
        let target = self
            .target
            .and_then(|id| targets.combatant(id))
            .filter(|target| target.alive)?;
        if origin.distance(target.position) > self.def.attack_range {
            debug!(enemy = ?self.id(), "telegraph_whiffed");
            return None;
        }
        Some(MeleeStrike {
            attacker: self.id(),
            origin,
            facing: origin.direction_to(target.position),
            range: self.def.attack_range,
            damage: self.combatant.effective_damage(),
            knockback: self.def.knockback,
        })
    }

    /// Damages the agent directly, then reacts as [`EnemyAgent::react_to_hit`].
    pub fn apply_damage<A: From<AgentTimer>>(
        &mut self,
        amount: u32,
        ctx: &mut AgentContext<'_, A>,
    ) -> DamageOutcome {
        let outcome = take_damage(&mut self.combatant, amount);
        self.react_to_hit(outcome, amount, ctx);
        outcome
    }

    /// Follow-up for a hit already applied to this agent's combatant. A
    /// non-lethal hit interrupts: the cooldown restarts and any pending
    /// telegraph is dropped.
    pub fn react_to_hit<A: From<AgentTimer>>(
        &mut self,
        outcome: DamageOutcome,
        amount: u32,
        ctx: &mut AgentContext<'_, A>,
    ) {
        match outcome {
            DamageOutcome::Ignored => {}
            DamageOutcome::Damaged { remaining } => {
                self.cooldown_remaining = self.def.attack_cooldown;
                self.cancel_telegraph(ctx.timers);
                ctx.events.emit(CombatEvent::HitReaction {
                    target: self.id(),
                    amount,
                    remaining_health: remaining,
                });
            }
            DamageOutcome::Killed => {
                ctx.events.emit(CombatEvent::HitReaction {
                    target: self.id(),
                    amount,
                    remaining_health: 0,
                });
                self.die(ctx);
            }
        }
    }

    /// Terminal transition. Returns false when the agent was already dead.
    pub fn die<A: From<AgentTimer>>(&mut self, ctx: &mut AgentContext<'_, A>) -> bool {
        if self.is_dead() {
            debug!(enemy = ?self.id(), "die_ignored_already_dead");
            return false;
        }
        self.set_state(AgentState::Dead, ctx.events);
        self.combatant.shut_down_body();
        self.path.clear();
        self.pending_path = None;
        ctx.paths.cancel(self.id());
        self.cancel_telegraph(ctx.timers);
        if let Some(handle) = self.repath.take() {
            ctx.timers.cancel(handle);
        }

        info!(enemy = ?self.id(), def = %self.def.def_name, "enemy_died");
        ctx.events.emit(CombatEvent::Died {
            entity: self.id(),
            role: CombatRole::Enemy,
        });
        ctx.timers.schedule(
            self.def.despawn_delay,
            A::from(AgentTimer::Despawn(self.id())),
        );
        true
    }

    fn beyond_return_range(&self) -> bool {
        self.position().distance(self.spawn_position) > self.def.return_range
    }

    fn begin_return<A>(&mut self, ctx: &mut AgentContext<'_, A>) {
        self.cancel_telegraph(ctx.timers);
        self.path.clear();
        ctx.paths.cancel(self.id());
        self.pending_path = None;
        self.set_state(AgentState::Returning, ctx.events);
        self.request_path(ctx.paths, self.spawn_position);
    }

    fn hold_position(&mut self, events: &mut EventBus) {
        self.path.clear();
        self.combatant.set_velocity(Vec2::ZERO);
        self.set_state(AgentState::Idle, events);
    }

    fn acquire_target(&mut self, targets: &dyn TargetLookup) -> Option<TargetSnapshot> {
        let current = self
            .target
            .and_then(|id| targets.combatant(id))
            .filter(|target| target.alive);
        let found = current.or_else(|| {
            targets
                .find_combatant_by_role(CombatRole::Player)
                .filter(|target| target.alive)
        });
        self.target = found.map(|target| target.id);
        found
    }

    fn request_path(&mut self, paths: &mut dyn PathService, goal: Vec2) {
        if let Some(ticket) = paths.request_path(self.id(), self.position(), goal) {
            self.pending_path = Some(ticket);
        }
    }

    fn begin_telegraph<A: From<AgentTimer>>(&mut self, ctx: &mut AgentContext<'_, A>) {
        self.cooldown_remaining = self.def.attack_cooldown;
        self.telegraph = Some(ctx.timers.schedule(
            self.def.telegraph_duration,
            A::from(AgentTimer::ResolveTelegraph(self.id())),
        ));
        debug!(enemy = ?self.id(), "attack_telegraphed");
        ctx.events
            .emit(CombatEvent::AttackTelegraphed { attacker: self.id() });
    }

    fn cancel_telegraph<A>(&mut self, timers: &mut TimerScheduler<A>) {
        if let Some(handle) = self.telegraph.take() {
            timers.cancel(handle);
        }
    }

    /// Steers toward the current waypoint. Returns whether the body is under
    /// steering control this tick; past the last waypoint it keeps its
    /// velocity until the next path arrives.
    fn follow_path(&mut self) -> bool {
        let position = self.position();
        while let Some(waypoint) = self.path.waypoints.get(self.path.cursor) {
            if position.distance(*waypoint) > self.def.waypoint_threshold {
                break;
            }
            self.path.cursor += 1;
        }
        let Some(waypoint) = self.path.waypoints.get(self.path.cursor).copied() else {
            return !self.path.waypoints.is_empty();
        };

        let desired = position.direction_to(waypoint) * self.combatant.effective_speed();
        let velocity = self.combatant.velocity().lerp(desired, STEERING_BLEND);
        self.combatant.set_velocity(velocity);
        true
    }

    fn set_state(&mut self, to: AgentState, events: &mut EventBus) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        debug!(enemy = ?self.id(), ?from, ?to, "enemy_state_changed");
        events.emit(CombatEvent::EnemyStateChanged {
            enemy: self.id(),
            from,
            to,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakePaths {
        next_ticket: u64,
        in_flight: Option<(PathTicket, Vec2)>,
        requests: u32,
        fail: bool,
    }

    impl PathService for FakePaths {
        fn request_path(&mut self, _requester: EntityId, _from: Vec2, to: Vec2) -> Option<PathTicket> {
            if self.in_flight.is_some() {
                return None;
            }
            let ticket = PathTicket(self.next_ticket);
            self.next_ticket += 1;
            self.requests += 1;
            self.in_flight = Some((ticket, to));
            Some(ticket)
        }

        fn is_busy(&self, _requester: EntityId) -> bool {
            self.in_flight.is_some()
        }

        fn cancel(&mut self, _requester: EntityId) {
            self.in_flight = None;
        }

        fn poll_completed(&mut self) -> Vec<crate::services::PathCompletion> {
            self.in_flight
                .take()
                .map(|(ticket, goal)| crate::services::PathCompletion {
                    requester: EntityId(1),
                    ticket,
                    result: if self.fail {
                        Err(PathError::Unreachable)
                    } else {
                        Ok(vec![goal])
                    },
                })
                .into_iter()
                .collect()
        }
    }

    struct FakeSight {
        blocked: bool,
    }

    impl LineOfSight for FakeSight {
        fn is_blocked(&self, _from: Vec2, _to: Vec2, _mask: LayerMask) -> bool {
            self.blocked
        }
    }

    struct FakeTargets {
        player: Option<TargetSnapshot>,
    }

    impl TargetLookup for FakeTargets {
        fn find_combatant_by_role(&self, role: CombatRole) -> Option<TargetSnapshot> {
            (role == CombatRole::Player).then_some(self.player).flatten()
        }

        fn combatant(&self, id: EntityId) -> Option<TargetSnapshot> {
            self.player.filter(|player| player.id == id)
        }
    }

    struct Harness {
        agent: EnemyAgent,
        timers: TimerScheduler<AgentTimer>,
        events: EventBus,
        paths: FakePaths,
        sight: FakeSight,
        targets: FakeTargets,
        despawned: bool,
        strikes: Vec<MeleeStrike>,
    }

    impl Harness {
        fn new(def: EnemyDef, player_at: Option<Vec2>) -> Self {
            let mut timers = TimerScheduler::new();
            let mut agent = EnemyAgent::new(EntityId(1), def, Vec2::ZERO, None);
            agent.start(&mut timers);
            Self {
                agent,
                timers,
                events: EventBus::default(),
                paths: FakePaths::default(),
                sight: FakeSight { blocked: false },
                targets: FakeTargets {
                    player: player_at.map(|position| TargetSnapshot {
                        id: EntityId(100),
                        position,
                        alive: true,
                    }),
                },
                despawned: false,
                strikes: Vec::new(),
            }
        }

        fn with_ctx<R>(
            &mut self,
            f: impl FnOnce(&mut EnemyAgent, &mut AgentContext<'_, AgentTimer>) -> R,
        ) -> R {
            let mut ctx = AgentContext {
                timers: &mut self.timers,
                events: &mut self.events,
                paths: &mut self.paths,
                sight: &self.sight,
                targets: &self.targets,
            };
            f(&mut self.agent, &mut ctx)
        }

        fn step(&mut self, dt: f32) {
            for completion in self.paths.poll_completed() {
                self.agent
                    .on_path_result(completion.ticket, completion.result, &mut self.events);
            }
            for fired in self.timers.advance(dt) {
                match fired.action {
                    AgentTimer::Repath(_) => self.with_ctx(|agent, ctx| agent.on_repath(ctx)),
                    AgentTimer::ResolveTelegraph(_) => {
                        if let Some(strike) = self.agent.resolve_telegraph(&self.targets) {
                            self.strikes.push(strike);
                        }
                    }
                    AgentTimer::Despawn(_) => self.despawned = true,
                }
            }
            self.agent.frame_tick(dt);
            self.with_ctx(|agent, ctx| agent.physics_tick(ctx, dt));
        }

        fn telegraph_count(&self) -> usize {
            self.events
                .iter_pending()
                .filter(|event| matches!(event, CombatEvent::AttackTelegraphed { .. }))
                .count()
        }
    }

    fn def() -> EnemyDef {
        EnemyDef::with_name("Grunt")
    }

    #[test]
    fn idle_agent_pursues_visible_target_in_detection_range() {
        let mut h = Harness::new(def(), Some(Vec2::new(5.0, 0.0)));
        h.step(0.1);
        assert_eq!(h.agent.state(), AgentState::Pursuing);
        assert_eq!(h.paths.requests, 1);

        h.step(0.1);
        assert_eq!(h.agent.waypoints(), &[Vec2::new(5.0, 0.0)]);
        for _ in 0..5 {
            h.step(0.1);
        }
        assert!(h.agent.position().x > 0.0);
    }

    #[test]
    fn blocked_sight_line_keeps_agent_idle_without_path_request() {
        let mut h = Harness::new(def(), Some(Vec2::new(3.0, 0.0)));
        h.sight.blocked = true;
        for _ in 0..10 {
            h.step(0.1);
        }
        assert_eq!(h.agent.state(), AgentState::Idle);
        assert_eq!(h.paths.requests, 0);
    }

    #[test]
    fn missing_or_distant_target_leaves_agent_idle() {
        let mut h = Harness::new(def(), None);
        h.step(0.1);
        assert_eq!(h.agent.state(), AgentState::Idle);

        let mut far = Harness::new(def(), Some(Vec2::new(50.0, 0.0)));
        far.step(0.1);
        assert_eq!(far.agent.state(), AgentState::Idle);
        assert_eq!(far.paths.requests, 0);
    }

    #[test]
    fn return_range_overrides_pursuit_even_with_target_adjacent() {
        let mut h = Harness::new(def(), Some(Vec2::new(20.5, 0.0)));
        h.step(0.1);
        h.agent.combatant_mut().set_position(Vec2::new(20.0, 0.0));
        h.agent.state = AgentState::Pursuing;
        h.agent.target = Some(EntityId(100));

        h.with_ctx(|agent, ctx| agent.physics_tick(ctx, 0.02));

        assert_eq!(h.agent.state(), AgentState::Returning);
        assert!(!h.agent.is_telegraphing());
        assert_eq!(h.telegraph_count(), 0);
    }

    #[test]
    fn returning_agent_goes_idle_at_spawn() {
        let mut h = Harness::new(def(), None);
        h.agent.combatant_mut().set_position(Vec2::new(12.5, 0.0));
        for _ in 0..300 {
            h.step(0.05);
            if h.agent.state() == AgentState::Idle && h.paths.requests > 0 {
                break;
            }
        }
        assert_eq!(h.agent.state(), AgentState::Idle);
        assert!(h.agent.position().distance(Vec2::ZERO) <= h.agent.def().waypoint_threshold);
        assert_eq!(h.agent.combatant().velocity(), Vec2::ZERO);
        assert!(h.agent.waypoints().is_empty());
    }

    #[test]
    fn unreachable_home_retries_only_on_repath_interval() {
        let mut h = Harness::new(def(), None);
        h.paths.fail = true;
        h.agent.combatant_mut().set_position(Vec2::new(12.5, 0.0));

        for _ in 0..20 {
            h.step(0.02);
        }
        assert_eq!(h.agent.state(), AgentState::Returning);
        assert_eq!(h.paths.requests, 1);
        assert_eq!(h.agent.combatant().velocity(), Vec2::ZERO);

        for _ in 0..10 {
            h.step(0.02);
        }
        assert_eq!(h.paths.requests, 2);
        assert_eq!(h.agent.state(), AgentState::Returning);
        let state_changes = h
            .events
            .iter_pending()
            .filter(|event| matches!(event, CombatEvent::EnemyStateChanged { .. }))
            .count();
        assert_eq!(state_changes, 1);
    }

    #[test]
    fn attack_cooldown_gates_second_telegraph() {
        let mut h = Harness::new(def(), Some(Vec2::new(1.0, 0.0)));
        let mut telegraph_steps = Vec::new();
        for step in 0..45 {
            let before = h.telegraph_count();
            h.step(0.1);
            if h.telegraph_count() > before {
                telegraph_steps.push(step);
            }
        }

        assert_eq!(telegraph_steps[0], 0);
        let gap = telegraph_steps[1] - telegraph_steps[0];
        assert!((20..=21).contains(&gap), "second attack after {gap} steps");
        assert!(h.strikes.len() >= 2);
        assert_eq!(h.agent.state(), AgentState::Attacking);
    }

    #[test]
    fn non_lethal_hit_resets_cooldown_and_cancels_telegraph() {
        let mut def = def();
        def.max_health = 3;
        let mut h = Harness::new(def, Some(Vec2::new(1.0, 0.0)));
        h.step(0.1);
        assert!(h.agent.is_telegraphing());
        h.step(0.1);

        let outcome = h.with_ctx(|agent, ctx| agent.apply_damage(1, ctx));
        assert_eq!(outcome, DamageOutcome::Damaged { remaining: 2 });
        assert!(!h.agent.is_telegraphing());
        assert!((h.agent.cooldown_remaining() - 2.0).abs() < 1e-6);

        for _ in 0..10 {
            h.step(0.1);
        }
        assert!(h.strikes.is_empty());
    }

    #[test]
    fn death_runs_once_and_schedules_despawn() {
        let mut h = Harness::new(def(), Some(Vec2::new(1.0, 0.0)));
        h.step(0.1);
        let outcome = h.with_ctx(|agent, ctx| agent.apply_damage(5, ctx));
        assert_eq!(outcome, DamageOutcome::Killed);
        assert!(!h.with_ctx(|agent, ctx| agent.die(ctx)));
        assert_eq!(
            h.with_ctx(|agent, ctx| agent.apply_damage(5, ctx)),
            DamageOutcome::Ignored
        );

        let deaths = h
            .events
            .iter_pending()
            .filter(|event| matches!(event, CombatEvent::Died { .. }))
            .count();
        assert_eq!(deaths, 1);
        assert_eq!(h.agent.state(), AgentState::Dead);
        assert!(!h.agent.combatant().body().collider_enabled);
        assert_eq!(h.timers.pending_count(), 1);

        for _ in 0..31 {
            h.step(0.1);
        }
        assert!(h.despawned);
        assert!(h.strikes.is_empty());
        assert_eq!(h.agent.state(), AgentState::Dead);
    }

    #[test]
    fn stale_path_ticket_is_ignored() {
        let mut h = Harness::new(def(), Some(Vec2::new(5.0, 0.0)));
        h.step(0.1);
        h.agent.on_path_result(
            PathTicket(999),
            Ok(vec![Vec2::new(-4.0, 0.0)]),
            &mut h.events,
        );
        assert!(h.agent.waypoints().is_empty());
    }

    #[test]
    fn unreachable_target_holds_position() {
        let mut h = Harness::new(def(), Some(Vec2::new(5.0, 0.0)));
        h.paths.fail = true;
        h.step(0.1);
        assert_eq!(h.agent.state(), AgentState::Pursuing);
        h.step(0.1);
        assert_eq!(h.agent.state(), AgentState::Idle);
        assert_eq!(h.agent.combatant().velocity(), Vec2::ZERO);
    }

    #[test]
    fn telegraph_whiffs_when_target_leaves_reach() {
        let mut h = Harness::new(def(), Some(Vec2::new(1.0, 0.0)));
        h.step(0.1);
        assert!(h.agent.is_telegraphing());
        if let Some(player) = h.targets.player.as_mut() {
            player.position = Vec2::new(4.0, 0.0);
        }
        assert!(h.agent.resolve_telegraph(&h.targets).is_none());
        assert!(!h.agent.is_telegraphing());
    }
}

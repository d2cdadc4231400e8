//! Real-time combat coordination: timed stat effects, melee resolution and
//! enemy agents that pursue, attack and return home.

pub mod agent;
pub mod challenge;
pub mod combat;
pub mod events;
pub mod loot;
pub mod nav;
pub mod player;
pub mod scenario;
pub mod services;
pub mod sim;

pub use agent::{AgentContext, AgentState, AgentTimer, EnemyAgent};
pub use challenge::{ChallengeTracker, CompletionCallback, KillOutcome};
pub use events::{CombatEvent, CombatEventCounts, CombatEventKind, EventBus};
pub use loot::{LootDrop, LootTable};
pub use nav::GridNavigator;
pub use player::{Player, PlayerTimer};
pub use scenario::{load_scenario, parse_scenario_json, Scenario, ScenarioError, ScenarioReport};
pub use services::{
    LayerMask, LineOfSight, PathCompletion, PathError, PathService, PathTicket, TargetLookup,
    TargetSnapshot,
};
pub use sim::{SetupError, SimTimer, Simulation, SimulationOptions};

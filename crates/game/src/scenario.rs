//! JSON scenario files for the headless runner.
//!
//! A scenario names a map (rows of `#` walls and `.` floor, top row first), the
//! player and enemy spawns, and a timeline of player actions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine::{DefDatabase, Tilemap, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::events::{CombatEvent, CombatEventCounts};
use crate::nav::WALL_TILE_ID;
use crate::sim::{SetupError, Simulation, SimulationOptions};

const WALL_CHAR: char = '#';
const FLOOR_CHAR: char = '.';

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("read scenario '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse scenario json at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: {message}")]
    Invalid { path: String, message: String },
    #[error(transparent)]
    Setup(#[from] SetupError),
}

fn default_duration_seconds() -> f32 {
    10.0
}

fn default_frame_rate() -> u32 {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: f32,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    pub map: Vec<String>,
    pub player: SpawnSpec,
    #[serde(default)]
    pub enemies: Vec<SpawnSpec>,
    #[serde(default)]
    pub actions: Vec<TimedAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpawnSpec {
    pub def: String,
    pub at: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedAction {
    pub at_seconds: f32,
    #[serde(flatten)]
    pub action: ScenarioAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioAction {
    Move { x: f32, y: f32 },
    Attack,
    UseItem { item: String },
    Heal { amount: u32 },
    StartChallenge { def: String, origin: Vec2 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub frames: u64,
    pub elapsed_seconds: f64,
    pub player_health: u32,
    pub player_alive: bool,
    pub enemies_alive: usize,
    pub drops: Vec<String>,
    pub completed_challenges: Vec<String>,
    pub events: CombatEventCounts,
}

pub fn load_scenario(path: &Path) -> Result<Scenario, ScenarioError> {
    let raw = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let scenario = parse_scenario_json(&raw)?;
    info!(
        path = %path.display(),
        name = %scenario.name,
        enemies = scenario.enemies.len(),
        actions = scenario.actions.len(),
        "scenario_loaded"
    );
    Ok(scenario)
}

pub fn parse_scenario_json(raw: &str) -> Result<Scenario, ScenarioError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let scenario = serde_path_to_error::deserialize::<_, Scenario>(&mut deserializer).map_err(
        |error| {
            let path = error.path().to_string();
            ScenarioError::Parse {
                path,
                source: error.into_inner(),
            }
        },
    )?;
    scenario.validate()?;
    Ok(scenario)
}

fn invalid(path: impl Into<String>, message: impl Into<String>) -> ScenarioError {
    ScenarioError::Invalid {
        path: path.into(),
        message: message.into(),
    }
}

fn check_position(path: &str, position: Vec2, width: usize, height: usize) -> Result<(), ScenarioError> {
    if !position.is_finite() {
        return Err(invalid(path, "expected finite coordinates"));
    }
    let inside = position.x >= 0.0
        && position.y >= 0.0
        && position.x < width as f32
        && position.y < height as f32;
    if !inside {
        return Err(invalid(
            path,
            format!(
                "({}, {}) lies outside the {width}x{height} map",
                position.x, position.y
            ),
        ));
    }
    Ok(())
}

impl Scenario {
    fn validate(&self) -> Result<(), ScenarioError> {
        let height = self.map.len();
        let width = self.map.first().map(|row| row.chars().count()).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(invalid("map", "expected at least one non-empty row"));
        }
        for (index, row) in self.map.iter().enumerate() {
            let row_width = row.chars().count();
            if row_width != width {
                return Err(invalid(
                    format!("map[{index}]"),
                    format!("expected {width} columns, got {row_width}"),
                ));
            }
            if let Some(bad) = row.chars().find(|c| *c != WALL_CHAR && *c != FLOOR_CHAR) {
                return Err(invalid(
                    format!("map[{index}]"),
                    format!("unexpected tile character '{bad}'"),
                ));
            }
        }
        if !(self.duration_seconds.is_finite() && self.duration_seconds > 0.0) {
            return Err(invalid("duration_seconds", "expected a positive number"));
        }
        if self.frame_rate == 0 {
            return Err(invalid("frame_rate", "expected a positive integer"));
        }

        check_position("player.at", self.player.at, width, height)?;
        for (index, enemy) in self.enemies.iter().enumerate() {
            check_position(&format!("enemies[{index}].at"), enemy.at, width, height)?;
        }
        for (index, action) in self.actions.iter().enumerate() {
            if !(action.at_seconds.is_finite() && action.at_seconds >= 0.0) {
                return Err(invalid(
                    format!("actions[{index}].at_seconds"),
                    "expected a non-negative number",
                ));
            }
            if let ScenarioAction::StartChallenge { origin, .. } = &action.action {
                check_position(&format!("actions[{index}].origin"), *origin, width, height)?;
            }
        }
        Ok(())
    }

    /// Tile (0, 0) is the bottom-left cell, so the last row of `map` is y = 0.
    pub fn tilemap(&self) -> Result<Tilemap, ScenarioError> {
        let height = self.map.len() as u32;
        let width = self.map.first().map(|row| row.chars().count()).unwrap_or(0) as u32;
        let tiles = self
            .map
            .iter()
            .rev()
            .flat_map(|row| row.chars())
            .map(|tile| if tile == WALL_CHAR { WALL_TILE_ID } else { 0 })
            .collect();
        Tilemap::new(width, height, Vec2::ZERO, tiles)
            .map_err(|error| invalid("map", error.to_string()))
    }

    pub fn run(
        &self,
        defs: DefDatabase,
        options: SimulationOptions,
    ) -> Result<ScenarioReport, ScenarioError> {
        let tilemap = self.tilemap()?;
        let mut sim = Simulation::on_tilemap(defs, &self.player.def, self.player.at, &tilemap, options)?;
        for enemy in &self.enemies {
            sim.spawn_enemy(&enemy.def, enemy.at)?;
        }

        let mut timeline = self.actions.clone();
        timeline.sort_by(|a, b| a.at_seconds.total_cmp(&b.at_seconds));
        let mut timeline = timeline.into_iter().peekable();

        let frame_dt = Duration::from_secs_f64(1.0 / f64::from(self.frame_rate));
        let duration = f64::from(self.duration_seconds);
        let mut completed_challenges = Vec::new();
        let mut frames = 0u64;
        let mut elapsed = 0.0f64;

        while elapsed < duration {
            while let Some(next) = timeline.next_if(|action| f64::from(action.at_seconds) <= elapsed)
            {
                apply_action(&mut sim, &next.action)?;
            }

            sim.update(frame_dt);
            for event in sim.drain_events() {
                if let CombatEvent::ChallengeCompleted { challenge_id } = &event {
                    completed_challenges.push(challenge_id.clone());
                }
                if let Ok(json) = serde_json::to_string(&event) {
                    debug!(frame = frames, %json, "combat_event");
                }
            }
            frames += 1;
            elapsed = frames as f64 * frame_dt.as_secs_f64();
        }

        let player = sim.player().combatant();
        Ok(ScenarioReport {
            scenario: self.name.clone(),
            frames,
            elapsed_seconds: elapsed,
            player_health: player.health().current(),
            player_alive: player.is_alive(),
            enemies_alive: sim.enemies().filter(|agent| !agent.is_dead()).count(),
            drops: sim.drops().iter().map(|drop| drop.item.clone()).collect(),
            completed_challenges,
            events: sim.event_totals(),
        })
    }
}

fn apply_action(sim: &mut Simulation, action: &ScenarioAction) -> Result<(), SetupError> {
    match action {
        ScenarioAction::Move { x, y } => sim.set_player_move(Vec2::new(*x, *y)),
        ScenarioAction::Attack => {
            sim.player_attack();
        }
        ScenarioAction::UseItem { item } => {
            sim.use_item(item)?;
        }
        ScenarioAction::Heal { amount } => {
            sim.heal_player(*amount);
        }
        ScenarioAction::StartChallenge { def, origin } => {
            if !sim.start_challenge(def, *origin, None)? {
                debug!(challenge = %def, "challenge_already_running");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use engine::{EnemyDef, PlayerDef};
    use tempfile::TempDir;

    use super::*;

    const VALID: &str = r######"{
        "name": "duel",
        "duration_seconds": 2.0,
        "frame_rate": 20,
        "map": [
            "#####",
            "#...#",
            "#####"
        ],
        "player": { "def": "Hero", "at": { "x": 1.5, "y": 1.5 } },
        "enemies": [ { "def": "Grunt", "at": { "x": 2.5, "y": 1.5 } } ],
        "actions": [
            { "at_seconds": 0.5, "kind": "attack" },
            { "at_seconds": 0.0, "kind": "move", "x": 1.0, "y": 0.0 },
            { "at_seconds": 0.05, "kind": "move", "x": 0.0, "y": 0.0 },
            { "at_seconds": 0.2, "kind": "attack" }
        ]
    }"######;

    fn defs() -> DefDatabase {
        let mut hero = PlayerDef::with_name("Hero");
        hero.knockback = 0.0;
        DefDatabase::builder()
            .player(hero)
            .enemy(EnemyDef::with_name("Grunt"))
            .build()
    }

    #[test]
    fn parses_actions_with_kind_tags() {
        let scenario = parse_scenario_json(VALID).expect("valid scenario");
        assert_eq!(scenario.enemies.len(), 1);
        assert_eq!(scenario.actions[0].action, ScenarioAction::Attack);
        assert_eq!(
            scenario.actions[1].action,
            ScenarioAction::Move { x: 1.0, y: 0.0 }
        );
    }

    #[test]
    fn map_rows_are_read_top_down() {
        let scenario = parse_scenario_json(
            r##"{ "name": "m", "map": ["#..", "..."], "player": { "def": "Hero", "at": { "x": 1.5, "y": 0.5 } } }"##,
        )
        .expect("valid scenario");
        let tilemap = scenario.tilemap().expect("tilemap");
        assert_eq!(tilemap.tile_at(0, 1), Some(WALL_TILE_ID));
        assert_eq!(tilemap.tile_at(0, 0), Some(0));
        assert_eq!(scenario.duration_seconds, 10.0);
        assert_eq!(scenario.frame_rate, 60);
    }

    #[test]
    fn parse_error_reports_json_path() {
        let raw = VALID.replace(r#""x": 2.5"#, r#""x": "far""#);
        let error = parse_scenario_json(&raw).expect_err("bad coordinate");
        match error {
            ScenarioError::Parse { path, .. } => assert_eq!(path, "enemies[0].at.x"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validation_rejects_ragged_rows_and_outside_spawns() {
        let ragged = VALID.replace(r##""#...#","##, r##""#..#","##);
        assert!(matches!(
            parse_scenario_json(&ragged),
            Err(ScenarioError::Invalid { path, .. }) if path == "map[1]"
        ));

        let outside = VALID.replace(r#""x": 2.5"#, r#""x": 9.5"#);
        assert!(matches!(
            parse_scenario_json(&outside),
            Err(ScenarioError::Invalid { path, .. }) if path == "enemies[0].at"
        ));
    }

    #[test]
    fn load_reads_file_and_reports_missing_file() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("duel.json");
        fs::write(&path, VALID).expect("write");
        assert_eq!(load_scenario(&path).expect("load").name, "duel");

        let missing = temp.path().join("missing.json");
        assert!(matches!(
            load_scenario(&missing),
            Err(ScenarioError::Read { .. })
        ));
    }

    #[test]
    fn run_plays_timeline_and_reports_outcome() {
        let scenario = parse_scenario_json(VALID).expect("valid scenario");
        let report = scenario
            .run(defs(), SimulationOptions::default())
            .expect("run");

        assert_eq!(report.frames, 40);
        assert_eq!(report.enemies_alive, 0);
        assert_eq!(report.events.died, 1);
        assert!(report.player_alive);
    }

    #[test]
    fn run_fails_on_unknown_item() {
        let raw = VALID.replace(
            r#"{ "at_seconds": 0.5, "kind": "attack" }"#,
            r#"{ "at_seconds": 0.5, "kind": "use_item", "item": "Nope" }"#,
        );
        let scenario = parse_scenario_json(&raw).expect("valid scenario");
        assert!(matches!(
            scenario.run(defs(), SimulationOptions::default()),
            Err(ScenarioError::Setup(SetupError::UnknownItemDef(_)))
        ));
    }
}

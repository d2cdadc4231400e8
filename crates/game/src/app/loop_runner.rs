use std::path::{Path, PathBuf};
use std::process::ExitCode;

use engine::{compile_def_database, resolve_app_paths, ContentCompileError, StartupError};
use skirmish::{load_scenario, ScenarioError, ScenarioReport};
use thiserror::Error;
use tracing::{error, info};

use super::bootstrap::AppWiring;

#[derive(Debug, Error)]
pub(crate) enum RunError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Content(#[from] ContentCompileError),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error("seed `{0}` is not an unsigned integer")]
    InvalidSeed(String),
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_scenario(&app) {
        Ok(report) => {
            log_report(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}

fn run_scenario(app: &AppWiring) -> Result<ScenarioReport, RunError> {
    let seed = parse_seed(app.seed_override.as_deref())?;
    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        mods = app.content_request.enabled_mods.len(),
        seed,
        "paths_resolved"
    );

    let defs = compile_def_database(&paths, &app.content_request)?;

    let scenario_path = resolve_scenario_path(&paths.scenarios_dir, &app.scenario);
    let scenario = load_scenario(&scenario_path)?;
    info!(
        scenario = %scenario.name,
        path = %scenario_path.display(),
        enemies = scenario.enemies.len(),
        actions = scenario.actions.len(),
        "scenario_loaded"
    );

    Ok(scenario.run(defs, app.simulation_options(seed))?)
}

fn parse_seed(raw: Option<&str>) -> Result<u64, RunError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(0),
        Some(value) => value
            .parse()
            .map_err(|_| RunError::InvalidSeed(value.to_string())),
    }
}

fn resolve_scenario_path(scenarios_dir: &Path, requested: &Path) -> PathBuf {
    if requested.components().count() > 1 || requested.is_absolute() {
        requested.to_path_buf()
    } else {
        scenarios_dir.join(requested)
    }
}

fn log_report(report: &ScenarioReport) {
    info!(
        scenario = %report.scenario,
        frames = report.frames,
        elapsed_seconds = report.elapsed_seconds,
        player_health = report.player_health,
        player_alive = report.player_alive,
        enemies_alive = report.enemies_alive,
        drops = report.drops.len(),
        completed_challenges = report.completed_challenges.len(),
        "scenario_finished"
    );
    match serde_json::to_string(report) {
        Ok(json) => println!("{json}"),
        Err(err) => error!(error = %err, "report_serialize_failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_seed_defaults_to_zero() {
        assert_eq!(parse_seed(None).unwrap(), 0);
        assert_eq!(parse_seed(Some("  ")).unwrap(), 0);
        assert_eq!(parse_seed(Some(" 42 ")).unwrap(), 42);
    }

    #[test]
    fn non_numeric_seed_is_rejected() {
        let err = parse_seed(Some("abc")).expect_err("seed must be numeric");
        assert!(matches!(err, RunError::InvalidSeed(value) if value == "abc"));
    }

    #[test]
    fn bare_scenario_names_resolve_inside_scenarios_dir() {
        let dir = Path::new("/data/scenarios");
        assert_eq!(
            resolve_scenario_path(dir, Path::new("demo.json")),
            dir.join("demo.json")
        );
        assert_eq!(
            resolve_scenario_path(dir, Path::new("local/arena.json")),
            PathBuf::from("local/arena.json")
        );
    }
}

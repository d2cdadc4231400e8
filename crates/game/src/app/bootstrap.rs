use std::path::PathBuf;

use engine::{ContentRequest, LoopConfig};
use skirmish::SimulationOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

const ENABLED_MODS_ENV_VAR: &str = "SKIRMISH_ENABLED_MODS";
const SEED_ENV_VAR: &str = "SKIRMISH_SEED";
const DEFAULT_SCENARIO: &str = "demo.json";

pub(crate) struct AppWiring {
    pub(crate) content_request: ContentRequest,
    /// A path, or a file name looked up in the scenarios directory.
    pub(crate) scenario: PathBuf,
    pub(crate) seed_override: Option<String>,
    pub(crate) loop_config: LoopConfig,
}

impl AppWiring {
    pub(crate) fn simulation_options(&self, seed: u64) -> SimulationOptions {
        SimulationOptions {
            seed,
            loop_config: self.loop_config.clone(),
        }
    }
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Skirmish Startup ===");

    let scenario = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCENARIO));

    AppWiring {
        content_request: ContentRequest::with_mods(parse_enabled_mods_from_env()),
        scenario,
        seed_override: std::env::var(SEED_ENV_VAR).ok(),
        loop_config: LoopConfig::default(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_enabled_mods_from_env() -> Vec<String> {
    std::env::var(ENABLED_MODS_ENV_VAR)
        .ok()
        .map(|raw| split_mod_list(&raw))
        .unwrap_or_default()
}

fn split_mod_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}

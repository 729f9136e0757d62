use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::loop_runner::LoopConfig;

pub(crate) const CATALOG_ENV_VAR: &str = "REALM_CATALOG";
pub(crate) const WORLD_ENV_VAR: &str = "REALM_WORLD";
pub(crate) const SAVE_ENV_VAR: &str = "REALM_SAVE";
pub(crate) const TICKS_ENV_VAR: &str = "REALM_TICKS";
pub(crate) const SEED_ENV_VAR: &str = "REALM_SEED";
pub(crate) const REALTIME_ENV_VAR: &str = "REALM_REALTIME";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Realm Sandbox Startup ===");

    let config = config_from_env(|name| env::var(name));
    info!(
        ticks = config.ticks,
        realtime = config.realtime,
        seed = config.ai_seed,
        catalog = ?config.catalog_path,
        world = ?config.world_path,
        save = ?config.save_path,
        "sandbox_config"
    );
    AppWiring { config }
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

/// Overlays environment settings on the defaults. Values that fail to parse
/// are logged and ignored.
pub(crate) fn config_from_env<F>(read: F) -> LoopConfig
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    let mut config = LoopConfig::default();
    if let Some(path) = read_var(&read, CATALOG_ENV_VAR) {
        config.catalog_path = Some(PathBuf::from(path));
    }
    if let Some(path) = read_var(&read, WORLD_ENV_VAR) {
        config.world_path = Some(PathBuf::from(path));
    }
    if let Some(path) = read_var(&read, SAVE_ENV_VAR) {
        config.save_path = Some(PathBuf::from(path));
    }
    if let Some(ticks) = parse_var::<u64, _>(&read, TICKS_ENV_VAR) {
        config.ticks = ticks;
    }
    if let Some(seed) = parse_var::<u64, _>(&read, SEED_ENV_VAR) {
        config.ai_seed = seed;
    }
    if let Some(raw) = read_var(&read, REALTIME_ENV_VAR) {
        match parse_flag(&raw) {
            Some(realtime) => config.realtime = realtime,
            None => warn!(
                env_var = REALTIME_ENV_VAR,
                value = raw.as_str(),
                "invalid flag value; keeping default"
            ),
        }
    }
    config
}

fn read_var<F>(read: &F, name: &'static str) -> Option<String>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match read(name) {
        Ok(value) => {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(env_var = name, error = %err, "unable to read env var; keeping default");
            None
        }
    }
}

fn parse_var<T, F>(read: &F, name: &'static str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    let raw = read_var(read, name)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(
                env_var = name,
                value = raw.as_str(),
                "invalid env var value; keeping default"
            );
            None
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

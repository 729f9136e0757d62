use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use realm_core::{
    load_catalog_from_path, parse_catalog, AssetCatalog, CatalogError, SaveError, SavedWorld,
    SimConfig, SimEvent, SimMode, Simulation, WorldError,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::bootstrap::AppWiring;
use super::demo;
use super::loader::ThreadedModelLoader;
use super::script::ScriptedRoute;

const BUNDLED_CATALOG_NAME: &str = "assets/base/catalog.xml";
const BUNDLED_CATALOG: &str = include_str!("../../../../assets/base/catalog.xml");

#[derive(Debug, Clone)]
pub(crate) struct LoopConfig {
    pub(crate) target_tps: u32,
    pub(crate) ticks: u64,
    pub(crate) realtime: bool,
    pub(crate) max_frame_delta: Duration,
    pub(crate) metrics_log_interval: Duration,
    pub(crate) catalog_path: Option<PathBuf>,
    pub(crate) world_path: Option<PathBuf>,
    pub(crate) save_path: Option<PathBuf>,
    pub(crate) ai_seed: u64,
    pub(crate) interact_every_ticks: u64,
    pub(crate) skill_every_ticks: u64,
    pub(crate) model_latency: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            ticks: 600,
            realtime: false,
            max_frame_delta: Duration::from_millis(250),
            metrics_log_interval: Duration::from_secs(1),
            catalog_path: None,
            world_path: None,
            save_path: None,
            ai_seed: SimConfig::default().ai_seed,
            interact_every_ticks: 90,
            skill_every_ticks: 45,
            model_latency: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum SandboxError {
    #[error("failed to load asset catalog: {0}")]
    Catalog(#[source] CatalogError),
    #[error("failed to read world {}: {source}", path.display())]
    LoadWorld {
        path: PathBuf,
        #[source]
        source: SaveError,
    },
    #[error("failed to write world {}: {source}", path.display())]
    SaveWorld {
        path: PathBuf,
        #[source]
        source: SaveError,
    },
    #[error("failed to build world: {0}")]
    World(#[source] WorldError),
    #[error("failed to start model loader: {0}")]
    SpawnLoader(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub(crate) ticks: u64,
    pub(crate) events: usize,
    pub(crate) entity_count: usize,
    pub(crate) player_deaths: u32,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_sandbox(&app.config) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                events = summary.events,
                entity_count = summary.entity_count,
                player_deaths = summary.player_deaths,
                "shutdown"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "sandbox_failed");
            ExitCode::FAILURE
        }
    }
}

pub(crate) fn run_sandbox(config: &LoopConfig) -> Result<RunSummary, SandboxError> {
    let catalog = load_catalog(config)?;
    info!(asset_def_count = catalog.len(), "catalog_loaded");

    let sim_config = SimConfig {
        ai_seed: config.ai_seed,
        metrics_interval: normalize_non_zero_duration(
            config.metrics_log_interval,
            Duration::from_secs(1),
        ),
        ..SimConfig::default()
    };
    let mut sim = Simulation::new(sim_config, catalog.clone());
    let loader = ThreadedModelLoader::spawn(catalog, config.model_latency)
        .map_err(SandboxError::SpawnLoader)?;
    sim.set_model_loader(Box::new(loader));

    match &config.world_path {
        Some(path) => {
            let saved = SavedWorld::load_from_path(path).map_err(|source| {
                SandboxError::LoadWorld {
                    path: path.clone(),
                    source,
                }
            })?;
            sim.load_world(&saved).map_err(SandboxError::World)?;
            sim.set_safe_zone(Some(demo::safe_zone()));
            info!(
                path = %path.display(),
                entity_count = sim.world().entity_count(),
                "world_file_loaded"
            );
        }
        None => {
            demo::populate(&mut sim).map_err(SandboxError::World)?;
        }
    }
    sim.set_mode(SimMode::Play);

    let mut route = ScriptedRoute::demo(sim.combat().skills().len())
        .with_schedule(config.interact_every_ticks, config.skill_every_ticks);
    let summary = drive(&mut sim, &mut route, config);

    if let Some(path) = &config.save_path {
        sim.serialize_world()
            .save_to_path(path)
            .map_err(|source| SandboxError::SaveWorld {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), "world_saved");
    }
    Ok(summary)
}

fn load_catalog(config: &LoopConfig) -> Result<AssetCatalog, SandboxError> {
    match &config.catalog_path {
        Some(path) => load_catalog_from_path(path),
        None => parse_catalog(BUNDLED_CATALOG_NAME, BUNDLED_CATALOG),
    }
    .map_err(SandboxError::Catalog)
}

fn drive(sim: &mut Simulation, route: &mut ScriptedRoute, config: &LoopConfig) -> RunSummary {
    let fixed_dt = fixed_tick_duration(config.target_tps);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    info!(
        target_tps = config.target_tps.max(1),
        ticks = config.ticks,
        realtime = config.realtime,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        "loop_config"
    );

    let mut summary = RunSummary {
        ticks: 0,
        events: 0,
        entity_count: sim.world().entity_count(),
        player_deaths: 0,
    };
    let mut last_frame_instant = Instant::now();
    let mut last_metrics_log = Instant::now();

    for tick in 1..=config.ticks {
        let frame_start = Instant::now();
        let dt = if config.realtime {
            let raw = frame_start.saturating_duration_since(last_frame_instant);
            clamp_frame_delta(raw, max_frame_delta)
        } else {
            fixed_dt
        };
        last_frame_instant = frame_start;

        let input = route.input_for(tick, sim.player().position);
        sim.tick(dt.as_secs_f32(), &input);
        summary.ticks = tick;

        for event in sim.drain_events() {
            log_event(&event);
            summary.events += 1;
        }

        if sim.player().vitals.is_dead() {
            summary.player_deaths += 1;
            info!(tick, "player_died");
            sim.respawn_player();
        }

        let now = Instant::now();
        if now.saturating_duration_since(last_metrics_log) >= metrics_log_interval {
            last_metrics_log = now;
            let snapshot = sim.metrics_handle().snapshot();
            info!(
                tick,
                tps = snapshot.tps,
                avg_tick_ms = snapshot.avg_tick_ms,
                max_tick_ms = snapshot.max_tick_ms,
                entity_count = snapshot.entity_count,
                npc_count = snapshot.npc_count,
                effect_count = snapshot.effect_count,
                "loop_metrics"
            );
        }

        if config.realtime {
            let sleep = compute_cap_sleep(
                Instant::now().saturating_duration_since(frame_start),
                Some(fixed_dt),
            );
            if sleep > Duration::ZERO {
                thread::sleep(sleep);
            }
        }
    }

    if sim.pending_model_loads() > 0 {
        warn!(pending = sim.pending_model_loads(), "model_loads_unfinished");
    }
    summary.entity_count = sim.world().entity_count();
    summary
}

fn log_event(event: &SimEvent) {
    match *event {
        SimEvent::TriggerEnter { entity_id } => info!(entity_id = entity_id.0, "trigger_enter"),
        SimEvent::TriggerExit { entity_id } => info!(entity_id = entity_id.0, "trigger_exit"),
        SimEvent::Interact { entity_id } => info!(entity_id = entity_id.0, "interact"),
        SimEvent::NpcStateChanged {
            entity_id,
            from,
            to,
        } => debug!(entity_id = entity_id.0, %from, %to, "npc_state_changed"),
        SimEvent::NpcAttack { entity_id, damage } => {
            debug!(entity_id = entity_id.0, damage, "npc_attack")
        }
        SimEvent::DamageDealt {
            target,
            amount,
            slot,
        } => info!(?target, amount, slot, "damage_dealt"),
        SimEvent::DamageReceived { source, amount } => {
            info!(source = source.0, amount, "damage_received")
        }
        SimEvent::SkillUsed { slot, kind } => debug!(slot, ?kind, "skill_used"),
        SimEvent::SkillCooldown { slot, remaining } => {
            debug!(slot, remaining, "skill_on_cooldown")
        }
        SimEvent::TargetKilled { target } => info!(?target, "target_killed"),
    }
}

fn fixed_tick_duration(target_tps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / target_tps.max(1) as f64)
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

use anyhow::{Context, Result};
use flock_cage::{Simulation, SimulationConfig};
use glam::Vec3;
use tracing::{info, warn};

const DEFAULT_TICKS: u64 = 600;
const DEFAULT_DT: f32 = 1.0 / 60.0;
const REPORT_EVERY: u64 = 60;

fn main() -> Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => load_config(&path)?,
        None => SimulationConfig::default(),
    };
    let ticks = match args.next() {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("tick count `{raw}` is not a number"))?,
        None => DEFAULT_TICKS,
    };
    let dt = match args.next() {
        Some(raw) => raw
            .parse::<f32>()
            .with_context(|| format!("time step `{raw}` is not a number"))?,
        None => DEFAULT_DT,
    };

    let mut simulation = Simulation::seeded(config)?;
    info!(
        agents = simulation.len(),
        ticks, dt, "starting headless flock run"
    );

    for _ in 0..ticks {
        let summary = simulation.step(dt)?;
        if summary.tick % REPORT_EVERY == 0 {
            let centroid = centroid(&simulation);
            info!(
                tick = summary.tick,
                neighbors = summary.neighbors_visited,
                wall_avoiders = summary.wall_avoiders,
                obstacle_hits = summary.obstacle_hits,
                centroid = ?centroid,
                "flock status"
            );
        }
    }

    if simulation.is_empty() {
        warn!("ran an empty flock");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn load_config(path: &str) -> Result<SimulationConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {path}"))?;
    let config = SimulationConfig::from_json(&raw)
        .with_context(|| format!("failed to load config file {path}"))?;
    Ok(config)
}

fn centroid(simulation: &Simulation) -> Vec3 {
    let transforms = simulation.store().transforms();
    if transforms.is_empty() {
        return Vec3::ZERO;
    }
    transforms.iter().map(|t| t.position).sum::<Vec3>() / transforms.len() as f32
}

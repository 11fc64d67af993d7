use glam::Vec3;
use wasm_bindgen::prelude::*;

pub mod aggregate;
pub mod config;
pub mod error;
pub mod force;
pub mod integrate;
pub mod math;
pub mod neighbor_grid;
pub mod obstacle;
pub mod simulation;
pub mod store;

pub use aggregate::{aggregate_brute_force, NeighborSums, Neighborhood};
pub use config::{NeighborSearch, SimulationConfig};
pub use error::{ConfigError, SimulationError, StoreError};
pub use obstacle::{NoObstacles, ObstacleHit, ObstacleQuery, ObstacleSet};
pub use simulation::{Simulation, TickSummary};
pub use store::{AgentId, AgentStore, Snapshot, Transform};

/// Browser-facing handle: steps the flock and exposes flat render buffers.
#[wasm_bindgen]
pub struct Sim {
    simulation: Simulation,
    obstacles: ObstacleSet,
    render_positions: Vec<f32>,
    render_rotations: Vec<f32>,
}

#[wasm_bindgen]
impl Sim {
    #[wasm_bindgen(constructor)]
    pub fn new(count: usize, cage_limits: f32) -> Result<Sim, String> {
        let config = SimulationConfig {
            population: count,
            cage_limits,
            ..SimulationConfig::default()
        };
        Self::with_config(config)
    }

    pub fn from_config_json(json: &str) -> Result<Sim, String> {
        let config = SimulationConfig::from_json(json).map_err(|err| err.to_string())?;
        Self::with_config(config)
    }

    pub fn step(&mut self, dt: f32) -> Result<(), String> {
        self.simulation.step(dt).map_err(|err| err.to_string())?;
        self.sync_render_buffers();
        Ok(())
    }

    pub fn set_config_json(&mut self, json: &str) -> Result<(), String> {
        let config = SimulationConfig::from_json(json).map_err(|err| err.to_string())?;
        self.simulation
            .set_config(config)
            .map_err(|err| err.to_string())
    }

    pub fn add_sphere_obstacle(&mut self, x: f32, y: f32, z: f32, radius: f32) {
        self.obstacles.add_sphere(Vec3::new(x, y, z), radius);
        self.simulation
            .set_obstacles(Box::new(self.obstacles.clone()));
    }

    pub fn add_plane_obstacle(&mut self, nx: f32, ny: f32, nz: f32, offset: f32) {
        self.obstacles.add_plane(Vec3::new(nx, ny, nz), offset);
        self.simulation
            .set_obstacles(Box::new(self.obstacles.clone()));
    }

    pub fn clear_obstacles(&mut self) {
        self.obstacles.clear();
        self.simulation.set_obstacles(Box::new(NoObstacles));
    }

    pub fn count(&self) -> usize {
        self.simulation.len()
    }

    pub fn tick(&self) -> u64 {
        self.simulation.tick()
    }

    /// xyz per agent.
    pub fn positions(&self) -> Vec<f32> {
        self.render_positions.clone()
    }

    /// Quaternion xyzw per agent.
    pub fn rotations(&self) -> Vec<f32> {
        self.render_rotations.clone()
    }

    /// Column-major 4x4 transform per agent, unit scale.
    pub fn matrices(&self) -> Vec<f32> {
        self.simulation
            .store()
            .transforms()
            .iter()
            .flat_map(|transform| transform.to_matrix().to_cols_array())
            .collect()
    }
}

impl Sim {
    fn with_config(config: SimulationConfig) -> Result<Sim, String> {
        let simulation = Simulation::seeded(config).map_err(|err| err.to_string())?;
        let mut sim = Sim {
            simulation,
            obstacles: ObstacleSet::new(),
            render_positions: Vec::new(),
            render_rotations: Vec::new(),
        };
        sim.sync_render_buffers();
        Ok(sim)
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    fn sync_render_buffers(&mut self) {
        let transforms = self.simulation.store().transforms();
        self.render_positions.clear();
        self.render_rotations.clear();
        for transform in transforms {
            self.render_positions
                .extend_from_slice(&transform.position.to_array());
            self.render_rotations
                .extend_from_slice(&transform.rotation.to_array());
        }
    }
}

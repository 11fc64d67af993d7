use rayon::prelude::*;
use tracing::{debug, debug_span, info, trace, warn};

use crate::aggregate::Neighborhood;
use crate::config::SimulationConfig;
use crate::error::{ConfigError, SimulationError};
use crate::force::{compose_force, wall_force};
use crate::integrate::integrate;
use crate::obstacle::{NoObstacles, ObstacleProbes, ObstacleQuery, Ray};
use crate::store::{AgentStore, Snapshot, Transform};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: u64,
    pub agents: usize,
    pub neighbors_visited: usize,
    pub obstacle_hits: usize,
    pub wall_avoiders: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct AgentUpdate {
    pub transform: Transform,
    pub neighbors: usize,
    pub avoided_wall: bool,
}

/// Every tick goes snapshot, obstacle probe, compute, commit. Compute reads
/// only the snapshot and the probe results, so agents can be processed in
/// any order or in parallel.
pub struct Simulation {
    config: SimulationConfig,
    store: AgentStore,
    obstacles: Box<dyn ObstacleQuery>,
    neighborhood: Neighborhood,
    snapshot: Snapshot,
    probes: ObstacleProbes,
    buffer: Vec<Transform>,
    tick: u64,
}

impl Simulation {
    pub fn new(
        mut config: SimulationConfig,
        store: AgentStore,
        obstacles: Box<dyn ObstacleQuery>,
    ) -> Result<Self, SimulationError> {
        config.sanitize();
        config.population = store.len();
        config.validate()?;

        info!(
            agents = store.len(),
            cage_limits = config.cage_limits,
            search = ?config.neighbor_search,
            parallel = config.parallel,
            "created flock simulation"
        );

        Ok(Self {
            neighborhood: Neighborhood::new(&config),
            config,
            store,
            obstacles,
            snapshot: Snapshot::default(),
            probes: ObstacleProbes::default(),
            buffer: Vec::new(),
            tick: 0,
        })
    }

    pub fn seeded(mut config: SimulationConfig) -> Result<Self, SimulationError> {
        config.sanitize();
        config.validate()?;
        let store = AgentStore::seeded(config.population, config.cage_limits);
        Self::new(config, store, Box::new(NoObstacles))
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replaces the parameters used by subsequent ticks. The population is
    /// fixed at startup and cannot change here.
    pub fn set_config(&mut self, mut config: SimulationConfig) -> Result<(), ConfigError> {
        config.sanitize();
        config.validate()?;
        if config.population != self.store.len() {
            return Err(ConfigError::InvalidConfig(
                "population cannot change after startup",
            ));
        }
        self.config = config;
        Ok(())
    }

    pub fn set_obstacles(&mut self, obstacles: Box<dyn ObstacleQuery>) {
        self.obstacles = obstacles;
    }

    pub fn store(&self) -> &AgentStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn transform(&self, index: usize) -> Option<&Transform> {
        self.store.transform(index)
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn step(&mut self, dt: f32) -> Result<TickSummary, SimulationError> {
        let dt = sanitize_dt(dt);
        let config = self.config;
        let tick = self.tick + 1;
        let span = debug_span!("tick", tick);
        let _enter = span.enter();

        self.store.snapshot_into(&mut self.snapshot);
        trace!(agents = self.snapshot.len(), "snapshot taken");

        let probe_distance = config.obstacle_probe_distance;
        self.probes.run(
            self.obstacles.as_ref(),
            self.snapshot.records().iter().map(|record| Ray {
                origin: record.transform.position,
                direction: record.forward,
                max_distance: probe_distance,
            }),
            config.parallel,
        );
        let obstacle_hits = self.probes.hit_count();
        trace!(obstacle_hits, "obstacle probe resolved");

        self.neighborhood.prepare(&self.snapshot, &config);
        let (neighbors_visited, wall_avoiders) = compute_phase(
            &self.snapshot,
            &self.neighborhood,
            &self.probes,
            &config,
            dt,
            &mut self.buffer,
        );
        trace!(neighbors_visited, "compute finished");

        debug_assert!(
            self.buffer.iter().all(Transform::is_finite),
            "compute produced a non-finite transform"
        );
        self.store.commit(&self.buffer)?;
        self.tick = tick;

        let summary = TickSummary {
            tick,
            agents: self.snapshot.len(),
            neighbors_visited,
            obstacle_hits,
            wall_avoiders,
        };
        debug!(
            neighbors_visited,
            obstacle_hits, wall_avoiders, "tick committed"
        );
        Ok(summary)
    }
}

fn sanitize_dt(dt: f32) -> f32 {
    if dt.is_finite() && dt >= 0.0 {
        dt
    } else {
        warn!(dt, "ignoring invalid time step");
        0.0
    }
}

/// Fills `buffer` with one new transform per snapshot entry. Returns the
/// total neighbor count and the number of agents steering off a wall.
fn compute_phase(
    snapshot: &Snapshot,
    neighborhood: &Neighborhood,
    probes: &ObstacleProbes,
    config: &SimulationConfig,
    dt: f32,
    buffer: &mut Vec<Transform>,
) -> (usize, usize) {
    buffer.clear();
    buffer.extend(snapshot.records().iter().map(|record| record.transform));

    let write = |scratch: &mut Vec<usize>, (index, slot): (usize, &mut Transform)| {
        let update = compute_agent(snapshot, neighborhood, probes, config, index, dt, scratch);
        *slot = update.transform;
        (update.neighbors, usize::from(update.avoided_wall))
    };

    if config.parallel {
        buffer
            .par_iter_mut()
            .enumerate()
            .map_init(Vec::new, write)
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
    } else {
        let mut scratch = Vec::new();
        buffer
            .iter_mut()
            .enumerate()
            .map(|item| write(&mut scratch, item))
            .fold((0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
    }
}

pub(crate) fn compute_agent(
    snapshot: &Snapshot,
    neighborhood: &Neighborhood,
    probes: &ObstacleProbes,
    config: &SimulationConfig,
    index: usize,
    dt: f32,
    scratch: &mut Vec<usize>,
) -> AgentUpdate {
    let record = &snapshot.records()[index];
    let position = record.transform.position;
    let sums = neighborhood.aggregate(snapshot, index, scratch);
    let obstacle = probes.hit(index);

    let force = compose_force(position, record.forward, &sums, obstacle, config);
    let (transform, _velocity) =
        integrate(&record.transform, record.forward, force, config.boid_speed, dt);

    AgentUpdate {
        transform,
        neighbors: sums.count,
        avoided_wall: obstacle.is_none() && wall_force(position, config).is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::{compute_agent, Simulation};
    use crate::aggregate::Neighborhood;
    use crate::config::{NeighborSearch, SimulationConfig};
    use crate::error::ConfigError;
    use crate::math::reflect;
    use crate::obstacle::{NoObstacles, ObstacleHit, ObstacleProbes, ObstacleSet};
    use crate::store::{AgentStore, Transform};
    use glam::{Quat, Vec3};

    fn dense_config(parallel: bool) -> SimulationConfig {
        SimulationConfig {
            population: 120,
            cage_limits: 12.0,
            perception_radius: 2.5,
            parallel,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn compute_order_does_not_change_results() {
        let config = dense_config(false);
        let store = AgentStore::seeded(config.population, config.cage_limits);
        let snapshot = store.snapshot();
        let mut neighborhood = Neighborhood::new(&config);
        neighborhood.prepare(&snapshot, &config);
        let probes = ObstacleProbes::from_hits(
            (0..snapshot.len())
                .map(|i| (i % 7 == 0).then(|| ObstacleHit::new(1.0, Vec3::X)))
                .collect(),
        );

        let mut scratch = Vec::new();
        let mut run = |i: usize| {
            compute_agent(&snapshot, &neighborhood, &probes, &config, i, 0.02, &mut scratch)
                .transform
        };

        let forward: Vec<Transform> = (0..snapshot.len()).map(&mut run).collect();

        let mut reversed = vec![Transform::new(Vec3::ZERO, Quat::IDENTITY); snapshot.len()];
        for i in (0..snapshot.len()).rev() {
            reversed[i] = run(i);
        }
        assert_eq!(forward, reversed);

        let mut strided = vec![Transform::new(Vec3::ZERO, Quat::IDENTITY); snapshot.len()];
        for offset in 0..5 {
            for i in (offset..snapshot.len()).step_by(5) {
                strided[i] = run(i);
            }
        }
        assert_eq!(forward, strided);
    }

    #[test]
    fn parallel_and_sequential_ticks_agree() {
        let mut sequential = Simulation::seeded(dense_config(false)).expect("valid config");
        let mut parallel = Simulation::seeded(dense_config(true)).expect("valid config");

        for _ in 0..5 {
            let a = sequential.step(1.0 / 60.0).expect("tick");
            let b = parallel.step(1.0 / 60.0).expect("tick");
            assert_eq!(a, b);
        }
        assert_eq!(sequential.store().transforms(), parallel.store().transforms());
    }

    #[test]
    fn grid_search_reproduces_brute_force_trajectories() {
        let mut brute = Simulation::seeded(dense_config(true)).expect("valid config");
        let mut grid = Simulation::seeded(SimulationConfig {
            neighbor_search: NeighborSearch::UniformGrid,
            ..dense_config(true)
        })
        .expect("valid config");

        for _ in 0..10 {
            brute.step(0.05).expect("tick");
            grid.step(0.05).expect("tick");
        }
        assert_eq!(brute.store().transforms(), grid.store().transforms());
    }

    #[test]
    fn obstacle_probe_feeds_the_override() {
        let config = SimulationConfig {
            cage_limits: 40.0,
            perception_radius: 5.0,
            avoid_obstacles_weight: 6.0,
            obstacle_probe_distance: 4.0,
            parallel: false,
            ..SimulationConfig::default()
        };
        let store = AgentStore::from_transforms(vec![
            Transform::new(Vec3::ZERO, Quat::IDENTITY),
            Transform::new(Vec3::new(2.0, 0.0, 0.0), Quat::IDENTITY),
            Transform::new(Vec3::new(0.0, 2.5, 0.0), Quat::IDENTITY),
        ]);
        let mut world = ObstacleSet::new();
        world.add_sphere(Vec3::new(0.0, 0.0, 3.0), 1.0);

        let mut sim = Simulation::new(config, store, Box::new(world)).expect("valid config");
        let summary = sim.step(0.1).expect("tick");
        assert_eq!(summary.obstacle_hits, 1);

        // only agent 0 sees the sphere; its force is the mirrored heading
        let expected_force = reflect(Vec3::Z, Vec3::new(0.0, 0.0, -1.0)) * 6.0;
        assert_eq!(expected_force, Vec3::new(0.0, 0.0, -6.0));
        let moved = sim.transform(0).expect("agent 0").position;
        let steered = Vec3::Z * config.boid_speed + expected_force * 0.1;
        let expected = steered.normalize() * config.boid_speed * 0.1;
        assert!((moved - expected).length() < 1.0e-5);
    }

    #[test]
    fn coincident_agents_stay_finite() {
        let config = SimulationConfig {
            parallel: false,
            ..SimulationConfig::default()
        };
        let spot = Transform::new(Vec3::new(2.0, 2.0, 2.0), Quat::IDENTITY);
        let store = AgentStore::from_transforms(vec![spot; 4]);
        let mut sim = Simulation::new(config, store, Box::new(NoObstacles)).expect("valid config");

        let summary = sim.step(0.1).expect("tick");
        assert_eq!(summary.neighbors_visited, 12);
        assert!(sim.store().transforms().iter().all(Transform::is_finite));
    }

    #[test]
    fn population_is_fixed_after_startup() {
        let mut sim = Simulation::seeded(SimulationConfig {
            population: 10,
            ..SimulationConfig::default()
        })
        .expect("valid config");

        let grown = SimulationConfig {
            population: 11,
            ..*sim.config()
        };
        assert!(matches!(
            sim.set_config(grown),
            Err(ConfigError::InvalidConfig(_))
        ));

        let faster = SimulationConfig {
            boid_speed: 20.0,
            ..*sim.config()
        };
        assert!(sim.set_config(faster).is_ok());
        assert_eq!(sim.config().boid_speed, 20.0);
    }

    #[test]
    fn invalid_time_step_freezes_positions() {
        let mut sim = Simulation::seeded(SimulationConfig {
            population: 8,
            parallel: false,
            ..SimulationConfig::default()
        })
        .expect("valid config");
        let before: Vec<Vec3> = sim.store().transforms().iter().map(|t| t.position).collect();

        sim.step(f32::NAN).expect("tick");
        let after: Vec<Vec3> = sim.store().transforms().iter().map(|t| t.position).collect();
        assert_eq!(before, after);
        assert_eq!(sim.tick(), 1);
    }
}

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

pub const DEFAULT_POPULATION: usize = 200;
pub const MAX_POPULATION: usize = 100_000;
const MAX_EXTENT: f32 = 1.0e5;
const MAX_WEIGHT: f32 = 1.0e3;

/// How the compute phase finds agents inside the perception radius.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborSearch {
    #[default]
    BruteForce,
    UniformGrid,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub population: usize,
    /// Full edge length of the cubic cage centered at the origin.
    pub cage_limits: f32,
    pub boid_speed: f32,
    pub perception_radius: f32,
    pub separation_weight: f32,
    pub cohesion_weight: f32,
    pub alignment_weight: f32,
    pub avoid_walls_weight: f32,
    /// Distance from the nearest cage face below which agents turn back.
    pub avoid_walls_turn_dist: f32,
    pub avoid_obstacles_weight: f32,
    pub obstacle_probe_distance: f32,
    pub neighbor_search: NeighborSearch,
    pub parallel: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population: DEFAULT_POPULATION,
            cage_limits: 40.0,
            boid_speed: 8.0,
            perception_radius: 3.0,
            separation_weight: 1.5,
            cohesion_weight: 1.0,
            alignment_weight: 1.0,
            avoid_walls_weight: 8.0,
            avoid_walls_turn_dist: 3.0,
            avoid_obstacles_weight: 10.0,
            obstacle_probe_distance: 4.0,
            neighbor_search: NeighborSearch::BruteForce,
            parallel: true,
        }
    }
}

impl SimulationConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.sanitize();
        config.validate()?;
        Ok(config)
    }

    pub fn half_extent(&self) -> f32 {
        self.cage_limits * 0.5
    }

    /// Replaces non-finite values with defaults and clamps the rest into
    /// workable ranges.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();

        if self.population > MAX_POPULATION {
            warn!(
                requested = self.population,
                max = MAX_POPULATION,
                "clamping population"
            );
            self.population = MAX_POPULATION;
        }

        repair("cage_limits", &mut self.cage_limits, 0.0, MAX_EXTENT, defaults.cage_limits);
        repair("boid_speed", &mut self.boid_speed, 0.0, MAX_EXTENT, defaults.boid_speed);
        repair(
            "perception_radius",
            &mut self.perception_radius,
            0.0,
            MAX_EXTENT,
            defaults.perception_radius,
        );
        repair(
            "separation_weight",
            &mut self.separation_weight,
            -MAX_WEIGHT,
            MAX_WEIGHT,
            defaults.separation_weight,
        );
        repair(
            "cohesion_weight",
            &mut self.cohesion_weight,
            -MAX_WEIGHT,
            MAX_WEIGHT,
            defaults.cohesion_weight,
        );
        repair(
            "alignment_weight",
            &mut self.alignment_weight,
            -MAX_WEIGHT,
            MAX_WEIGHT,
            defaults.alignment_weight,
        );
        repair(
            "avoid_walls_weight",
            &mut self.avoid_walls_weight,
            -MAX_WEIGHT,
            MAX_WEIGHT,
            defaults.avoid_walls_weight,
        );
        repair(
            "avoid_walls_turn_dist",
            &mut self.avoid_walls_turn_dist,
            0.0,
            MAX_EXTENT,
            defaults.avoid_walls_turn_dist,
        );
        repair(
            "avoid_obstacles_weight",
            &mut self.avoid_obstacles_weight,
            -MAX_WEIGHT,
            MAX_WEIGHT,
            defaults.avoid_obstacles_weight,
        );
        repair(
            "obstacle_probe_distance",
            &mut self.obstacle_probe_distance,
            0.0,
            MAX_EXTENT,
            defaults.obstacle_probe_distance,
        );
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cage_limits > 0.0) {
            return Err(ConfigError::InvalidConfig("cage_limits must be positive"));
        }
        if !(self.boid_speed > 0.0) {
            return Err(ConfigError::InvalidConfig("boid_speed must be positive"));
        }
        if !(self.perception_radius > 0.0) {
            return Err(ConfigError::InvalidConfig(
                "perception_radius must be positive",
            ));
        }
        if !(self.avoid_walls_turn_dist >= 0.0) {
            return Err(ConfigError::InvalidConfig(
                "avoid_walls_turn_dist must be non-negative",
            ));
        }
        if !(self.obstacle_probe_distance >= 0.0) {
            return Err(ConfigError::InvalidConfig(
                "obstacle_probe_distance must be non-negative",
            ));
        }
        if self.population > MAX_POPULATION {
            return Err(ConfigError::InvalidConfig("population is too large"));
        }
        Ok(())
    }
}

fn repair(field: &'static str, value: &mut f32, min: f32, max: f32, fallback: f32) {
    let repaired = clamp_finite(*value, min, max, fallback);
    if repaired.to_bits() != value.to_bits() {
        warn!(field, from = *value, to = repaired, "repaired configuration value");
        *value = repaired;
    }
}

fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(min, max)
}

use glam::Vec3;

use crate::aggregate::NeighborSums;
use crate::config::SimulationConfig;
use crate::math::{normalize_or, reflect};
use crate::obstacle::ObstacleHit;

/// Distance from `position` to the closest face of the cage; negative once
/// the position has left the cage on some axis.
pub fn wall_margin(position: Vec3, half_extent: f32) -> f32 {
    let margins = Vec3::splat(half_extent) - position.abs();
    margins.x.min(margins.y).min(margins.z)
}

pub fn flocking_force(position: Vec3, sums: &NeighborSums, config: &SimulationConfig) -> Vec3 {
    if sums.count == 0 {
        return Vec3::ZERO;
    }
    let n = sums.count as f32;
    let mut force = Vec3::ZERO;
    // away from crowding neighbors
    force += (sums.separation_sum / n) * config.separation_weight;
    // toward the local center of mass
    force += ((sums.position_sum / n) - position) * config.cohesion_weight;
    // toward the mean heading
    force += (sums.heading_sum / n) * config.alignment_weight;
    force
}

/// Pulls toward the origin once an agent is within the turn distance of any face.
pub fn wall_force(position: Vec3, config: &SimulationConfig) -> Option<Vec3> {
    if wall_margin(position, config.half_extent()) < config.avoid_walls_turn_dist {
        Some(-normalize_or(position, Vec3::ZERO) * config.avoid_walls_weight)
    } else {
        None
    }
}

/// Combined steering force for one agent. An obstacle hit replaces every
/// other contribution.
pub fn compose_force(
    position: Vec3,
    forward: Vec3,
    sums: &NeighborSums,
    obstacle: Option<ObstacleHit>,
    config: &SimulationConfig,
) -> Vec3 {
    if let Some(hit) = obstacle {
        return reflect(forward, hit.normal) * config.avoid_obstacles_weight;
    }

    let mut force = flocking_force(position, sums, config);
    if let Some(wall) = wall_force(position, config) {
        force += wall;
    }
    force
}

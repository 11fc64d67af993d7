use glam::Vec3;

use crate::config::{NeighborSearch, SimulationConfig};
use crate::math::separation_scale;
use crate::neighbor_grid::NeighborGrid;
use crate::store::{AgentRecord, Snapshot};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NeighborSums {
    pub separation_sum: Vec3,
    pub position_sum: Vec3,
    pub heading_sum: Vec3,
    pub count: usize,
}

impl NeighborSums {
    #[inline]
    fn accumulate(&mut self, agent: &AgentRecord, other: &AgentRecord, radius: f32) {
        if other.id == agent.id {
            return;
        }
        let offset = agent.transform.position - other.transform.position;
        let distance = offset.length();
        if distance < radius {
            self.separation_sum += offset * separation_scale(distance);
            self.position_sum += other.transform.position;
            self.heading_sum += other.forward;
            self.count += 1;
        }
    }
}

/// All-pairs scan over the snapshot. This is the reference result every
/// other search strategy has to reproduce bit for bit.
pub fn aggregate_brute_force(snapshot: &Snapshot, index: usize, radius: f32) -> NeighborSums {
    let mut sums = NeighborSums::default();
    let Some(agent) = snapshot.get(index) else {
        return sums;
    };
    for other in snapshot.records() {
        sums.accumulate(agent, other, radius);
    }
    sums
}

/// Grid-accelerated scan. Candidates are visited in ascending index order so
/// the floating-point sums match [`aggregate_brute_force`] exactly.
///
/// `candidates` is scratch space; its contents are overwritten.
pub fn aggregate_with_grid(
    snapshot: &Snapshot,
    grid: &NeighborGrid,
    index: usize,
    radius: f32,
    candidates: &mut Vec<usize>,
) -> NeighborSums {
    let mut sums = NeighborSums::default();
    let Some(agent) = snapshot.get(index) else {
        return sums;
    };

    candidates.clear();
    grid.for_each_candidate(index, radius, |j| candidates.push(j));
    candidates.sort_unstable();

    let records = snapshot.records();
    for &j in candidates.iter() {
        sums.accumulate(agent, &records[j], radius);
    }
    sums
}

/// Per-tick neighbor search state. `prepare` runs once after the snapshot
/// is taken, then `aggregate` is safe to call from any number of threads.
pub struct Neighborhood {
    search: NeighborSearch,
    grid: NeighborGrid,
    positions: Vec<Vec3>,
    radius: f32,
}

impl Neighborhood {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            search: config.neighbor_search,
            grid: NeighborGrid::new(0, config.half_extent(), config.perception_radius),
            positions: Vec::new(),
            radius: config.perception_radius,
        }
    }

    pub fn prepare(&mut self, snapshot: &Snapshot, config: &SimulationConfig) {
        self.search = config.neighbor_search;
        self.radius = config.perception_radius;
        if self.search == NeighborSearch::UniformGrid {
            self.positions.clear();
            self.positions
                .extend(snapshot.records().iter().map(|r| r.transform.position));
            self.grid
                .rebuild(&self.positions, config.half_extent(), config.perception_radius);
        }
    }

    pub fn aggregate(
        &self,
        snapshot: &Snapshot,
        index: usize,
        scratch: &mut Vec<usize>,
    ) -> NeighborSums {
        match self.search {
            NeighborSearch::BruteForce => aggregate_brute_force(snapshot, index, self.radius),
            NeighborSearch::UniformGrid => {
                aggregate_with_grid(snapshot, &self.grid, index, self.radius, scratch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{aggregate_brute_force, aggregate_with_grid, Neighborhood, NeighborSums};
    use crate::config::{NeighborSearch, SimulationConfig};
    use crate::neighbor_grid::NeighborGrid;
    use crate::store::{AgentStore, Transform};
    use glam::{Quat, Vec3};

    fn store_at(positions: &[Vec3]) -> AgentStore {
        AgentStore::from_transforms(
            positions
                .iter()
                .map(|&p| Transform::new(p, Quat::IDENTITY))
                .collect(),
        )
    }

    #[test]
    fn excludes_self_but_keeps_coincident_peers() {
        let store = store_at(&[Vec3::ONE, Vec3::ONE, Vec3::new(50.0, 0.0, 0.0)]);
        let snapshot = store.snapshot();

        let sums = aggregate_brute_force(&snapshot, 0, 2.0);
        assert_eq!(sums.count, 1);
        assert_eq!(sums.position_sum, Vec3::ONE);
        assert_eq!(sums.heading_sum, Vec3::Z);
        assert_eq!(sums.separation_sum, Vec3::ZERO);
        assert!(sums.separation_sum.is_finite());
    }

    #[test]
    fn accumulates_unit_separation_per_neighbor() {
        let store = store_at(&[
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, -2.0, 0.0),
            Vec3::new(0.0, 0.0, 3.0),
        ]);
        let snapshot = store.snapshot();

        let sums = aggregate_brute_force(&snapshot, 0, 2.5);
        assert_eq!(
            sums,
            NeighborSums {
                separation_sum: Vec3::new(-1.0, 1.0, 0.0),
                position_sum: Vec3::new(1.0, -2.0, 0.0),
                heading_sum: Vec3::new(0.0, 0.0, 2.0),
                count: 2,
            }
        );
    }

    #[test]
    fn radius_is_exclusive() {
        let store = store_at(&[Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)]);
        let snapshot = store.snapshot();
        assert_eq!(aggregate_brute_force(&snapshot, 0, 2.0).count, 0);
    }

    #[test]
    fn grid_matches_brute_force_exactly() {
        for (population, radius) in [(150, 3.0), (80, 7.5), (60, 0.5)] {
            let config = SimulationConfig {
                population,
                cage_limits: 20.0,
                perception_radius: radius,
                neighbor_search: NeighborSearch::UniformGrid,
                ..SimulationConfig::default()
            };
            let mut store = AgentStore::seeded(population, config.cage_limits);
            // Push a few agents outside the cage as well.
            let mut transforms = store.transforms().to_vec();
            transforms[0].position = Vec3::new(-14.0, 0.0, 3.0);
            transforms[1].position = Vec3::new(-13.8, 0.2, 3.0);
            transforms[2].position = transforms[3].position;
            store.commit(&transforms).expect("same size");
            let snapshot = store.snapshot();

            let mut neighborhood = Neighborhood::new(&config);
            neighborhood.prepare(&snapshot, &config);

            let mut scratch = Vec::new();
            for i in 0..snapshot.len() {
                assert_eq!(
                    neighborhood.aggregate(&snapshot, i, &mut scratch),
                    aggregate_brute_force(&snapshot, i, radius),
                    "agent {i} with radius {radius}"
                );
            }
        }
    }

    #[test]
    fn grid_scan_ignores_stale_scratch() {
        let positions = [
            Vec3::ZERO,
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(8.0, 8.0, 8.0),
        ];
        let store = store_at(&positions);
        let snapshot = store.snapshot();
        let mut grid = NeighborGrid::new(positions.len(), 10.0, 2.0);
        grid.rebuild(&positions, 10.0, 2.0);

        let mut scratch = vec![3, 3, 3, 2];
        for i in 0..positions.len() {
            assert_eq!(
                aggregate_with_grid(&snapshot, &grid, i, 2.0, &mut scratch),
                aggregate_brute_force(&snapshot, i, 2.0)
            );
        }
    }
}

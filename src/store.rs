use glam::{Mat4, Quat, Vec3};
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::error::StoreError;
use crate::math::{euler_degrees, is_finite_quat};

const EULER_RANGE_DEG: f32 = 360.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Position + rotation with unit scale, column-major.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::ONE, self.rotation, self.position)
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && is_finite_quat(self.rotation)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentRecord {
    pub id: AgentId,
    pub transform: Transform,
    /// `transform.forward()`, resolved once when the snapshot is taken.
    pub forward: Vec3,
}

impl AgentRecord {
    pub fn new(id: AgentId, transform: Transform) -> Self {
        Self {
            id,
            transform,
            forward: transform.forward(),
        }
    }
}

/// Point-in-time copy of every agent, indexed like the store it came from.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    agents: Vec<AgentRecord>,
}

impl Snapshot {
    pub(crate) fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn get(&self, index: usize) -> Option<&AgentRecord> {
        self.agents.get(index)
    }

    pub fn records(&self) -> &[AgentRecord] {
        &self.agents
    }
}

/// Index `i` addresses the same agent in the store, in every snapshot taken
/// from it and in every buffer committed to it.
#[derive(Clone, Debug, Default)]
pub struct AgentStore {
    ids: Vec<AgentId>,
    transforms: Vec<Transform>,
}

impl AgentStore {
    /// Agent `i` draws its placement from a generator seeded with `i + 1`.
    pub fn seeded(population: usize, cage_limits: f32) -> Self {
        let half = (cage_limits * 0.5).abs();
        let transforms = (0..population)
            .map(|i| {
                let mut rng = SmallRng::seed_from_u64(i as u64 + 1);
                let position = Vec3::new(
                    rng.random_range(-half..=half),
                    rng.random_range(-half..=half),
                    rng.random_range(-half..=half),
                );
                let rotation = euler_degrees(
                    rng.random_range(-EULER_RANGE_DEG..=EULER_RANGE_DEG),
                    rng.random_range(-EULER_RANGE_DEG..=EULER_RANGE_DEG),
                    rng.random_range(-EULER_RANGE_DEG..=EULER_RANGE_DEG),
                );
                Transform::new(position, rotation)
            })
            .collect();
        Self::from_transforms(transforms)
    }

    pub fn from_transforms(transforms: Vec<Transform>) -> Self {
        let ids = (0..transforms.len() as u32).map(AgentId).collect();
        Self { ids, transforms }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn ids(&self) -> &[AgentId] {
        &self.ids
    }

    pub fn transform(&self, index: usize) -> Option<&Transform> {
        self.transforms.get(index)
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        self.snapshot_into(&mut snapshot);
        snapshot
    }

    pub fn snapshot_into(&self, snapshot: &mut Snapshot) {
        snapshot.agents.clear();
        snapshot.agents.extend(
            self.ids
                .iter()
                .zip(&self.transforms)
                .map(|(&id, &transform)| AgentRecord::new(id, transform)),
        );
    }

    pub fn commit(&mut self, buffer: &[Transform]) -> Result<(), StoreError> {
        if buffer.len() != self.transforms.len() {
            return Err(StoreError::SizeMismatch {
                expected: self.transforms.len(),
                actual: buffer.len(),
            });
        }
        self.transforms.copy_from_slice(buffer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentId, AgentStore, Transform};
    use crate::error::StoreError;
    use glam::{Quat, Vec3};

    #[test]
    fn seeded_placement_is_reproducible_and_caged() {
        let a = AgentStore::seeded(32, 10.0);
        let b = AgentStore::seeded(32, 10.0);
        assert_eq!(a.transforms(), b.transforms());

        for transform in a.transforms() {
            assert!(transform.position.abs().max_element() <= 5.0);
            assert!((transform.rotation.length() - 1.0).abs() < 1.0e-4);
        }

        // Seeds depend on the index only, so a larger population keeps the prefix.
        let larger = AgentStore::seeded(40, 10.0);
        assert_eq!(&larger.transforms()[..32], a.transforms());
    }

    #[test]
    fn ids_are_unique_and_positional() {
        let store = AgentStore::seeded(5, 4.0);
        let ids: Vec<u32> = store.ids().iter().map(|id| id.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn snapshot_is_isolated_from_later_commits() {
        let mut store = AgentStore::seeded(3, 8.0);
        let snapshot = store.snapshot();
        let before = snapshot.get(1).map(|r| r.transform);

        let moved = vec![Transform::new(Vec3::splat(1.0), Quat::IDENTITY); 3];
        store.commit(&moved).expect("matching size");

        assert_eq!(snapshot.get(1).map(|r| r.transform), before);
        assert_eq!(snapshot.get(1).map(|r| r.id), Some(AgentId(1)));
        assert_eq!(store.transform(1).map(|t| t.position), Some(Vec3::splat(1.0)));
    }

    #[test]
    fn commit_rejects_mismatched_buffers() {
        let mut store = AgentStore::seeded(4, 8.0);
        let short = vec![Transform::new(Vec3::ZERO, Quat::IDENTITY); 3];
        assert_eq!(
            store.commit(&short),
            Err(StoreError::SizeMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn transform_exposes_unit_scale_matrix() {
        let transform = Transform::new(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY);
        let (scale, rotation, translation) = transform.to_matrix().to_scale_rotation_translation();
        assert!((scale - Vec3::ONE).abs().max_element() < 1.0e-6);
        assert!(rotation.angle_between(Quat::IDENTITY) < 1.0e-3);
        assert_eq!(translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(transform.forward(), Vec3::Z);
        assert_eq!(transform.up(), Vec3::Y);
    }
}

use glam::Vec3;
use rayon::prelude::*;

use crate::math::{normalize_or, EPSILON};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObstacleHit {
    pub distance: f32,
    /// Unit surface normal at the hit point.
    pub normal: Vec3,
}

impl ObstacleHit {
    pub fn new(distance: f32, normal: Vec3) -> Self {
        Self {
            distance,
            normal: normalize_or(normal, Vec3::ZERO),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub max_distance: f32,
}

pub trait ObstacleQuery: Send + Sync {
    fn probe(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<ObstacleHit>;

    fn probe_batch(&self, rays: &[Ray], out: &mut [Option<ObstacleHit>], parallel: bool) {
        debug_assert_eq!(rays.len(), out.len());
        if parallel {
            out.par_iter_mut().zip(rays.par_iter()).for_each(|(slot, ray)| {
                *slot = self.probe(ray.origin, ray.direction, ray.max_distance);
            });
        } else {
            for (slot, ray) in out.iter_mut().zip(rays) {
                *slot = self.probe(ray.origin, ray.direction, ray.max_distance);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoObstacles;

impl ObstacleQuery for NoObstacles {
    fn probe(&self, _origin: Vec3, _direction: Vec3, _max_distance: f32) -> Option<ObstacleHit> {
        None
    }

    fn probe_batch(&self, _rays: &[Ray], out: &mut [Option<ObstacleHit>], _parallel: bool) {
        out.fill(None);
    }
}

/// Per-agent probe results for one tick, indexed like the snapshot.
#[derive(Clone, Debug, Default)]
pub struct ObstacleProbes {
    rays: Vec<Ray>,
    hits: Vec<Option<ObstacleHit>>,
}

impl ObstacleProbes {
    /// Result for agent `index`; a slot that was never resolved reads as no hit.
    pub fn hit(&self, index: usize) -> Option<ObstacleHit> {
        self.hits.get(index).copied().flatten()
    }

    pub fn hit_count(&self) -> usize {
        self.hits.iter().filter(|hit| hit.is_some()).count()
    }

    pub(crate) fn run<Q>(&mut self, query: &Q, rays: impl Iterator<Item = Ray>, parallel: bool)
    where
        Q: ObstacleQuery + ?Sized,
    {
        self.rays.clear();
        self.rays.extend(rays);
        self.hits.clear();
        self.hits.resize(self.rays.len(), None);
        query.probe_batch(&self.rays, &mut self.hits, parallel);
    }

    #[cfg(test)]
    pub(crate) fn from_hits(hits: Vec<Option<ObstacleHit>>) -> Self {
        Self {
            rays: Vec::new(),
            hits,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

/// Infinite plane `dot(normal, p) == offset`, solid on the side opposite the normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f32,
}

/// Analytic obstacle world made of spheres and planes.
#[derive(Clone, Debug, Default)]
pub struct ObstacleSet {
    spheres: Vec<Sphere>,
    planes: Vec<Plane>,
}

impl ObstacleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sphere(&mut self, center: Vec3, radius: f32) {
        if radius > 0.0 && center.is_finite() {
            self.spheres.push(Sphere { center, radius });
        }
    }

    pub fn add_plane(&mut self, normal: Vec3, offset: f32) {
        let normal = normalize_or(normal, Vec3::ZERO);
        if normal != Vec3::ZERO && offset.is_finite() {
            self.planes.push(Plane { normal, offset });
        }
    }

    pub fn clear(&mut self) {
        self.spheres.clear();
        self.planes.clear();
    }

    pub fn len(&self) -> usize {
        self.spheres.len() + self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObstacleQuery for ObstacleSet {
    fn probe(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<ObstacleHit> {
        let dir = normalize_or(direction, Vec3::ZERO);
        if dir == Vec3::ZERO || !(max_distance > 0.0) {
            return None;
        }

        let mut nearest: Option<ObstacleHit> = None;
        let mut consider = |hit: ObstacleHit| {
            if hit.distance <= max_distance
                && nearest.map_or(true, |best| hit.distance < best.distance)
            {
                nearest = Some(hit);
            }
        };

        for sphere in &self.spheres {
            if let Some(hit) = intersect_sphere(origin, dir, sphere) {
                consider(hit);
            }
        }
        for plane in &self.planes {
            if let Some(hit) = intersect_plane(origin, dir, plane) {
                consider(hit);
            }
        }

        nearest
    }
}

fn intersect_sphere(origin: Vec3, dir: Vec3, sphere: &Sphere) -> Option<ObstacleHit> {
    let oc = origin - sphere.center;
    let b = oc.dot(dir);
    let c = oc.length_squared() - sphere.radius * sphere.radius;
    // Rays starting inside a sphere do not report it.
    if c <= 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = -b - discriminant.sqrt();
    if t < 0.0 {
        return None;
    }
    let point = origin + dir * t;
    Some(ObstacleHit::new(t, point - sphere.center))
}

fn intersect_plane(origin: Vec3, dir: Vec3, plane: &Plane) -> Option<ObstacleHit> {
    let denom = plane.normal.dot(dir);
    // Only the front face is solid to an approaching ray.
    if denom >= -EPSILON {
        return None;
    }
    let t = (plane.offset - plane.normal.dot(origin)) / denom;
    if t < 0.0 {
        return None;
    }
    Some(ObstacleHit::new(t, plane.normal))
}

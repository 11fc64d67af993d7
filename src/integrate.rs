use glam::{Quat, Vec3};

use crate::math::{look_rotation_safe, normalize_or};
use crate::store::Transform;

/// A velocity that cancels out keeps the previous heading. A heading parallel
/// to the previous up axis swings the previous orientation along the
/// shortest arc.
pub fn integrate(
    transform: &Transform,
    forward: Vec3,
    force: Vec3,
    speed: f32,
    dt: f32,
) -> (Transform, Vec3) {
    let heading = normalize_or(forward, Vec3::Z);
    let steered = heading * speed + force * dt;
    let direction = normalize_or(steered, heading);
    let velocity = direction * speed;

    let position = transform.position + velocity * dt;
    let rotation = look_rotation_safe(velocity, transform.up())
        .unwrap_or_else(|| (Quat::from_rotation_arc(heading, direction) * transform.rotation).normalize());

    (Transform::new(position, rotation), velocity)
}

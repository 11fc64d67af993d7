use glam::{EulerRot, Mat3, Quat, Vec3};

pub const EPSILON: f32 = 1.0e-6;
pub const SEPARATION_MIN_DISTANCE: f32 = 1.0e-4;
const PARALLEL_EPSILON: f32 = 1.0e-6;

pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    v.try_normalize().unwrap_or(fallback)
}

pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

pub fn separation_scale(distance: f32) -> f32 {
    1.0 / distance.max(SEPARATION_MIN_DISTANCE)
}

/// Builds the rotation whose local +Z axis points along `forward` and whose
/// local +Y axis lies in the plane spanned by `forward` and `up`.
///
/// Returns `None` when `forward` has no usable length or is parallel to `up`.
pub fn look_rotation_safe(forward: Vec3, up: Vec3) -> Option<Quat> {
    let fwd = forward.try_normalize()?;

    let right = up.cross(fwd);
    let right_len_sq = right.length_squared();
    if right_len_sq <= PARALLEL_EPSILON || !right_len_sq.is_finite() {
        return None;
    }
    let right = right / right_len_sq.sqrt();
    let basis_up = fwd.cross(right);

    Some(Quat::from_mat3(&Mat3::from_cols(right, basis_up, fwd)).normalize())
}

/// Euler rotation in degrees, applied about Z first, then X, then Y.
pub fn euler_degrees(x_deg: f32, y_deg: f32, z_deg: f32) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        y_deg.to_radians(),
        x_deg.to_radians(),
        z_deg.to_radians(),
    )
}

pub fn is_finite_quat(q: Quat) -> bool {
    q.x.is_finite() && q.y.is_finite() && q.z.is_finite() && q.w.is_finite()
}

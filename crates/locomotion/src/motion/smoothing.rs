//! Angle helpers and critically-damped smoothing.
//!
//! Yaw is in degrees; yaw 0 faces +Z and positive yaw turns toward +X.

use bevy::math::{Quat, Vec3};

/// Wrap an angle into `[0, 360)`.
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Shortest signed difference `target - current`, in `(-180, 180]`.
pub fn delta_angle(current: f32, target: f32) -> f32 {
    let mut diff = (target - current).rem_euclid(360.0);
    if diff > 180.0 {
        diff -= 360.0;
    }
    diff
}

/// Yaw of a horizontal direction.
pub fn yaw_from_direction(direction: Vec3) -> f32 {
    wrap_degrees(direction.x.atan2(direction.z).to_degrees())
}

/// Unit horizontal direction for a yaw.
pub fn direction_from_yaw(yaw: f32) -> Vec3 {
    let r = yaw.to_radians();
    Vec3::new(r.sin(), 0.0, r.cos())
}

pub fn yaw_rotation(yaw: f32) -> Quat {
    Quat::from_rotation_y(yaw.to_radians())
}

/// Yaw of a rotation's forward (+Z) axis.
pub fn yaw_of(rotation: Quat) -> f32 {
    let forward = rotation * Vec3::Z;
    if forward.x.abs() < f32::EPSILON && forward.z.abs() < f32::EPSILON {
        return 0.0;
    }
    yaw_from_direction(forward)
}

/// Critically-damped spring toward `target`.
///
/// `velocity` carries the spring state between calls; the step never
/// overshoots and the rate of change is bounded by `max_speed`.
pub fn smooth_damp(
    current: f32,
    target: f32,
    velocity: &mut f32,
    smooth_time: f32,
    max_speed: f32,
    dt: f32,
) -> f32 {
    if dt <= 0.0 {
        return current;
    }
    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let max_change = max_speed * smooth_time;
    let change = (current - target).clamp(-max_change, max_change);
    let clamped_target = current - change;

    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * decay;
    let mut output = clamped_target + (change + temp) * decay;

    // No overshoot past the original target
    if (target - current > 0.0) == (output > target) {
        output = target;
        *velocity = 0.0;
    }
    output
}

/// [`smooth_damp`] for angles, taking the short way round. Result is wrapped.
pub fn smooth_damp_angle(
    current: f32,
    target: f32,
    velocity: &mut f32,
    smooth_time: f32,
    max_speed: f32,
    dt: f32,
) -> f32 {
    let unwrapped_target = current + delta_angle(current, target);
    wrap_degrees(smooth_damp(
        current,
        unwrapped_target,
        velocity,
        smooth_time,
        max_speed,
        dt,
    ))
}

/// Frame-rate independent slerp toward `target` at `sharpness` per second.
pub fn damp_rotation(current: Quat, target: Quat, sharpness: f32, dt: f32) -> Quat {
    let t = 1.0 - (-sharpness * dt).exp();
    current.slerp(target, t.clamp(0.0, 1.0)).normalize()
}

// Angle helpers shared by the kinematics and the steering loop.
// All angles are degrees; 0 = robot-forward, positive = clockwise.

/// Wrap an angle into the half-open range (-180, 180].
pub fn wrap_deg(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Shortest signed angular distance from `from` to `to`, in (-180, 180].
pub fn shortest_delta_deg(from: f64, to: f64) -> f64 {
    wrap_deg(to - from)
}

/// Saturate to [-1, 1]. Non-finite values come back as `None`.
pub fn saturate_unit(value: f64) -> Option<f64> {
    value.is_finite().then(|| value.clamp(-1.0, 1.0))
}

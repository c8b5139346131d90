//! Critically damped smoothing for jittery clocks

/// Move `current` toward `target` with a critically damped spring
///
/// `velocity` carries state between calls. Never overshoots the target.
/// Matches the usual game-engine `SmoothDamp` with unlimited speed.
pub fn smooth_damp(current: f32, target: f32, velocity: &mut f32, smooth_time: f32, delta_time: f32) -> f32 {
    if delta_time <= 0.0 {
        return current;
    }

    let smooth_time = smooth_time.max(0.0001);
    let omega = 2.0 / smooth_time;
    let x = omega * delta_time;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + omega * change) * delta_time;
    *velocity = (*velocity - omega * temp) * exp;
    let mut output = target + (change + temp) * exp;

    // Clamp overshoot.
    if (target - current > 0.0) == (output > target) {
        output = target;
        *velocity = (output - target) / delta_time;
    }

    output
}

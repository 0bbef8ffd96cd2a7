// Differential-drive kinematics.
// Converts body-frame motion (forward speed, steering rate) to per-wheel
// angular rates via the standard sum/diff decomposition.

use std::f32::consts::PI;

/// Wheel angular-rate commands, in degrees of wheel rotation per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelRates {
    pub left: f32,
    pub right: f32,
}

impl WheelRates {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Convert body motion to per-wheel angular rates.
///
/// # Arguments
/// * `speed` - Forward speed in mm/s (same linear unit as the dimensions)
/// * `steering` - Steering rate in deg/s (positive = turn toward the right wheel side)
/// * `wheel_diameter` - Wheel diameter in mm
/// * `axle_track` - Distance between the two wheel contact points in mm
///
/// The `720/π` factor converts a diameter-based linear speed into wheel
/// degrees per second (360/π per radius-based revolution, doubled for the
/// diameter form). It is exact, not a tuning constant.
pub fn wheel_rates(speed: f32, steering: f32, wheel_diameter: f32, axle_track: f32) -> WheelRates {
    let sum = speed / wheel_diameter * (720.0 / PI);
    let diff = 2.0 * axle_track / wheel_diameter * steering;

    WheelRates {
        left: (sum + diff) / 2.0,
        right: (sum - diff) / 2.0,
    }
}

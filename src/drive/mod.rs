// Drive control module for a two-wheel differential base
//
// Provides:
// - Differential-drive kinematics (speed/steering -> per-wheel rates)
// - DriveBase: synchronized two-motor command API

mod base;
pub mod kinematics;

pub use base::{DriveBase, DriveError, Side};
pub use kinematics::{WheelRates, wheel_rates};

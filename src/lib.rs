// drivebase: differential-drive controller for a two-wheel robot base
//
// The core is `drive::DriveBase`, which converts (speed, steering)
// commands into synchronized per-wheel velocity commands over a shared
// motor bus. `motor::ServoBus` is the serial hardware backend; any
// `motor::MotorBus` implementation (including test fakes) works.

pub mod config;
pub mod delay;
pub mod drive;
pub mod motor;

pub use drive::{DriveBase, DriveError};
pub use motor::{AfterStop, MotorBus, MotorError, ServoBus};

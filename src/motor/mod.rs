// Motor/actuator layer
//
// Provides:
// - The MotorBus trait the drive core commands motors through
// - A serial servo-bus backend (Feetech STS-style protocol)
// - Shared-bus handle with one lock guarding the whole bus

pub mod bus;
pub mod servo;

pub use bus::{AfterStop, MotorBus, MotorError, SharedBus, shared};
pub use servo::{DEFAULT_BAUDRATE, ServoBus};

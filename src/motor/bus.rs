// Actuator-layer seam between the drive core and motor hardware.
//
// `MotorBus` is the typed contract DriveBase talks through; the serial
// backend in `servo.rs` is the real implementation, and tests substitute
// recording fakes. A bus is shared between callers as `SharedBus`, one
// mutex guarding the whole bus.

use std::sync::Arc;

use parking_lot::Mutex;

/// What the motor does with its windings once a stop command lands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AfterStop {
    /// Remove power and let the shaft spin freely.
    #[default]
    Coast,
    /// Hold a zero velocity target, damping the shaft to a standstill.
    Brake,
    /// Actively servo on the position where the motor stopped.
    Hold,
}

/// Error types for motor communication
#[derive(Debug, thiserror::Error)]
pub enum MotorError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from motor {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for motor {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Motor {id} reported fault status 0x{status:02X}")]
    Fault { id: u8, status: u8 },

    #[error("No response from motor {id}")]
    NotConnected { id: u8 },
}

/// Per-motor operations the drive core needs from the actuator layer.
///
/// Methods take `&mut self`: a bus is a single half-duplex channel, and
/// exclusive access is how commands stay ordered. Concurrent callers go
/// through the [`SharedBus`] mutex instead.
pub trait MotorBus {
    /// Read the current shaft angle in degrees.
    ///
    /// Also serves as the liveness probe: a motor that is connected and
    /// encoder-equipped answers this, anything else errors.
    fn get_angle(&mut self, id: u8) -> Result<f32, MotorError>;

    /// Command a closed-loop shaft velocity in degrees per second.
    fn run(&mut self, id: u8, rate_degps: f32) -> Result<(), MotorError>;

    /// Stop the motor with the selected after-stop behavior.
    fn stop(&mut self, id: u8, after_stop: AfterStop) -> Result<(), MotorError>;
}

/// Shared handle to a motor bus.
///
/// The mutex is the critical-section boundary for multi-motor operations:
/// whoever holds the guard owns every motor on the bus until it drops.
pub type SharedBus<B> = Arc<Mutex<B>>;

/// Wrap a bus for sharing between a DriveBase and other callers.
pub fn shared<B: MotorBus>(bus: B) -> SharedBus<B> {
    Arc::new(Mutex::new(bus))
}

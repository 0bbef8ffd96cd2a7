// Robot configuration: serial port, motor ids, base geometry

use std::path::Path;

use serde::{Deserialize, Serialize};

// Serial port for the servo bus controller
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

// Default motor ids (as configured in the motors)
pub const DEFAULT_LEFT_ID: u8 = 1;
pub const DEFAULT_RIGHT_ID: u8 = 2;

// Default base geometry in mm (standard 56 mm wheels, 114 mm track)
pub const DEFAULT_WHEEL_DIAMETER: f32 = 56.0;
pub const DEFAULT_AXLE_TRACK: f32 = 114.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Robot configuration, loadable from a JSON file.
///
/// Every field has a default, so a config file only needs to name what
/// differs from the stock robot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Serial port of the servo bus controller
    pub serial_port: String,
    pub baudrate: u32,
    pub left_id: u8,
    pub right_id: u8,
    /// Wheel diameter in mm
    pub wheel_diameter: f32,
    /// Distance between the wheel contact points in mm
    pub axle_track: f32,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            serial_port: DEFAULT_PORT.to_string(),
            baudrate: crate::motor::DEFAULT_BAUDRATE,
            left_id: DEFAULT_LEFT_ID,
            right_id: DEFAULT_RIGHT_ID,
            wheel_diameter: DEFAULT_WHEEL_DIAMETER,
            axle_track: DEFAULT_AXLE_TRACK,
        }
    }
}

impl RobotConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

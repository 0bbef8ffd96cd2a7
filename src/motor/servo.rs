// Serial servo bus backend.
//
// Speaks the Dynamixel-Protocol-1.0-style framing used by Feetech STS
// series servos: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum],
// half duplex over a USB serial adapter.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::debug;

use super::bus::{AfterStop, MotorBus, MotorError};

/// Default serial configuration for STS-series servos
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Encoder resolution: 4096 ticks per shaft revolution
const TICKS_PER_REVOLUTION: f32 = 4096.0;
const TICKS_PER_DEG: f32 = TICKS_PER_REVOLUTION / 360.0;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
}

/// Register map subset used by this driver
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    // EEPROM area (persists across power cycles)
    Id = 5, // 1 byte

    // RAM area (volatile)
    OperatingMode = 33,   // 1 byte: 0=position, 1=velocity, 2=PWM, 3=step
    TorqueEnable = 40,    // 1 byte: 0=off, 1=on
    GoalPosition = 42,    // 2 bytes
    GoalVelocity = 46,    // 2 bytes (sign-magnitude, velocity mode)
    Lock = 55,            // 1 byte: 0=unlocked, 1=locked
    PresentPosition = 56, // 2 bytes, read-only
    PresentVelocity = 58, // 2 bytes, read-only (sign-magnitude)
}

/// Operating modes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    Position = 0,
    Velocity = 1,
}

pub type Result<T> = std::result::Result<T, MotorError>;

/// Serial bus of encoder servos, addressed by id.
pub struct ServoBus {
    port: Box<dyn SerialPort>,
}

impl ServoBus {
    /// Open a connection to the servo bus at the default baudrate.
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// Calculate checksum for a packet (excluding header)
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a packet with header and checksum
    fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8; // params + instruction + checksum
        let mut packet = Vec::with_capacity(6 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);

        // Checksum over id, length, instruction, params
        packet.push(Self::checksum(&packet[2..]));

        packet
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read a status packet, returning its parameter bytes.
    fn read_response(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut header = [0u8; 2];
        self.port.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                MotorError::NotConnected { id: expected_id }
            } else {
                MotorError::Io(e)
            }
        })?;

        if header != HEADER {
            return Err(MotorError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", header),
            });
        }

        let mut id_length = [0u8; 2];
        self.port.read_exact(&mut id_length)?;
        let id = id_length[0];
        let length = id_length[1] as usize;

        if id != expected_id {
            return Err(MotorError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: expected {}, got {}", expected_id, id),
            });
        }

        // error + params + checksum = length bytes
        let mut remaining = vec![0u8; length];
        self.port.read_exact(&mut remaining)?;

        let mut checksum_data = vec![id, length as u8];
        checksum_data.extend_from_slice(&remaining[..remaining.len() - 1]);
        if Self::checksum(&checksum_data) != remaining[remaining.len() - 1] {
            return Err(MotorError::ChecksumMismatch { id });
        }

        let fault_status = remaining[0];
        if fault_status != 0 {
            return Err(MotorError::Fault {
                id,
                status: fault_status,
            });
        }

        Ok(remaining[1..remaining.len() - 1].to_vec())
    }

    /// Ping a motor to check if it's on the bus
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        let packet = Self::build_packet(id, Instruction::Ping, &[]);
        self.send_packet(&packet)?;

        match self.read_response(id) {
            Ok(_) => Ok(true),
            Err(MotorError::NotConnected { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        let params = [register as u8, value];
        let packet = Self::build_packet(id, Instruction::Write, &params);
        debug!("Write u8 to motor {}: reg={:?}, value={}", id, register, value);
        self.send_packet(&packet)?;

        let _ = self.read_response(id)?;
        Ok(())
    }

    fn write_u16(&mut self, id: u8, register: Register, value: u16) -> Result<()> {
        let params = [register as u8, (value & 0xFF) as u8, (value >> 8) as u8];
        let packet = Self::build_packet(id, Instruction::Write, &params);
        debug!("Write u16 to motor {}: reg={:?}, value={}", id, register, value);
        self.send_packet(&packet)?;

        let _ = self.read_response(id)?;
        Ok(())
    }

    fn read_u16(&mut self, id: u8, register: Register) -> Result<u16> {
        let params = [register as u8, 2]; // address, length
        let packet = Self::build_packet(id, Instruction::Read, &params);
        self.send_packet(&packet)?;

        let response = self.read_response(id)?;
        if response.len() < 2 {
            return Err(MotorError::InvalidResponse {
                id,
                reason: format!("Expected 2 bytes, got {}", response.len()),
            });
        }
        Ok(u16::from_le_bytes([response[0], response[1]]))
    }

    /// Prepare motors for velocity control.
    ///
    /// Torque must be off while the operating mode changes, so the
    /// sequence is: torque off, velocity mode, torque on. Call this once
    /// before the first `run` command.
    pub fn initialize(&mut self, ids: &[u8]) -> Result<()> {
        for &id in ids {
            if !self.ping(id)? {
                return Err(MotorError::NotConnected { id });
            }
        }

        for &id in ids {
            self.torque_off(id)?;
        }
        for &id in ids {
            self.write_u8(id, Register::OperatingMode, OperatingMode::Velocity as u8)?;
        }
        for &id in ids {
            self.torque_on(id)?;
        }

        debug!("Motors {:?} initialized for velocity control", ids);
        Ok(())
    }

    fn torque_on(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 1)?;
        self.write_u8(id, Register::Lock, 1)
    }

    fn torque_off(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 0)?;
        self.write_u8(id, Register::Lock, 0)
    }

    /// Read the present shaft velocity in degrees per second.
    pub fn get_velocity(&mut self, id: u8) -> Result<f32> {
        let raw = self.read_u16(id, Register::PresentVelocity)?;
        Ok(decode_sign_magnitude(raw) as f32 / TICKS_PER_DEG)
    }
}

impl MotorBus for ServoBus {
    fn get_angle(&mut self, id: u8) -> Result<f32> {
        let raw = self.read_u16(id, Register::PresentPosition)?;
        Ok(raw as f32 / TICKS_PER_DEG)
    }

    fn run(&mut self, id: u8, rate_degps: f32) -> Result<()> {
        let raw = degps_to_ticks(rate_degps);
        self.write_u16(id, Register::GoalVelocity, encode_sign_magnitude(raw))
    }

    fn stop(&mut self, id: u8, after_stop: AfterStop) -> Result<()> {
        match after_stop {
            AfterStop::Coast => self.torque_off(id),
            AfterStop::Brake => {
                // Torque stays on: the velocity loop damps the shaft to zero
                self.write_u16(id, Register::GoalVelocity, 0)
            }
            AfterStop::Hold => {
                // Park the position loop on the spot where the shaft stopped.
                // Mode changes require torque off; motors need initialize()
                // again before the next velocity command.
                self.write_u16(id, Register::GoalVelocity, 0)?;
                let present = self.read_u16(id, Register::PresentPosition)?;
                self.torque_off(id)?;
                self.write_u8(id, Register::OperatingMode, OperatingMode::Position as u8)?;
                self.torque_on(id)?;
                self.write_u16(id, Register::GoalPosition, present)
            }
        }
    }
}

/// Convert degrees per second to raw encoder ticks per second
fn degps_to_ticks(degps: f32) -> i16 {
    let ticks = (degps * TICKS_PER_DEG).round() as i32;
    ticks.clamp(-0x7FFF, 0x7FFF) as i16
}

/// Encode a signed value to sign-magnitude format
/// Bit 15 = sign (1 = negative), Bits 0-14 = magnitude
fn encode_sign_magnitude(value: i16) -> u16 {
    if value >= 0 {
        value as u16
    } else {
        0x8000 | (-value as u16)
    }
}

/// Decode sign-magnitude format to signed value
fn decode_sign_magnitude(raw: u16) -> i16 {
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 { -magnitude } else { magnitude }
}

// Command-line tool for driving the base: probe, drive, stop.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use drivebase::config::RobotConfig;
use drivebase::drive::DriveBase;
use drivebase::motor::{AfterStop, MotorBus, ServoBus, shared};

#[derive(Parser)]
#[command(name = "drivebase", about = "Differential drive base control")]
struct Cli {
    /// Path to a JSON config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ping both motors and read their angles (read-only)
    Status,
    /// Drive for a fixed duration, then stop
    Drive {
        /// Forward speed in mm/s
        #[arg(long, default_value_t = 100.0)]
        speed: f32,
        /// Steering rate in deg/s
        #[arg(long, default_value_t = 0.0)]
        steering: f32,
        /// Duration in milliseconds
        #[arg(long, default_value_t = 1000)]
        duration_ms: u64,
    },
    /// Stop both motors immediately
    Stop {
        #[arg(long, value_enum, default_value_t = StopMode::Coast)]
        mode: StopMode,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StopMode {
    Coast,
    Brake,
    Hold,
}

impl From<StopMode> for AfterStop {
    fn from(mode: StopMode) -> Self {
        match mode {
            StopMode::Coast => AfterStop::Coast,
            StopMode::Brake => AfterStop::Brake,
            StopMode::Hold => AfterStop::Hold,
        }
    }
}

fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RobotConfig::load(path)?,
        None => RobotConfig::default(),
    };
    info!("Opening servo bus on {}", config.serial_port);
    let mut bus = ServoBus::open_with_baudrate(&config.serial_port, config.baudrate)?;

    match cli.command {
        Command::Status => {
            for (name, id) in [("Left", config.left_id), ("Right", config.right_id)] {
                if bus.ping(id)? {
                    let angle = bus.get_angle(id)?;
                    println!("{} motor (ID {}): angle {:.1} deg", name, id, angle);
                } else {
                    println!("{} motor (ID {}): not responding", name, id);
                }
            }
        }
        Command::Drive {
            speed,
            steering,
            duration_ms,
        } => {
            bus.initialize(&[config.left_id, config.right_id])?;
            let db = build_base(&config, bus)?;
            info!("{}", db);
            db.drive_time(speed, steering, duration_ms, AfterStop::Coast)?;
        }
        Command::Stop { mode } => {
            let db = build_base(&config, bus)?;
            db.stop(mode.into())?;
        }
    }

    Ok(())
}

fn build_base(
    config: &RobotConfig,
    bus: ServoBus,
) -> Result<DriveBase<ServoBus>, drivebase::DriveError> {
    DriveBase::new(
        shared(bus),
        config.left_id,
        config.right_id,
        config.wheel_diameter,
        config.axle_track,
    )
}

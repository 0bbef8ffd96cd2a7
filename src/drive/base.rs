// Two-motor differential drive controller.
//
// Owns the pair of wheel motor ids plus the robot's geometric calibration
// and turns (speed, steering) commands into synchronized per-wheel
// velocity commands. The two underlying motor calls always happen under
// one bus lock so the pair acts as a single atomic unit.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::kinematics::wheel_rates;
use crate::delay::{Delay, SpinDelay};
use crate::motor::{AfterStop, MotorBus, MotorError, SharedBus};

/// Which wheel motor an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Error types for drive base construction and commands
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{side} motor: {source}")]
    Motor {
        side: Side,
        #[source]
        source: MotorError,
    },
}

impl DriveError {
    fn motor(side: Side) -> impl FnOnce(MotorError) -> Self {
        move |source| Self::Motor { side, source }
    }
}

/// A differential-drive base: two wheel motors commanded as one unit.
///
/// Immutable after construction; cloning shares the underlying bus
/// handle, so clones command the same hardware.
#[derive(Debug)]
pub struct DriveBase<B> {
    bus: SharedBus<B>,
    left_id: u8,
    right_id: u8,
    wheel_diameter: f32,
    axle_track: f32,
}

impl<B> Clone for DriveBase<B> {
    fn clone(&self) -> Self {
        Self {
            bus: Arc::clone(&self.bus),
            left_id: self.left_id,
            right_id: self.right_id,
            wheel_diameter: self.wheel_diameter,
            axle_track: self.axle_track,
        }
    }
}

impl<B> fmt::Display for DriveBase<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DriveBase with left motor on ID {} and right motor on ID {}",
            self.left_id, self.right_id
        )
    }
}

impl<B: MotorBus> DriveBase<B> {
    /// Create a drive base from two motors on a shared bus.
    ///
    /// # Arguments
    /// * `left_id` / `right_id` - The two wheel motors; must be distinct
    /// * `wheel_diameter` - Wheel diameter in mm, at least 1
    /// * `axle_track` - Distance between the wheel contact points in mm, at least 1
    ///
    /// Both motors are probed with an angle read, so construction fails
    /// early if either is unplugged or has no encoder. Beyond those two
    /// reads there is no hardware side effect.
    pub fn new(
        bus: SharedBus<B>,
        left_id: u8,
        right_id: u8,
        wheel_diameter: f32,
        axle_track: f32,
    ) -> Result<Self, DriveError> {
        if left_id == right_id {
            return Err(DriveError::InvalidArgument(format!(
                "left and right motor are both ID {left_id}"
            )));
        }
        // Motors must be connected and encoder-equipped; reading their
        // angles proves both. The readings themselves are discarded.
        {
            let mut bus = bus.lock();
            bus.get_angle(left_id).map_err(DriveError::motor(Side::Left))?;
            bus.get_angle(right_id).map_err(DriveError::motor(Side::Right))?;
        }

        if !(wheel_diameter >= 1.0) {
            return Err(DriveError::InvalidArgument(format!(
                "wheel diameter must be at least 1 mm, got {wheel_diameter}"
            )));
        }
        if !(axle_track >= 1.0) {
            return Err(DriveError::InvalidArgument(format!(
                "axle track must be at least 1 mm, got {axle_track}"
            )));
        }

        info!(
            "DriveBase ready: motors {}/{}, wheel {} mm, track {} mm",
            left_id, right_id, wheel_diameter, axle_track
        );

        Ok(Self {
            bus,
            left_id,
            right_id,
            wheel_diameter,
            axle_track,
        })
    }

    /// Wheel diameter in mm.
    pub fn wheel_diameter(&self) -> f32 {
        self.wheel_diameter
    }

    /// Axle track in mm.
    pub fn axle_track(&self) -> f32 {
        self.axle_track
    }

    /// Drive at a forward speed (mm/s) and steering rate (deg/s).
    ///
    /// Both wheel commands are issued under one bus lock, so no other
    /// caller can slip a command between the left and the right motor.
    /// Both are attempted even if the left one fails; a left failure is
    /// surfaced over a right one. A wheel that was commanded before the
    /// other side failed keeps running - callers decide whether to `stop`.
    pub fn drive(&self, speed: f32, steering: f32) -> Result<(), DriveError> {
        let rates = wheel_rates(speed, steering, self.wheel_diameter, self.axle_track);
        debug!(
            "drive: speed={} steering={} -> left={:.1} right={:.1} deg/s",
            speed, steering, rates.left, rates.right
        );

        let (left, right) = {
            let mut bus = self.bus.lock();
            (
                bus.run(self.left_id, rates.left),
                bus.run(self.right_id, rates.right),
            )
        };

        left.map_err(DriveError::motor(Side::Left))?;
        right.map_err(DriveError::motor(Side::Right))?;
        Ok(())
    }

    /// Stop both motors with the selected after-stop behavior.
    ///
    /// Pass [`AfterStop::default()`] for the plain coast stop. Same
    /// locking and attempt-both policy as [`DriveBase::drive`].
    pub fn stop(&self, after_stop: AfterStop) -> Result<(), DriveError> {
        debug!("stop: after_stop={:?}", after_stop);

        let (left, right) = {
            let mut bus = self.bus.lock();
            (
                bus.stop(self.left_id, after_stop),
                bus.stop(self.right_id, after_stop),
            )
        };

        left.map_err(DriveError::motor(Side::Left))?;
        right.map_err(DriveError::motor(Side::Right))?;
        Ok(())
    }

    /// Drive for a fixed duration, then command zero rate.
    ///
    /// Blocks the calling thread for the whole duration. If the initial
    /// drive command fails, the wait is skipped but a best-effort
    /// zero-rate drive is still issued - with no rollback in `drive`, one
    /// wheel may already be running and must not be left spinning.
    pub fn drive_time(
        &self,
        speed: f32,
        steering: f32,
        duration_ms: u64,
        after_stop: AfterStop,
    ) -> Result<(), DriveError> {
        self.drive_time_with(speed, steering, duration_ms, after_stop, &SpinDelay)
    }

    fn drive_time_with(
        &self,
        speed: f32,
        steering: f32,
        duration_ms: u64,
        after_stop: AfterStop,
        delay: &impl Delay,
    ) -> Result<(), DriveError> {
        if let Err(err) = self.drive(speed, steering) {
            if let Err(cleanup) = self.drive(0.0, 0.0) {
                warn!("zero-drive after failed drive also failed: {}", cleanup);
            }
            return Err(err);
        }

        delay.delay_ms(duration_ms);

        // TODO: honor `after_stop` on the timed-drive exit; it currently
        // ends with a zero-rate drive, matching stop(Brake) in effect.
        debug!("drive_time elapsed after {} ms, after_stop={:?} not applied", duration_ms, after_stop);
        self.drive(0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::motor::shared;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Angle(u8),
        Run(u8, f32),
        Stop(u8, AfterStop),
    }

    /// Records every command; ids listed in `dead` fail all operations.
    #[derive(Debug, Default)]
    struct FakeBus {
        calls: Vec<Call>,
        dead: Vec<u8>,
    }

    impl FakeBus {
        fn check(&self, id: u8) -> Result<(), MotorError> {
            if self.dead.contains(&id) {
                Err(MotorError::NotConnected { id })
            } else {
                Ok(())
            }
        }
    }

    impl MotorBus for FakeBus {
        fn get_angle(&mut self, id: u8) -> Result<f32, MotorError> {
            self.calls.push(Call::Angle(id));
            self.check(id)?;
            Ok(90.0)
        }

        fn run(&mut self, id: u8, rate_degps: f32) -> Result<(), MotorError> {
            self.calls.push(Call::Run(id, rate_degps));
            self.check(id)
        }

        fn stop(&mut self, id: u8, after_stop: AfterStop) -> Result<(), MotorError> {
            self.calls.push(Call::Stop(id, after_stop));
            self.check(id)
        }
    }

    struct FakeDelay {
        waits: RefCell<Vec<u64>>,
    }

    impl FakeDelay {
        fn new() -> Self {
            Self {
                waits: RefCell::new(Vec::new()),
            }
        }
    }

    impl Delay for FakeDelay {
        fn delay_ms(&self, ms: u64) {
            self.waits.borrow_mut().push(ms);
        }
    }

    const LEFT: u8 = 1;
    const RIGHT: u8 = 2;

    fn base(bus: &SharedBus<FakeBus>) -> DriveBase<FakeBus> {
        DriveBase::new(Arc::clone(bus), LEFT, RIGHT, 56.0, 114.0).unwrap()
    }

    #[test]
    fn test_rejects_identical_motors() {
        let bus = shared(FakeBus::default());
        let err = DriveBase::new(bus, 3, 3, 56.0, 114.0).unwrap_err();
        assert!(matches!(err, DriveError::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_sub_minimum_dimensions() {
        let bus = shared(FakeBus::default());
        let err = DriveBase::new(Arc::clone(&bus), LEFT, RIGHT, 0.5, 114.0).unwrap_err();
        assert!(matches!(err, DriveError::InvalidArgument(_)));

        let err = DriveBase::new(bus, LEFT, RIGHT, 56.0, 0.9).unwrap_err();
        assert!(matches!(err, DriveError::InvalidArgument(_)));
    }

    #[test]
    fn test_construction_probes_both_motors() {
        let bus = shared(FakeBus::default());
        let _db = base(&bus);
        assert_eq!(bus.lock().calls, vec![Call::Angle(LEFT), Call::Angle(RIGHT)]);
    }

    #[test]
    fn test_construction_fails_on_unplugged_motor() {
        let bus = shared(FakeBus {
            dead: vec![RIGHT],
            ..Default::default()
        });
        let err = DriveBase::new(bus, LEFT, RIGHT, 56.0, 114.0).unwrap_err();
        assert!(matches!(
            err,
            DriveError::Motor {
                side: Side::Right,
                source: MotorError::NotConnected { id: RIGHT },
            }
        ));
    }

    #[test]
    fn test_drive_commands_both_wheels() {
        let bus = shared(FakeBus::default());
        let db = base(&bus);
        db.drive(200.0, 0.0).unwrap();

        let calls = bus.lock().calls.clone();
        match &calls[2..] {
            [Call::Run(LEFT, l), Call::Run(RIGHT, r)] => {
                assert_eq!(l, r);
                assert!((l - 818.8).abs() < 0.1);
            }
            other => panic!("unexpected commands: {:?}", other),
        }
    }

    #[test]
    fn test_drive_attempts_right_after_left_failure() {
        let bus = shared(FakeBus::default());
        let db = base(&bus);
        bus.lock().dead.push(LEFT);

        let err = db.drive(100.0, 0.0).unwrap_err();
        assert!(matches!(err, DriveError::Motor { side: Side::Left, .. }));

        // The right wheel was still commanded
        let calls = bus.lock().calls.clone();
        assert!(matches!(calls.last(), Some(Call::Run(RIGHT, _))));
    }

    #[test]
    fn test_left_failure_surfaced_when_both_fail() {
        let bus = shared(FakeBus::default());
        let db = base(&bus);
        bus.lock().dead.extend([LEFT, RIGHT]);

        let err = db.drive(100.0, 0.0).unwrap_err();
        assert!(matches!(err, DriveError::Motor { side: Side::Left, .. }));
    }

    #[test]
    fn test_base_reusable_after_failed_command() {
        let bus = shared(FakeBus::default());
        let db = base(&bus);

        bus.lock().dead.push(RIGHT);
        assert!(db.drive(100.0, 0.0).is_err());

        bus.lock().dead.clear();
        db.drive(100.0, 0.0).unwrap();
        db.stop(AfterStop::Coast).unwrap();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let bus = shared(FakeBus::default());
        let db = base(&bus);

        db.stop(AfterStop::default()).unwrap();
        db.stop(AfterStop::default()).unwrap();

        let calls = bus.lock().calls.clone();
        let once = [Call::Stop(LEFT, AfterStop::Coast), Call::Stop(RIGHT, AfterStop::Coast)];
        assert_eq!(calls[2..4], once);
        assert_eq!(calls[4..6], once);
    }

    #[test]
    fn test_stop_defaults_to_coast() {
        assert_eq!(AfterStop::default(), AfterStop::Coast);
    }

    #[test]
    fn test_stop_passes_after_stop_through() {
        let bus = shared(FakeBus::default());
        let db = base(&bus);
        db.stop(AfterStop::Hold).unwrap();

        let calls = bus.lock().calls.clone();
        assert_eq!(
            calls[2..],
            [Call::Stop(LEFT, AfterStop::Hold), Call::Stop(RIGHT, AfterStop::Hold)]
        );
    }

    #[test]
    fn test_drive_time_sequence() {
        let bus = shared(FakeBus::default());
        let db = base(&bus);
        let delay = FakeDelay::new();

        db.drive_time_with(100.0, 0.0, 1000, AfterStop::Coast, &delay)
            .unwrap();

        assert_eq!(*delay.waits.borrow(), vec![1000]);

        let calls = bus.lock().calls.clone();
        match &calls[2..] {
            [
                Call::Run(LEFT, l),
                Call::Run(RIGHT, r),
                Call::Run(LEFT, zero_l),
                Call::Run(RIGHT, zero_r),
            ] => {
                assert!(*l > 0.0);
                assert!(*r > 0.0);
                assert_eq!(*zero_l, 0.0);
                assert_eq!(*zero_r, 0.0);
            }
            other => panic!("unexpected commands: {:?}", other),
        }
    }

    #[test]
    fn test_drive_time_zeroes_wheels_on_initial_failure() {
        let bus = shared(FakeBus::default());
        let db = base(&bus);
        let delay = FakeDelay::new();

        bus.lock().dead.push(RIGHT);
        let err = db
            .drive_time_with(100.0, 0.0, 1000, AfterStop::Coast, &delay)
            .unwrap_err();
        assert!(matches!(err, DriveError::Motor { side: Side::Right, .. }));

        // No wait, but both wheels were zeroed before the error surfaced
        assert!(delay.waits.borrow().is_empty());
        let calls = bus.lock().calls.clone();
        assert_eq!(
            calls[4..],
            [Call::Run(LEFT, 0.0), Call::Run(RIGHT, 0.0)]
        );
    }

    #[test]
    fn test_drive_time_blocks_for_duration() {
        let bus = shared(FakeBus::default());
        let db = base(&bus);

        let start = Instant::now();
        db.drive_time(50.0, 0.0, 30, AfterStop::Coast).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_concurrent_drives_never_interleave() {
        let bus = shared(FakeBus::default());
        let db = base(&bus);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let db = db.clone();
                thread::spawn(move || {
                    let speed = (i + 1) as f32 * 10.0;
                    for _ in 0..50 {
                        db.drive(speed, 0.0).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Every left command must be followed immediately by its partner
        // right command at the matching rate - no foreign command between.
        let calls = bus.lock().calls.clone();
        let commands = &calls[2..];
        assert_eq!(commands.len(), 4 * 50 * 2);
        for pair in commands.chunks(2) {
            match pair {
                [Call::Run(LEFT, l), Call::Run(RIGHT, r)] => assert_eq!(l, r),
                _ => panic!("interleaved commands: {:?}", pair),
            }
        }
    }

    #[test]
    fn test_display_names_both_motors() {
        let bus = shared(FakeBus::default());
        let db = base(&bus);
        assert_eq!(
            db.to_string(),
            "DriveBase with left motor on ID 1 and right motor on ID 2"
        );
    }
}

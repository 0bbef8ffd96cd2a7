// Blocking delay collaborator.
//
// `drive_time` needs a "block at least N milliseconds" primitive; putting
// it behind a trait lets tests record the wait instead of serving it.

use std::time::Duration;

/// Contract: block the calling thread for at least `ms` milliseconds.
pub trait Delay {
    fn delay_ms(&self, ms: u64);
}

/// Wall-clock delay with sub-millisecond accuracy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinDelay;

impl Delay for SpinDelay {
    fn delay_ms(&self, ms: u64) {
        spin_sleep::sleep(Duration::from_millis(ms));
    }
}

use core::sync::atomic::{AtomicU32, Ordering};

/// Monotonic millisecond clock.
///
/// The achieved sample rate is measured against this clock rather than
/// assumed from the configuration, so pacing drift does not skew the
/// frequency axis.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

/// Reads a counter advanced elsewhere, e.g. by a timer interrupt.
#[derive(Clone, Copy)]
pub struct CountClock(pub &'static AtomicU32);

impl Clock for CountClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::Relaxed) as i64
    }
}

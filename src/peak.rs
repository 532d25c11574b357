use libm::sqrtf;
use serde::Serialize;

use crate::sdft::Sdft;

/// A frequency estimate: one bin expressed in output units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, defmt::Format)]
pub struct Estimate {
    /// Beats per minute.
    pub bpm: f32,
    /// Scaled magnitude of the bin.
    pub amplitude: f32,
}

fn reading(s: &Sdft, rate: f32, i: usize) -> Estimate {
    let (re, im) = s.bin(i);
    let n = s.n() as f32;

    Estimate {
        bpm: 60.0 * i as f32 * rate / n,
        amplitude: 2.0 * sqrtf(re * re + im * im) / n,
    }
}

/// The full `(bpm, amplitude)` table, bin 0 upward.
///
/// `rate` is the achieved sample rate in Hz, not the configured one.
pub fn readings(s: &Sdft, rate: f32) -> impl Iterator<Item = Estimate> + '_ {
    (0..s.bound()).map(move |i| reading(s, rate, i))
}

/// Dominant bin of the accumulator.
///
/// The maximum is tracked with a non-strict comparison, so of two bins
/// with exactly equal magnitude the higher-frequency one wins.
pub fn scan(s: &Sdft, rate: f32) -> Estimate {
    let mut top = Estimate {
        bpm: 0.0,
        amplitude: 0.0,
    };

    for e in readings(s, rate) {
        if e.amplitude >= top.amplitude {
            top = e;
        }
    }

    top
}

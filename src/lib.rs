#![cfg_attr(not(test), no_std)]

//! Incremental heart-rate estimation from a photoplethysmography (PPG)
//! waveform.
//!
//! A fixed-length record of pulse readings is folded sample by sample
//! into a packed spectral accumulator ([`sdft`]), so the analysis never
//! needs the whole record and a full f32 spectrum at once. The dominant
//! bin ([`peak`]) is converted to beats per minute with the sample rate
//! measured during acquisition, shown on a small display ([`screen`])
//! and persisted ([`store`]).
//!
//! The crate is `no_std`; sensor, display, store, clock and pacing are
//! all injected, so the pipeline runs unchanged against hardware, a
//! host simulator or the test suite.

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};

use static_assertions as sa;

pub mod clock;
pub mod monitor;
pub mod pack;
pub mod peak;
pub mod ppg;
pub mod screen;
pub mod sdft;
pub mod store;
pub mod window;

/// Capacity of the sample record. Runs use `Config::n` samples of it.
pub const MAX_SAMPLES: usize = 1024;

/// Capacity of the spectral accumulator in bins. Equals the sample
/// capacity: a run without conjugate symmetry keeps one bin per sample.
pub const MAX_BINS: usize = MAX_SAMPLES;

sa::const_assert!(MAX_SAMPLES % 2 == 0);
sa::const_assert_eq!(MAX_BINS, MAX_SAMPLES);

#[derive(Debug, Clone, Copy, PartialEq, defmt::Format)]
pub enum ConfigError {
    /// Record length below 2 or above [`MAX_SAMPLES`].
    Length,
    /// Conjugate symmetry halves the bins, which needs an even length.
    OddLength,
    /// Sample rate below 1 Hz does not fit the 16-bit millisecond pause.
    Rate,
    /// Smoothing factors below 1 would amplify instead of smooth.
    Smoothing,
}

/// Run parameters, fixed for the lifetime of the estimator.
#[derive(Debug, Clone, Copy, PartialEq, defmt::Format)]
pub struct Config {
    n: usize,
    sample_rate: f32,
    conjugate_symmetric: bool,
    smoothing: f32,
}

impl Config {
    pub fn new(
        n: usize,
        sample_rate: f32,
        conjugate_symmetric: bool,
        smoothing: f32,
    ) -> Result<Config, ConfigError> {
        if n < 2 || n > MAX_SAMPLES {
            return Err(ConfigError::Length);
        }

        if conjugate_symmetric && n % 2 != 0 {
            return Err(ConfigError::OddLength);
        }

        if !(sample_rate >= 1.0) {
            return Err(ConfigError::Rate);
        }

        if !(smoothing >= 1.0) {
            return Err(ConfigError::Smoothing);
        }

        Ok(Config {
            n,
            sample_rate,
            conjugate_symmetric,
            smoothing,
        })
    }

    /// Record length in samples.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Nominal sample rate in Hz. The achieved rate is measured per run.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Live bins in the accumulator: half the record length for
    /// real-valued input (the upper half mirrors the lower), the full
    /// length otherwise.
    pub fn bound(&self) -> usize {
        if self.conjugate_symmetric {
            self.n / 2
        } else {
            self.n
        }
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    /// Nominal pause between raw reads, in whole milliseconds.
    pub fn period_ms(&self) -> u16 {
        (1000.0 / self.sample_rate) as u16
    }
}

impl Default for Config {
    /// The deployed configuration: 550 samples at 20 Hz, real-valued
    /// input, light smoothing.
    fn default() -> Config {
        Config {
            n: 550,
            sample_rate: 20.0,
            conjugate_symmetric: true,
            smoothing: 4.0,
        }
    }
}

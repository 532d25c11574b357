//! Incremental spectral accumulator.
//!
//! Frequency bins are folded forward for every incoming sample instead of
//! batch-transforming the finished record, so spectral state fits in a
//! fixed block of packed 16-bit components. Contributions are only ever
//! added: nothing is subtracted as older samples age, and the effective
//! window keeps growing over the record.

use core::f32::consts::PI;
use heapless::Vec;
use libm::{cosf, sinf};

use crate::pack::Tf16;
use crate::window::hann;
use crate::{Config, MAX_BINS};

/// Packed complex bins, real parts in `[0, bound)`, imaginary parts in
/// `[bound, 2 * bound)`.
pub type VecBins = Vec<u16, { 2 * MAX_BINS }>;

pub struct Sdft {
    n: usize,
    bound: usize,
    bins: VecBins,

    /// Previous raw pair. The update is driven by the difference between
    /// the incoming pair and this one, both weighted by the current
    /// window coefficient.
    rold: f32,
    iold: f32,
}

impl Sdft {
    pub fn new(cfg: &Config) -> Sdft {
        let mut bins = VecBins::new();
        bins.resize_default(2 * cfg.bound()).unwrap();

        Sdft {
            n: cfg.n(),
            bound: cfg.bound(),
            bins,
            rold: 0.0,
            iold: 0.0,
        }
    }

    /// Fold sample `index` of the record into every bin.
    ///
    /// Each bin unpacks to f32, accumulates the windowed difference
    /// rotated by its own phase, and packs back down. The packing noise
    /// this re-quantization injects is bounded by the codec error and
    /// stays far below the window sidelobes.
    pub fn update(&mut self, index: usize, rin: f32, iin: f32) {
        let m = hann(index, self.n);

        let rdelta = m * rin - m * self.rold;
        let idelta = m * iin - m * self.iold;

        self.rold = rin;
        self.iold = iin;

        let (n, bound) = (self.n, self.bound);

        for i in 0..bound {
            // (i * index) mod n keeps the phase argument in one period.
            let theta = -2.0 * PI * ((i * index) % n) as f32 / n as f32;
            let (s, c) = (sinf(theta), cosf(theta));

            let re = Tf16::from_u16(self.bins[i]).to_f32();
            let im = Tf16::from_u16(self.bins[bound + i]).to_f32();

            self.bins[i] = Tf16::from_f32(re + rdelta * c - idelta * s).to_u16();
            self.bins[bound + i] = Tf16::from_f32(im + rdelta * s + idelta * c).to_u16();
        }
    }

    /// Complex value of bin `i`, expanded to f32.
    pub fn bin(&self, i: usize) -> (f32, f32) {
        (
            Tf16::from_u16(self.bins[i]).to_f32(),
            Tf16::from_u16(self.bins[self.bound + i]).to_f32(),
        )
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of live bins.
    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Clear all bins and the held previous pair.
    pub fn reset(&mut self) {
        for b in self.bins.iter_mut() {
            *b = 0;
        }

        self.rold = 0.0;
        self.iold = 0.0;
    }
}

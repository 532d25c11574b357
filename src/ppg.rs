//! Pulse waveform acquisition: the sensor seam, the delta-packed sample
//! record and the pre-analysis smoother.

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};

use embedded_hal::adc::{Channel, OneShot};
use heapless::Vec;

use crate::MAX_SAMPLES;

#[derive(Debug, Clone, Copy, PartialEq, defmt::Format)]
pub enum Error {
    BufFull,
}

/// One raw pulse reading per call, as an unsigned ADC count.
pub trait PulseSensor {
    type Error;

    fn read(&mut self) -> Result<u16, Self::Error>;
}

/// Adapter from any one-shot ADC channel to [`PulseSensor`].
pub struct AdcSensor<ADC, PIN> {
    adc: ADC,
    pin: PIN,
}

impl<ADC, PIN> AdcSensor<ADC, PIN> {
    pub fn new(adc: ADC, pin: PIN) -> AdcSensor<ADC, PIN> {
        AdcSensor { adc, pin }
    }
}

impl<ADC, PIN, E> PulseSensor for AdcSensor<ADC, PIN>
where
    PIN: Channel<ADC>,
    ADC: OneShot<ADC, u16, PIN, Error = E>,
{
    type Error = E;

    fn read(&mut self) -> Result<u16, E> {
        nb::block!(self.adc.read(&mut self.pin))
    }
}

/// The sample record: an anchor reading plus signed 8-bit steps between
/// consecutive readings.
///
/// A step outside `[-128, 127]` wraps like any fixed-width subtraction,
/// and the replayed record then deviates from the raw readings. The wrap
/// is logged, not rejected.
pub struct DeltaBuf {
    anchor: u16,
    last: u16,
    deltas: Vec<i8, { MAX_SAMPLES - 1 }>,
    len: usize,
    n: usize,
}

impl DeltaBuf {
    pub fn new(n: usize) -> DeltaBuf {
        DeltaBuf {
            anchor: 0,
            last: 0,
            deltas: Vec::new(),
            len: 0,
            n,
        }
    }

    /// Append the next raw reading. The first becomes the anchor, later
    /// ones are stored as deltas from their predecessor.
    pub fn push(&mut self, raw: u16) -> Result<(), Error> {
        if self.len == self.n {
            return Err(Error::BufFull);
        }

        if self.len == 0 {
            self.anchor = raw;
        } else {
            let step = raw as i32 - self.last as i32;
            if step > i8::MAX as i32 || step < i8::MIN as i32 {
                warn!("sample step {} outside the delta range, wrapping", step);
            }

            self.deltas
                .push(raw.wrapping_sub(self.last) as u8 as i8)
                .map_err(|_| Error::BufFull)?;
        }

        self.last = raw;
        self.len += 1;

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.n
    }

    pub fn anchor(&self) -> u16 {
        self.anchor
    }

    /// Replay the record as absolute values: the anchor, then the running
    /// sum of the deltas. Sums are carried in i32 so a wrapped delta
    /// yields a deviated but well-defined value.
    pub fn replay(&self) -> impl Iterator<Item = f32> + '_ {
        let anchor = self.anchor as i32;

        core::iter::once(anchor)
            .chain(self.deltas.iter().scan(anchor, |acc, d| {
                *acc += *d as i32;
                Some(*acc)
            }))
            .take(self.len)
            .map(|v| v as f32)
    }

    pub fn reset(&mut self) {
        self.anchor = 0;
        self.last = 0;
        self.deltas.clear();
        self.len = 0;
    }
}

/// One-pole low-pass ahead of the spectral stage.
///
/// `smoothed += (raw - smoothed) / factor`. State starts at the first
/// value fed, so a constant input passes through unchanged from the
/// first sample.
pub struct Smoother {
    factor: f32,
    value: f32,
    primed: bool,
}

impl Smoother {
    pub fn new(factor: f32) -> Smoother {
        Smoother {
            factor,
            value: 0.0,
            primed: false,
        }
    }

    pub fn smooth(&mut self, raw: f32) -> f32 {
        if !self.primed {
            self.value = raw;
            self.primed = true;
        } else {
            self.value += (raw - self.value) / self.factor;
        }

        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
        self.primed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_reproduces_small_steps() {
        let mut b = DeltaBuf::new(8);
        let raw = [500u16, 510, 505, 505, 630, 520, 519, 400];

        for r in raw {
            b.push(r).unwrap();
        }
        assert!(b.is_full());

        let out: std::vec::Vec<f32> = b.replay().collect();
        let expect: std::vec::Vec<f32> = raw.iter().map(|r| *r as f32).collect();
        assert_eq!(out, expect);
    }

    #[test]
    fn oversized_step_wraps() {
        let mut b = DeltaBuf::new(2);
        b.push(100).unwrap();
        b.push(300).unwrap();

        // +200 wraps to -56 in eight bits.
        let out: std::vec::Vec<f32> = b.replay().collect();
        assert_eq!(out, [100.0, 44.0]);
    }

    #[test]
    fn push_past_capacity() {
        let mut b = DeltaBuf::new(4);
        for r in [1u16, 2, 3, 4] {
            b.push(r).unwrap();
        }

        assert_eq!(b.push(5), Err(Error::BufFull));
        assert_eq!(b.len(), 4);
    }

    #[test]
    fn reset_clears_record() {
        let mut b = DeltaBuf::new(4);
        b.push(100).unwrap();
        b.push(110).unwrap();

        b.reset();
        assert!(b.is_empty());
        assert_eq!(b.replay().count(), 0);

        b.push(42).unwrap();
        assert_eq!(b.anchor(), 42);
    }

    #[test]
    fn smoother_passes_constant() {
        let mut s = Smoother::new(4.0);

        for _ in 0..10 {
            assert_eq!(s.smooth(512.0), 512.0);
        }
    }

    #[test]
    fn smoother_converges_on_step() {
        let mut s = Smoother::new(4.0);
        s.smooth(0.0);

        let mut v = 0.0;
        for _ in 0..32 {
            v = s.smooth(100.0);
        }

        assert!((v - 100.0).abs() < 1.0);
    }

    #[test]
    fn smoother_reset_reprimes() {
        let mut s = Smoother::new(8.0);
        s.smooth(1000.0);
        s.reset();

        assert_eq!(s.smooth(3.0), 3.0);
    }

    struct FakeAdc {
        v: u16,
    }

    struct Pin;

    impl Channel<FakeAdc> for Pin {
        type ID = u8;

        fn channel() -> u8 {
            0
        }
    }

    impl OneShot<FakeAdc, u16, Pin> for FakeAdc {
        type Error = ();

        fn read(&mut self, _pin: &mut Pin) -> nb::Result<u16, ()> {
            self.v += 1;
            Ok(self.v)
        }
    }

    #[test]
    fn adc_sensor_reads_channel() {
        let mut s = AdcSensor::new(FakeAdc { v: 10 }, Pin);

        assert_eq!(s.read(), Ok(11));
        assert_eq!(s.read(), Ok(12));
    }
}

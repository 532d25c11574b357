//! The estimator aggregate: owns the sensor, display and store seams and
//! drives a full acquisition-and-analysis pass.

#[allow(unused_imports)]
use defmt::{debug, error, info, trace, warn};

use core::fmt::Write as _;
use embedded_hal::blocking::delay::DelayMs;

use crate::clock::Clock;
use crate::peak::{self, Estimate};
use crate::ppg::{DeltaBuf, PulseSensor, Smoother};
use crate::screen::{Row, Screen};
use crate::sdft::Sdft;
use crate::store::RecordStore;
use crate::Config;

/// Byte address of the persisted BPM record.
pub const RECORD_ADDR: usize = 0;

/// Samples between refreshes of the running estimate during analysis.
const ESTIMATE_EVERY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, defmt::Format)]
pub enum Error<SE, PE> {
    Sensor(SE),
    Store(PE),
}

/// Heart-rate monitor pipeline.
///
/// Acquisition and analysis run strictly in sequence on the caller's
/// thread. Pacing comes from the injected delay, timing from the
/// injected clock.
pub struct Monitor<S, D, P> {
    cfg: Config,

    pub sensor: S,
    pub screen: D,
    pub store: P,

    buf: DeltaBuf,
    smoother: Smoother,
    sdft: Sdft,
    rate: f32,
}

impl<S, D, P> Monitor<S, D, P>
where
    S: PulseSensor,
    D: Screen,
    P: RecordStore,
{
    pub fn new(cfg: Config, sensor: S, screen: D, store: P) -> Monitor<S, D, P> {
        Monitor {
            buf: DeltaBuf::new(cfg.n()),
            smoother: Smoother::new(cfg.smoothing()),
            sdft: Sdft::new(&cfg),
            rate: 0.0,
            cfg,
            sensor,
            screen,
            store,
        }
    }

    /// Run the full pipeline once: acquire, analyse, report.
    ///
    /// Per-sample `elapsed TAB smoothed` lines and the final
    /// `bpm TAB amplitude` table go to `diag`. Progress and the running
    /// estimate go to the screen. The winning BPM is persisted before
    /// returning.
    pub fn run<C: Clock, W: core::fmt::Write>(
        &mut self,
        clock: &C,
        delay: &mut impl DelayMs<u16>,
        diag: &mut W,
    ) -> Result<Estimate, Error<S::Error, P::Error>> {
        let rate = self.acquire(clock, delay, diag)?;
        let est = self.analyse(rate);
        self.report(est, rate, diag)?;

        Ok(est)
    }

    /// Last computed spectrum.
    pub fn spectrum(&self) -> &Sdft {
        &self.sdft
    }

    /// Sample rate achieved by the last run, in Hz. Zero before the
    /// first run.
    pub fn measured_rate(&self) -> f32 {
        self.rate
    }

    /// Record `n` paced readings into the delta buffer and return the
    /// achieved sample rate.
    fn acquire(
        &mut self,
        clock: &impl Clock,
        delay: &mut impl DelayMs<u16>,
        diag: &mut impl core::fmt::Write,
    ) -> Result<f32, Error<S::Error, P::Error>> {
        let n = self.cfg.n();
        let period = self.cfg.period_ms();

        info!("acquiring {} samples at {} ms intervals..", n, period);

        self.buf.reset();
        self.smoother.reset();

        let start = clock.now_ms();
        let mut pct = usize::MAX;

        for i in 0..n {
            let raw = self.sensor.read().map_err(Error::Sensor)?;
            self.buf.push(raw).unwrap();

            let smoothed = self.smoother.smooth(raw as f32);
            let elapsed = (clock.now_ms() - start) as f32 / 1000.0;
            writeln!(diag, "{}\t{}", elapsed, smoothed).ok();

            let p = i * 100 / n;
            if p != pct {
                pct = p;
                progress(&mut self.screen, "sampling", p);
            }

            delay.delay_ms(period);
        }

        let elapsed = (clock.now_ms() - start) as f32 / 1000.0;
        let rate = n as f32 / elapsed;
        self.rate = rate;

        info!(
            "acquired {} samples in {} s, measured rate {} Hz",
            n, elapsed, rate
        );

        Ok(rate)
    }

    /// Replay the record through the smoother into the accumulator,
    /// refreshing the running estimate as bins converge.
    fn analyse(&mut self, rate: f32) -> Estimate {
        let n = self.cfg.n();

        info!("analysing {} samples at {} Hz..", n, rate);

        self.smoother.reset();
        self.sdft.reset();

        let mut pct = usize::MAX;

        for (i, raw) in self.buf.replay().enumerate() {
            let smoothed = self.smoother.smooth(raw);
            self.sdft.update(i, smoothed, 0.0);

            if (i + 1) % ESTIMATE_EVERY == 0 {
                let running = peak::scan(&self.sdft, rate);
                bpm_line(&mut self.screen, running);
            }

            let p = i * 100 / n;
            if p != pct {
                pct = p;
                progress(&mut self.screen, "analysis", p);
            }
        }

        let est = peak::scan(&self.sdft, rate);
        debug!("estimate: {} bpm, amplitude {}", est.bpm, est.amplitude);

        est
    }

    /// Emit the spectrum table, show the final summary and persist the
    /// winning BPM.
    fn report(
        &mut self,
        est: Estimate,
        rate: f32,
        diag: &mut impl core::fmt::Write,
    ) -> Result<(), Error<S::Error, P::Error>> {
        for r in peak::readings(&self.sdft, rate) {
            writeln!(diag, "{}\t{}", r.bpm, r.amplitude).ok();
        }

        let mut s = heapless::String::<32>::new();
        write!(&mut s, "done {:.1} bpm", est.bpm).ok();
        self.screen.print(Row::Top, &s);
        bpm_line(&mut self.screen, est);

        self.store
            .store_bpm(RECORD_ADDR, est.bpm)
            .map_err(Error::Store)?;

        info!("stored estimate: {} bpm", est.bpm);

        Ok(())
    }
}

fn progress(screen: &mut impl Screen, phase: &str, pct: usize) {
    let mut s = heapless::String::<32>::new();
    write!(&mut s, "{} {}%", phase, pct).ok();
    screen.print(Row::Top, &s);
}

fn bpm_line(screen: &mut impl Screen, e: Estimate) {
    let mut s = heapless::String::<32>::new();
    write!(&mut s, "{:.1} bpm", e.bpm).ok();
    screen.print(Row::Bottom, &s);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::NullScreen;
    use crate::store::MemStore;
    use core::cell::Cell;
    use core::convert::Infallible;
    use std::rc::Rc;
    use std::string::{String, ToString};
    use std::vec::Vec;

    struct VirtClock(Rc<Cell<i64>>);

    impl Clock for VirtClock {
        fn now_ms(&self) -> i64 {
            self.0.get()
        }
    }

    /// Advances the shared clock instead of sleeping, `stretch` times
    /// slower than asked.
    struct VirtDelay {
        t: Rc<Cell<i64>>,
        stretch: i64,
    }

    impl DelayMs<u16> for VirtDelay {
        fn delay_ms(&mut self, ms: u16) {
            self.t.set(self.t.get() + ms as i64 * self.stretch);
        }
    }

    /// Synthesizes the waveform from the shared clock, like a physical
    /// source oscillating in real time.
    struct SineSensor {
        t: Rc<Cell<i64>>,
        hz: f32,
    }

    impl PulseSensor for SineSensor {
        type Error = Infallible;

        fn read(&mut self) -> Result<u16, Infallible> {
            let t = self.t.get() as f32 / 1000.0;
            let v = 512.0 + 100.0 * (2.0 * core::f32::consts::PI * self.hz * t).sin();
            Ok(v as u16)
        }
    }

    fn run_sim(
        hz: f32,
        stretch: i64,
    ) -> (
        Estimate,
        String,
        Monitor<SineSensor, NullScreen, MemStore<16>>,
    ) {
        let t = Rc::new(Cell::new(0i64));
        let cfg = Config::default();

        let mut m = Monitor::new(
            cfg,
            SineSensor { t: t.clone(), hz },
            NullScreen,
            MemStore::new(),
        );

        let clock = VirtClock(t.clone());
        let mut delay = VirtDelay { t, stretch };
        let mut diag = String::new();

        let est = m.run(&clock, &mut delay, &mut diag).unwrap();
        (est, diag, m)
    }

    #[test]
    fn seventy_two_bpm() {
        // 1.2 Hz at 20 Hz over 550 samples lands exactly on bin 33.
        let (est, diag, mut m) = run_sim(1.2, 1);

        assert_eq!(m.measured_rate(), 20.0);
        assert_eq!(est.bpm, 72.0);
        assert!(est.amplitude > 5.0 && est.amplitude < 20.0);

        assert_eq!(diag.lines().count(), 550 + 275);
        assert!(diag.starts_with("0\t"));

        let stored = m.store.load_bpm(RECORD_ADDR).unwrap();
        assert_eq!(stored.to_bits(), est.bpm.to_bits());
    }

    #[test]
    fn slow_pacing_measured_not_assumed() {
        // Delays run twice as long as requested, so the achieved rate is
        // 10 Hz against a configured 20. The 1.2 Hz source must still
        // come back as 72 bpm.
        let (est, _, m) = run_sim(1.2, 2);

        assert_eq!(m.measured_rate(), 10.0);
        assert_eq!(est.bpm, 72.0);
    }

    #[test]
    fn off_bin_frequency_within_resolution() {
        // 1.25 Hz falls between bins; the estimate may only miss by the
        // bin width.
        let (est, _, _) = run_sim(1.25, 1);

        let width = 60.0 * 20.0 / 550.0;
        assert!((est.bpm - 75.0).abs() <= width);
    }

    struct ConstSensor(u16);

    impl PulseSensor for ConstSensor {
        type Error = Infallible;

        fn read(&mut self) -> Result<u16, Infallible> {
            Ok(self.0)
        }
    }

    #[test]
    fn flatline_gives_zero_spectrum() {
        let t = Rc::new(Cell::new(0i64));
        let cfg = Config::default();

        let mut m = Monitor::new(cfg, ConstSensor(512), NullScreen, MemStore::<8>::new());

        let clock = VirtClock(t.clone());
        let mut delay = VirtDelay { t, stretch: 1 };
        let mut diag = String::new();

        let est = m.run(&clock, &mut delay, &mut diag).unwrap();

        assert_eq!(est.amplitude, 0.0);
        // All bins tie at zero and the scan resolves to the top of the
        // range.
        assert_eq!(est.bpm, 60.0 * 274.0 * 20.0 / 550.0);
    }

    struct FailingSensor {
        left: usize,
    }

    impl PulseSensor for FailingSensor {
        type Error = u8;

        fn read(&mut self) -> Result<u16, u8> {
            if self.left == 0 {
                return Err(7);
            }

            self.left -= 1;
            Ok(500)
        }
    }

    #[test]
    fn sensor_error_aborts_run() {
        let t = Rc::new(Cell::new(0i64));
        let cfg = Config::new(32, 20.0, true, 4.0).unwrap();

        let mut m = Monitor::new(cfg, FailingSensor { left: 10 }, NullScreen, MemStore::<8>::new());

        let clock = VirtClock(t.clone());
        let mut delay = VirtDelay { t, stretch: 1 };
        let mut diag = String::new();

        let err = m.run(&clock, &mut delay, &mut diag).unwrap_err();
        assert_eq!(err, Error::Sensor(7));
    }

    #[test]
    fn store_error_surfaces() {
        let t = Rc::new(Cell::new(0i64));
        let cfg = Config::new(16, 20.0, true, 4.0).unwrap();

        let mut m = Monitor::new(cfg, ConstSensor(500), NullScreen, MemStore::<2>::new());

        let clock = VirtClock(t.clone());
        let mut delay = VirtDelay { t, stretch: 1 };
        let mut diag = String::new();

        let err = m.run(&clock, &mut delay, &mut diag).unwrap_err();
        assert_eq!(err, Error::Store(crate::store::StoreError::OutOfRange));
    }

    struct LogScreen {
        top: Vec<String>,
        bottom: Vec<String>,
    }

    impl Screen for LogScreen {
        fn print(&mut self, row: Row, text: &str) {
            match row {
                Row::Top => self.top.push(text.to_string()),
                Row::Bottom => self.bottom.push(text.to_string()),
            }
        }
    }

    #[test]
    fn screen_follows_phases() {
        let t = Rc::new(Cell::new(0i64));
        let cfg = Config::new(32, 20.0, true, 4.0).unwrap();

        let screen = LogScreen {
            top: Vec::new(),
            bottom: Vec::new(),
        };

        let mut m = Monitor::new(
            cfg,
            SineSensor {
                t: t.clone(),
                hz: 1.0,
            },
            screen,
            MemStore::<8>::new(),
        );

        let clock = VirtClock(t.clone());
        let mut delay = VirtDelay { t, stretch: 1 };
        let mut diag = String::new();

        m.run(&clock, &mut delay, &mut diag).unwrap();

        // One running estimate every second replayed sample, then the
        // final line.
        assert_eq!(m.screen.bottom.len(), 32 / 2 + 1);
        assert!(m.screen.top.first().unwrap().starts_with("sampling"));
        assert!(m.screen.top.last().unwrap().starts_with("done"));
        assert!(m.screen.bottom.last().unwrap().ends_with("bpm"));
    }
}

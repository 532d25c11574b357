use anyhow::anyhow;
use argh::FromArgs;
use core::cell::Cell;
use std::io::Write as _;
use std::rc::Rc;
use std::time::{Duration, Instant};

use embedded_hal::blocking::delay::DelayMs;

use hrm::clock::Clock;
use hrm::monitor::{Monitor, RECORD_ADDR};
use hrm::peak::{self, Estimate};
use hrm::ppg::PulseSensor;
use hrm::screen::{Row, Screen};
use hrm::store::{MemStore, RecordStore};
use hrm::Config;

#[derive(FromArgs)]
/// Simulate a pulse source and estimate its heart rate.
struct HrmSim {
    #[argh(option, default = "550", description = "samples to record")]
    n: usize,

    #[argh(option, default = "20.0", description = "nominal sample rate (Hz)")]
    rate: f32,

    #[argh(option, default = "72.0", description = "simulated heart rate (bpm)")]
    bpm: f32,

    #[argh(
        option,
        default = "4.0",
        description = "smoothing factor of the one-pole filter"
    )]
    smoothing: f32,

    #[argh(
        option,
        default = "0.0",
        description = "peak-to-peak noise on the synthetic waveform (counts)"
    )]
    noise: f32,

    #[argh(switch, description = "run on a virtual clock instead of real time")]
    fast: bool,

    #[argh(switch, description = "print a JSON summary instead of the TSV spectrum")]
    json: bool,
}

#[derive(Clone, Copy)]
struct WallClock(Instant);

impl Clock for WallClock {
    fn now_ms(&self) -> i64 {
        self.0.elapsed().as_millis() as i64
    }
}

struct WallDelay;

impl DelayMs<u16> for WallDelay {
    fn delay_ms(&mut self, ms: u16) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}

#[derive(Clone)]
struct VirtClock(Rc<Cell<i64>>);

impl Clock for VirtClock {
    fn now_ms(&self) -> i64 {
        self.0.get()
    }
}

struct VirtDelay(Rc<Cell<i64>>);

impl DelayMs<u16> for VirtDelay {
    fn delay_ms(&mut self, ms: u16) {
        self.0.set(self.0.get() + ms as i64);
    }
}

/// Synthetic PPG source: a sinusoid at the requested heart rate around
/// mid-scale of a 10-bit ADC, with optional uniform noise.
struct SimSensor<C> {
    clock: C,
    hz: f32,
    noise: f32,
    rng: u32,
}

impl<C> SimSensor<C> {
    fn next_rand(&mut self) -> f32 {
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 17;
        self.rng ^= self.rng << 5;

        (self.rng >> 8) as f32 / (1u32 << 24) as f32
    }
}

impl<C: Clock> PulseSensor for SimSensor<C> {
    type Error = core::convert::Infallible;

    fn read(&mut self) -> Result<u16, Self::Error> {
        let t = self.clock.now_ms() as f32 / 1000.0;
        let mut v = 512.0 + 100.0 * (2.0 * core::f32::consts::PI * self.hz * t).sin();

        if self.noise > 0.0 {
            v += self.noise * (self.next_rand() - 0.5);
        }

        Ok(v as u16)
    }
}

/// Two-line display on stderr. Repeated rows are dropped so converged
/// running estimates do not flood the log.
struct TermScreen {
    last: [String; 2],
}

impl TermScreen {
    fn new() -> TermScreen {
        TermScreen {
            last: [String::new(), String::new()],
        }
    }
}

impl Screen for TermScreen {
    fn print(&mut self, row: Row, text: &str) {
        let i = match row {
            Row::Top => 0,
            Row::Bottom => 1,
        };

        if self.last[i] != text {
            self.last[i] = text.to_string();
            eprintln!("[screen:{}] {}", i + 1, text);
        }
    }
}

struct StdoutDiag(std::io::Stdout);

impl core::fmt::Write for StdoutDiag {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.write_all(s.as_bytes()).map_err(|_| core::fmt::Error)
    }
}

struct NullDiag;

impl core::fmt::Write for NullDiag {
    fn write_str(&mut self, _s: &str) -> core::fmt::Result {
        Ok(())
    }
}

#[derive(serde::Serialize)]
struct Summary {
    bpm: f32,
    amplitude: f32,
    rate: f32,
    spectrum: Vec<Estimate>,
}

fn simulate<C: Clock + Clone>(
    args: &HrmSim,
    cfg: Config,
    clock: C,
    delay: &mut impl DelayMs<u16>,
) -> anyhow::Result<()> {
    let sensor = SimSensor {
        clock: clock.clone(),
        hz: args.bpm / 60.0,
        noise: args.noise,
        rng: 0x2545_f491,
    };

    let mut m = Monitor::new(cfg, sensor, TermScreen::new(), MemStore::<64>::new());

    eprintln!(
        "simulating {} bpm over {} samples at {} Hz..",
        args.bpm,
        cfg.n(),
        cfg.sample_rate()
    );

    let res = if args.json {
        m.run(&clock, delay, &mut NullDiag)
    } else {
        m.run(&clock, delay, &mut StdoutDiag(std::io::stdout()))
    };
    let est = res.map_err(|e| anyhow!("run failed: {:?}", e))?;

    let rate = m.measured_rate();
    let stored = m
        .store
        .load_bpm(RECORD_ADDR)
        .map_err(|e| anyhow!("store readback failed: {:?}", e))?;

    if args.json {
        let summary = Summary {
            bpm: est.bpm,
            amplitude: est.amplitude,
            rate,
            spectrum: peak::readings(m.spectrum(), rate).collect(),
        };

        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        eprintln!(
            "estimate: {:.1} bpm (amplitude {:.2}) at a measured {:.2} Hz",
            est.bpm, est.amplitude, rate
        );
        eprintln!("stored record: {:.1} bpm", stored);
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args: HrmSim = argh::from_env();

    let cfg = Config::new(args.n, args.rate, true, args.smoothing)
        .map_err(|e| anyhow!("bad configuration: {:?}", e))?;

    if args.fast {
        let t = Rc::new(Cell::new(0i64));
        let mut delay = VirtDelay(t.clone());
        simulate(&args, cfg, VirtClock(t), &mut delay)
    } else {
        let mut delay = WallDelay;
        simulate(&args, cfg, WallClock(Instant::now()), &mut delay)
    }
}

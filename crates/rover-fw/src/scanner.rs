//! Servo sweep: one averaged range sample per degree.

use embedded_hal::delay::DelayNs;
use rover_proto::ScanMode;
use serde::Deserialize;
use tracing::debug;

use crate::hal::{ActuatorControl, HardwareSensors};

/// Degrees covered by one sweep, one sample each.
pub const SWEEP_LEN: usize = 180;

pub const MAX_AVERAGES: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSource {
    Ir,
    Averaged,
}

/// What was measured at one angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    /// Fast mode: one IR reading.
    Ir(u16),
    /// Full mode: sonar and IR, each already averaged over the repeat count.
    Averaged { sonar: u16, ir: u16 },
}

impl Reading {
    pub fn source(&self) -> SampleSource {
        match self {
            Reading::Ir(_) => SampleSource::Ir,
            Reading::Averaged { .. } => SampleSource::Averaged,
        }
    }

    /// Truncating mean when both rangers contributed.
    pub fn distance_cm(&self) -> u16 {
        match *self {
            Reading::Ir(cm) => cm,
            Reading::Averaged { sonar, ir } => ((u32::from(sonar) + u32::from(ir)) / 2) as u16,
        }
    }

    /// Every contributing ranger sees something closer than `threshold_cm`.
    pub fn below(&self, threshold_cm: u16) -> bool {
        match *self {
            Reading::Ir(cm) => cm < threshold_cm,
            Reading::Averaged { sonar, ir } => sonar < threshold_cm && ir < threshold_cm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSample {
    pub angle: u8,
    pub reading: Reading,
}

impl SensorSample {
    pub fn distance_cm(&self) -> u16 {
        self.reading.distance_cm()
    }

    pub fn source(&self) -> SampleSource {
        self.reading.source()
    }
}

/// Settle times, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanTiming {
    /// Wait after parking the servo at 0 before the sweep starts.
    pub park_ms: u32,
    /// Every servo move waits this long for the horn to get there.
    pub servo_move_ms: u32,
    pub full_settle_ms: u32,
    pub fast_settle_ms: u32,
    /// Gap between averaged readings at one angle.
    pub between_readings_ms: u32,
}

impl Default for ScanTiming {
    fn default() -> Self {
        Self { park_ms: 700, servo_move_ms: 5, full_settle_ms: 10, fast_settle_ms: 5, between_readings_ms: 1 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scanner {
    timing: ScanTiming,
}

impl Scanner {
    pub fn new(timing: ScanTiming) -> Self {
        Self { timing }
    }

    /// Sweep 0..180 and return exactly [`SWEEP_LEN`] samples in angle order.
    ///
    /// `averages` is clamped to 1..=9 and ignored in fast mode. Readings are
    /// taken at face value; a failed ping simply shows up as a long range.
    pub fn sweep<H>(&self, hw: &mut H, mode: ScanMode, averages: u8) -> Vec<SensorSample>
    where
        H: HardwareSensors + ActuatorControl + DelayNs,
    {
        let averages = averages.clamp(1, MAX_AVERAGES);
        debug!(?mode, averages, "sweep start");

        self.move_servo(hw, 0);
        hw.delay_ms(self.timing.park_ms);

        let mut samples = Vec::with_capacity(SWEEP_LEN);
        for angle in 0..SWEEP_LEN as u8 {
            self.move_servo(hw, angle);
            let reading = match mode {
                ScanMode::Full => {
                    hw.delay_ms(self.timing.full_settle_ms);
                    self.averaged(hw, averages)
                }
                ScanMode::Fast => {
                    hw.delay_ms(self.timing.fast_settle_ms);
                    Reading::Ir(hw.ir_cm())
                }
            };
            samples.push(SensorSample { angle, reading });
        }
        samples
    }

    fn move_servo<H: ActuatorControl + DelayNs>(&self, hw: &mut H, angle: u8) {
        hw.set_servo(angle);
        hw.delay_ms(self.timing.servo_move_ms);
    }

    fn averaged<H: HardwareSensors + DelayNs>(&self, hw: &mut H, n: u8) -> Reading {
        let (mut sonar, mut ir) = (0u32, 0u32);
        for _ in 0..n {
            sonar += u32::from(hw.sonar_cm());
            ir += u32::from(hw.ir_cm());
            hw.delay_ms(self.timing.between_readings_ms);
        }
        let n = u32::from(n);
        Reading::Averaged { sonar: (sonar / n) as u16, ir: (ir / n) as u16 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::BodySensors;
    use crate::song::Song;

    /// Returns readings from a fixed list, cycling, and records servo angles.
    struct Bench {
        sonar: Vec<u16>,
        ir: Vec<u16>,
        sonar_i: usize,
        ir_i: usize,
        angles: Vec<u8>,
        slept_ns: u64,
    }

    impl Bench {
        fn new(sonar: Vec<u16>, ir: Vec<u16>) -> Self {
            Self { sonar, ir, sonar_i: 0, ir_i: 0, angles: vec![], slept_ns: 0 }
        }
    }

    impl HardwareSensors for Bench {
        fn sonar_cm(&mut self) -> u16 {
            let v = self.sonar[self.sonar_i % self.sonar.len()];
            self.sonar_i += 1;
            v
        }
        fn ir_cm(&mut self) -> u16 {
            let v = self.ir[self.ir_i % self.ir.len()];
            self.ir_i += 1;
            v
        }
        fn body(&mut self) -> BodySensors {
            BodySensors::default()
        }
    }

    impl ActuatorControl for Bench {
        fn set_wheels(&mut self, _: i16, _: i16) {}
        fn set_servo(&mut self, degree: u8) {
            self.angles.push(degree);
        }
        fn play_song(&mut self, _: &Song) {}
    }

    impl DelayNs for Bench {
        fn delay_ns(&mut self, ns: u32) {
            self.slept_ns += u64::from(ns);
        }
    }

    #[test]
    fn full_sweep_has_one_sample_per_degree() {
        let mut hw = Bench::new(vec![40], vec![30]);
        let samples = Scanner::default().sweep(&mut hw, ScanMode::Full, 3);
        assert_eq!(samples.len(), SWEEP_LEN);
        for (i, s) in samples.iter().enumerate() {
            assert_eq!(s.angle as usize, i);
            assert_eq!(s.source(), SampleSource::Averaged);
            assert_eq!(s.distance_cm(), 35);
        }
        assert_eq!(hw.sonar_i, SWEEP_LEN * 3);
        // park at 0, then every angle once
        assert_eq!(hw.angles.len(), SWEEP_LEN + 1);
        assert_eq!(hw.angles[0], 0);
        assert_eq!(*hw.angles.last().unwrap(), 179);
    }

    #[test]
    fn average_truncates() {
        let mut hw = Bench::new(vec![10, 11], vec![20, 21]);
        let samples = Scanner::default().sweep(&mut hw, ScanMode::Full, 2);
        assert_eq!(samples[0].reading, Reading::Averaged { sonar: 10, ir: 20 });
        // (10 + 20) / 2
        assert_eq!(samples[0].distance_cm(), 15);

        let mut hw = Bench::new(vec![7], vec![8]);
        let s = Scanner::default().sweep(&mut hw, ScanMode::Full, 1);
        assert_eq!(s[0].distance_cm(), 7);
    }

    #[test]
    fn zero_averages_reads_once() {
        let mut hw = Bench::new(vec![50], vec![50]);
        let samples = Scanner::default().sweep(&mut hw, ScanMode::Full, 0);
        assert_eq!(samples.len(), SWEEP_LEN);
        assert_eq!(hw.sonar_i, SWEEP_LEN);
    }

    #[test]
    fn fast_sweep_is_ir_only() {
        let mut hw = Bench::new(vec![1], vec![120]);
        let samples = Scanner::default().sweep(&mut hw, ScanMode::Fast, 9);
        assert!(samples.iter().all(|s| s.reading == Reading::Ir(120)));
        assert_eq!(hw.sonar_i, 0);
        assert_eq!(hw.ir_i, SWEEP_LEN);
        // 700 park + 180 * (5 + 5) + the park move
        assert_eq!(hw.slept_ns, (700 + 5 + SWEEP_LEN as u64 * 10) * 1_000_000);
    }

    #[test]
    fn threshold_needs_both_rangers() {
        let r = Reading::Averaged { sonar: 80, ir: 95 };
        assert!(!r.below(90));
        assert!(Reading::Averaged { sonar: 80, ir: 89 }.below(90));
        assert!(Reading::Ir(149).below(150));
        assert!(!Reading::Ir(150).below(150));
    }
}

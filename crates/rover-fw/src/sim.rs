//! A simulated rover body for bench runs without hardware.
//!
//! Time only moves when the firmware waits: every `delay_ns` integrates the
//! wheel speeds into odometry. Ranging looks up the obstacle under the servo.

use std::time::Duration;

use embedded_hal::delay::DelayNs;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rover_proto::TripReason;
use serde::Deserialize;
use tracing::trace;

use crate::hal::{ActuatorControl, BodySensors, HardwareSensors};
use crate::song::Song;

/// Distance between the drive wheels, mm.
pub const WHEEL_BASE_MM: f64 = 258.0;

const PAD_SIGNAL: u16 = 900;
const FLOOR_SIGNAL: u16 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Obstacle {
    pub center_deg: u8,
    pub width_deg: u8,
    pub distance_cm: u16,
}

impl Obstacle {
    fn covers(&self, angle: u8) -> bool {
        let half = i16::from(self.width_deg) / 2;
        (i16::from(angle) - i16::from(self.center_deg)).abs() <= half
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    pub obstacles: Vec<Obstacle>,
    /// Range reported where nothing is in view.
    pub background_cm: u16,
    /// Uniform jitter added to every range reading.
    pub noise_cm: u16,
    /// Net forward travel at which `trip_reason` starts to read true.
    /// Zero or absent means never.
    pub trip_after_cm: Option<u16>,
    pub trip_reason: TripReason,
    /// Net forward travel at which all four cliff sensors see the pad.
    /// Zero or absent means never.
    pub landing_after_cm: Option<u16>,
    /// Sleep for real in `delay_ns` instead of only advancing the sim clock.
    pub realtime: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            obstacles: Vec::new(),
            background_cm: 250,
            noise_cm: 0,
            trip_after_cm: None,
            trip_reason: TripReason::BumperLeft,
            landing_after_cm: None,
            realtime: false,
        }
    }
}

#[derive(Debug)]
pub struct SimHardware {
    config: SimConfig,
    rng: StdRng,
    servo_deg: u8,
    wheels: (i16, i16),
    /// Net forward displacement, mm.
    position_mm: f64,
    heading_deg: f64,
    // motion not yet reported through `body`
    unreported_mm: f64,
    unreported_deg: f64,
    clock_ns: u64,
    stop_calls: usize,
    songs: Vec<&'static str>,
}

impl SimHardware {
    pub fn new(config: SimConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            servo_deg: 0,
            wheels: (0, 0),
            position_mm: 0.0,
            heading_deg: 0.0,
            unreported_mm: 0.0,
            unreported_deg: 0.0,
            clock_ns: 0,
            stop_calls: 0,
            songs: Vec::new(),
        }
    }

    pub fn position_cm(&self) -> f64 {
        self.position_mm / 10.0
    }

    /// Clockwise is positive.
    pub fn heading_deg(&self) -> f64 {
        self.heading_deg
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.clock_ns)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls
    }

    pub fn songs(&self) -> &[&'static str] {
        &self.songs
    }

    fn range(&mut self) -> u16 {
        let truth = self
            .config
            .obstacles
            .iter()
            .filter(|o| o.covers(self.servo_deg))
            .map(|o| o.distance_cm)
            .min()
            .unwrap_or(self.config.background_cm);
        if self.config.noise_cm == 0 {
            return truth;
        }
        let n = i32::from(self.config.noise_cm);
        let jitter = self.rng.gen_range(-n..=n);
        (i32::from(truth) + jitter).clamp(0, i32::from(u16::MAX)) as u16
    }

    fn reached(&self, cm: Option<u16>) -> bool {
        cm.is_some_and(|cm| cm > 0 && self.position_mm >= f64::from(cm) * 10.0)
    }

    fn advance(&mut self, ns: u32) {
        let dt = f64::from(ns) / 1e9;
        let (left, right) = (f64::from(self.wheels.0), f64::from(self.wheels.1));
        let linear = (left + right) / 2.0 * dt;
        // left faster than right turns clockwise
        let turn = ((left - right) / WHEEL_BASE_MM * dt).to_degrees();
        self.position_mm += linear;
        self.heading_deg += turn;
        self.unreported_mm += linear;
        self.unreported_deg += turn;
        self.clock_ns += u64::from(ns);
    }
}

impl HardwareSensors for SimHardware {
    fn sonar_cm(&mut self) -> u16 {
        self.range()
    }

    fn ir_cm(&mut self) -> u16 {
        self.range()
    }

    fn body(&mut self) -> BodySensors {
        // whole units are reported, fractions carry over to the next poll
        let mm = self.unreported_mm.trunc();
        let deg = self.unreported_deg.trunc();
        self.unreported_mm -= mm;
        self.unreported_deg -= deg;

        let mut body = BodySensors { distance_mm: mm as i16, angle_deg: deg as i16, ..Default::default() };
        if self.reached(self.config.trip_after_cm) {
            body.set_flag(self.config.trip_reason, true);
        }
        let signal = if self.reached(self.config.landing_after_cm) { PAD_SIGNAL } else { FLOOR_SIGNAL };
        body.cliff_left_signal = signal;
        body.cliff_front_left_signal = signal;
        body.cliff_front_right_signal = signal;
        body.cliff_right_signal = signal;
        body
    }
}

impl ActuatorControl for SimHardware {
    fn set_wheels(&mut self, left: i16, right: i16) {
        trace!(left, right, "wheels");
        self.wheels = (left, right);
    }

    fn stop(&mut self) {
        self.stop_calls += 1;
        self.set_wheels(0, 0);
    }

    fn set_servo(&mut self, degree: u8) {
        self.servo_deg = degree;
    }

    fn play_song(&mut self, song: &Song) {
        trace!(song = song.name, "playing");
        self.songs.push(song.name);
        self.clock_ns += u64::from(song.duration_ms()) * 1_000_000;
    }
}

impl DelayNs for SimHardware {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(ns);
        if self.config.realtime {
            std::thread::sleep(Duration::from_nanos(u64::from(ns)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{MotionController, Rotation};
    use crate::scanner::Scanner;
    use crate::segment::ObjectSegmenter;
    use rover_proto::{MotionOutcome, ScanMode};

    #[test]
    fn drives_the_requested_distance() {
        let mut sim = SimHardware::new(SimConfig::default());
        let outcome = MotionController::default().forward(&mut sim, 50);
        assert_eq!(outcome, MotionOutcome::Success);
        assert!((sim.position_cm() - 50.0).abs() < 1.0, "{}", sim.position_cm());
        assert_eq!(sim.stop_calls(), 1);
    }

    #[test]
    fn obstacle_trips_then_reverse_clears_it() {
        let config = SimConfig { trip_after_cm: Some(40), ..Default::default() };
        let mut sim = SimHardware::new(config);
        let mut mc = MotionController::default();
        assert_eq!(mc.forward(&mut sim, 100), MotionOutcome::SensorTrip(TripReason::BumperLeft));
        assert!((sim.position_cm() - 40.0).abs() < 1.0);
        assert_eq!(mc.reverse(&mut sim, 20), MotionOutcome::Success);
        assert_eq!(mc.forward(&mut sim, 10), MotionOutcome::Success);
        assert_eq!(sim.stop_calls(), 3);
    }

    #[test]
    fn landing_pad() {
        let config = SimConfig { landing_after_cm: Some(30), ..Default::default() };
        let mut sim = SimHardware::new(config);
        assert_eq!(MotionController::default().forward(&mut sim, 80), MotionOutcome::HeuristicLanding);
    }

    #[test]
    fn turns_about_the_requested_angle() {
        let mut sim = SimHardware::new(SimConfig::default());
        MotionController::default().rotate(&mut sim, 90, Rotation::Clockwise);
        assert!((sim.heading_deg() - 90.0).abs() < 2.0, "{}", sim.heading_deg());
        MotionController::default().rotate(&mut sim, 45, Rotation::CounterClockwise);
        assert!((sim.heading_deg() - 45.0).abs() < 3.0, "{}", sim.heading_deg());
    }

    #[test]
    fn scan_finds_configured_obstacles() {
        let config = SimConfig {
            obstacles: vec![
                Obstacle { center_deg: 45, width_deg: 10, distance_cm: 60 },
                Obstacle { center_deg: 120, width_deg: 20, distance_cm: 40 },
            ],
            noise_cm: 2,
            seed: 7,
            ..Default::default()
        };
        let mut sim = SimHardware::new(config);
        let samples = Scanner::default().sweep(&mut sim, ScanMode::Full, 3);
        let seg = ObjectSegmenter::for_mode(ScanMode::Full).segment(&samples);
        let found: Vec<_> = seg.objects.iter().map(|o| (o.start_angle, o.end_angle)).collect();
        assert_eq!(found, vec![(40, 50), (110, 130)]);
        assert!(seg.objects.iter().all(|o| o.distance_cm.abs_diff(if o.start_angle < 90 { 60 } else { 40 }) <= 2));
        assert!(sim.elapsed() > Duration::from_secs(2));
    }

    #[test]
    fn songs_are_recorded() {
        let mut sim = SimHardware::new(SimConfig::default());
        sim.play_song(&crate::song::BEEP);
        assert_eq!(sim.songs(), ["beep"]);
    }
}

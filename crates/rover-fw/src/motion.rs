//! Blocking drive and turn primitives.
//!
//! Every call commands the wheels, polls odometry until the target is covered
//! or something aborts it, then stops the wheels exactly once.

use embedded_hal::delay::DelayNs;
use rover_proto::MotionOutcome;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::hal::{ActuatorControl, BodySensors, HardwareSensors};

/// Cliff reflectance above which the floor counts as the landing pad marking.
/// All four must be exceeded on the same poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliffCalibration {
    pub left: u16,
    pub front_left: u16,
    pub front_right: u16,
    pub right: u16,
}

impl Default for CliffCalibration {
    fn default() -> Self {
        Self { left: 400, front_left: 500, front_right: 600, right: 600 }
    }
}

impl CliffCalibration {
    pub fn on_pad(&self, body: &BodySensors) -> bool {
        body.cliff_left_signal > self.left
            && body.cliff_right_signal > self.right
            && body.cliff_front_right_signal > self.front_right
            && body.cliff_front_left_signal > self.front_left
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Wheel speed for straight moves, mm/s.
    pub drive_speed: i16,
    /// Wheel speed while turning in place, mm/s.
    pub rotate_speed: i16,
    pub drive_poll_ms: u32,
    pub rotate_poll_ms: u32,
    pub cliff: CliffCalibration,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self { drive_speed: 200, rotate_speed: 150, drive_poll_ms: 10, rotate_poll_ms: 5, cliff: CliffCalibration::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

impl Rotation {
    /// Positive is clockwise, anything else counter-clockwise.
    pub fn from_sign(direction: i32) -> Self {
        if direction > 0 {
            Rotation::Clockwise
        } else {
            Rotation::CounterClockwise
        }
    }

    pub fn sign(self) -> i16 {
        match self {
            Rotation::Clockwise => 1,
            Rotation::CounterClockwise => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionState {
    #[default]
    Idle,
    Moving,
    Tripped(MotionOutcome),
    Completed,
}

#[derive(Debug, Default)]
pub struct MotionController {
    config: MotionConfig,
    state: MotionState,
    last: Option<MotionState>,
}

impl MotionController {
    pub fn new(config: MotionConfig) -> Self {
        Self { config, state: MotionState::Idle, last: None }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    /// Terminal state of the previous call.
    pub fn last_terminal(&self) -> Option<MotionState> {
        self.last
    }

    /// Drive forward `distance_cm`, watching the trip sensors and the landing
    /// pad heuristic on every poll.
    pub fn forward<H>(&mut self, hw: &mut H, distance_cm: u16) -> MotionOutcome
    where
        H: HardwareSensors + ActuatorControl + DelayNs,
    {
        let target_mm = u32::from(distance_cm) * 10;
        let speed = self.config.drive_speed;
        self.begin();
        hw.set_wheels(speed, speed);

        let mut sum_mm: u32 = 0;
        let mut outcome = MotionOutcome::Success;
        while sum_mm < target_mm {
            let body = hw.body();
            if let Some(reason) = body.first_trip() {
                warn!(%reason, sum_mm, target_mm, "forward aborted");
                outcome = MotionOutcome::SensorTrip(reason);
                break;
            }
            if self.config.cliff.on_pad(&body) {
                info!(
                    left = body.cliff_left_signal,
                    front_left = body.cliff_front_left_signal,
                    front_right = body.cliff_front_right_signal,
                    right = body.cliff_right_signal,
                    "landing pad under the bumper"
                );
                outcome = MotionOutcome::HeuristicLanding;
                break;
            }
            sum_mm += u32::from(body.distance_mm.unsigned_abs());
            hw.delay_ms(self.config.drive_poll_ms);
        }
        hw.stop();

        self.end(match outcome {
            MotionOutcome::Success => MotionState::Completed,
            other => MotionState::Tripped(other),
        });
        outcome
    }

    /// Back up `distance_cm` without looking at any trip sensor. Always
    /// succeeds once the distance is covered.
    pub fn reverse<H>(&mut self, hw: &mut H, distance_cm: u16) -> MotionOutcome
    where
        H: HardwareSensors + ActuatorControl + DelayNs,
    {
        let target_mm = u32::from(distance_cm) * 10;
        let speed = self.config.drive_speed;
        self.begin();
        hw.set_wheels(-speed, -speed);

        let mut sum_mm: u32 = 0;
        while sum_mm < target_mm {
            sum_mm += u32::from(hw.body().distance_mm.unsigned_abs());
            hw.delay_ms(self.config.drive_poll_ms);
        }
        hw.stop();

        self.end(MotionState::Completed);
        MotionOutcome::Success
    }

    /// Turn in place until `degrees` of rotation have been measured.
    pub fn rotate<H>(&mut self, hw: &mut H, degrees: u16, direction: Rotation)
    where
        H: HardwareSensors + ActuatorControl + DelayNs,
    {
        let speed = self.config.rotate_speed * direction.sign();
        self.begin();
        hw.set_wheels(speed, -speed);

        let mut sum: u32 = 0;
        while sum < u32::from(degrees) {
            sum += u32::from(hw.body().angle_deg.unsigned_abs());
            hw.delay_ms(self.config.rotate_poll_ms);
        }
        hw.stop();

        self.end(MotionState::Completed);
    }

    fn begin(&mut self) {
        self.state = MotionState::Moving;
    }

    fn end(&mut self, terminal: MotionState) {
        debug!(?terminal, "motion finished");
        self.last = Some(terminal);
        self.state = MotionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::Song;
    use rover_proto::TripReason;

    /// Reports a fixed odometry step per poll and raises a flag once the
    /// travelled distance reaches a threshold.
    #[derive(Default)]
    struct Track {
        step_mm: i16,
        step_deg: i16,
        travelled_mm: u32,
        trip: Option<(TripReason, u32)>,
        // raised together with `trip`
        also_trip: Option<TripReason>,
        pad_after_mm: Option<u32>,
        wheels: Vec<(i16, i16)>,
        stops: usize,
        polls: usize,
    }

    impl HardwareSensors for Track {
        fn sonar_cm(&mut self) -> u16 {
            300
        }
        fn ir_cm(&mut self) -> u16 {
            300
        }
        fn body(&mut self) -> BodySensors {
            self.polls += 1;
            self.travelled_mm += u32::from(self.step_mm.unsigned_abs());
            let mut body = BodySensors { distance_mm: self.step_mm, angle_deg: self.step_deg, ..Default::default() };
            if let Some((reason, at)) = self.trip {
                if self.travelled_mm >= at {
                    body.set_flag(reason, true);
                    if let Some(also) = self.also_trip {
                        body.set_flag(also, true);
                    }
                }
            }
            if self.pad_after_mm.is_some_and(|at| self.travelled_mm >= at) {
                body.cliff_left_signal = 900;
                body.cliff_front_left_signal = 900;
                body.cliff_front_right_signal = 900;
                body.cliff_right_signal = 900;
            }
            body
        }
    }

    impl ActuatorControl for Track {
        fn set_wheels(&mut self, left: i16, right: i16) {
            self.wheels.push((left, right));
        }
        fn stop(&mut self) {
            self.stops += 1;
            self.set_wheels(0, 0);
        }
        fn set_servo(&mut self, _: u8) {}
        fn play_song(&mut self, _: &Song) {}
    }

    impl DelayNs for Track {
        fn delay_ns(&mut self, _: u32) {}
    }

    fn bumper_at_40cm() -> Track {
        Track { step_mm: 10, trip: Some((TripReason::BumperLeft, 400)), ..Default::default() }
    }

    #[test]
    fn forward_trips_and_stops_once() {
        let mut hw = bumper_at_40cm();
        let mut mc = MotionController::default();
        let outcome = mc.forward(&mut hw, 100);
        assert_eq!(outcome, MotionOutcome::SensorTrip(TripReason::BumperLeft));
        assert_eq!(hw.stops, 1);
        assert_eq!(hw.polls, 40);
        assert_eq!(hw.wheels, vec![(200, 200), (0, 0)]);
        assert_eq!(mc.state(), MotionState::Idle);
        assert_eq!(mc.last_terminal(), Some(MotionState::Tripped(outcome)));
    }

    #[test]
    fn reverse_ignores_the_same_trip() {
        let mut hw = bumper_at_40cm();
        let mut mc = MotionController::default();
        assert_eq!(mc.reverse(&mut hw, 100), MotionOutcome::Success);
        assert_eq!(hw.travelled_mm, 1000);
        assert_eq!(hw.stops, 1);
        assert_eq!(hw.wheels[0], (-200, -200));
        assert_eq!(mc.last_terminal(), Some(MotionState::Completed));
    }

    #[test]
    fn forward_completes_without_trips() {
        let mut hw = Track { step_mm: 7, ..Default::default() };
        let outcome = MotionController::default().forward(&mut hw, 10);
        assert_eq!(outcome, MotionOutcome::Success);
        // 15 polls of 7 mm cover 100 mm
        assert_eq!(hw.polls, 15);
        assert_eq!(hw.stops, 1);
    }

    #[test]
    fn lowest_code_wins_when_several_trip() {
        let mut hw = Track {
            step_mm: 10,
            trip: Some((TripReason::VirtualWall, 0)),
            also_trip: Some(TripReason::BumperRight),
            ..Default::default()
        };
        assert_eq!(MotionController::default().forward(&mut hw, 50), MotionOutcome::SensorTrip(TripReason::BumperRight));
        assert_eq!(hw.stops, 1);

        // trip flags are checked before the pad heuristic
        let mut hw = Track {
            step_mm: 10,
            trip: Some((TripReason::WheeldropCaster, 100)),
            pad_after_mm: Some(100),
            ..Default::default()
        };
        assert_eq!(
            MotionController::default().forward(&mut hw, 50),
            MotionOutcome::SensorTrip(TripReason::WheeldropCaster)
        );
    }

    #[test]
    fn landing_pad_reports_255() {
        let mut hw = Track { step_mm: 10, pad_after_mm: Some(200), ..Default::default() };
        let outcome = MotionController::default().forward(&mut hw, 100);
        assert_eq!(outcome, MotionOutcome::HeuristicLanding);
        assert_eq!(outcome.code(), 255);
        assert_eq!(hw.stops, 1);
    }

    #[test]
    fn pad_needs_all_four_signals() {
        let cal = CliffCalibration::default();
        let mut body = BodySensors {
            cliff_left_signal: 401,
            cliff_front_left_signal: 501,
            cliff_front_right_signal: 601,
            cliff_right_signal: 601,
            ..Default::default()
        };
        assert!(cal.on_pad(&body));
        body.cliff_right_signal = 600;
        assert!(!cal.on_pad(&body));
    }

    #[test]
    fn zero_distance_still_stops() {
        let mut hw = Track { step_mm: 10, ..Default::default() };
        assert_eq!(MotionController::default().forward(&mut hw, 0), MotionOutcome::Success);
        assert_eq!(hw.polls, 0);
        assert_eq!(hw.stops, 1);
    }

    #[test]
    fn rotation_direction_is_normalised() {
        let mut hw = Track { step_deg: 3, ..Default::default() };
        let mut mc = MotionController::default();
        mc.rotate(&mut hw, 90, Rotation::from_sign(7));
        assert_eq!(hw.polls, 30);
        assert_eq!(hw.wheels, vec![(150, -150), (0, 0)]);

        let mut hw = Track { step_deg: -3, ..Default::default() };
        mc.rotate(&mut hw, 90, Rotation::from_sign(-2));
        assert_eq!(hw.polls, 30);
        assert_eq!(hw.wheels[0], (-150, 150));
        assert_eq!(Rotation::from_sign(0), Rotation::CounterClockwise);
    }
}

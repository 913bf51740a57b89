//! Hardware seams. Register setup, interrupts and edge capture live behind these
//! traits; everything above them is plain blocking code.

use rover_proto::TripReason;
use thiserror::Error;

use crate::song::Song;

/// Ranging and body sensors. All calls block until a value is available.
pub trait HardwareSensors {
    /// One sonar ping, in centimetres.
    fn sonar_cm(&mut self) -> u16;

    /// One IR reading, in centimetres.
    fn ir_cm(&mut self) -> u16;

    /// Refresh the body sensor block. Odometry fields hold the motion since
    /// the previous call.
    fn body(&mut self) -> BodySensors;
}

pub trait ActuatorControl {
    /// Wheel velocities in mm/s.
    fn set_wheels(&mut self, left: i16, right: i16);

    fn stop(&mut self) {
        self.set_wheels(0, 0);
    }

    fn set_servo(&mut self, degree: u8);

    fn play_song(&mut self, song: &Song);
}

/// Rover end of the serial link.
pub trait SerialLink {
    fn read_byte(&mut self) -> Result<u8, LinkError>;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError>;
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("serial link closed")]
    Closed,

    #[error("serial I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BodySensors {
    pub bumper_left: bool,
    pub bumper_right: bool,
    pub cliff_left: bool,
    pub cliff_right: bool,
    pub cliff_front_left: bool,
    pub cliff_front_right: bool,
    pub wheeldrop_left: bool,
    pub wheeldrop_right: bool,
    pub wheeldrop_caster: bool,
    pub virtual_wall: bool,

    // raw cliff reflectance
    pub cliff_left_signal: u16,
    pub cliff_front_left_signal: u16,
    pub cliff_front_right_signal: u16,
    pub cliff_right_signal: u16,

    /// Millimetres travelled since the last refresh.
    pub distance_mm: i16,
    /// Degrees turned since the last refresh.
    pub angle_deg: i16,
}

impl BodySensors {
    pub fn flag(&self, reason: TripReason) -> bool {
        match reason {
            TripReason::BumperLeft => self.bumper_left,
            TripReason::BumperRight => self.bumper_right,
            TripReason::CliffLeft => self.cliff_left,
            TripReason::CliffRight => self.cliff_right,
            TripReason::CliffFrontLeft => self.cliff_front_left,
            TripReason::CliffFrontRight => self.cliff_front_right,
            TripReason::WheeldropLeft => self.wheeldrop_left,
            TripReason::WheeldropRight => self.wheeldrop_right,
            TripReason::WheeldropCaster => self.wheeldrop_caster,
            TripReason::VirtualWall => self.virtual_wall,
        }
    }

    pub fn set_flag(&mut self, reason: TripReason, value: bool) {
        let slot = match reason {
            TripReason::BumperLeft => &mut self.bumper_left,
            TripReason::BumperRight => &mut self.bumper_right,
            TripReason::CliffLeft => &mut self.cliff_left,
            TripReason::CliffRight => &mut self.cliff_right,
            TripReason::CliffFrontLeft => &mut self.cliff_front_left,
            TripReason::CliffFrontRight => &mut self.cliff_front_right,
            TripReason::WheeldropLeft => &mut self.wheeldrop_left,
            TripReason::WheeldropRight => &mut self.wheeldrop_right,
            TripReason::WheeldropCaster => &mut self.wheeldrop_caster,
            TripReason::VirtualWall => &mut self.virtual_wall,
        };
        *slot = value;
    }

    /// Highest-priority raised trip flag.
    pub fn first_trip(&self) -> Option<TripReason> {
        TripReason::PRIORITY.iter().copied().find(|r| self.flag(*r))
    }
}

/// Sonar echo width (timer ticks at 15.625 kHz) to centimetres.
pub fn sonar_ticks_to_cm(ticks: u32) -> u16 {
    (ticks * 34 / 32).min(u32::from(u16::MAX)) as u16
}

// (adc, cm) breakpoints of the IR ranger, strongest signal first
const IR_CURVE: [(f32, f32); 6] =
    [(1000.0, 10.0), (710.0, 15.0), (500.0, 20.0), (290.0, 40.0), (220.0, 60.0), (180.0, 80.0)];

/// 10-bit IR ADC value to centimetres, piecewise linear.
pub fn ir_adc_to_cm(adc: u16) -> u16 {
    let x = adc as f32;
    let seg = IR_CURVE
        .windows(2)
        .find(|w| x > w[1].0)
        .unwrap_or(&IR_CURVE[IR_CURVE.len() - 2..]);
    let ((x1, y1), (x2, y2)) = (seg[0], seg[1]);
    let slope = (y2 - y1) / (x2 - x1);
    let cm = y1 + slope * (x - x1);
    cm.clamp(0.0, f32::from(u16::MAX)) as u16
}

/// Servo compare value for a pulse that points the servo at `degree`.
pub fn servo_compare(degree: u8) -> u16 {
    (f32::from(degree) * 19.7 + 800.0) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_priority() {
        let mut body = BodySensors::default();
        assert_eq!(body.first_trip(), None);
        body.virtual_wall = true;
        body.cliff_front_left = true;
        assert_eq!(body.first_trip(), Some(TripReason::CliffFrontLeft));
        body.set_flag(TripReason::BumperRight, true);
        assert_eq!(body.first_trip(), Some(TripReason::BumperRight));
    }

    #[test]
    fn sonar_conversion() {
        assert_eq!(sonar_ticks_to_cm(0), 0);
        assert_eq!(sonar_ticks_to_cm(32), 34);
        assert_eq!(sonar_ticks_to_cm(100), 106);
    }

    #[test]
    fn ir_curve_hits_breakpoints() {
        assert_eq!(ir_adc_to_cm(1000), 10);
        assert_eq!(ir_adc_to_cm(500), 20);
        assert_eq!(ir_adc_to_cm(290), 40);
        assert_eq!(ir_adc_to_cm(220), 60);
        assert_eq!(ir_adc_to_cm(180), 80);
        // beyond the last breakpoint the final segment is extrapolated
        assert_eq!(ir_adc_to_cm(160), 90);
    }

    #[test]
    fn servo_pulse() {
        assert_eq!(servo_compare(0), 800);
        assert_eq!(servo_compare(90), 2573);
    }
}

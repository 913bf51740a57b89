use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Sensor conditions that abort a forward move, in the order the rover checks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum TripReason {
    BumperLeft = 1,
    BumperRight = 2,
    CliffLeft = 3,
    CliffRight = 4,
    CliffFrontLeft = 5,
    CliffFrontRight = 6,
    WheeldropLeft = 7,
    WheeldropRight = 8,
    WheeldropCaster = 9,
    VirtualWall = 10,
}

impl TripReason {
    pub const PRIORITY: [TripReason; 10] = [
        TripReason::BumperLeft,
        TripReason::BumperRight,
        TripReason::CliffLeft,
        TripReason::CliffRight,
        TripReason::CliffFrontLeft,
        TripReason::CliffFrontRight,
        TripReason::WheeldropLeft,
        TripReason::WheeldropRight,
        TripReason::WheeldropCaster,
        TripReason::VirtualWall,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::PRIORITY.iter().copied().find(|r| r.code() == code)
    }

    /// Operator-facing label.
    pub fn label(self) -> &'static str {
        match self {
            TripReason::BumperLeft => "LEFT BUMPER",
            TripReason::BumperRight => "RIGHT BUMPER",
            TripReason::CliffLeft => "LEFT CLIFF",
            TripReason::CliffRight => "RIGHT CLIFF",
            TripReason::CliffFrontLeft => "FRONT LEFT CLIFF",
            TripReason::CliffFrontRight => "FRONT RIGHT CLIFF",
            TripReason::WheeldropLeft => "LEFT WHEEL DROP",
            TripReason::WheeldropRight => "RIGHT WHEEL DROP",
            TripReason::WheeldropCaster => "CASTER DROP",
            TripReason::VirtualWall => "IR WALL",
        }
    }
}

/// Result of one movement command, carried back as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionOutcome {
    Success,
    SensorTrip(TripReason),
    /// All four cliff signals read high at once: most likely the marked landing pad.
    HeuristicLanding,
}

impl MotionOutcome {
    pub const LANDING_CODE: u8 = 255;

    pub fn code(self) -> u8 {
        match self {
            MotionOutcome::Success => 0,
            MotionOutcome::SensorTrip(r) => r.code(),
            MotionOutcome::HeuristicLanding => Self::LANDING_CODE,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, ProtoError> {
        match code {
            0 => Ok(MotionOutcome::Success),
            Self::LANDING_CODE => Ok(MotionOutcome::HeuristicLanding),
            c => TripReason::from_code(c)
                .map(MotionOutcome::SensorTrip)
                .ok_or(ProtoError::UnknownResponseCode(c)),
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, MotionOutcome::Success)
    }

    pub fn label(self) -> &'static str {
        match self {
            MotionOutcome::Success => "COMMAND COMPLETE",
            MotionOutcome::SensorTrip(r) => r.label(),
            MotionOutcome::HeuristicLanding => "TARGET REACHED",
        }
    }
}

impl fmt::Display for TripReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for MotionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

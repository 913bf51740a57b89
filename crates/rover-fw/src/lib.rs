//! Rover-side control: sweep scanning, object segmentation, trip-aware motion
//! and the serial command loop, all written against the traits in [`hal`].

pub mod dispatch;
pub mod hal;
pub mod motion;
pub mod scanner;
pub mod segment;
pub mod sim;
pub mod song;

use serde::Deserialize;

pub use dispatch::{read_line, Rover};
pub use hal::{ActuatorControl, BodySensors, HardwareSensors, LinkError, SerialLink};
pub use motion::{CliffCalibration, MotionConfig, MotionController, MotionState, Rotation};
pub use scanner::{Reading, SampleSource, ScanTiming, Scanner, SensorSample};
pub use segment::{ObjectSegmenter, Segmentation};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FwConfig {
    /// Drive speeds, poll periods and the landing pad calibration.
    pub motion: MotionConfig,

    /// Servo settle times used by every sweep.
    pub scan: ScanTiming,
}

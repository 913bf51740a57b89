//! Ground console: serial link to the rover, operator command routing, scan
//! reception and the operator's history.

pub mod doctor;
pub mod error;
pub mod history;
pub mod link;
pub mod receive;
pub mod router;
pub mod timer;

use std::time::Duration;

use serde::Deserialize;

pub use error::ConsoleError;
pub use history::{EntryKind, HistoryConfig, HistoryEntry, HistoryLog};
pub use link::RoverLink;
pub use receive::{ReceiveTimeouts, ScanCapture, ScanEnd};
pub use router::{CommandRouter, Connector, LinkState, OperatorCommand, Response, ScanReport, SerialConnector};
pub use timer::MissionTimer;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial device of the rover's radio.
    pub device: String,
    pub baud: u32,

    /// Wait for the `a` reply to a handshake.
    #[serde(rename = "handshake_timeout_ms", with = "receive::millis")]
    pub handshake_timeout: Duration,

    /// Wait for the outcome byte of a forward or reverse move.
    #[serde(rename = "response_timeout_ms", with = "receive::millis")]
    pub response_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud: 57_600,
            handshake_timeout: Duration::from_secs(2),
            response_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    #[serde(flatten)]
    pub timeouts: ReceiveTimeouts,

    /// Averages per degree when `scan` is typed without an argument.
    pub default_averages: u8,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { timeouts: ReceiveTimeouts::default(), default_averages: 1 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub link: LinkConfig,
    pub scan: ScanConfig,
    pub history: HistoryConfig,
}

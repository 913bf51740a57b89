use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

pub const MISSION_LENGTH: Duration = Duration::from_secs(15 * 60);

/// Countdown started by the operator's `start` command.
#[derive(Debug, Clone)]
pub struct MissionTimer {
    started: Option<Instant>,
    length: Duration,
}

impl Default for MissionTimer {
    fn default() -> Self {
        Self::new(MISSION_LENGTH)
    }
}

impl MissionTimer {
    pub fn new(length: Duration) -> Self {
        Self { started: None, length }
    }

    /// Start, or restart, the countdown.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// `None` before `start`.
    pub fn remaining(&self) -> Option<Duration> {
        self.started.map(|t| self.length.saturating_sub(t.elapsed()))
    }

    pub fn is_up(&self) -> bool {
        self.remaining() == Some(Duration::ZERO)
    }
}

impl fmt::Display for MissionTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.remaining() {
            None => f.write_str("--:--"),
            Some(left) if left.is_zero() => f.write_str("TIME'S UP"),
            Some(left) => {
                let s = left.as_secs();
                write!(f, "{:02}:{:02}", s / 60, s % 60)
            }
        }
    }
}

//! The rover's command loop: read a line, beep, act, answer.

use embedded_hal::delay::DelayNs;
use rover_proto::{encode_scan, MoveDirection, MotionOutcome, ScanMode, WireMessage, HANDSHAKE_ACK, LINE_END};
use tracing::{debug, info, warn};

use crate::hal::{ActuatorControl, HardwareSensors, LinkError, SerialLink};
use crate::motion::{MotionController, Rotation};
use crate::scanner::Scanner;
use crate::segment::ObjectSegmenter;
use crate::song;
use crate::FwConfig;

/// Longest command line the rover buffers.
pub const MAX_LINE: usize = 10;

/// Read up to and including `\r`, or until [`MAX_LINE`] bytes have arrived.
pub fn read_line<L: SerialLink>(link: &mut L) -> Result<Vec<u8>, LinkError> {
    let mut line = Vec::with_capacity(MAX_LINE);
    while line.len() < MAX_LINE {
        let b = link.read_byte()?;
        line.push(b);
        if b == LINE_END {
            break;
        }
    }
    Ok(line)
}

pub struct Rover<H, L> {
    hw: H,
    link: L,
    scanner: Scanner,
    motion: MotionController,
}

impl<H, L> Rover<H, L>
where
    H: HardwareSensors + ActuatorControl + DelayNs,
    L: SerialLink,
{
    pub fn new(hw: H, link: L, config: FwConfig) -> Self {
        Self {
            hw,
            link,
            scanner: Scanner::new(config.scan),
            motion: MotionController::new(config.motion),
        }
    }

    pub fn into_parts(self) -> (H, L) {
        (self.hw, self.link)
    }

    /// Serve commands until the link closes.
    pub fn run(&mut self) -> Result<(), LinkError> {
        self.hw.play_song(&song::BEEP);
        info!("rover ready");
        loop {
            match self.serve_one() {
                Ok(()) => {}
                Err(LinkError::Closed) => {
                    info!("link closed, rover idle");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Handle exactly one command line.
    pub fn serve_one(&mut self) -> Result<(), LinkError> {
        let line = read_line(&mut self.link)?;
        self.hw.play_song(&song::BEEP);

        let msg = match WireMessage::parse_command(&line) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(line = %String::from_utf8_lossy(&line).escape_debug(), "ignoring command: {}", e);
                return Ok(());
            }
        };
        debug!(?msg, "command");

        match msg {
            WireMessage::Handshake => {
                self.link.write_all(&[HANDSHAKE_ACK])?;
                info!("console connected");
            }
            WireMessage::Move { direction, magnitude } => self.drive(direction, magnitude)?,
            WireMessage::ScanRequest { mode, averages } => {
                self.scan(mode, averages)?;
                self.hw.play_song(&song::BEEP);
            }
            WireMessage::Tone => self.hw.play_song(&song::COMPLETION),
            other => warn!(?other, "not a command"),
        }
        Ok(())
    }

    fn drive(&mut self, direction: MoveDirection, magnitude: u16) -> Result<(), LinkError> {
        let outcome = match direction {
            MoveDirection::Forward => self.motion.forward(&mut self.hw, magnitude),
            MoveDirection::Reverse => self.motion.reverse(&mut self.hw, magnitude),
            MoveDirection::RotateRight => {
                info!(degrees = magnitude, "rotate right");
                self.motion.rotate(&mut self.hw, magnitude, Rotation::Clockwise);
                return Ok(());
            }
            MoveDirection::RotateLeft => {
                info!(degrees = magnitude, "rotate left");
                self.motion.rotate(&mut self.hw, magnitude, Rotation::CounterClockwise);
                return Ok(());
            }
        };
        info!(?direction, cm = magnitude, %outcome, "move finished");
        self.link.write_all(&[outcome.code()])?;
        if outcome != MotionOutcome::Success {
            warn!(code = outcome.code(), "error #{}", outcome.code());
            self.hw.play_song(&song::ERROR);
        }
        Ok(())
    }

    fn scan(&mut self, mode: ScanMode, averages: u8) -> Result<(), LinkError> {
        info!(?mode, averages, "scanning");
        let samples = self.scanner.sweep(&mut self.hw, mode, averages);
        let seg = ObjectSegmenter::for_mode(mode).segment(&samples);
        if let Some(e) = &seg.overflow {
            warn!("scan truncated: {}", e);
        }
        debug!(objects = seg.objects.len(), discarded = seg.discarded, "segmented");
        self.link.write_all(&encode_scan(&seg.objects))
    }
}

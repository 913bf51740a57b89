//! Console/rover messages and their fixed-width ASCII framing.
//!
//! Commands are a tag byte, an optional fixed-width decimal argument and `\r`.
//! Rover replies are either a single raw byte (movement) or a record stream
//! closed by [`SCAN_END`](crate::record::SCAN_END).

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;
use crate::object::DetectedObject;
use crate::outcome::MotionOutcome;
use crate::record;

pub const HANDSHAKE_ACK: u8 = b'a';
pub const LINE_END: u8 = b'\r';

/// Largest value a three-digit argument can carry.
pub const MAX_MAGNITUDE: u16 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDirection {
    Forward,
    Reverse,
    RotateRight,
    RotateLeft,
}

impl MoveDirection {
    pub fn tag(self) -> u8 {
        match self {
            MoveDirection::Forward => b'f',
            MoveDirection::Reverse => b'b',
            MoveDirection::RotateRight => b'r',
            MoveDirection::RotateLeft => b'l',
        }
    }

    /// Forward and reverse answer with one outcome byte; rotations answer nothing.
    pub fn has_response(self) -> bool {
        matches!(self, MoveDirection::Forward | MoveDirection::Reverse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Sonar and IR, averaged per degree.
    Full,
    /// IR only, one reading per degree.
    Fast,
}

impl ScanMode {
    pub fn tag(self) -> u8 {
        match self {
            ScanMode::Full => b's',
            ScanMode::Fast => b'i',
        }
    }
}

/// What the console has to wait for after sending a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    Nothing,
    SingleByte,
    RecordStream,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessage {
    Handshake,
    Move { direction: MoveDirection, magnitude: u16 },
    ScanRequest { mode: ScanMode, averages: u8 },
    Tone,
    ObjectRecord(DetectedObject),
    ScanEnd,
    MoveResponse(MotionOutcome),
}

impl WireMessage {
    pub fn forward(cm: u16) -> Self {
        WireMessage::Move { direction: MoveDirection::Forward, magnitude: cm }
    }

    pub fn reverse(cm: u16) -> Self {
        WireMessage::Move { direction: MoveDirection::Reverse, magnitude: cm }
    }

    pub fn left(deg: u16) -> Self {
        WireMessage::Move { direction: MoveDirection::RotateLeft, magnitude: deg }
    }

    pub fn right(deg: u16) -> Self {
        WireMessage::Move { direction: MoveDirection::RotateRight, magnitude: deg }
    }

    pub fn response_shape(&self) -> ResponseShape {
        match self {
            WireMessage::Handshake => ResponseShape::SingleByte,
            WireMessage::Move { direction, .. } if direction.has_response() => ResponseShape::SingleByte,
            WireMessage::ScanRequest { .. } => ResponseShape::RecordStream,
            _ => ResponseShape::Nothing,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), ProtoError> {
        match self {
            WireMessage::Handshake => out.extend_from_slice(&[HANDSHAKE_ACK, LINE_END]),
            WireMessage::Move { direction, magnitude } => {
                if *magnitude > MAX_MAGNITUDE {
                    return Err(ProtoError::MagnitudeOutOfRange(*magnitude));
                }
                out.extend_from_slice(format!("{}{:03}", direction.tag() as char, magnitude).as_bytes());
                out.push(LINE_END);
            }
            WireMessage::ScanRequest { mode, averages } => {
                if *averages > 9 {
                    return Err(ProtoError::AveragesOutOfRange(*averages));
                }
                out.extend_from_slice(&[mode.tag(), b'0' + averages, LINE_END]);
            }
            WireMessage::Tone => out.extend_from_slice(&[b'm', LINE_END]),
            WireMessage::ObjectRecord(obj) => record::encode_record(obj, out),
            WireMessage::ScanEnd => out.push(record::SCAN_END),
            WireMessage::MoveResponse(outcome) => out.push(outcome.code()),
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtoError> {
        let mut out = Vec::with_capacity(8);
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Parse a console command line as received by the rover (`\r` optional).
    pub fn parse_command(line: &[u8]) -> Result<Self, ProtoError> {
        let line = match line.iter().position(|&b| b == LINE_END) {
            Some(end) => &line[..end],
            None => line,
        };
        let (&tag, arg) = line.split_first().ok_or(ProtoError::EmptyCommand)?;
        let direction = match tag {
            b'a' => return Ok(WireMessage::Handshake),
            b'm' => return Ok(WireMessage::Tone),
            b's' => {
                return Ok(WireMessage::ScanRequest { mode: ScanMode::Full, averages: parse_averages(arg)? });
            }
            b'i' => {
                // argument is sent but carries no meaning
                return Ok(WireMessage::ScanRequest { mode: ScanMode::Fast, averages: 1 });
            }
            b'f' => MoveDirection::Forward,
            b'b' => MoveDirection::Reverse,
            b'r' => MoveDirection::RotateRight,
            b'l' => MoveDirection::RotateLeft,
            other => return Err(ProtoError::UnknownTag(other as char)),
        };
        Ok(WireMessage::Move { direction, magnitude: parse_magnitude(arg)? })
    }
}

fn parse_magnitude(arg: &[u8]) -> Result<u16, ProtoError> {
    let digits = arg.get(..3).filter(|d| d.iter().all(u8::is_ascii_digit));
    match digits {
        Some(d) => Ok(d.iter().fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'))),
        None => Err(ProtoError::BadArgument(String::from_utf8_lossy(arg).into_owned())),
    }
}

// A missing digit reads as zero; the scanner clamps that to one reading.
fn parse_averages(arg: &[u8]) -> Result<u8, ProtoError> {
    match arg.first() {
        None => Ok(0),
        Some(b) if b.is_ascii_digit() => Ok(b - b'0'),
        Some(_) => Err(ProtoError::BadArgument(String::from_utf8_lossy(arg).into_owned())),
    }
}

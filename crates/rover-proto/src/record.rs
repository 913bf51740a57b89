//! Object-record stream: `o<id>d<distance>s<start>e<end>q ... z`.
//!
//! There are no length prefixes. A digit run belongs to the tag that came
//! *before* it and is only interpreted when the *next* tag shows up, so the
//! decoder keeps the opening tag as an explicit pending field.

use std::fmt;

use thiserror::Error;
use tracing::warn;

use crate::error::{CapacityExceeded, ProtoError};
use crate::object::{DetectedObject, ScanResult};

/// Ends a record stream; sent even when no record precedes it.
pub const SCAN_END: u8 = b'z';

// Longest digit run we hold on to before declaring the field damaged.
const MAX_FIELD_LEN: usize = 8;

pub fn encode_record(obj: &DetectedObject, out: &mut Vec<u8>) {
    out.extend_from_slice(
        format!("o{}d{}s{}e{}q", obj.id, obj.distance_cm, obj.start_angle, obj.end_angle).as_bytes(),
    );
}

/// All records followed by the end byte.
pub fn encode_scan<'a>(objects: impl IntoIterator<Item = &'a DetectedObject>) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    for obj in objects {
        encode_record(obj, &mut out);
    }
    out.push(SCAN_END);
    out
}

/// Record field, named after the tag that opens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Distance,
    Start,
    End,
}

impl Field {
    /// Tag that must follow this field's digits.
    fn closing_tag(self) -> u8 {
        match self {
            Field::Id => b'd',
            Field::Distance => b's',
            Field::Start => b'e',
            Field::End => b'q',
        }
    }

    fn next(self) -> Option<Field> {
        match self {
            Field::Id => Some(Field::Distance),
            Field::Distance => Some(Field::Start),
            Field::Start => Some(Field::End),
            Field::End => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Id => "id",
            Field::Distance => "distance",
            Field::Start => "start angle",
            Field::End => "end angle",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("tag {found:?} arrived where {expected:?} was expected")]
    UnexpectedTag { found: char, expected: char },

    #[error("{field} field holds {text:?}, not a number in range")]
    BadField { field: Field, text: String },

    #[error("byte {0:#04x} outside any record")]
    StrayByte(u8),

    #[error("record broke off while reading {0}")]
    Truncated(Field),

    #[error("record describes an impossible object: {0}")]
    InvalidObject(ProtoError),

    #[error(transparent)]
    Capacity(CapacityExceeded),
}

fn is_tag(b: u8) -> bool {
    matches!(b, b'o' | b'd' | b's' | b'e' | b'q')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between records, expecting `o`.
    Idle,
    /// Collecting digits for the field opened by the previous tag.
    Pending(Field),
    /// Damaged record: skip everything up to the next `o`.
    Resync,
}

#[derive(Debug, Default, Clone, Copy)]
struct Partial {
    id: u8,
    distance_cm: u16,
    start_angle: u8,
}

/// Outcome of decoding one buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    pub objects: ScanResult,
    pub errors: Vec<FrameError>,
    /// The end byte was seen.
    pub terminated: bool,
}

impl Decoded {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug)]
pub struct RecordDecoder {
    state: State,
    digits: Vec<u8>,
    partial: Partial,
    out: Decoded,
}

impl Default for RecordDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            digits: Vec::with_capacity(MAX_FIELD_LEN),
            partial: Partial::default(),
            out: Decoded::default(),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.out.terminated
    }

    pub fn push(&mut self, byte: u8) {
        if self.out.terminated {
            return;
        }
        if byte == SCAN_END {
            if let State::Pending(field) = self.state {
                self.fail(FrameError::Truncated(field));
            }
            self.out.terminated = true;
            return;
        }

        match self.state {
            State::Idle => {
                if byte == b'o' {
                    self.open_record();
                } else if is_tag(byte) {
                    self.fail(FrameError::UnexpectedTag { found: byte as char, expected: 'o' });
                } else {
                    self.fail(FrameError::StrayByte(byte));
                }
            }
            State::Resync => {
                if byte == b'o' {
                    self.open_record();
                }
            }
            State::Pending(field) if byte == field.closing_tag() => self.close_field(field),
            State::Pending(field) if byte == b'o' => {
                self.fail(FrameError::Truncated(field));
                self.open_record();
            }
            State::Pending(field) if is_tag(byte) => {
                self.fail(FrameError::UnexpectedTag {
                    found: byte as char,
                    expected: field.closing_tag() as char,
                });
            }
            State::Pending(field) => {
                // Non-digits are kept so the field fails to parse when it closes.
                if self.digits.len() >= MAX_FIELD_LEN {
                    let text = String::from_utf8_lossy(&self.digits).into_owned();
                    self.fail(FrameError::BadField { field, text });
                } else {
                    self.digits.push(byte);
                }
            }
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
            if self.out.terminated {
                break;
            }
        }
    }

    /// Close out the stream; an unfinished record counts as truncated.
    pub fn finish(mut self) -> Decoded {
        if !self.out.terminated {
            if let State::Pending(field) = self.state {
                self.fail(FrameError::Truncated(field));
            }
        }
        self.out
    }

    fn open_record(&mut self) {
        self.digits.clear();
        self.partial = Partial::default();
        self.state = State::Pending(Field::Id);
    }

    fn close_field(&mut self, field: Field) {
        let parsed = parse_digits(&self.digits);
        let text = String::from_utf8_lossy(&self.digits).into_owned();
        self.digits.clear();

        let bad = || FrameError::BadField { field, text: text.clone() };
        let Some(value) = parsed else {
            self.fail(bad());
            return;
        };

        match field {
            Field::Id => match u8::try_from(value) {
                Ok(v) => self.partial.id = v,
                Err(_) => return self.fail(bad()),
            },
            Field::Distance => match u16::try_from(value) {
                Ok(v) => self.partial.distance_cm = v,
                Err(_) => return self.fail(bad()),
            },
            Field::Start => match u8::try_from(value) {
                Ok(v) => self.partial.start_angle = v,
                Err(_) => return self.fail(bad()),
            },
            Field::End => {
                let end = match u8::try_from(value) {
                    Ok(v) => v,
                    Err(_) => return self.fail(bad()),
                };
                let p = self.partial;
                match DetectedObject::new(p.id, p.start_angle, end, p.distance_cm) {
                    Ok(obj) => {
                        if let Err(e) = self.out.objects.try_push(obj) {
                            warn!(id = obj.id, "dropping record: {}", e);
                            self.out.errors.push(FrameError::Capacity(e));
                        }
                    }
                    Err(e) => {
                        warn!("dropping record: {}", e);
                        self.out.errors.push(FrameError::InvalidObject(e));
                    }
                }
            }
        }

        self.state = match field.next() {
            Some(next) => State::Pending(next),
            None => State::Idle,
        };
    }

    fn fail(&mut self, err: FrameError) {
        warn!("malformed record stream: {}", err);
        self.out.errors.push(err);
        self.digits.clear();
        self.state = State::Resync;
    }
}

fn parse_digits(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Decode a complete receive buffer.
pub fn decode(bytes: &[u8]) -> Decoded {
    let mut dec = RecordDecoder::new();
    dec.extend(bytes);
    dec.finish()
}

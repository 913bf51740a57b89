//! Wire vocabulary shared by the rover firmware and the ground console.
//!
//! Everything in here is pure data plus byte codecs; no I/O happens in this crate.

pub mod error;
pub mod message;
pub mod object;
pub mod outcome;
pub mod record;

pub use error::{CapacityExceeded, ProtoError};
pub use message::{MoveDirection, ResponseShape, ScanMode, WireMessage, HANDSHAKE_ACK, LINE_END, MAX_MAGNITUDE};
pub use object::{DetectedObject, ScanResult, SCAN_CAPACITY};
pub use outcome::{MotionOutcome, TripReason};
pub use record::{decode, encode_scan, Decoded, Field, FrameError, RecordDecoder, SCAN_END};

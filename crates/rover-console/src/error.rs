use std::io;
use std::time::Duration;

use rover_proto::{CapacityExceeded, ProtoError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The link could not be opened at all.
    #[error("cannot open link to {target}: {source}")]
    Transport {
        target: String,
        #[source]
        source: io::Error,
    },

    /// The link is open but the rover did not answer the handshake with `a`.
    /// The link stays usable.
    #[error("rover did not acknowledge the handshake (got {got:?})")]
    Handshake { got: Option<u8> },

    #[error("not connected, use `connect` first")]
    NotConnected,

    #[error("no response from rover within {0:?}")]
    ResponseTimeout(Duration),

    #[error("rover closed the link")]
    LinkClosed,

    #[error("unknown command {0:?}, try `help`")]
    UnknownCommand(String),

    #[error("{command}: {reason}")]
    Usage { command: &'static str, reason: String },

    #[error("no scan stored at history entry {0}")]
    NoSuchEntry(usize),

    #[error(transparent)]
    Capacity(#[from] CapacityExceeded),

    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error("serial I/O: {0}")]
    Io(#[from] io::Error),
}

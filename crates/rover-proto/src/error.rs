use thiserror::Error;

/// A fixed-capacity store refused an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{what} capacity of {capacity} exceeded")]
pub struct CapacityExceeded {
    pub what: &'static str,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    #[error("magnitude {0} does not fit in three digits")]
    MagnitudeOutOfRange(u16),

    #[error("scan averages {0} outside 0..=9")]
    AveragesOutOfRange(u8),

    #[error("angle {0} outside 0..180")]
    AngleOutOfRange(u16),

    #[error("start angle {start} after end angle {end}")]
    InvertedSpan { start: u8, end: u8 },

    #[error("unknown movement response code {0}")]
    UnknownResponseCode(u8),

    #[error("empty command line")]
    EmptyCommand,

    #[error("unknown command tag {0:?}")]
    UnknownTag(char),

    #[error("bad numeric argument {0:?}")]
    BadArgument(String),
}

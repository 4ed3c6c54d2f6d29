use crate::{
    Unit,
    units::{Bits, Words32},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ArgumentError),

    #[error("invalid target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("transport failure")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// An I2C-mediated chip kept reporting busy or error status after every
    /// allowed attempt.
    #[error("device busy or in error after {attempts} attempts (status {status:#04b})")]
    DeviceBusyOrError { status: u32, attempts: u32 },

    #[error("{name} read back {value:#X}, which is not a known setting")]
    Unrecognized { name: &'static str, value: u32 },
}

impl Error {
    pub fn transport(report: eyre::Report) -> Self {
        Self::Transport(report.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("{op}: expected {expected} arguments, got {got}")]
    Count {
        op: &'static str,
        expected: u32,
        got: usize,
    },

    #[error("{op}: argument {index} is {value:#X}, maximum is {max:#X}")]
    Range {
        op: &'static str,
        index: usize,
        value: u32,
        max: u32,
    },

    #[error("{name} is {value}, maximum is {max}")]
    Field {
        name: &'static str,
        value: u32,
        max: u32,
    },

    #[error("{0} is write-only")]
    NotReadable(&'static str),

    #[error("{0} is read-only")]
    NotWritable(&'static str),

    #[error("{width} does not divide evenly into {count} elements")]
    UnevenWidth { width: Bits<u32>, count: usize },

    #[error("element {index} ({value:#X}) does not fit in {width}")]
    Overflow {
        index: usize,
        value: u32,
        width: Bits<u32>,
    },

    #[error("element width must be 1..=32, got {0}")]
    ElementWidth(Bits<u32>),

    #[error("no elements to pack")]
    Empty,

    #[error("stream of {have:?} is too short for {need}")]
    ShortStream { have: Words32<usize>, need: Bits<u32> },

    #[error("payload of {0} does not fit a serial command")]
    TooLong(Bits<u32>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("front-end unit {0} out of range 0..=7")]
    FeUnit(u8),

    #[error("delay chip {0} out of range 0..=2")]
    DelayChip(u8),

    #[error("designator {0} out of range 0..=31")]
    Designator(u8),

    #[error("cannot read from the front-end broadcast address")]
    BroadcastRead,

    #[error("{op} is a {expected} command, not addressable at {got}")]
    WrongUnit {
        op: &'static str,
        expected: Unit,
        got: Unit,
    },

    #[error("unknown FPGA address {0:#X}")]
    Address(u32),
}

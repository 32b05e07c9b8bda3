//! Protocol error types

/// Why an inbound Security+ 2.0 frame was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FramingError {
    /// The frame does not start with `55 01 00`
    BadPreamble,
    /// A half carries the wrong frame-type bits
    BadHeader,
    /// A two-bit ternary digit held the reserved value `0b11`
    InvalidTrit,
    /// The indicator copy inside a half does not match its header
    IndicatorMismatch,
    /// The data parity nibble does not match
    Parity,
    /// Inter-byte silence exceeded the frame timeout
    Timeout,
}

/// Errors from encoding or decoding a Security+ 2.0 message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Bad or aborted inbound frame
    Framing(FramingError),
    /// An outbound field does not fit its bit width
    EncodingRange,
}

impl From<FramingError> for CodecError {
    fn from(e: FramingError) -> Self {
        CodecError::Framing(e)
    }
}

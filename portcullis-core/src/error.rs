//! Error kinds surfaced by the bridge core
//!
//! Nothing here is fatal: every error has a local recovery and the
//! engine keeps running.

use portcullis_hal::FlashError;
use portcullis_protocol::{CodecError, FramingError, Sec1Error};

/// Core error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Bad or aborted inbound frame; discarded, scanning resumes
    Framing,
    /// Outbound packet fields exceed their bit widths; action dropped
    EncodingRange,
    /// Bus contended at transmit start; action stays at the queue front
    Collision,
    /// Outbound queue saturated; the new action is dropped
    QueueFull,
    /// Durable storage unavailable; operation continues in memory
    Persistence(FlashError),
    /// Transmit exceeded its time budget; handled like a collision
    UartWriteTimeout,
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Error::Persistence(e)
    }
}

impl From<FramingError> for Error {
    fn from(_: FramingError) -> Self {
        Error::Framing
    }
}

impl From<Sec1Error> for Error {
    fn from(_: Sec1Error) -> Self {
        Error::Framing
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Framing(_) => Error::Framing,
            CodecError::EncodingRange => Error::EncodingRange,
        }
    }
}

impl Error {
    /// Errors after which the same action is retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Collision | Error::UartWriteTimeout)
    }
}

//! UART serial communication abstractions
//!
//! The door bus is a single inverted wire shared by the opener, the wall
//! console and the bridge, so the transmit side is kept separate from the
//! receive side (which is sampled edge by edge, see `portcullis-protocol`).

/// UART transmitter
pub trait UartTx {
    /// Error type for transmit operations
    type Error;

    /// Write data to the UART
    ///
    /// Blocks until all data has been written or an error occurs.
    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// UART configuration
///
/// Frames are always 8N1 on the door bus; only the rate and the line
/// polarity vary between protocol generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Line levels are logically inverted (idle low at the pin)
    pub invert: bool,
}

impl UartConfig {
    /// 8N1 with inverted line levels at the given baud rate
    pub const fn inverted_8n1(baudrate: u32) -> Self {
        Self {
            baudrate,
            invert: true,
        }
    }

    /// Duration of one bit in microseconds, rounded up
    pub const fn bit_time_us(&self) -> u32 {
        1_000_000u32.div_ceil(self.baudrate)
    }

    /// Silence after which a partially received byte is flushed, in milliseconds
    pub const fn byte_timeout_ms(&self) -> u32 {
        10_000 / self.baudrate + 1
    }
}

impl Default for UartConfig {
    fn default() -> Self {
        Self::inverted_8n1(9600)
    }
}

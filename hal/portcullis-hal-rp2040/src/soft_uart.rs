//! Bit-banged UART transmitter
//!
//! The door bus runs at 1200 or 9600 baud with inverted levels, slow
//! enough to clock out of a plain GPIO. Bits are timed against absolute
//! deadlines so interrupt latency does not accumulate across a frame.
//! Receiving is edge driven, see `portcullis_protocol::softuart`.

use embassy_rp::gpio::{Level, Output};
use embassy_time::{Duration, Instant};
use portcullis_hal::{UartConfig, UartTx};
use portcullis_protocol::frame_levels;

/// Hard ceiling on a single write
pub const WRITE_BUDGET_MS: u64 = 100;

/// Transmit errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SoftUartError {
    /// Write ran past [`WRITE_BUDGET_MS`]
    Timeout,
}

/// Software UART transmitter on one GPIO
pub struct SoftUartTx<'d> {
    pin: Output<'d>,
    config: UartConfig,
    bit: Duration,
}

impl<'d> SoftUartTx<'d> {
    /// Take the pin and park it at the idle level
    pub fn new(pin: Output<'d>, config: UartConfig) -> Self {
        let mut tx = Self {
            pin,
            config,
            bit: Duration::from_micros(config.bit_time_us() as u64),
        };
        tx.set_break(false);
        tx
    }

    pub fn config(&self) -> UartConfig {
        self.config
    }

    /// Hold the line at the space level (`true`) or release it to idle
    pub fn set_break(&mut self, asserted: bool) {
        // Idle is a logical one
        self.pin.set_level(Level::from(!asserted ^ self.config.invert));
    }
}

impl<'d> UartTx for SoftUartTx<'d> {
    type Error = SoftUartError;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let start = Instant::now();
        let budget = start + Duration::from_millis(WRITE_BUDGET_MS);
        let mut next = start;

        for &byte in data {
            if Instant::now() > budget {
                self.set_break(false);
                return Err(SoftUartError::Timeout);
            }
            for level in frame_levels(byte, self.config.invert) {
                self.pin.set_level(Level::from(level));
                next += self.bit;
                while Instant::now() < next {}
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        // Nothing is buffered
        Ok(())
    }
}

//! Door bus driver
//!
//! Ties the bit-banged transmitter and the receive-side atomics together
//! behind the core [`Bus`] trait.

use embassy_time::{block_for, Duration};
use portable_atomic::Ordering;

use portcullis_core::{Bus, BusError};
use portcullis_hal::UartTx;
use portcullis_hal_rp2040::soft_uart::{SoftUartError, SoftUartTx};

use crate::channels::{EDGE_CHANNEL, LED_BLINK, LINE_LEVEL, RX_BUSY, RX_BYTES, TX_ACTIVE};

pub struct DoorBus<'d> {
    tx: SoftUartTx<'d>,
}

impl<'d> DoorBus<'d> {
    pub fn new(tx: SoftUartTx<'d>) -> Self {
        Self { tx }
    }
}

impl<'d> Bus for DoorBus<'d> {
    fn line_busy(&mut self) -> bool {
        let idle = LINE_LEVEL.load(Ordering::Relaxed) ^ self.tx.config().invert;
        !idle || RX_BUSY.load(Ordering::Relaxed)
    }

    fn rx_pending(&self) -> bool {
        !RX_BYTES.is_empty() || !EDGE_CHANNEL.is_empty() || RX_BUSY.load(Ordering::Relaxed)
    }

    fn set_tx_asserted(&mut self, asserted: bool) {
        TX_ACTIVE.store(asserted, Ordering::Relaxed);
        self.tx.set_break(asserted);
    }

    async fn delay_us(&mut self, us: u32) {
        block_for(Duration::from_micros(us as u64));
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        TX_ACTIVE.store(true, Ordering::Relaxed);
        let result = self.tx.write_blocking(bytes);
        TX_ACTIVE.store(false, Ordering::Relaxed);
        LED_BLINK.signal(());

        result.map_err(|e| match e {
            SoftUartError::Timeout => BusError::Timeout,
        })
    }
}

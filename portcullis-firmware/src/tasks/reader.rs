//! Soft UART reader task
//!
//! Turns receive-pin edges back into bytes. A byte that ends in idle-level
//! bits has no closing edge, so the reader flushes it after the byte
//! timeout.

use defmt::*;
use embassy_time::{with_timeout, Duration, Instant};
use portable_atomic::Ordering;

use portcullis_hal::UartConfig;
use portcullis_protocol::EdgeDecoder;

use crate::channels::{RxByte, EDGE_CHANNEL, LED_BLINK, RX_BUSY, RX_BYTES};
use crate::tasks::now_ms;

#[embassy_executor::task]
pub async fn reader_task(uart: UartConfig) {
    info!("Reader task started at {} baud", uart.baudrate);

    let mut decoder = EdgeDecoder::new(uart.bit_time_us(), uart.invert);
    let timeout = Duration::from_millis(uart.byte_timeout_ms() as u64);

    loop {
        let byte = if decoder.is_busy() {
            match with_timeout(timeout, EDGE_CHANNEL.receive()).await {
                Ok(edge) => decoder.process(edge),
                Err(_) => decoder.timeout(Instant::now().as_micros()),
            }
        } else {
            decoder.process(EDGE_CHANNEL.receive().await)
        };
        RX_BUSY.store(decoder.is_busy(), Ordering::Relaxed);

        if let Some(byte) = byte {
            trace!("RX {:#x}", byte);
            if RX_BYTES.try_send(RxByte { byte, at_ms: now_ms() }).is_err() {
                warn!("RX queue full, dropping byte");
            }
            LED_BLINK.signal(());
        }
    }
}

//! Receive-pin edge capture
//!
//! Runs on the high-priority executor so that each edge is timestamped
//! within a few microseconds of the interrupt. Decoding happens later in
//! the reader task.

use defmt::*;
use embassy_time::Instant;
use portable_atomic::Ordering;

use portcullis_hal_rp2040::gpio::RpInput;
use portcullis_protocol::EdgeEvent;

use crate::channels::{EDGE_CHANNEL, LINE_LEVEL, TX_ACTIVE};

#[embassy_executor::task]
pub async fn edge_task(mut rx: RpInput<'static>) {
    info!("Edge task started");

    let mut dropped: u32 = 0;

    loop {
        let level = rx.wait_for_edge().await;
        let micros = Instant::now().as_micros();
        LINE_LEVEL.store(level, Ordering::Relaxed);

        if TX_ACTIVE.load(Ordering::Relaxed) {
            continue;
        }

        if EDGE_CHANNEL.try_send(EdgeEvent { micros, level }).is_err() {
            dropped = dropped.wrapping_add(1);
            if dropped.is_power_of_two() {
                warn!("Edge queue full, {} edges dropped", dropped);
            }
        }
    }
}

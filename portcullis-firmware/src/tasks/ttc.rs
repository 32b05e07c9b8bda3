//! Time-to-close timer
//!
//! Ticks every 500 ms while the comms task has a countdown armed. The
//! countdown itself lives in the core; this task only supplies the beat.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Ticker};

use portcullis_core::ttc::TICK_MS;

use crate::channels::{TTC_ARMED, TTC_TICK};

#[embassy_executor::task]
pub async fn ttc_task() {
    info!("TTC task started");

    loop {
        while !TTC_ARMED.wait().await {}
        debug!("TTC timer armed");

        let mut ticker = Ticker::every(Duration::from_millis(TICK_MS));
        loop {
            match select(ticker.next(), TTC_ARMED.wait()).await {
                Either::First(()) => TTC_TICK.signal(()),
                Either::Second(true) => ticker.reset(),
                Either::Second(false) => break,
            }
        }

        // A tick raised just before disarming is stale
        TTC_TICK.reset();
        debug!("TTC timer stopped");
    }
}

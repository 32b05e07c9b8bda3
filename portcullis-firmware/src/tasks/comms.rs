//! Door bus engine task
//!
//! Owns the [`Comms`] engine and is the only task that mutates door
//! state. Every wake-up (received bytes, a control request, a TTC beat,
//! an obstruction transition or the engine's own next deadline) is
//! followed by one service pass.

use defmt::*;
use embassy_futures::select::{select, select4, Either, Either4};
use embassy_time::{Duration, Instant, Timer};

use portcullis_core::{Comms, RestartReason};
use portcullis_hal_rp2040::flash::FlashStorage;

use crate::bus::DoorBus;
use crate::channels::{CONTROL_CHANNEL, NOTIFY_CHANNEL, OBSTRUCTION, RX_BYTES, TTC_ARMED, TTC_TICK};
use crate::observer::BridgeObserver;
use crate::tasks::now_ms;

/// Engine type driven by this task
pub type BridgeComms = Comms<FlashStorage<'static>, BridgeObserver>;

/// Longest wait for notifications to drain before a restart
const RESTART_DRAIN_MS: u64 = 500;

#[embassy_executor::task]
pub async fn comms_task(mut comms: BridgeComms, mut bus: DoorBus<'static>, entropy: u32) {
    info!("Comms task started");

    if let Err(e) = comms.start(entropy, now_ms()).await {
        warn!("Startup restore incomplete: {:?}", e);
    }
    comms.service(&mut bus, now_ms()).await;

    let mut ttc_armed = false;

    loop {
        let wake = comms
            .next_wake(now_ms())
            .map_or(Instant::MAX, Instant::from_millis);

        match select4(
            RX_BYTES.receive(),
            CONTROL_CHANNEL.receive(),
            TTC_TICK.wait(),
            select(OBSTRUCTION.wait(), Timer::at(wake)),
        )
        .await
        {
            Either4::First(rx) => {
                comms.on_byte(rx.byte, rx.at_ms);
                while let Ok(rx) = RX_BYTES.try_receive() {
                    comms.on_byte(rx.byte, rx.at_ms);
                }
            }
            Either4::Second(request) => {
                if let Err(e) = comms.apply(request) {
                    warn!("Control request {:?} failed: {:?}", request, e);
                }
            }
            Either4::Third(()) => {
                if let Err(e) = comms.ttc_tick() {
                    warn!("TTC step failed: {:?}", e);
                }
            }
            Either4::Fourth(Either::First(obstructed)) => comms.on_obstruction(obstructed, now_ms()),
            Either4::Fourth(Either::Second(())) => {}
        }

        comms.service(&mut bus, now_ms()).await;

        let active = comms.ttc().is_active();
        if active != ttc_armed {
            ttc_armed = active;
            TTC_ARMED.signal(active);
        }

        if let Some(reason) = comms.observer_mut().take_restart() {
            restart(reason).await;
        }
    }
}

/// Let pending notifications drain, then reset the chip
async fn restart(reason: RestartReason) -> ! {
    match reason {
        RestartReason::SoftAp => warn!("Setup mode is handled by the network side, plain restart"),
        RestartReason::Reset => info!("Door identity cleared, restarting"),
    }

    let deadline = Instant::now() + Duration::from_millis(RESTART_DRAIN_MS);
    while !NOTIFY_CHANNEL.is_empty() && Instant::now() < deadline {
        Timer::after_millis(10).await;
    }

    cortex_m::peripheral::SCB::sys_reset()
}

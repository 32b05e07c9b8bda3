//! Obstruction sensor tasks
//!
//! The safety beam pulses low every few milliseconds while the path is
//! clear. One task counts falling edges, the other samples the count every
//! 50 ms and mirrors the debounced result on the status output.

use defmt::*;
use embassy_time::{Duration, Ticker};
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use portcullis_core::obstruction::SAMPLE_INTERVAL_MS;
use portcullis_core::ObstructionSampler;
use portcullis_hal::{InputPin, OutputPin};
use portcullis_hal_rp2040::gpio::{RpInput, RpOutput};

use crate::channels::OBSTRUCTION;
use crate::tasks::now_ms;

/// Falling edges since the last sample
static PULSES: AtomicU32 = AtomicU32::new(0);

/// Sensor level after the latest edge
static SENSOR_LEVEL: AtomicBool = AtomicBool::new(false);

/// Sensor line as seen by the edge counter
struct SensorLevel;

impl InputPin for SensorLevel {
    fn is_high(&self) -> bool {
        SENSOR_LEVEL.load(Ordering::Relaxed)
    }
}

/// Count sensor pulses
#[embassy_executor::task]
pub async fn obstruction_pulse_task(mut sensor: RpInput<'static>) {
    info!("Obstruction pulse task started");

    SENSOR_LEVEL.store(sensor.is_high(), Ordering::Relaxed);
    loop {
        let level = sensor.wait_for_edge().await;
        SENSOR_LEVEL.store(level, Ordering::Relaxed);
        if !level {
            PULSES.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Debounce the pulse count into obstruction transitions
#[embassy_executor::task]
pub async fn obstruction_task(mut status: RpOutput<'static>) {
    info!("Obstruction sampler started");

    let mut sampler = ObstructionSampler::new();
    let mut ticker = Ticker::every(Duration::from_millis(SAMPLE_INTERVAL_MS));
    status.set_low();

    loop {
        ticker.next().await;

        let pulses = PULSES.swap(0, Ordering::Relaxed);
        if let Some(obstructed) = sampler.sample(pulses, &SensorLevel, now_ms()) {
            info!("Obstruction {}", if obstructed { "detected" } else { "clear" });
            status.set_state(obstructed);
            OBSTRUCTION.signal(obstructed);
        }
    }
}

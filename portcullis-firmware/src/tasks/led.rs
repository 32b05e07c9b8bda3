//! Activity LED
//!
//! Flashes for 500 ms after bus traffic. Further traffic while lit
//! extends the flash.

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Timer};

use portcullis_core::LedIdle;
use portcullis_hal::OutputPin;
use portcullis_hal_rp2040::gpio::RpOutput;

use crate::channels::LED_BLINK;

const FLASH_MS: u64 = 500;

#[embassy_executor::task]
pub async fn led_task(mut led: RpOutput<'static>, idle: LedIdle) {
    let rest = match idle {
        LedIdle::Off => false,
        LedIdle::On => true,
        LedIdle::Disabled => {
            led.set_low();
            return;
        }
    };
    led.set_state(rest);

    loop {
        LED_BLINK.wait().await;
        led.set_state(!rest);
        loop {
            match select(Timer::after(Duration::from_millis(FLASH_MS)), LED_BLINK.wait()).await {
                Either::First(()) => break,
                Either::Second(()) => {}
            }
        }
        led.set_state(rest);
    }
}

//! Portcullis - Garage Door Opener Bridge Firmware
//!
//! Main firmware binary for RP2040-based bridge boards. Sits on the
//! Security+ serial bus between an opener and its wall console, tracks
//! door, light, lock, motion and obstruction state and injects commands.
//!
//! Pin assignments follow the bridge board layout:
//!
//! | GPIO | Function                                  |
//! |------|-------------------------------------------|
//! | 1    | Door bus transmit (through the inverter)  |
//! | 2    | Door bus receive                          |
//! | 3    | Obstruction sensor input                  |
//! | 4    | Obstruction status output                 |
//! | 5    | Door status output                        |
//! | 25   | Activity LED                              |

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::{interrupt, Peri};
use embassy_rp::peripherals::{DMA_CH0, FLASH};
use embassy_time::Instant;
use {defmt_rtt as _, panic_probe as _};

use portcullis_core::{Comms, CoreConfig};
use portcullis_hal_rp2040::flash::FlashStorage;
use portcullis_hal_rp2040::gpio::{RpInput, RpOutput};
use portcullis_hal_rp2040::soft_uart::SoftUartTx;

use crate::bus::DoorBus;
use crate::config::{embedded_config, log_config_summary, ConfigPersistence};
use crate::observer::BridgeObserver;

/// Embedded default configuration (compiled into firmware)
/// Edit bridge.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../bridge.toml");

mod bus;
mod channels;
mod config;
mod observer;
mod tasks;

/// Executor for the receive-edge task, preempts everything else
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_HIGH.on_interrupt()
}

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Portcullis firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let (mut storage, config) = load_config(p.FLASH, p.DMA_CH0).await;
    let entropy = entropy(&mut storage);

    let uart = config.security_type.uart_config();
    info!("Door bus at {} baud, inverted {}", uart.baudrate, uart.invert);

    // Receive edges are captured at interrupt priority
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let high_spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    let rx = RpInput::new(Input::new(p.PIN_2, Pull::Up));
    high_spawner.spawn(unwrap!(tasks::edge_task(rx)));

    let tx = SoftUartTx::new(Output::new(p.PIN_1, Level::Low), uart);
    let bus = DoorBus::new(tx);

    let obstruction_in = RpInput::new(Input::new(p.PIN_3, Pull::None));
    let obstruction_status = RpOutput::new(Output::new(p.PIN_4, Level::Low));
    let door_status = RpOutput::new(Output::new(p.PIN_5, Level::Low));
    let led = RpOutput::new(Output::new(p.PIN_25, Level::Low));

    let comms = Comms::new(config, storage, BridgeObserver::new());

    spawner.spawn(unwrap!(tasks::reader_task(uart)));
    spawner.spawn(unwrap!(tasks::comms_task(comms, bus, entropy)));
    spawner.spawn(unwrap!(tasks::ttc_task()));
    spawner.spawn(unwrap!(tasks::obstruction_pulse_task(obstruction_in)));
    spawner.spawn(unwrap!(tasks::obstruction_task(obstruction_status)));
    spawner.spawn(unwrap!(tasks::notify_task(door_status)));
    spawner.spawn(unwrap!(tasks::led_task(led, config.led_idle)));

    info!("All tasks spawned, firmware running");
}

/// Load configuration from flash storage
///
/// Falls back to the embedded bridge.toml when flash holds no valid
/// configuration. The storage is handed back for the comms engine.
async fn load_config(
    flash: Peri<'static, FLASH>,
    dma: Peri<'static, DMA_CH0>,
) -> (FlashStorage<'static>, CoreConfig) {
    let mut storage = FlashStorage::new(flash, dma);

    let loaded = ConfigPersistence::new(&mut storage).load().await;
    let config = match loaded {
        Ok(config) => {
            info!("Loaded configuration from flash");
            config
        }
        Err(_) => {
            info!("No valid configuration in flash, using embedded defaults");
            let config = embedded_config(EMBEDDED_CONFIG);
            log_config_summary(&config);
            config
        }
    };

    (storage, config)
}

/// Seed for the door identity, used only when none is stored yet
fn entropy(storage: &mut FlashStorage<'static>) -> u32 {
    let uid = storage.unique_id().unwrap_or_else(|e| {
        warn!("Flash unique id unavailable: {:?}", e);
        0
    });
    let ticks = Instant::now().as_ticks();
    (uid ^ (uid >> 32) ^ ticks) as u32
}

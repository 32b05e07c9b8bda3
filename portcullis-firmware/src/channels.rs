//! Inter-task communication channels
//!
//! Defines the static channels used for communication between Embassy tasks.
//! The edge task runs on the high-priority interrupt executor and only ever
//! touches [`EDGE_CHANNEL`] and the line atomics.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use portable_atomic::AtomicBool;

use portcullis_core::{ControlRequest, Notification};
use portcullis_protocol::EdgeEvent;

/// Edge queue capacity, five Security+ 2.0 frames worth of bits
const EDGE_QUEUE_SIZE: usize = 950;

/// Received byte queue capacity
const RX_QUEUE_SIZE: usize = 256;

/// Control request queue capacity
const CONTROL_QUEUE_SIZE: usize = 4;

/// Notification queue capacity
const NOTIFY_QUEUE_SIZE: usize = 16;

/// A decoded byte and the time its stop bit completed
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxByte {
    pub byte: u8,
    pub at_ms: u64,
}

/// Timestamped edges from the door bus receive pin
pub static EDGE_CHANNEL: Channel<CriticalSectionRawMutex, EdgeEvent, EDGE_QUEUE_SIZE> = Channel::new();

/// Bytes decoded by the reader task
pub static RX_BYTES: Channel<CriticalSectionRawMutex, RxByte, RX_QUEUE_SIZE> = Channel::new();

/// Requests from the home-automation side
pub static CONTROL_CHANNEL: Channel<CriticalSectionRawMutex, ControlRequest, CONTROL_QUEUE_SIZE> = Channel::new();

/// State changes published by the comms task
pub static NOTIFY_CHANNEL: Channel<CriticalSectionRawMutex, Notification, NOTIFY_QUEUE_SIZE> = Channel::new();

/// Countdown tick from the TTC timer
pub static TTC_TICK: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Start (true) or stop (false) the TTC timer
pub static TTC_ARMED: Signal<CriticalSectionRawMutex, bool> = Signal::new();

/// Debounced obstruction transitions
pub static OBSTRUCTION: Signal<CriticalSectionRawMutex, bool> = Signal::new();

/// Flash the activity LED
pub static LED_BLINK: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Set while the bridge drives the line; echoed edges are ignored
pub static TX_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Physical receive-pin level after the latest edge
pub static LINE_LEVEL: AtomicBool = AtomicBool::new(false);

/// Set while the reader holds a partially decoded byte
pub static RX_BUSY: AtomicBool = AtomicBool::new(false);

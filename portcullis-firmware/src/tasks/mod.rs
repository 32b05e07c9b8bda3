//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod comms;
pub mod edge;
pub mod led;
pub mod notify;
pub mod obstruction;
pub mod reader;
pub mod ttc;

pub use comms::comms_task;
pub use edge::edge_task;
pub use led::led_task;
pub use notify::notify_task;
pub use obstruction::{obstruction_pulse_task, obstruction_task};
pub use reader::reader_task;
pub use ttc::ttc_task;

use embassy_time::Instant;

/// Milliseconds since boot, the time base handed to the core
pub fn now_ms() -> u64 {
    Instant::now().as_millis()
}

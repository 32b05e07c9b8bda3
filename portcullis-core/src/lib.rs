//! Board-agnostic core logic for the Portcullis garage door bridge
//!
//! This crate contains all bridge logic that does not depend on specific
//! hardware implementations:
//!
//! - Bus arbitration and the outbound packet queue
//! - Rolling-code bookkeeping with lazy persistence
//! - Door state tracking and observer notifications
//! - Time-to-close countdown and manual recovery
//! - Obstruction sensor debouncing
//! - Configuration types and the TOML parser
//!
//! The firmware drives a single [`Comms`] engine from one task and feeds
//! it bytes, timer ticks and sensor transitions.

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod macros;

pub mod arbiter;
pub mod comms;
pub mod config;
pub mod control;
pub mod door;
pub mod error;
pub mod observer;
pub mod obstruction;
pub mod queue;
pub mod recovery;
pub mod rolling;
pub mod ttc;

#[cfg(test)]
mod testing;

pub use arbiter::{Bus, BusArbiter, BusError};
pub use comms::Comms;
pub use config::{CoreConfig, LedIdle, MotionTrigger, MotionTriggers, SecurityType};
pub use control::ControlRequest;
pub use door::GarageDoor;
pub use error::Error;
pub use observer::{Notification, Observer, RestartReason};
pub use obstruction::ObstructionSampler;
pub use ttc::TtcController;

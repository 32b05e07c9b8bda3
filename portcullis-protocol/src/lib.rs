//! Security+ Garage Door Bus Protocols
//!
//! This crate implements the two serial protocols spoken between a
//! residential garage door opener and its wall console, as seen by a
//! bridge sitting on the same wire.
//!
//! # Protocol Overview
//!
//! Security+ 2.0 frames are 19 bytes at 9600 baud on an inverted line:
//! ```text
//! ┌──────────┬──────────────────────┬──────────────────────┐
//! │ PREAMBLE │ HALF 0               │ HALF 1               │
//! │ 55 01 00 │ 64 bits              │ 64 bits              │
//! └──────────┴──────────────────────┴──────────────────────┘
//! ```
//! Each half carries a slice of the rolling code, the fixed (device) value
//! and the data word, scrambled under an indicator taken from the rolling
//! code itself.
//!
//! Security+ 1.0 is a polled byte protocol at 1200 baud: single bytes for
//! button presses and `(key, value)` pairs for status replies.
//!
//! The bytes themselves are recovered from line edges by [`softuart`].

#![no_std]
#![deny(unsafe_code)]

pub mod error;
pub mod packet;
pub mod reader;
pub mod secplus1;
pub mod secplus2;
pub mod softuart;

pub use error::{CodecError, FramingError};
pub use packet::{
    command_name, DoorAction, DoorActionData, DoorState, LightData, LightState, LockData,
    LockState, Packet, StatusData,
};
pub use reader::Sec2Reader;
pub use secplus1::{ButtonPress, Sec1Error, Sec1Reader, Sec1Record, Sec1Status};
pub use secplus2::{Message, FRAME_LEN, PREAMBLE, ROLLING_MODULUS};
pub use softuart::{frame_levels, EdgeDecoder, EdgeEvent};

//! RP2040-specific HAL for the garage door bridge
//!
//! Implements the shared `portcullis-hal` traits on top of `embassy-rp`:
//!
//! - Flash storage driver (implements `portcullis_hal::FlashStorage`)
//! - GPIO adapters for the HAL pin traits
//! - Bit-banged inverted UART transmitter for the door bus

#![no_std]

pub mod flash;
pub mod gpio;
pub mod soft_uart;

// Re-export shared traits from portcullis-hal for convenience
pub use portcullis_hal::{FlashStorage as FlashStorageTrait, StorageKey};

//! GPIO adapters
//!
//! Wraps `embassy-rp` pins so the board-agnostic core can drive them
//! through the `portcullis-hal` pin traits.

use embassy_rp::gpio::{Input, Level, Output};

/// Push-pull output implementing [`portcullis_hal::OutputPin`]
pub struct RpOutput<'d> {
    pin: Output<'d>,
}

impl<'d> RpOutput<'d> {
    pub fn new(pin: Output<'d>) -> Self {
        Self { pin }
    }
}

impl<'d> portcullis_hal::OutputPin for RpOutput<'d> {
    fn set_high(&mut self) {
        self.pin.set_high();
    }

    fn set_low(&mut self) {
        self.pin.set_low();
    }

    fn set_state(&mut self, high: bool) {
        self.pin.set_level(Level::from(high));
    }

    fn is_set_high(&self) -> bool {
        self.pin.is_set_high()
    }
}

/// Digital input implementing [`portcullis_hal::InputPin`]
///
/// Also exposes edge waits for tasks that sample on interrupt.
pub struct RpInput<'d> {
    pin: Input<'d>,
}

impl<'d> RpInput<'d> {
    pub fn new(pin: Input<'d>) -> Self {
        Self { pin }
    }

    /// Wait for the next edge and return the level after it
    pub async fn wait_for_edge(&mut self) -> bool {
        self.pin.wait_for_any_edge().await;
        self.pin.is_high()
    }

    /// Wait for the next falling edge
    pub async fn wait_for_falling_edge(&mut self) {
        self.pin.wait_for_falling_edge().await;
    }
}

impl<'d> portcullis_hal::InputPin for RpInput<'d> {
    fn is_high(&self) -> bool {
        self.pin.is_high()
    }
}

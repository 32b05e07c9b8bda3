//! Time-to-close countdown
//!
//! Counts half-second ticks while the light blinks, then fires its action.
//! The same countdown doubles as visual feedback before a recovery
//! restart. The 500 ms tick source lives outside the core; a tick that
//! arrives after cancellation finds no action and does nothing.

use crate::observer::RestartReason;

/// Tick period of the countdown
pub const TICK_MS: u64 = 500;

/// What happens when the countdown runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TtcAction {
    CloseDoor,
    Restart(RestartReason),
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TtcStep {
    /// Still counting, toggle the light
    Blink,
    /// Countdown finished
    Fire(TtcAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TtcController {
    countdown: u16,
    saved_light: bool,
    action: Option<TtcAction>,
}

impl TtcController {
    pub const fn new() -> Self {
        Self {
            countdown: 0,
            saved_light: false,
            action: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.action.is_some()
    }

    pub fn action(&self) -> Option<TtcAction> {
        self.action
    }

    /// True while a delayed close is counting down
    pub fn is_closing(&self) -> bool {
        self.action == Some(TtcAction::CloseDoor)
    }

    pub fn remaining_ticks(&self) -> u16 {
        self.countdown
    }

    /// Arm a countdown of `ticks` half seconds
    pub fn start(&mut self, ticks: u16, saved_light: bool, action: TtcAction) {
        debug!("Countdown of {} ticks for {:?}", ticks, action);
        self.countdown = ticks;
        self.saved_light = saved_light;
        self.action = Some(action);
    }

    /// Stop the countdown, returning the light level saved at start
    pub fn cancel(&mut self) -> Option<bool> {
        let action = self.action.take()?;
        debug!("Countdown for {:?} cancelled", action);
        self.countdown = 0;
        Some(self.saved_light)
    }

    /// Advance one tick
    pub fn tick(&mut self) -> Option<TtcStep> {
        let action = self.action?;
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            return Some(TtcStep::Blink);
        }
        self.action = None;
        Some(TtcStep::Fire(action))
    }
}

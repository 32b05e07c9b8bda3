//! Manual recovery press counter
//!
//! Five wall-console presses inside the recovery window ask the bridge to
//! reboot into setup mode.

/// Presses needed inside one window
pub const RECOVERY_PRESSES: u8 = 5;

/// Countdown ticks of light blinking before the restart
pub const RECOVERY_GRACE_TICKS: u16 = 6;

#[derive(Debug, Clone, Copy)]
pub struct ManualRecovery {
    window_ms: u32,
    presses: u8,
    deadline_ms: Option<u64>,
}

impl ManualRecovery {
    pub const fn new(window_ms: u32) -> Self {
        Self {
            window_ms,
            presses: 0,
            deadline_ms: None,
        }
    }

    pub fn presses(&self) -> u8 {
        self.presses
    }

    /// Count a press; returns true when the sequence is complete
    ///
    /// A press after the window has closed starts a new sequence.
    pub fn press(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(deadline) if now_ms <= deadline => self.presses += 1,
            _ => {
                self.presses = 1;
                self.deadline_ms = Some(now_ms + self.window_ms as u64);
            }
        }
        trace!("Recovery press {}", self.presses);

        if self.presses < RECOVERY_PRESSES {
            return false;
        }
        self.presses = 0;
        self.deadline_ms = None;
        true
    }
}

//! Observer that forwards core notifications to the other tasks

use defmt::*;

use portcullis_core::{Notification, Observer, RestartReason};

use crate::channels::NOTIFY_CHANNEL;

/// Publishes notifications and latches restart requests
#[derive(Default)]
pub struct BridgeObserver {
    restart: Option<RestartReason>,
}

impl BridgeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a pending restart request
    pub fn take_restart(&mut self) -> Option<RestartReason> {
        self.restart.take()
    }
}

impl Observer for BridgeObserver {
    fn notify(&mut self, notification: Notification) {
        if let Notification::RestartRequested(reason) = notification {
            self.restart = Some(reason);
        }
        if NOTIFY_CHANNEL.try_send(notification).is_err() {
            warn!("Notification channel full, dropping {:?}", notification);
        }
    }
}

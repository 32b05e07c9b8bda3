//! State notifications
//!
//! The core reports every externally visible change through an
//! [`Observer`]. Implementors only need [`Observer::notify`]; the named
//! methods are conveniences that build the matching [`Notification`].

use portcullis_protocol::DoorState;

/// Why the bridge asks to be restarted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RestartReason {
    /// Manual recovery sequence: reboot into setup mode
    SoftAp,
    /// Door identity was reset and must be regenerated
    Reset,
}

/// A state change reported by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    CurrentDoorState(DoorState),
    TargetDoorState(DoorState),
    /// First status reply seen; the opener is connected
    Active,
    CurrentLock(bool),
    TargetLock(bool),
    Light(bool),
    Motion(bool),
    Obstruction(bool),
    /// A motion sensor was discovered on the bus
    MotionSensorDiscovered { reboot_required: bool },
    RestartRequested(RestartReason),
}

/// Receiver for core notifications
pub trait Observer {
    fn notify(&mut self, notification: Notification);

    fn on_current_door_state(&mut self, state: DoorState) {
        self.notify(Notification::CurrentDoorState(state));
    }

    fn on_target_door_state(&mut self, state: DoorState) {
        self.notify(Notification::TargetDoorState(state));
    }

    fn on_active(&mut self) {
        self.notify(Notification::Active);
    }

    fn on_current_lock(&mut self, locked: bool) {
        self.notify(Notification::CurrentLock(locked));
    }

    fn on_target_lock(&mut self, locked: bool) {
        self.notify(Notification::TargetLock(locked));
    }

    fn on_light(&mut self, on: bool) {
        self.notify(Notification::Light(on));
    }

    fn on_motion(&mut self, detected: bool) {
        self.notify(Notification::Motion(detected));
    }

    fn on_obstruction(&mut self, obstructed: bool) {
        self.notify(Notification::Obstruction(obstructed));
    }

    fn on_motion_sensor_discovered(&mut self, reboot_required: bool) {
        self.notify(Notification::MotionSensorDiscovered { reboot_required });
    }

    fn request_restart(&mut self, reason: RestartReason) {
        self.notify(Notification::RestartRequested(reason));
    }
}

/// Observer that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn notify(&mut self, _notification: Notification) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    #[derive(Default)]
    struct Recorder(Vec<Notification, 8>);

    impl Observer for Recorder {
        fn notify(&mut self, notification: Notification) {
            self.0.push(notification).unwrap();
        }
    }

    #[test]
    fn test_named_methods_forward_to_notify() {
        let mut recorder = Recorder::default();
        recorder.on_current_door_state(DoorState::Opening);
        recorder.on_light(true);
        recorder.on_motion_sensor_discovered(false);
        recorder.request_restart(RestartReason::SoftAp);
        assert_eq!(
            recorder.0.as_slice(),
            &[
                Notification::CurrentDoorState(DoorState::Opening),
                Notification::Light(true),
                Notification::MotionSensorDiscovered {
                    reboot_required: false
                },
                Notification::RestartRequested(RestartReason::SoftAp),
            ]
        );
    }
}

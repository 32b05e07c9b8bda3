//! Observable garage door state
//!
//! [`GarageDoor`] mirrors what the opener reports. Every setter compares
//! against the held value and notifies the observer only on change.

use portcullis_protocol::DoorState;

use crate::observer::Observer;

/// How long a motion report stays active
pub const MOTION_HOLD_MS: u64 = 5000;

/// State mirrored from the opener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GarageDoor {
    /// A status reply has been seen
    pub active: bool,
    pub current_state: DoorState,
    pub target_state: DoorState,
    pub current_lock: bool,
    pub target_lock: bool,
    pub light: bool,
    pub motion: bool,
    pub motion_deadline_ms: u64,
    pub obstructed: bool,
    pub has_motion_sensor: bool,
}

impl GarageDoor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a reported door position
    ///
    /// Returns true when the current state changed. An `Unknown` report is
    /// ignored.
    pub fn observe_door<O: Observer>(&mut self, door: DoorState, observer: &mut O) -> bool {
        let Some(target) = door.target() else {
            debug!("Ignoring unknown door state");
            return false;
        };

        if !self.active {
            self.active = true;
            observer.on_active();
        }

        let changed = door != self.current_state;
        if changed {
            info!("Door {:?} -> {:?}", self.current_state, door);
            self.current_state = door;
            observer.on_current_door_state(door);
        }

        if target != self.target_state {
            self.target_state = target;
            observer.on_target_door_state(target);
        }

        changed
    }

    pub fn observe_light<O: Observer>(&mut self, on: bool, observer: &mut O) -> bool {
        if on == self.light {
            return false;
        }
        info!("Light {}", on);
        self.light = on;
        observer.on_light(on);
        true
    }

    /// Apply a reported lock state
    ///
    /// Compared against the current lock so that a target already set by a
    /// local command is still confirmed when the opener echoes it.
    pub fn observe_lock<O: Observer>(&mut self, locked: bool, observer: &mut O) -> bool {
        if locked == self.current_lock {
            return false;
        }
        info!("Lock {}", locked);
        self.current_lock = locked;
        observer.on_current_lock(locked);
        self.target_lock = locked;
        observer.on_target_lock(locked);
        true
    }

    /// Update the lock target requested from the wall console
    pub fn set_target_lock<O: Observer>(&mut self, locked: bool, observer: &mut O) -> bool {
        if locked == self.target_lock {
            return false;
        }
        self.target_lock = locked;
        observer.on_target_lock(locked);
        true
    }

    /// Start or extend a motion report
    pub fn raise_motion<O: Observer>(&mut self, now_ms: u64, observer: &mut O) {
        self.motion_deadline_ms = now_ms + MOTION_HOLD_MS;
        if !self.motion {
            info!("Motion detected");
            self.motion = true;
            observer.on_motion(true);
        }
    }

    /// Clear a motion report whose hold time has passed
    pub fn expire_motion<O: Observer>(&mut self, now_ms: u64, observer: &mut O) -> bool {
        if self.motion && now_ms >= self.motion_deadline_ms {
            info!("Motion cleared");
            self.motion = false;
            observer.on_motion(false);
            return true;
        }
        false
    }

    /// Deadline of the running motion report
    pub fn motion_deadline(&self) -> Option<u64> {
        self.motion.then_some(self.motion_deadline_ms)
    }

    pub fn set_obstructed<O: Observer>(&mut self, obstructed: bool, observer: &mut O) -> bool {
        if obstructed == self.obstructed {
            return false;
        }
        info!("Obstruction {}", obstructed);
        self.obstructed = obstructed;
        observer.on_obstruction(obstructed);
        true
    }
}

/// Two-in-a-row filter for noisy Security+ 1.0 door reports
#[derive(Debug, Clone, Copy, Default)]
pub struct DoorDebounce {
    last: Option<DoorState>,
}

impl DoorDebounce {
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Returns the state once it has been seen twice in a row
    pub fn accept(&mut self, door: DoorState) -> Option<DoorState> {
        let confirmed = self.last == Some(door);
        self.last = Some(door);
        confirmed.then_some(door)
    }
}

//! Control surface
//!
//! User-facing operations. They only queue packets and set flags, never
//! touch the bus or storage directly, so they are safe to call from an
//! observer callback. Each one is a no-op when the door is already in the
//! requested state.

use portcullis_hal::FlashStorage;
use portcullis_protocol::{
    DoorAction, DoorActionData, DoorState, LightData, LightState, LockData, LockState, Packet,
};

use crate::comms::Comms;
use crate::config::SecurityType;
use crate::error::Error;
use crate::observer::Observer;
use crate::queue::PacketAction;
use crate::ttc::{TtcAction, TtcStep};

/// Button id used for door commands sent by the bridge
pub const DOOR_BUTTON_ID: u8 = 1;

/// Hold time of an emulated button press
const PRESS_HOLD_MS: u32 = 250;
/// Hold time of a Security+ 1.0 lock press
const SEC1_LOCK_HOLD_MS: u32 = 3000;
/// Gap after a button release
const RELEASE_GAP_MS: u32 = 40;

const STATUS_REQUEST: PacketAction = PacketAction::new(Packet::GetStatus, true, 0);

fn light_toggle(pressed: bool) -> Packet {
    Packet::Light(LightData {
        state: LightState::Toggle,
        pressed,
    })
}

/// A request from the home-automation side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlRequest {
    Open,
    Close,
    Light(bool),
    Lock(bool),
    GetStatus,
    Reset,
}

impl<S: FlashStorage, O: Observer> Comms<S, O> {
    /// Dispatch a [`ControlRequest`]
    pub fn apply(&mut self, request: ControlRequest) -> Result<(), Error> {
        debug!("Control request {:?}", request);
        match request {
            ControlRequest::Open => self.open_door(),
            ControlRequest::Close => self.close_door(),
            ControlRequest::Light(on) => self.set_light(on),
            ControlRequest::Lock(locked) => self.set_lock(locked),
            ControlRequest::GetStatus => self.send_get_status(),
            ControlRequest::Reset => {
                self.reset_door();
                Ok(())
            }
        }
    }

    pub(crate) fn enqueue(&mut self, actions: &[PacketAction]) -> Result<(), Error> {
        self.queue.push_all(actions).inspect_err(|_| {
            warn!("Transmit queue full, dropping {} packets", actions.len());
        })
    }

    fn is_sec2(&self) -> bool {
        self.config.security_type == SecurityType::Sec2
    }

    /// Queue a Security+ 1.0 button press followed by two releases
    fn press_button(&mut self, press: Packet, release: Packet, hold_ms: u32) -> Result<(), Error> {
        let press = PacketAction::new(press, false, hold_ms);
        let release = PacketAction::new(release, true, RELEASE_GAP_MS);
        self.enqueue(&[press, release, release])
    }

    fn door_command(&mut self, action: DoorAction) -> Result<(), Error> {
        info!("Door command {:?}", action);
        let packet = |pressed| {
            Packet::DoorAction(DoorActionData {
                action,
                pressed,
                id: DOOR_BUTTON_ID,
            })
        };
        let press = PacketAction::new(packet(true), false, PRESS_HOLD_MS);
        let release = PacketAction::new(packet(false), true, RELEASE_GAP_MS);
        if self.is_sec2() {
            self.enqueue(&[press, release, STATUS_REQUEST])
        } else {
            self.enqueue(&[press, release, release])
        }
    }

    /// Put the light back to its level from before a countdown
    ///
    /// Blinks that have not started are dropped from the queue. A blink sent
    /// after the last status reply makes the reported level stale.
    fn restore_light(&mut self, saved: bool) -> Result<(), Error> {
        // A Security+ 1.0 release at the front belongs to a press already sent
        let mut in_sequence = !self.is_sec2()
            && matches!(
                self.queue.front().map(|a| a.packet),
                Some(Packet::Light(LightData { pressed: false, .. }))
            );
        let dropped = self.queue.discard(|action| match action.packet {
            Packet::Light(light) if in_sequence && !light.pressed => false,
            Packet::Light(_) => {
                in_sequence = false;
                true
            }
            _ => {
                in_sequence = false;
                false
            }
        });
        if dropped > 0 {
            debug!("Dropped {} queued blinks", dropped);
        }

        if !self.light_unconfirmed {
            return self.set_light(saved);
        }
        if self.is_sec2() {
            let packet = Packet::Light(LightData {
                state: LightState::from(saved),
                pressed: false,
            });
            self.enqueue(&[PacketAction::new(packet, true, 0), STATUS_REQUEST])
        } else if self.door.light == saved {
            // The press in flight will toggle away from the saved level
            self.press_button(light_toggle(true), light_toggle(false), PRESS_HOLD_MS)
        } else {
            Ok(())
        }
    }

    /// Open the door, cancelling a pending delayed close
    pub fn open_door(&mut self) -> Result<(), Error> {
        if self.ttc.is_closing() {
            if let Some(saved_light) = self.ttc.cancel() {
                info!("Delayed close cancelled");
                self.restore_light(saved_light)?;
            }
        }

        match self.door.current_state {
            DoorState::Open => Ok(()),
            DoorState::Closing => self.door_command(DoorAction::Stop),
            _ => self.door_command(DoorAction::Open),
        }
    }

    /// Close the door, after the time-to-close warning when one is set
    ///
    /// Closing during a running warning skips the rest of it.
    pub fn close_door(&mut self) -> Result<(), Error> {
        match self.door.current_state {
            DoorState::Closed => return Ok(()),
            DoorState::Opening => return self.door_command(DoorAction::Stop),
            _ => {}
        }

        if self.ttc.is_closing() {
            self.ttc.cancel();
            return self.door_command(DoorAction::Close);
        }
        if self.config.ttc_seconds == 0 || self.ttc.is_active() {
            return self.door_command(DoorAction::Close);
        }

        info!("Closing in {} s", self.config.ttc_seconds);
        self.ttc
            .start(2 * self.config.ttc_seconds as u16, self.door.light, TtcAction::CloseDoor);
        Ok(())
    }

    pub fn set_light(&mut self, on: bool) -> Result<(), Error> {
        if on == self.door.light {
            return Ok(());
        }
        if self.is_sec2() {
            let packet = Packet::Light(LightData {
                state: LightState::from(on),
                pressed: false,
            });
            self.enqueue(&[PacketAction::new(packet, true, 0), STATUS_REQUEST])
        } else {
            self.press_button(light_toggle(true), light_toggle(false), PRESS_HOLD_MS)
        }
    }

    /// Request a lock state; the target is remembered even when unchanged
    pub fn set_lock(&mut self, locked: bool) -> Result<(), Error> {
        self.door.target_lock = locked;
        if locked == self.door.current_lock {
            return Ok(());
        }
        if self.is_sec2() {
            let packet = Packet::Lock(LockData {
                state: LockState::from(locked),
                pressed: false,
            });
            self.enqueue(&[PacketAction::new(packet, true, 0), STATUS_REQUEST])
        } else {
            let packet = |pressed| {
                Packet::Lock(LockData {
                    state: LockState::Toggle,
                    pressed,
                })
            };
            self.press_button(packet(true), packet(false), SEC1_LOCK_HOLD_MS)
        }
    }

    /// Ask the opener for a status reply (Security+ 2.0 only)
    pub fn send_get_status(&mut self) -> Result<(), Error> {
        if !self.is_sec2() {
            return Ok(());
        }
        self.enqueue(&[STATUS_REQUEST])
    }

    /// Forget the door identity; storage is cleared on the next flush,
    /// followed by a restart request
    pub fn reset_door(&mut self) {
        warn!("Door reset requested");
        self.queue.clear();
        self.ttc.cancel();
        self.pending.reset = true;
    }

    /// Advance the countdown by one 500 ms tick
    pub fn ttc_tick(&mut self) -> Result<(), Error> {
        match self.ttc.tick() {
            None => Ok(()),
            Some(TtcStep::Blink) => self.set_light(!self.door.light),
            Some(TtcStep::Fire(TtcAction::CloseDoor)) => {
                if self.door.current_state == DoorState::Closed {
                    return Ok(());
                }
                self.door_command(DoorAction::Close)
            }
            Some(TtcStep::Fire(TtcAction::Restart(reason))) => {
                self.pending.save = true;
                self.pending.restart = Some(reason);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::tests::{drain, engine, receive, sec2, status, TestComms};
    use crate::config::CoreConfig;
    use crate::observer::{Notification, RestartReason};
    use crate::queue::QUEUE_DEPTH;
    use crate::testing::{FakeBus, MemoryStorage};
    use embassy_futures::block_on;
    use heapless::Vec;
    use portcullis_hal::StorageKey;

    fn ready(door: DoorState, light: bool, ttc_seconds: u8) -> (TestComms, FakeBus, u64) {
        let mut config = CoreConfig::default();
        config.ttc_seconds = ttc_seconds;
        let mut comms = engine(config, MemoryStorage::new());
        let mut bus = FakeBus::new();
        let now = drain(&mut comms, &mut bus, 0);
        receive(&mut comms, status(door, light, false), now);
        bus.clear();
        comms.observer_mut().clear();
        (comms, bus, now)
    }

    fn sec1(door: DoorState) -> TestComms {
        let mut config = CoreConfig::default();
        config.security_type = SecurityType::Sec1;
        config.sec1_door_debounce = false;
        let mut comms = engine(config, MemoryStorage::new());
        comms.door.observe_door(door, &mut comms.observer);
        comms
    }

    impl TestComms {
        fn queued_packets(&self) -> Vec<Packet, 8> {
            let mut copy = self.queue.clone();
            core::iter::from_fn(|| copy.pop_front().map(|a| a.packet)).collect()
        }

        fn queued_actions(&self) -> Vec<PacketAction, 8> {
            let mut copy = self.queue.clone();
            core::iter::from_fn(|| copy.pop_front()).collect()
        }
    }

    fn door_packet(action: DoorAction, pressed: bool) -> Packet {
        Packet::DoorAction(DoorActionData {
            action,
            pressed,
            id: DOOR_BUTTON_ID,
        })
    }

    #[test]
    fn test_open_from_closed() {
        let (mut comms, _, _) = ready(DoorState::Closed, false, 0);
        comms.open_door().unwrap();
        let actions = comms.queued_actions();
        assert_eq!(
            actions.as_slice(),
            &[
                PacketAction::new(door_packet(DoorAction::Open, true), false, 250),
                PacketAction::new(door_packet(DoorAction::Open, false), true, 40),
                PacketAction::new(Packet::GetStatus, true, 0),
            ]
        );
    }

    #[test]
    fn test_open_when_open_is_silent() {
        let (mut comms, mut bus, now) = ready(DoorState::Open, false, 0);
        comms.open_door().unwrap();
        assert_eq!(comms.queued(), 0);
        drain(&mut comms, &mut bus, now + 1000);
        assert!(bus.frames.is_empty());
    }

    #[test]
    fn test_open_while_closing_stops() {
        let (mut comms, _, _) = ready(DoorState::Closing, false, 0);
        comms.open_door().unwrap();
        assert_eq!(comms.queued_packets()[0], door_packet(DoorAction::Stop, true));
    }

    #[test]
    fn test_close_variants() {
        let (mut comms, _, _) = ready(DoorState::Closed, false, 0);
        comms.close_door().unwrap();
        assert_eq!(comms.queued(), 0);

        let (mut comms, _, _) = ready(DoorState::Opening, false, 0);
        comms.close_door().unwrap();
        assert_eq!(comms.queued_packets()[0], door_packet(DoorAction::Stop, true));

        let (mut comms, _, _) = ready(DoorState::Open, false, 0);
        comms.close_door().unwrap();
        assert_eq!(comms.queued_packets()[0], door_packet(DoorAction::Close, true));
        assert!(!comms.ttc().is_active());
    }

    #[test]
    fn test_delayed_close_fires() {
        let (mut comms, mut bus, now) = ready(DoorState::Open, false, 2);
        comms.close_door().unwrap();
        assert_eq!(comms.queued(), 0);
        assert_eq!(comms.ttc().remaining_ticks(), 4);

        let mut light = false;
        for _ in 0..3 {
            comms.ttc_tick().unwrap();
            light = !light;
            receive(&mut comms, status(DoorState::Open, light, false), now);
            drain(&mut comms, &mut bus, now);
        }
        bus.clear();

        comms.ttc_tick().unwrap();
        assert!(!comms.ttc().is_active());
        assert_eq!(comms.queued_packets()[0], door_packet(DoorAction::Close, true));
    }

    #[test]
    fn test_second_close_skips_countdown() {
        let (mut comms, _, _) = ready(DoorState::Open, false, 10);
        comms.close_door().unwrap();
        assert!(comms.ttc().is_closing());
        comms.close_door().unwrap();
        assert!(!comms.ttc().is_active());
        assert_eq!(comms.queued_packets()[0], door_packet(DoorAction::Close, true));
    }

    #[test]
    fn test_open_cancels_countdown() {
        let (mut comms, mut bus, now) = ready(DoorState::Open, false, 10);
        comms.close_door().unwrap();

        // Three seconds of blinking
        let mut light = false;
        for _ in 0..6 {
            comms.ttc_tick().unwrap();
            drain(&mut comms, &mut bus, now);
            light = !light;
            receive(&mut comms, status(DoorState::Open, light, false), now);
        }
        assert!(!comms.door().light);
        let blinks = bus.messages().iter().filter(|m| matches!(m.packet, Packet::Light(_))).count();
        assert_eq!(blinks, 6);
        bus.clear();

        comms.open_door().unwrap();
        assert!(!comms.ttc().is_active());
        assert_eq!(comms.queued(), 0);

        // A tick already in flight does nothing
        comms.ttc_tick().unwrap();
        drain(&mut comms, &mut bus, now + 5000);
        assert!(bus.frames.is_empty());
        assert_eq!(comms.door().current_state, DoorState::Open);
    }

    #[test]
    fn test_open_restores_light() {
        let (mut comms, _, now) = ready(DoorState::Open, false, 10);
        comms.close_door().unwrap();
        comms.ttc_tick().unwrap();
        receive(&mut comms, status(DoorState::Open, true, false), now);
        while comms.queued() > 0 {
            comms.queue.pop_front();
        }

        comms.open_door().unwrap();
        assert_eq!(
            comms.queued_packets()[0],
            Packet::Light(LightData {
                state: LightState::Off,
                pressed: false
            })
        );
    }

    #[test]
    fn test_open_drops_queued_blink() {
        let (mut comms, mut bus, now) = ready(DoorState::Open, false, 10);
        comms.close_door().unwrap();
        comms.ttc_tick().unwrap();
        comms.open_door().unwrap();
        assert!(!comms.ttc().is_active());

        drain(&mut comms, &mut bus, now);
        assert!(bus.messages().iter().all(|m| !matches!(m.packet, Packet::Light(_))));
        receive(&mut comms, status(DoorState::Open, false, false), now + 1000);
        assert!(!comms.door().light);
    }

    #[test]
    fn test_open_undoes_blink_sent_after_status() {
        let (mut comms, mut bus, now) = ready(DoorState::Open, false, 10);
        comms.close_door().unwrap();
        comms.ttc_tick().unwrap();
        let now = drain(&mut comms, &mut bus, now);
        bus.clear();

        // The opener has not reported the blink yet
        assert!(!comms.door().light);
        comms.open_door().unwrap();
        assert_eq!(
            comms.queued_packets().as_slice(),
            &[
                Packet::Light(LightData {
                    state: LightState::Off,
                    pressed: false
                }),
                Packet::GetStatus
            ]
        );

        drain(&mut comms, &mut bus, now);
        receive(&mut comms, status(DoorState::Open, true, false), now + 100);
        receive(&mut comms, status(DoorState::Open, false, false), now + 200);
        assert!(!comms.door().light);
    }

    #[test]
    fn test_sec1_open_restores_light() {
        let mut comms = sec1(DoorState::Open);
        comms.ttc.start(20, false, TtcAction::CloseDoor);

        // A blink that never started is dropped
        comms.ttc_tick().unwrap();
        assert_eq!(comms.queued(), 3);
        comms.open_door().unwrap();
        assert_eq!(comms.queued(), 0);

        // A blink whose press went out is answered with another toggle
        comms.ttc.start(20, false, TtcAction::CloseDoor);
        comms.ttc_tick().unwrap();
        comms.queue.pop_front();
        comms.light_unconfirmed = true;
        comms.open_door().unwrap();
        let packets = comms.queued_packets();
        assert_eq!(
            packets.as_slice(),
            &[
                light_toggle(false),
                light_toggle(false),
                light_toggle(true),
                light_toggle(false),
                light_toggle(false)
            ]
        );
    }

    #[test]
    fn test_door_command_is_all_or_nothing() {
        let (mut comms, _, _) = ready(DoorState::Closed, false, 0);
        let filler = PacketAction::new(Packet::GetOpenings, false, 0);
        for _ in 0..QUEUE_DEPTH - 2 {
            comms.enqueue(&[filler]).unwrap();
        }
        assert_eq!(comms.open_door(), Err(Error::QueueFull));
        assert_eq!(comms.queued(), QUEUE_DEPTH - 2);

        comms.queue.pop_front();
        comms.open_door().unwrap();
        assert_eq!(comms.queued(), QUEUE_DEPTH);
        assert_eq!(comms.queued_packets()[QUEUE_DEPTH - 1], Packet::GetStatus);
    }

    #[test]
    fn test_opener_closing_cancels_countdown() {
        let (mut comms, _, now) = ready(DoorState::Open, false, 10);
        comms.close_door().unwrap();
        receive(&mut comms, status(DoorState::Closing, false, false), now);
        assert!(!comms.ttc().is_active());
        assert_eq!(comms.queued(), 0);
    }

    #[test]
    fn test_close_keeps_recovery_countdown() {
        let (mut comms, _, _) = ready(DoorState::Open, false, 10);
        comms.ttc.start(6, false, TtcAction::Restart(RestartReason::SoftAp));
        comms.close_door().unwrap();
        assert_eq!(comms.ttc().action(), Some(TtcAction::Restart(RestartReason::SoftAp)));
        assert_eq!(comms.queued_packets()[0], door_packet(DoorAction::Close, true));
    }

    #[test]
    fn test_set_light() {
        let (mut comms, mut bus, now) = ready(DoorState::Closed, true, 0);
        comms.set_light(true).unwrap();
        drain(&mut comms, &mut bus, now + 100);
        assert!(bus.frames.is_empty());

        comms.set_light(false).unwrap();
        assert_eq!(
            comms.queued_packets().as_slice(),
            &[
                Packet::Light(LightData {
                    state: LightState::Off,
                    pressed: false
                }),
                Packet::GetStatus,
            ]
        );
    }

    #[test]
    fn test_set_lock() {
        let (mut comms, _, _) = ready(DoorState::Closed, false, 0);
        comms.set_lock(false).unwrap();
        assert_eq!(comms.queued(), 0);

        comms.set_lock(true).unwrap();
        assert!(comms.door().target_lock);
        assert_eq!(
            comms.queued_packets()[0],
            Packet::Lock(LockData {
                state: LockState::On,
                pressed: false
            })
        );
        assert!(comms.observer().seen.is_empty());
    }

    #[test]
    fn test_queue_full_drops_new_requests() {
        let (mut comms, _, _) = ready(DoorState::Closed, false, 0);
        for _ in 0..4 {
            comms.set_light(true).unwrap();
        }
        assert_eq!(comms.set_light(true), Err(Error::QueueFull));
        assert_eq!(comms.open_door(), Err(Error::QueueFull));
        assert_eq!(comms.queued(), 8);
    }

    #[test]
    fn test_reset_door() {
        let mut comms = sec2();
        let mut bus = FakeBus::new();
        drain(&mut comms, &mut bus, 0);
        receive(&mut comms, Packet::Motion, 10);
        block_on(comms.flush()).unwrap();
        assert!(comms.storage().get(StorageKey::HasMotion).is_some());

        comms.apply(ControlRequest::Reset).unwrap();
        assert_eq!(comms.queued(), 0);
        block_on(comms.flush()).unwrap();

        for key in [StorageKey::IdCode, StorageKey::RollingCode, StorageKey::HasMotion] {
            assert_eq!(comms.storage().get(key), None);
        }
        assert!(comms
            .observer()
            .contains(Notification::RestartRequested(RestartReason::Reset)));
    }

    #[test]
    fn test_apply_dispatch() {
        let (mut comms, _, _) = ready(DoorState::Closed, false, 0);
        comms.apply(ControlRequest::GetStatus).unwrap();
        comms.apply(ControlRequest::Light(true)).unwrap();
        assert_eq!(
            comms.queued_packets().as_slice(),
            &[
                Packet::GetStatus,
                Packet::Light(LightData {
                    state: LightState::On,
                    pressed: false
                }),
                Packet::GetStatus,
            ]
        );
    }

    #[test]
    fn test_sec1_door_sequence() {
        let mut comms = sec1(DoorState::Closed);
        let mut bus = FakeBus::new();
        comms.open_door().unwrap();
        assert_eq!(comms.queued(), 3);
        drain(&mut comms, &mut bus, 1000);
        assert_eq!(bus.bytes().as_slice(), &[0x30, 0x31, 0x31]);
        assert_eq!(comms.keeper().rolling(), 0);
    }

    #[test]
    fn test_sec1_light_and_lock_sequences() {
        let mut comms = sec1(DoorState::Closed);
        comms.set_light(true).unwrap();
        comms.set_lock(true).unwrap();
        let holds: Vec<u32, 8> = comms.queued_actions().iter().map(|a| a.post_delay_ms).collect();
        assert_eq!(holds.as_slice(), &[250, 40, 40, 3000, 40, 40]);

        let mut bus = FakeBus::new();
        drain(&mut comms, &mut bus, 0);
        assert_eq!(bus.bytes().as_slice(), &[0x32, 0x33, 0x33, 0x34, 0x35, 0x35]);
    }

    #[test]
    fn test_sec1_has_no_status_request() {
        let mut comms = sec1(DoorState::Open);
        comms.send_get_status().unwrap();
        assert_eq!(comms.queued(), 0);
    }
}

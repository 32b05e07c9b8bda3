//! Bridge engine
//!
//! [`Comms`] owns all door-side state and is driven by one task. The task
//! feeds it received bytes, timer ticks and obstruction transitions, and
//! after every event calls [`Comms::service`], which expires timeouts,
//! sends at most one queued packet and persists whatever became dirty.
//! Time is passed in as monotonic milliseconds so the engine runs the
//! same on the target and on the host.

use portcullis_hal::{FlashError, FlashStorage, StorageKey};
use portcullis_protocol::{
    command_name, ButtonPress, DoorState, Message, Packet, Sec1Reader, Sec1Record, Sec1Status, Sec2Reader,
    StatusData, FRAME_LEN,
};

use heapless::Vec;

use crate::arbiter::{Bus, BusArbiter};
use crate::config::{CoreConfig, MotionTrigger, SecurityType};
use crate::door::{DoorDebounce, GarageDoor};
use crate::error::Error;
use crate::observer::{Observer, RestartReason};
use crate::queue::{PacketAction, TxQueue};
use crate::recovery::{ManualRecovery, RECOVERY_GRACE_TICKS};
use crate::rolling::RollingCodeKeeper;
use crate::ttc::{TtcAction, TtcController};

/// Storage keys cleared by a door reset
const RESET_KEYS: [StorageKey; 3] = [StorageKey::IdCode, StorageKey::RollingCode, StorageKey::HasMotion];

/// Work deferred to [`Comms::flush`]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Pending {
    pub(crate) save: bool,
    pub(crate) has_motion: bool,
    pub(crate) reset: bool,
    pub(crate) restart: Option<RestartReason>,
}

/// Door bus engine
pub struct Comms<S: FlashStorage, O: Observer> {
    pub(crate) config: CoreConfig,
    pub(crate) storage: S,
    pub(crate) observer: O,
    pub(crate) keeper: RollingCodeKeeper,
    pub(crate) arbiter: BusArbiter,
    pub(crate) queue: TxQueue,
    pub(crate) door: GarageDoor,
    pub(crate) ttc: TtcController,
    pub(crate) recovery: ManualRecovery,
    pub(crate) pending: Pending,
    /// A light packet went out after the last status reply
    pub(crate) light_unconfirmed: bool,
    sec2_reader: Sec2Reader,
    sec1_reader: Sec1Reader,
    debounce: DoorDebounce,
}

impl<S: FlashStorage, O: Observer> Comms<S, O> {
    pub fn new(config: CoreConfig, storage: S, observer: O) -> Self {
        Self {
            config,
            storage,
            observer,
            keeper: RollingCodeKeeper::new(),
            arbiter: BusArbiter::new(config.security_type),
            queue: TxQueue::new(),
            door: GarageDoor::new(),
            ttc: TtcController::new(),
            recovery: ManualRecovery::new(config.force_recover_delay_ms),
            pending: Pending::default(),
            light_unconfirmed: false,
            sec2_reader: Sec2Reader::new(),
            sec1_reader: Sec1Reader::new(),
            debounce: DoorDebounce::new(),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn door(&self) -> &GarageDoor {
        &self.door
    }

    pub fn keeper(&self) -> &RollingCodeKeeper {
        &self.keeper
    }

    pub fn ttc(&self) -> &TtcController {
        &self.ttc
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Number of packets waiting to be sent
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Give the storage back, e.g. before a restart
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Restore persisted state and queue the startup sync
    ///
    /// Storage failures are logged and returned, but the engine is usable
    /// either way.
    pub async fn start(&mut self, entropy: u32, now_ms: u64) -> Result<(), Error> {
        info!(
            "Starting Security+ {} bridge, ttc {} s",
            match self.config.security_type {
                SecurityType::Sec1 => 1,
                SecurityType::Sec2 => 2,
            },
            self.config.ttc_seconds
        );
        let mut result = Ok(());

        if self.config.security_type == SecurityType::Sec2 {
            if let Err(e) = self.keeper.restore(&mut self.storage, entropy).await {
                result = Err(e.into());
            }
            info!("Id code {:#x}", self.keeper.id_code());
        }

        let mut flag = [0u8; 1];
        match self.storage.read(StorageKey::HasMotion, &mut flag).await {
            Ok(1) if flag[0] != 0 => {
                info!("Motion sensor known from a previous run");
                self.door.has_motion_sensor = true;
                self.config.motion_triggers.set(MotionTrigger::Motion, true);
            }
            Ok(_) | Err(FlashError::NotFound) => {}
            Err(e) => {
                error!("Failed to read motion flag: {:?}", e);
                result = result.and(Err(e.into()));
            }
        }

        if self.config.security_type == SecurityType::Sec2 {
            // Both consume a code so the opener sees the counter move
            self.enqueue(&[
                PacketAction::new(Packet::GetOpenings, true, 0),
                PacketAction::new(Packet::GetStatus, true, 0),
            ])?;
        }

        self.arbiter.note_rx(now_ms);
        result
    }

    /// Feed one received byte
    pub fn on_byte(&mut self, byte: u8, now_ms: u64) {
        self.arbiter.note_rx(now_ms);
        match self.config.security_type {
            SecurityType::Sec2 => match self.sec2_reader.feed(byte, now_ms) {
                Ok(Some(frame)) => self.on_frame(&frame, now_ms),
                Ok(None) => {}
                Err(e) => debug!("Dropped partial frame: {:?}", e),
            },
            SecurityType::Sec1 => match self.sec1_reader.feed(byte, now_ms) {
                Ok(Some(record)) => self.on_sec1_record(record, now_ms),
                Ok(None) => {}
                Err(e) => trace!("Ignored byte {:#x}: {:?}", byte, e),
            },
        }
    }

    fn on_frame(&mut self, frame: &[u8; FRAME_LEN], now_ms: u64) {
        match Message::decode(frame) {
            Ok(message) => {
                debug!(
                    "RX {} rolling {} from {:#x}",
                    command_name(message.packet.command()),
                    message.rolling,
                    message.remote_id
                );
                self.on_packet(message.packet, now_ms);
            }
            Err(e) => debug!("Undecodable frame: {:?}", e),
        }
    }

    fn on_packet(&mut self, packet: Packet, now_ms: u64) {
        match packet {
            Packet::Status(status) => self.on_status(status),
            Packet::Lock(lock) => {
                let target = lock.state.apply(self.door.target_lock);
                if self.door.set_target_lock(target, &mut self.observer) {
                    self.trigger_motion(MotionTrigger::LockKey, now_ms);
                }
                self.request_status();
            }
            Packet::Light(light) => {
                self.manual_recovery(now_ms);
                let on = light.state.apply(self.door.light);
                if self.door.observe_light(on, &mut self.observer) {
                    self.trigger_motion(MotionTrigger::LightKey, now_ms);
                }
                self.request_status();
            }
            Packet::DoorAction(action) => {
                if action.pressed {
                    self.manual_recovery(now_ms);
                    self.trigger_motion(MotionTrigger::DoorKey, now_ms);
                }
            }
            Packet::Motion => {
                self.on_motion_packet(now_ms);
                self.request_status();
            }
            Packet::GetStatus | Packet::GetOpenings => {}
            Packet::Unknown { command, data } => {
                debug!("Unhandled {} ({:#x}) data {:#x}", command_name(command), command, data);
            }
        }
    }

    fn on_status(&mut self, status: StatusData) {
        trace!(
            "Status obstructed {} learn {}",
            status.obstructed,
            status.learn
        );
        self.apply_door(status.door);
        self.light_unconfirmed = false;
        self.door.observe_light(status.light, &mut self.observer);
        self.door.observe_lock(status.lock, &mut self.observer);
    }

    fn apply_door(&mut self, state: DoorState) {
        self.door.observe_door(state, &mut self.observer);
        // The opener started closing on its own
        if state == DoorState::Closing && self.ttc.is_closing() {
            self.ttc.cancel();
        }
    }

    fn on_sec1_record(&mut self, record: Sec1Record, now_ms: u64) {
        match record {
            Sec1Record::Button(press) => {
                trace!("Button {:#x}", press.to_byte());
                match press {
                    ButtonPress::DoorPress => {
                        self.manual_recovery(now_ms);
                        self.trigger_motion(MotionTrigger::DoorKey, now_ms);
                    }
                    ButtonPress::LightPress => self.trigger_motion(MotionTrigger::LightKey, now_ms),
                    ButtonPress::LockPress => self.trigger_motion(MotionTrigger::LockKey, now_ms),
                    _ => {}
                }
            }
            Sec1Record::Other(byte) => trace!("Unnamed record {:#x}", byte),
            Sec1Record::Status(status) => {
                if !self.arbiter.wall_panel() {
                    info!("Wall console detected");
                    self.arbiter.set_wall_panel(true);
                }
                match status {
                    Sec1Status::Door(state) => {
                        let accepted = if self.config.sec1_door_debounce {
                            self.debounce.accept(state)
                        } else {
                            Some(state)
                        };
                        if let Some(state) = accepted {
                            self.apply_door(state);
                        }
                    }
                    Sec1Status::LightLock { light, lock } => {
                        self.light_unconfirmed = false;
                        self.door.observe_light(light, &mut self.observer);
                        self.door.observe_lock(lock, &mut self.observer);
                    }
                    Sec1Status::Obstruction(value) => trace!("Obstruction status {:#x}", value),
                }
            }
        }
    }

    fn on_motion_packet(&mut self, now_ms: u64) {
        if !self.door.has_motion_sensor {
            info!("Motion sensor discovered");
            self.door.has_motion_sensor = true;
            self.pending.has_motion = true;
            self.config.motion_triggers.set(MotionTrigger::Motion, true);
            let reboot_required = self.config.motion_triggers.only(MotionTrigger::Motion);
            self.observer.on_motion_sensor_discovered(reboot_required);
        }
        self.door.raise_motion(now_ms, &mut self.observer);
    }

    fn trigger_motion(&mut self, trigger: MotionTrigger, now_ms: u64) {
        if self.config.motion_triggers.contains(trigger) {
            self.door.raise_motion(now_ms, &mut self.observer);
        }
    }

    fn request_status(&mut self) {
        // Queue pressure already logged; the next status request catches up
        let _ = self.send_get_status();
    }

    /// Count a wall-console press toward the recovery sequence
    pub fn manual_recovery(&mut self, now_ms: u64) {
        if self.recovery.press(now_ms) {
            warn!("Manual recovery requested, restarting into setup");
            self.ttc.start(
                RECOVERY_GRACE_TICKS,
                self.door.light,
                TtcAction::Restart(RestartReason::SoftAp),
            );
        }
    }

    /// Apply an obstruction transition from the sampler
    pub fn on_obstruction(&mut self, obstructed: bool, now_ms: u64) {
        if self.door.set_obstructed(obstructed, &mut self.observer) && obstructed {
            self.trigger_motion(MotionTrigger::Obstruction, now_ms);
        }
    }

    /// Expire timeouts due at `now_ms`
    pub fn tick(&mut self, now_ms: u64) {
        self.door.expire_motion(now_ms, &mut self.observer);
        if let Err(e) = self.sec2_reader.expire(now_ms) {
            debug!("Dropped partial frame: {:?}", e);
        }
        if let Err(e) = self.sec1_reader.expire(now_ms) {
            debug!("Dropped partial record: {:?}", e);
        }
    }

    /// Next instant at which [`Comms::service`] has work to do
    pub fn next_wake(&self, now_ms: u64) -> Option<u64> {
        let send = if self.queue.is_empty() {
            None
        } else {
            self.arbiter.ready_at(now_ms)
        };
        let reader = match self.config.security_type {
            SecurityType::Sec2 => self.sec2_reader.deadline(),
            SecurityType::Sec1 => self.sec1_reader.deadline(),
        }
        .map(|deadline| deadline + 1);

        [send, self.door.motion_deadline(), reader].into_iter().flatten().min()
    }

    fn encode(&self, packet: &Packet) -> Result<Vec<u8, FRAME_LEN>, Error> {
        match self.config.security_type {
            SecurityType::Sec2 => {
                let frame = Message::new(*packet, self.keeper.rolling(), self.keeper.id_code()).encode()?;
                Vec::from_slice(&frame).map_err(|_| Error::EncodingRange)
            }
            SecurityType::Sec1 => {
                let press = ButtonPress::from_packet(packet).ok_or(Error::EncodingRange)?;
                Vec::from_slice(&[press.to_byte()]).map_err(|_| Error::EncodingRange)
            }
        }
    }

    /// Send the packet at the queue front if the bus allows it
    ///
    /// Returns the packet that went out, `None` when nothing was due. A
    /// packet that cannot be encoded is dropped; one that collides stays at
    /// the front for the next attempt.
    pub async fn transmit_next<B: Bus>(&mut self, bus: &mut B, now_ms: u64) -> Result<Option<Packet>, Error> {
        let Some(action) = self.queue.front().copied() else {
            return Ok(None);
        };
        if !self.arbiter.can_transmit(now_ms) {
            return Ok(None);
        }

        let frame = match self.encode(&action.packet) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping unencodable {:?}", action.packet);
                self.queue.pop_front();
                return Err(e);
            }
        };

        if let Err(e) = self
            .arbiter
            .transmit(bus, &frame, now_ms, action.post_delay_ms)
            .await
        {
            warn!("Transmit of {} failed: {:?}, will retry", command_name(action.packet.command()), e);
            return Err(e);
        }

        self.queue.pop_front();
        // Only a Security+ 1.0 press toggles; its releases change nothing
        if let Packet::Light(light) = action.packet {
            if light.pressed || self.config.security_type == SecurityType::Sec2 {
                self.light_unconfirmed = true;
            }
        }
        match self.config.security_type {
            SecurityType::Sec2 => {
                info!(
                    "TX {} rolling {}",
                    command_name(action.packet.command()),
                    self.keeper.rolling()
                );
                if action.inc {
                    self.keeper.increment();
                }
            }
            SecurityType::Sec1 => info!("TX byte {:#x}", frame[0]),
        }
        Ok(Some(action.packet))
    }

    /// Persist dirty state and deliver deferred restart requests
    pub async fn flush(&mut self) -> Result<(), Error> {
        let mut result = Ok(());

        if self.pending.reset {
            self.pending = Pending::default();
            for key in RESET_KEYS {
                match self.storage.remove(key).await {
                    Ok(()) | Err(FlashError::NotFound) => {}
                    Err(e) => {
                        error!("Failed to clear {:?}: {:?}", key, e);
                        result = Err(e.into());
                    }
                }
            }
            self.observer.request_restart(RestartReason::Reset);
            return result;
        }

        if self.pending.has_motion {
            self.pending.has_motion = false;
            if let Err(e) = self.storage.write(StorageKey::HasMotion, &[1]).await {
                error!("Failed to store motion flag: {:?}", e);
                result = Err(e.into());
            }
        }

        let forced = core::mem::take(&mut self.pending.save);
        if self.config.security_type == SecurityType::Sec2 && (forced || self.keeper.needs_save()) {
            if let Err(e) = self.keeper.save(&mut self.storage).await {
                result = Err(e.into());
            }
        }

        if let Some(reason) = self.pending.restart.take() {
            info!("Requesting restart: {:?}", reason);
            self.observer.request_restart(reason);
        }

        result
    }

    /// One pass of the event loop after an event at `now_ms`
    pub async fn service<B: Bus>(&mut self, bus: &mut B, now_ms: u64) {
        self.tick(now_ms);
        // Failures are logged where they happen and retried or dropped
        let _ = self.transmit_next(bus, now_ms).await;
        let _ = self.flush().await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::observer::Notification;
    use crate::testing::{FakeBus, MemoryStorage, RecordingObserver};
    use embassy_futures::block_on;
    use portcullis_protocol::{DoorAction, DoorActionData, LightData, LightState, LockData, LockState};

    pub(crate) type TestComms = Comms<MemoryStorage, RecordingObserver>;

    pub(crate) const CONSOLE_ID: u32 = 0x0033_3539;

    pub(crate) fn engine(config: CoreConfig, storage: MemoryStorage) -> TestComms {
        let mut comms = Comms::new(config, storage, RecordingObserver::default());
        block_on(comms.start(0x123, 0)).unwrap();
        comms
    }

    pub(crate) fn sec2() -> TestComms {
        engine(CoreConfig::default(), MemoryStorage::new())
    }

    /// Deliver a packet as if the opener or console sent it
    pub(crate) fn receive(comms: &mut TestComms, packet: Packet, now_ms: u64) {
        let frame = Message::new(packet, 100, CONSOLE_ID).encode().unwrap();
        for byte in frame {
            comms.on_byte(byte, now_ms);
        }
    }

    pub(crate) fn status(door: DoorState, light: bool, lock: bool) -> Packet {
        Packet::Status(StatusData {
            door,
            light,
            lock,
            obstructed: false,
            learn: false,
        })
    }

    /// Send everything queued, stepping time forward as the bus allows
    pub(crate) fn drain(comms: &mut TestComms, bus: &mut FakeBus, mut now_ms: u64) -> u64 {
        while comms.queued() > 0 {
            match comms.next_wake(now_ms) {
                Some(at) if at > now_ms => now_ms = at,
                _ => {}
            }
            block_on(comms.transmit_next(bus, now_ms)).unwrap();
        }
        block_on(comms.flush()).unwrap();
        now_ms
    }

    #[test]
    fn test_cold_boot_sync() {
        let mut comms = sec2();
        let mut bus = FakeBus::new();
        assert_eq!(comms.storage().get_u32(StorageKey::IdCode), Some(0x124539));
        assert_eq!(comms.queued(), 2);

        drain(&mut comms, &mut bus, 0);
        let sent = bus.messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].packet, Packet::GetOpenings);
        assert_eq!(sent[0].rolling, 0);
        assert_eq!(sent[1].packet, Packet::GetStatus);
        assert_eq!(sent[1].rolling, 1);
        assert!(sent.iter().all(|m| m.remote_id == 0x124539));
        assert_eq!(comms.keeper().rolling(), 2);

        receive(&mut comms, status(DoorState::Closed, false, false), 100);
        let door = comms.door();
        assert!(door.active);
        assert_eq!(door.current_state, DoorState::Closed);
        assert_eq!(door.target_state, DoorState::Closed);
        assert!(comms.observer().contains(Notification::Active));
        assert!(comms
            .observer()
            .contains(Notification::CurrentDoorState(DoorState::Closed)));
    }

    #[test]
    fn test_warm_boot_counter() {
        let mut storage = MemoryStorage::new();
        storage.set_u32(StorageKey::IdCode, 0x0045_6539);
        storage.set_u32(StorageKey::RollingCode, 57);
        let mut comms = engine(CoreConfig::default(), storage);
        let mut bus = FakeBus::new();

        assert_eq!(comms.keeper().rolling(), 67);
        assert_eq!(comms.storage().get_u32(StorageKey::RollingCode), Some(67));

        block_on(comms.transmit_next(&mut bus, 0)).unwrap();
        assert_eq!(bus.messages()[0].rolling, 67);
        assert_eq!(bus.messages()[0].remote_id, 0x0045_6539);
        assert_eq!(comms.keeper().rolling(), 68);
    }

    #[test]
    fn test_collision_retry_keeps_order() {
        let mut comms = sec2();
        let mut bus = FakeBus::new();
        let now = drain(&mut comms, &mut bus, 0);
        receive(&mut comms, status(DoorState::Closed, false, false), now);
        bus.clear();

        let start = 1000;
        comms.open_door().unwrap();
        assert_eq!(comms.queued(), 3);
        let rolling = comms.keeper().rolling();

        bus.busy_samples.push_back(true).unwrap();
        assert_eq!(block_on(comms.transmit_next(&mut bus, start)), Err(Error::Collision));
        assert_eq!(comms.queued(), 3);
        assert_eq!(comms.keeper().rolling(), rolling);
        assert_eq!(block_on(comms.transmit_next(&mut bus, start + 10)), Ok(None));

        let press = block_on(comms.transmit_next(&mut bus, start + 20)).unwrap();
        assert!(matches!(
            press,
            Some(Packet::DoorAction(DoorActionData {
                action: DoorAction::Open,
                pressed: true,
                id: 1
            }))
        ));
        assert_eq!(comms.keeper().rolling(), rolling);

        // 22 ms on the wire plus the 250 ms hold
        assert_eq!(block_on(comms.transmit_next(&mut bus, start + 291)), Ok(None));
        let release = block_on(comms.transmit_next(&mut bus, start + 292)).unwrap();
        assert!(matches!(release, Some(Packet::DoorAction(DoorActionData { pressed: false, .. }))));
        assert_eq!(comms.keeper().rolling(), rolling + 1);

        assert_eq!(block_on(comms.transmit_next(&mut bus, start + 353)), Ok(None));
        let get = block_on(comms.transmit_next(&mut bus, start + 354)).unwrap();
        assert_eq!(get, Some(Packet::GetStatus));

        let rollings: Vec<u32, 4> = bus.messages().iter().map(|m| m.rolling).collect();
        assert_eq!(rollings.as_slice(), &[rolling, rolling, rolling + 1]);
    }

    #[test]
    fn test_unencodable_packet_is_dropped() {
        let mut comms = sec2();
        let mut bus = FakeBus::new();
        let now = drain(&mut comms, &mut bus, 0);
        let rolling = comms.keeper().rolling();

        comms
            .queue
            .push_all(&[PacketAction::new(
                Packet::Unknown {
                    command: 0x1000,
                    data: 0,
                },
                true,
                0,
            )])
            .unwrap();
        assert_eq!(
            block_on(comms.transmit_next(&mut bus, now + 100)),
            Err(Error::EncodingRange)
        );
        assert_eq!(comms.queued(), 0);
        assert_eq!(comms.keeper().rolling(), rolling);
    }

    #[test]
    fn test_status_updates_light_and_lock() {
        let mut comms = sec2();
        receive(&mut comms, status(DoorState::Open, true, true), 0);
        let door = comms.door();
        assert!(door.light);
        assert!(door.current_lock);
        assert!(door.target_lock);
        let obs = comms.observer();
        assert!(obs.contains(Notification::Light(true)));
        assert!(obs.contains(Notification::CurrentLock(true)));
        assert!(obs.contains(Notification::TargetLock(true)));
    }

    #[test]
    fn test_latest_status_wins() {
        let mut comms = sec2();
        receive(&mut comms, status(DoorState::Closed, false, false), 0);
        comms.open_door().unwrap();
        receive(&mut comms, status(DoorState::Opening, false, false), 100);
        comms.close_door().unwrap();
        receive(&mut comms, status(DoorState::Stopped, false, false), 200);
        assert_eq!(comms.door().current_state, DoorState::Stopped);
        assert_eq!(comms.door().target_state, DoorState::Open);
    }

    #[test]
    fn test_console_lock_packet() {
        let mut config = CoreConfig::default();
        config.motion_triggers.set(MotionTrigger::LockKey, true);
        let mut comms = engine(config, MemoryStorage::new());
        let mut bus = FakeBus::new();
        drain(&mut comms, &mut bus, 0);

        receive(
            &mut comms,
            Packet::Lock(LockData {
                state: LockState::Toggle,
                pressed: true,
            }),
            500,
        );
        assert!(comms.door().target_lock);
        assert!(!comms.door().current_lock);
        assert!(comms.observer().contains(Notification::TargetLock(true)));
        assert!(comms.observer().contains(Notification::Motion(true)));
        assert_eq!(comms.queued(), 1);
    }

    #[test]
    fn test_console_light_packet() {
        let mut comms = sec2();
        let mut bus = FakeBus::new();
        drain(&mut comms, &mut bus, 0);

        receive(
            &mut comms,
            Packet::Light(LightData {
                state: LightState::Toggle2,
                pressed: true,
            }),
            500,
        );
        assert!(comms.door().light);
        assert!(comms.observer().contains(Notification::Light(true)));
        // Light key is not a motion trigger by default
        assert!(!comms.observer().contains(Notification::Motion(true)));
        assert_eq!(comms.queued(), 1);
    }

    #[test]
    fn test_motion_auto_clear_and_discovery() {
        let mut comms = sec2();
        let mut bus = FakeBus::new();
        drain(&mut comms, &mut bus, 0);
        comms.observer_mut().clear();

        receive(&mut comms, Packet::Motion, 1000);
        assert!(comms.door().motion);
        assert!(comms.door().has_motion_sensor);
        assert!(comms.observer().contains(Notification::MotionSensorDiscovered {
            reboot_required: true
        }));
        assert_eq!(comms.queued(), 1);

        block_on(comms.flush()).unwrap();
        assert_eq!(comms.storage().get(StorageKey::HasMotion), Some(&[1u8][..]));

        comms.tick(5999);
        assert!(comms.door().motion);
        comms.tick(6000);
        assert!(!comms.door().motion);
        assert!(comms.observer().contains(Notification::Motion(false)));

        // Known after a reboot
        let storage = comms.into_storage();
        let comms = engine(CoreConfig::default(), storage);
        assert!(comms.door().has_motion_sensor);
        assert!(comms.config().motion_triggers.contains(MotionTrigger::Motion));
    }

    #[test]
    fn test_second_motion_sensor_report_is_quiet() {
        let mut config = CoreConfig::default();
        config.motion_triggers.set(MotionTrigger::DoorKey, true);
        let mut comms = engine(config, MemoryStorage::new());
        receive(&mut comms, Packet::Motion, 0);
        assert!(comms.observer().contains(Notification::MotionSensorDiscovered {
            reboot_required: false
        }));
        receive(&mut comms, Packet::Motion, 100);
        assert_eq!(
            comms
                .observer()
                .seen
                .iter()
                .filter(|n| matches!(n, Notification::MotionSensorDiscovered { .. }))
                .count(),
            1
        );
        assert_eq!(comms.door().motion_deadline(), Some(5100));
    }

    #[test]
    fn test_obstruction_raises_motion_when_enabled() {
        let mut config = CoreConfig::default();
        config.motion_triggers.set(MotionTrigger::Obstruction, true);
        let mut comms = engine(config, MemoryStorage::new());

        comms.on_obstruction(true, 100);
        assert!(comms.door().obstructed);
        assert!(comms.observer().contains(Notification::Obstruction(true)));
        assert!(comms.door().motion);

        comms.on_obstruction(false, 200);
        assert!(comms.observer().contains(Notification::Obstruction(false)));
        assert!(!comms.door().has_motion_sensor);
    }

    #[test]
    fn test_partial_frame_expires() {
        let mut comms = sec2();
        let frame = Message::new(Packet::GetStatus, 1, CONSOLE_ID).encode().unwrap();
        for &byte in &frame[..8] {
            comms.on_byte(byte, 50);
        }
        assert_eq!(comms.next_wake(50), Some(0));
        let mut bus = FakeBus::new();
        drain(&mut comms, &mut bus, 0);
        assert_eq!(comms.next_wake(60), Some(151));
        comms.tick(151);
        assert_eq!(comms.next_wake(151), None);
    }

    #[test]
    fn test_manual_recovery_restarts_into_setup() {
        let mut comms = sec2();
        let mut bus = FakeBus::new();
        let now = drain(&mut comms, &mut bus, 0);
        let press = Packet::DoorAction(DoorActionData {
            action: DoorAction::Toggle,
            pressed: true,
            id: 2,
        });

        for i in 0..5 {
            receive(&mut comms, press, now + i * 500);
        }
        assert_eq!(comms.ttc().action(), Some(TtcAction::Restart(RestartReason::SoftAp)));

        for _ in 0..RECOVERY_GRACE_TICKS - 1 {
            comms.ttc_tick().unwrap();
            let flipped = !comms.door().light;
            receive(&mut comms, status(DoorState::Closed, flipped, false), now + 3000);
            drain(&mut comms, &mut bus, now + 3000);
        }
        let writes = comms.storage().writes;
        assert!(!comms
            .observer()
            .contains(Notification::RestartRequested(RestartReason::SoftAp)));

        comms.ttc_tick().unwrap();
        block_on(comms.flush()).unwrap();
        assert!(comms
            .observer()
            .contains(Notification::RestartRequested(RestartReason::SoftAp)));
        assert_eq!(comms.storage().writes, writes + 1);
        assert_eq!(
            comms.storage().get_u32(StorageKey::RollingCode),
            Some(comms.keeper().rolling())
        );
    }

    #[test]
    fn test_counter_saved_every_ten_codes() {
        let mut comms = sec2();
        let mut bus = FakeBus::new();
        let mut now = drain(&mut comms, &mut bus, 0);
        receive(&mut comms, status(DoorState::Closed, false, false), now);

        for _ in 0..5 {
            comms.send_get_status().unwrap();
            now = drain(&mut comms, &mut bus, now + 100);
        }
        assert_eq!(comms.keeper().rolling(), 7);
        assert_eq!(comms.storage().get_u32(StorageKey::RollingCode), Some(0));

        for _ in 0..3 {
            comms.send_get_status().unwrap();
            now = drain(&mut comms, &mut bus, now + 100);
        }
        assert_eq!(comms.keeper().rolling(), 10);
        assert_eq!(comms.storage().get_u32(StorageKey::RollingCode), Some(10));
    }

    #[test]
    fn test_persistence_failure_is_not_fatal() {
        let mut storage = MemoryStorage::new();
        storage.fail_writes(true);
        let mut comms = Comms::new(CoreConfig::default(), storage, RecordingObserver::default());
        assert!(matches!(
            block_on(comms.start(7, 0)),
            Err(Error::Persistence(FlashError::Storage))
        ));
        assert_eq!(comms.queued(), 2);

        let mut bus = FakeBus::new();
        drain(&mut comms, &mut bus, 0);
        assert_eq!(bus.messages().len(), 2);
    }

    #[test]
    fn test_sec1_status_records() {
        let mut config = CoreConfig::default();
        config.security_type = SecurityType::Sec1;
        let mut comms = engine(config, MemoryStorage::new());
        assert_eq!(comms.queued(), 0);
        assert_eq!(comms.keeper().id_code(), 0);

        // Console poll followed by the opener reply
        for (t, byte) in [(0, 0x38), (5, 0x55)] {
            comms.on_byte(byte, t);
        }
        // Debounced: one report is not enough
        assert_eq!(comms.door().current_state, DoorState::Unknown);
        for (t, byte) in [(100, 0x38), (105, 0x55)] {
            comms.on_byte(byte, t);
        }
        assert_eq!(comms.door().current_state, DoorState::Closed);

        for (t, byte) in [(200, 0x3a), (205, 0x54)] {
            comms.on_byte(byte, t);
        }
        assert!(comms.door().light);
        assert!(comms.door().current_lock);
    }

    #[test]
    fn test_sec1_without_debounce() {
        let mut config = CoreConfig::default();
        config.security_type = SecurityType::Sec1;
        config.sec1_door_debounce = false;
        let mut comms = engine(config, MemoryStorage::new());
        comms.on_byte(0x38, 0);
        comms.on_byte(0x52, 1);
        assert_eq!(comms.door().current_state, DoorState::Open);
    }

    #[test]
    fn test_sec1_console_buttons() {
        let mut config = CoreConfig::default();
        config.security_type = SecurityType::Sec1;
        config.motion_triggers.set(MotionTrigger::LightKey, true);
        let mut comms = engine(config, MemoryStorage::new());

        comms.on_byte(0x30, 0);
        assert_eq!(comms.recovery.presses(), 1);
        assert!(!comms.door().motion);
        comms.on_byte(0x32, 10);
        assert!(comms.door().motion);
    }
}

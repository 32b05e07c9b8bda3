//! Security+ 1.0 byte vocabulary
//!
//! The wall console polls the opener with one-byte requests and the opener
//! answers with one status byte, so a status record on the wire is the
//! pair `(key, value)`. Button presses are single bytes.
//!
//! | Byte      | Meaning                |
//! |-----------|------------------------|
//! | 0x30/0x31 | Door press / release   |
//! | 0x32/0x33 | Light press / release  |
//! | 0x34/0x35 | Lock press / release   |
//! | 0x38 v    | Door status            |
//! | 0x39 v    | Obstruction status     |
//! | 0x3A v    | Light and lock status  |

use crate::packet::{DoorState, Packet};

/// Key of the door status record
pub const KEY_DOOR_STATUS: u8 = 0x38;
/// Key of the obstruction status record
pub const KEY_OBSTRUCTION_STATUS: u8 = 0x39;
/// Key of the light/lock status record
pub const KEY_LIGHT_LOCK_STATUS: u8 = 0x3a;

/// Silence after which a half-received status record is dropped
pub const RECORD_TIMEOUT_MS: u64 = 100;

/// Security+ 1.0 decode errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sec1Error {
    /// Byte outside the protocol vocabulary
    Noise,
    /// Status value failed its sanity check
    InvalidStatus,
    /// Status record abandoned half way
    Timeout,
}

/// A button edge on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ButtonPress {
    DoorPress = 0x30,
    DoorRelease = 0x31,
    LightPress = 0x32,
    LightRelease = 0x33,
    LockPress = 0x34,
    LockRelease = 0x35,
}

impl ButtonPress {
    /// Wire byte for this button edge
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Parse a wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x30 => Some(ButtonPress::DoorPress),
            0x31 => Some(ButtonPress::DoorRelease),
            0x32 => Some(ButtonPress::LightPress),
            0x33 => Some(ButtonPress::LightRelease),
            0x34 => Some(ButtonPress::LockPress),
            0x35 => Some(ButtonPress::LockRelease),
            _ => None,
        }
    }

    /// The button edge that emulates a typed packet, if any
    pub fn from_packet(packet: &Packet) -> Option<Self> {
        match packet {
            Packet::DoorAction(a) if a.pressed => Some(ButtonPress::DoorPress),
            Packet::DoorAction(_) => Some(ButtonPress::DoorRelease),
            Packet::Light(l) if l.pressed => Some(ButtonPress::LightPress),
            Packet::Light(_) => Some(ButtonPress::LightRelease),
            Packet::Lock(l) if l.pressed => Some(ButtonPress::LockPress),
            Packet::Lock(_) => Some(ButtonPress::LockRelease),
            _ => None,
        }
    }

    /// True for the press half of a press/release pair
    pub fn is_press(self) -> bool {
        matches!(
            self,
            ButtonPress::DoorPress | ButtonPress::LightPress | ButtonPress::LockPress
        )
    }
}

/// Decoded status reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sec1Status {
    Door(DoorState),
    /// Raw obstruction byte
    Obstruction(u8),
    LightLock { light: bool, lock: bool },
}

impl Sec1Status {
    /// Decode a `(key, value)` status pair
    pub fn decode(key: u8, value: u8) -> Result<Self, Sec1Error> {
        match key {
            KEY_DOOR_STATUS => {
                if !matches!(value >> 4, 0x0 | 0x5 | 0xb) {
                    return Err(Sec1Error::InvalidStatus);
                }
                let door = match value & 0x07 {
                    0 | 6 => DoorState::Stopped,
                    1 => DoorState::Opening,
                    2 => DoorState::Open,
                    4 => DoorState::Closing,
                    5 => DoorState::Closed,
                    _ => DoorState::Unknown,
                };
                Ok(Sec1Status::Door(door))
            }
            KEY_OBSTRUCTION_STATUS => Ok(Sec1Status::Obstruction(value)),
            KEY_LIGHT_LOCK_STATUS => {
                if value >> 4 != 0x5 {
                    return Err(Sec1Error::InvalidStatus);
                }
                Ok(Sec1Status::LightLock {
                    light: value & 0x04 != 0,
                    lock: value & 0x08 == 0,
                })
            }
            _ => Err(Sec1Error::Noise),
        }
    }
}

/// A complete record read from the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sec1Record {
    Button(ButtonPress),
    /// Single-byte record with no known meaning (0x36, 0x37)
    Other(u8),
    Status(Sec1Status),
}

/// Incremental record reader
#[derive(Debug, Clone, Default)]
pub struct Sec1Reader {
    pending_key: Option<u8>,
    last_byte_ms: u64,
}

impl Sec1Reader {
    /// Create a new reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline after which a pending status key expires
    pub fn deadline(&self) -> Option<u64> {
        self.pending_key.map(|_| self.last_byte_ms + RECORD_TIMEOUT_MS)
    }

    /// Drop a pending status key whose timeout has passed
    pub fn expire(&mut self, now_ms: u64) -> Result<(), Sec1Error> {
        match self.deadline() {
            Some(deadline) if now_ms > deadline => {
                self.pending_key = None;
                Err(Sec1Error::Timeout)
            }
            _ => Ok(()),
        }
    }

    /// Feed a single byte received at `now_ms`
    pub fn feed(&mut self, byte: u8, now_ms: u64) -> Result<Option<Sec1Record>, Sec1Error> {
        // An expired key is simply dropped; this byte starts a new record
        let _ = self.expire(now_ms);
        self.last_byte_ms = now_ms;

        if let Some(key) = self.pending_key.take() {
            return Sec1Status::decode(key, byte).map(|s| Some(Sec1Record::Status(s)));
        }

        match byte {
            0x30..=0x37 => Ok(Some(
                ButtonPress::from_byte(byte).map_or(Sec1Record::Other(byte), Sec1Record::Button),
            )),
            KEY_DOOR_STATUS..=KEY_LIGHT_LOCK_STATUS => {
                self.pending_key = Some(byte);
                Ok(None)
            }
            _ => Err(Sec1Error::Noise),
        }
    }
}

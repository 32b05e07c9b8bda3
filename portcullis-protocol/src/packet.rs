//! Typed Security+ packets
//!
//! A packet is a command opcode plus a 32-bit data word. The opcode is
//! 12 bits wide: its high nibble travels in the fixed value, its low byte
//! in the low byte of the data word. The rest of the data word carries the
//! payload:
//!
//! ```text
//!  31      24 23      16 15  12 11   8 7        0
//! ┌──────────┬──────────┬──────┬──────┬──────────┐
//! │  byte 2  │  byte 1  │parity│ value│ cmd low  │
//! └──────────┴──────────┴──────┴──────┴──────────┘
//! ```

/// Opcode: request a status reply
pub const CMD_GET_STATUS: u16 = 0x080;
/// Opcode: status reply from the opener
pub const CMD_STATUS: u16 = 0x081;
/// Opcode: lock command
pub const CMD_LOCK: u16 = 0x18c;
/// Opcode: door button
pub const CMD_DOOR_ACTION: u16 = 0x280;
/// Opcode: light command
pub const CMD_LIGHT: u16 = 0x281;
/// Opcode: motion detected
pub const CMD_MOTION: u16 = 0x285;
/// Opcode: request the openings counter
pub const CMD_GET_OPENINGS: u16 = 0x48b;

/// Bits of the data word that belong to the payload
pub const PAYLOAD_MASK: u32 = 0xffff_0f00;

/// Human-readable name for an opcode, for logging
pub fn command_name(command: u16) -> &'static str {
    match command {
        CMD_GET_STATUS => "GET_STATUS",
        CMD_STATUS => "STATUS",
        0x084 => "OBST_1",
        0x085 => "OBST_2",
        0x0a0 => "PAIR_3",
        0x0a1 => "PAIR_3_RESP",
        0x181 => "LEARN_2",
        CMD_LOCK => "LOCK",
        CMD_DOOR_ACTION => "DOOR_ACTION",
        CMD_LIGHT => "LIGHT",
        0x284 => "MOTOR_ON",
        CMD_MOTION => "MOTION",
        0x391 => "LEARN_1",
        0x392 => "PING",
        0x393 => "PING_RESP",
        0x400 => "PAIR_2",
        0x401 => "PAIR_2_RESP",
        0x402 => "SET_TTC",
        0x408 => "CANCEL_TTC",
        0x40a => "TTC",
        CMD_GET_OPENINGS => "GET_OPENINGS",
        0x48c => "OPENINGS",
        _ => "UNKNOWN",
    }
}

/// Door position as reported by the opener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DoorState {
    #[default]
    Unknown = 0,
    Open = 1,
    Closed = 2,
    Stopped = 3,
    Opening = 4,
    Closing = 5,
}

impl DoorState {
    /// Map a wire value; anything out of range reads as `Unknown`
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => DoorState::Open,
            2 => DoorState::Closed,
            3 => DoorState::Stopped,
            4 => DoorState::Opening,
            5 => DoorState::Closing,
            _ => DoorState::Unknown,
        }
    }

    /// The position the door is heading for, `None` while unknown
    ///
    /// A stopped door counts as heading open: the next button press
    /// reverses it upward.
    pub fn target(self) -> Option<DoorState> {
        match self {
            DoorState::Open | DoorState::Opening | DoorState::Stopped => Some(DoorState::Open),
            DoorState::Closed | DoorState::Closing => Some(DoorState::Closed),
            DoorState::Unknown => None,
        }
    }
}

/// Door button action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DoorAction {
    Close = 0,
    Open = 1,
    Toggle = 2,
    Stop = 3,
}

impl DoorAction {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DoorAction::Close),
            1 => Some(DoorAction::Open),
            2 => Some(DoorAction::Toggle),
            3 => Some(DoorAction::Stop),
            _ => None,
        }
    }
}

/// Light command value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LightState {
    Off = 0,
    On = 1,
    Toggle = 2,
    Toggle2 = 3,
}

impl LightState {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(LightState::Off),
            1 => Some(LightState::On),
            2 => Some(LightState::Toggle),
            3 => Some(LightState::Toggle2),
            _ => None,
        }
    }

    /// Apply this command to a current light level
    pub fn apply(self, on: bool) -> bool {
        match self {
            LightState::Off => false,
            LightState::On => true,
            LightState::Toggle | LightState::Toggle2 => !on,
        }
    }
}

impl From<bool> for LightState {
    fn from(on: bool) -> Self {
        if on {
            LightState::On
        } else {
            LightState::Off
        }
    }
}

/// Lock command value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LockState {
    Off = 0,
    On = 1,
    Toggle = 2,
}

impl LockState {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(LockState::Off),
            1 => Some(LockState::On),
            2 => Some(LockState::Toggle),
            _ => None,
        }
    }

    /// Apply this command to a current lock state
    pub fn apply(self, locked: bool) -> bool {
        match self {
            LockState::Off => false,
            LockState::On => true,
            LockState::Toggle => !locked,
        }
    }
}

impl From<bool> for LockState {
    fn from(locked: bool) -> Self {
        if locked {
            LockState::On
        } else {
            LockState::Off
        }
    }
}

/// Status reply payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusData {
    pub door: DoorState,
    pub light: bool,
    pub lock: bool,
    pub obstructed: bool,
    pub learn: bool,
}

/// Door button payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DoorActionData {
    pub action: DoorAction,
    pub pressed: bool,
    pub id: u8,
}

/// Light command payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LightData {
    pub state: LightState,
    pub pressed: bool,
}

/// Lock command payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LockData {
    pub state: LockState,
    pub pressed: bool,
}

/// A typed packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Packet {
    Status(StatusData),
    GetStatus,
    GetOpenings,
    DoorAction(DoorActionData),
    Light(LightData),
    Lock(LockData),
    Motion,
    /// Anything else, kept raw so it can be logged
    Unknown { command: u16, data: u32 },
}

const BIT_PRESSED: u32 = 16;
const BIT_OBSTRUCTED: u32 = 22;
const BIT_LOCK: u32 = 24;
const BIT_LIGHT: u32 = 25;
const BIT_LEARN: u32 = 29;

fn flag(data: u32, bit: u32) -> bool {
    data & (1 << bit) != 0
}

impl Packet {
    /// 12-bit opcode of this packet
    pub fn command(&self) -> u16 {
        match self {
            Packet::Status(_) => CMD_STATUS,
            Packet::GetStatus => CMD_GET_STATUS,
            Packet::GetOpenings => CMD_GET_OPENINGS,
            Packet::DoorAction(_) => CMD_DOOR_ACTION,
            Packet::Light(_) => CMD_LIGHT,
            Packet::Lock(_) => CMD_LOCK,
            Packet::Motion => CMD_MOTION,
            Packet::Unknown { command, .. } => *command,
        }
    }

    /// Payload bits of the data word (opcode byte and parity left clear)
    pub fn payload(&self) -> u32 {
        match self {
            Packet::Status(s) => {
                (s.door as u32) << 8
                    | (s.obstructed as u32) << BIT_OBSTRUCTED
                    | (s.lock as u32) << BIT_LOCK
                    | (s.light as u32) << BIT_LIGHT
                    | (s.learn as u32) << BIT_LEARN
            }
            Packet::DoorAction(a) => {
                (a.action as u32) << 8 | (a.pressed as u32) << BIT_PRESSED | (a.id as u32) << 24
            }
            Packet::Light(l) => (l.state as u32) << 8 | (l.pressed as u32) << BIT_PRESSED,
            Packet::Lock(l) => (l.state as u32) << 8 | (l.pressed as u32) << BIT_PRESSED,
            Packet::GetStatus | Packet::GetOpenings | Packet::Motion => 0,
            Packet::Unknown { data, .. } => *data,
        }
    }

    /// Build a packet from an opcode and a data word
    ///
    /// Values the typed payloads cannot represent fall back to `Unknown`.
    pub fn from_parts(command: u16, data: u32) -> Self {
        let value = ((data >> 8) & 0xf) as u8;
        let pressed = flag(data, BIT_PRESSED);
        let typed = match command {
            CMD_STATUS => Some(Packet::Status(StatusData {
                door: DoorState::from_u8(value),
                light: flag(data, BIT_LIGHT),
                lock: flag(data, BIT_LOCK),
                obstructed: flag(data, BIT_OBSTRUCTED),
                learn: flag(data, BIT_LEARN),
            })),
            CMD_GET_STATUS => Some(Packet::GetStatus),
            CMD_GET_OPENINGS => Some(Packet::GetOpenings),
            CMD_MOTION => Some(Packet::Motion),
            CMD_DOOR_ACTION => DoorAction::from_u8(value).map(|action| {
                Packet::DoorAction(DoorActionData {
                    action,
                    pressed,
                    id: (data >> 24) as u8,
                })
            }),
            CMD_LIGHT => LightState::from_u8(value).map(|state| Packet::Light(LightData { state, pressed })),
            CMD_LOCK => LockState::from_u8(value).map(|state| Packet::Lock(LockData { state, pressed })),
            _ => None,
        };
        typed.unwrap_or(Packet::Unknown {
            command,
            data: data & PAYLOAD_MASK,
        })
    }
}

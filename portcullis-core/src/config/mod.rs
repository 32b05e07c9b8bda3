//! Bridge configuration
//!
//! The configuration is stored in flash either as TOML text or as
//! postcard-serialized binary data. Both forms decode to [`CoreConfig`].

mod toml;

pub use toml::{parse_config, ParseError};

use portcullis_hal::{FlashError, UartConfig};
use serde::{Deserialize, Serialize};

/// Current binary config layout version
pub const CONFIG_VERSION: u8 = 1;

/// Largest postcard encoding of [`CoreConfig`]
pub const MAX_CONFIG_SIZE: usize = 32;

/// Default window for the manual recovery press sequence
pub const DEFAULT_FORCE_RECOVER_DELAY_MS: u32 = 3000;

/// Protocol generation spoken by the opener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityType {
    /// Security+ 1.0, 1200 baud single-byte protocol
    Sec1,
    /// Security+ 2.0, 9600 baud rolling-code frames
    #[default]
    Sec2,
}

impl SecurityType {
    /// Line settings for this protocol
    pub fn uart_config(self) -> UartConfig {
        match self {
            SecurityType::Sec1 => UartConfig::inverted_8n1(1200),
            SecurityType::Sec2 => UartConfig::inverted_8n1(9600),
        }
    }
}

/// Events that count as motion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MotionTrigger {
    /// Dedicated motion sensor on the bus
    Motion = 1 << 0,
    /// Obstruction beam interrupted
    Obstruction = 1 << 1,
    /// Light button on the wall console
    LightKey = 1 << 2,
    /// Door button on the wall console
    DoorKey = 1 << 3,
    /// Lock button on the wall console
    LockKey = 1 << 4,
}

/// Set of [`MotionTrigger`]s, stored as a bitfield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionTriggers(u8);

impl MotionTriggers {
    const ALL: u8 = 0x1f;

    /// No triggers
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from raw bits; unknown bits are dropped
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL)
    }

    /// Raw bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, trigger: MotionTrigger) -> bool {
        self.0 & trigger as u8 != 0
    }

    pub fn set(&mut self, trigger: MotionTrigger, enabled: bool) {
        if enabled {
            self.0 |= trigger as u8;
        } else {
            self.0 &= !(trigger as u8);
        }
    }

    /// True when `trigger` is the only one set
    pub fn only(self, trigger: MotionTrigger) -> bool {
        self.0 == trigger as u8
    }
}

/// Idle level of the activity LED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedIdle {
    /// LED off at rest, lit during activity
    #[default]
    Off,
    /// LED lit at rest, dark during activity
    On,
    /// LED never driven
    Disabled,
}

/// Complete bridge configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoreConfig {
    /// Binary layout version
    pub version: u8,
    pub security_type: SecurityType,
    /// Time-to-close warning in seconds, 0 closes immediately
    pub ttc_seconds: u8,
    pub motion_triggers: MotionTriggers,
    /// Require two identical Security+ 1.0 door reports before accepting one
    pub sec1_door_debounce: bool,
    /// Window in which five wall-console presses trigger recovery
    pub force_recover_delay_ms: u32,
    pub led_idle: LedIdle,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            security_type: SecurityType::Sec2,
            ttc_seconds: 0,
            motion_triggers: MotionTriggers::empty(),
            sec1_door_debounce: true,
            force_recover_delay_ms: DEFAULT_FORCE_RECOVER_DELAY_MS,
            led_idle: LedIdle::Off,
        }
    }
}

/// Configuration load/store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Flash operation failed
    Flash(FlashError),
    /// Binary decode failed
    Deserialize,
    /// Binary encode failed
    Serialize,
    /// TOML parsing failed
    TomlParse(ParseError),
    /// Invalid UTF-8 in TOML data
    InvalidUtf8,
    /// Binary config written by another layout version
    VersionMismatch,
}

impl From<FlashError> for ConfigError {
    fn from(e: FlashError) -> Self {
        ConfigError::Flash(e)
    }
}

impl From<ParseError> for ConfigError {
    fn from(e: ParseError) -> Self {
        ConfigError::TomlParse(e)
    }
}

impl CoreConfig {
    /// Decode the binary form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: CoreConfig = postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;
        if config.version != CONFIG_VERSION {
            warn!(
                "Config version mismatch: found {}, expected {}",
                config.version, CONFIG_VERSION
            );
            return Err(ConfigError::VersionMismatch);
        }
        Ok(config)
    }

    /// Encode the binary form into `buf`, returning the used length
    pub fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        postcard::to_slice(self, buf)
            .map(|used| used.len())
            .map_err(|_| ConfigError::Serialize)
    }

    /// Decode TOML text
    pub fn from_toml(bytes: &[u8]) -> Result<Self, ConfigError> {
        let text = core::str::from_utf8(bytes).map_err(|_| ConfigError::InvalidUtf8)?;
        Ok(parse_config(text)?)
    }
}

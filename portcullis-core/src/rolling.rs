//! Rolling-code keeper
//!
//! Owns the device id and the 28-bit rolling counter. The counter is saved
//! lazily, at most every [`SAVE_INTERVAL`] increments, and bumped by the
//! same amount on every boot so that it always restarts ahead of the last
//! value the opener accepted.

use portcullis_hal::flash::{read_u32, write_u32};
use portcullis_hal::{FlashError, FlashStorage, StorageKey};
use portcullis_protocol::ROLLING_MODULUS;

/// Increments between durable saves, and the boot-time bump
pub const SAVE_INTERVAL: u32 = 10;

/// Fixed low bits of every generated id
pub const ID_SUFFIX: u32 = 0x539;

const ROLLING_MASK: u32 = ROLLING_MODULUS - 1;

/// Step the counter forward, skipping 0, which marks a fresh counter
fn advance(rolling: u32, by: u32) -> u32 {
    match (rolling + by) & ROLLING_MASK {
        0 => 1,
        r => r,
    }
}

/// Device id and rolling counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RollingCodeKeeper {
    id_code: u32,
    rolling: u32,
    last_saved: u32,
}

impl RollingCodeKeeper {
    pub const fn new() -> Self {
        Self {
            id_code: 0,
            rolling: 0,
            last_saved: 0,
        }
    }

    /// Build an id from raw entropy: 12 random bits above [`ID_SUFFIX`]
    pub fn derive_id(entropy: u32) -> u32 {
        ((entropy % 0xfff) + 1) << 12 | ID_SUFFIX
    }

    pub fn id_code(&self) -> u32 {
        self.id_code
    }

    pub fn rolling(&self) -> u32 {
        self.rolling
    }

    pub fn last_saved(&self) -> u32 {
        self.last_saved
    }

    /// Load id and counter at boot
    ///
    /// A missing id is generated from `entropy` and stored. A non-zero
    /// counter is bumped by [`SAVE_INTERVAL`] and saved straight away.
    /// Storage failures leave the keeper usable in memory; the first one
    /// is returned after every step has been attempted.
    pub async fn restore<S: FlashStorage>(&mut self, storage: &mut S, entropy: u32) -> Result<(), FlashError> {
        let mut failure = None;

        let stored_id = read_u32(storage, StorageKey::IdCode).await.unwrap_or_else(|e| {
            error!("Failed to read id code: {:?}", e);
            failure.get_or_insert(e);
            None
        });
        self.id_code = match stored_id {
            Some(id) if id != 0 => id,
            _ => {
                let id = Self::derive_id(entropy);
                warn!("Id code not found, generated {:#x}", id);
                if let Err(e) = write_u32(storage, StorageKey::IdCode, id).await {
                    error!("Failed to store id code: {:?}", e);
                    failure.get_or_insert(e);
                }
                id
            }
        };

        let stored = read_u32(storage, StorageKey::RollingCode).await.unwrap_or_else(|e| {
            error!("Failed to read rolling code: {:?}", e);
            failure.get_or_insert(e);
            None
        });
        self.rolling = match stored.unwrap_or(0) & ROLLING_MASK {
            0 => 0,
            r => advance(r, SAVE_INTERVAL),
        };
        info!("Rolling code {} (stored {:?})", self.rolling, stored);

        if let Err(e) = self.save(storage).await {
            failure.get_or_insert(e);
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Advance the counter after a transmit that consumes a code
    pub fn increment(&mut self) {
        self.rolling = advance(self.rolling, 1);
    }

    /// True once [`SAVE_INTERVAL`] codes were used since the last save
    pub fn needs_save(&self) -> bool {
        self.rolling.wrapping_sub(self.last_saved) & ROLLING_MASK >= SAVE_INTERVAL
    }

    /// Persist the counter
    ///
    /// The save point advances even when the write fails so that a broken
    /// flash is not hammered on every transmit; the boot bump covers the gap.
    pub async fn save<S: FlashStorage>(&mut self, storage: &mut S) -> Result<(), FlashError> {
        let result = write_u32(storage, StorageKey::RollingCode, self.rolling).await;
        match result {
            Ok(()) => debug!("Saved rolling code {}", self.rolling),
            Err(e) => error!("Failed to save rolling code {}: {:?}", self.rolling, e),
        }
        self.last_saved = self.rolling;
        result
    }
}

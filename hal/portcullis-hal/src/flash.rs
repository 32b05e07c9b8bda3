//! Flash storage abstractions
//!
//! Provides traits for persistent key-value storage that can be implemented
//! by chip-specific HALs using their flash memory.

/// Storage keys for persisted bridge data
///
/// Each key holds one small record. The storage implementation handles
/// wear leveling and data integrity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StorageKey {
    /// Device fingerprint sent as the remote id (u32, little endian)
    IdCode = 0,
    /// Last saved rolling-code counter (u32, little endian)
    RollingCode = 1,
    /// Motion sensor seen on the bus (u8, 0 or 1)
    HasMotion = 2,
    /// Bridge configuration (binary postcard format)
    Config = 3,
    /// Bridge configuration as TOML text
    ConfigToml = 4,
}

impl StorageKey {
    /// Get the key as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create a key from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StorageKey::IdCode),
            1 => Some(StorageKey::RollingCode),
            2 => Some(StorageKey::HasMotion),
            3 => Some(StorageKey::Config),
            4 => Some(StorageKey::ConfigToml),
            _ => None,
        }
    }
}

/// Errors from flash storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Flash operation failed
    Flash,
    /// Storage operation failed
    Storage,
    /// Key not found
    NotFound,
    /// Buffer too small for the data
    BufferTooSmall,
    /// Data corrupted or invalid
    Corrupted,
    /// Storage is full
    Full,
}

/// Flash storage trait
///
/// Provides wear-leveled key-value storage. Writes must be crash
/// consistent: after power loss a key reads back either the old or the
/// new value, never a mix.
pub trait FlashStorage {
    /// Read a value by key into the provided buffer
    ///
    /// # Returns
    /// The number of bytes read, or `FlashError::NotFound` for a missing key.
    fn read(
        &mut self,
        key: StorageKey,
        buffer: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, FlashError>>;

    /// Write a value by key
    fn write(
        &mut self,
        key: StorageKey,
        data: &[u8],
    ) -> impl core::future::Future<Output = Result<(), FlashError>>;

    /// Remove a key so that later reads report `NotFound`
    fn remove(&mut self, key: StorageKey) -> impl core::future::Future<Output = Result<(), FlashError>>;

    /// Check if a key exists in storage
    fn exists(&mut self, key: StorageKey) -> impl core::future::Future<Output = bool>;

    /// Erase all stored data
    ///
    /// This erases the entire storage partition, configuration included.
    fn erase_all(&mut self) -> impl core::future::Future<Output = Result<(), FlashError>>;
}

/// Read a little-endian `u32` stored under `key`
///
/// Returns `Ok(None)` when the key has never been written.
pub async fn read_u32<S: FlashStorage>(storage: &mut S, key: StorageKey) -> Result<Option<u32>, FlashError> {
    let mut buf = [0u8; 4];
    match storage.read(key, &mut buf).await {
        Ok(4) => Ok(Some(u32::from_le_bytes(buf))),
        Ok(_) => Err(FlashError::Corrupted),
        Err(FlashError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Store a little-endian `u32` under `key`
pub async fn write_u32<S: FlashStorage>(storage: &mut S, key: StorageKey, value: u32) -> Result<(), FlashError> {
    storage.write(key, &value.to_le_bytes()).await
}

// Implement the sequential-storage Key trait when the feature is enabled
#[cfg(feature = "sequential-storage")]
impl sequential_storage::map::Key for StorageKey {
    fn serialize_into(
        &self,
        buffer: &mut [u8],
    ) -> Result<usize, sequential_storage::map::SerializationError> {
        if buffer.is_empty() {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        }
        buffer[0] = self.as_u8();
        Ok(1)
    }

    fn deserialize_from(
        buffer: &[u8],
    ) -> Result<(Self, usize), sequential_storage::map::SerializationError> {
        if buffer.is_empty() {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        }
        match StorageKey::from_u8(buffer[0]) {
            Some(key) => Ok((key, 1)),
            None => Err(sequential_storage::map::SerializationError::InvalidFormat),
        }
    }
}

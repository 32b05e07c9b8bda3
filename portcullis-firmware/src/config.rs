//! Configuration persistence
//!
//! Loads the bridge configuration from flash storage. TOML text takes
//! precedence over the binary postcard form; callers fall back to the
//! embedded defaults when neither is present.

use defmt::*;

use portcullis_core::config::{ConfigError, CoreConfig, MAX_CONFIG_SIZE};
use portcullis_hal::{FlashError, FlashStorage, StorageKey};

/// Maximum TOML config size
const MAX_TOML_SIZE: usize = 1024;

/// Configuration persistence manager
pub struct ConfigPersistence<'a, S: FlashStorage> {
    storage: &'a mut S,
}

impl<'a, S: FlashStorage> ConfigPersistence<'a, S> {
    pub fn new(storage: &'a mut S) -> Self {
        Self { storage }
    }

    /// Load configuration from flash
    ///
    /// Tries TOML first, then the binary postcard format.
    pub async fn load(&mut self) -> Result<CoreConfig, ConfigError> {
        info!("Loading configuration from flash...");

        match self.load_toml().await {
            Ok(config) => {
                info!("Loaded configuration from TOML");
                return Ok(config);
            }
            Err(ConfigError::Flash(FlashError::NotFound)) => {
                debug!("No TOML config found, trying binary format");
            }
            Err(e) => {
                warn!("Failed to load TOML config: {:?}, trying binary", e);
            }
        }

        self.load_binary().await
    }

    async fn load_toml(&mut self) -> Result<CoreConfig, ConfigError> {
        let mut buffer = [0u8; MAX_TOML_SIZE];
        let len = self.storage.read(StorageKey::ConfigToml, &mut buffer).await?;
        debug!("Read {} bytes of TOML from flash", len);

        let config = CoreConfig::from_toml(&buffer[..len])?;
        log_config_summary(&config);
        Ok(config)
    }

    async fn load_binary(&mut self) -> Result<CoreConfig, ConfigError> {
        let mut buffer = [0u8; MAX_CONFIG_SIZE];
        let len = self.storage.read(StorageKey::Config, &mut buffer).await?;
        debug!("Read {} bytes of binary config from flash", len);

        let config = CoreConfig::from_bytes(&buffer[..len])?;
        log_config_summary(&config);
        Ok(config)
    }
}

/// Parse the configuration compiled into the firmware
pub fn embedded_config(text: &str) -> CoreConfig {
    match CoreConfig::from_toml(text.as_bytes()) {
        Ok(config) => {
            info!("Parsed embedded configuration successfully");
            config
        }
        Err(e) => {
            // bridge.toml is validated by build.rs, so this is a parser mismatch
            error!("Failed to parse embedded config: {:?}", e);
            error!("Using built-in defaults");
            CoreConfig::default()
        }
    }
}

/// Log a summary of the loaded configuration
pub fn log_config_summary(config: &CoreConfig) {
    info!("  security type {:?}", config.security_type);
    info!("  time to close {} s", config.ttc_seconds);
    debug!("  motion triggers {:#x}", config.motion_triggers.bits());
    debug!("  recovery window {} ms", config.force_recover_delay_ms);
    debug!("  led idle {:?}", config.led_idle);
}

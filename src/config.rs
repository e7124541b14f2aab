//! Server configuration parameters.
//!
//! Everything the INFO and VERSION commands report about the server, plus
//! the knobs the server loop reads at startup. Loaded from a JSON file on
//! the service processor; `Default` gives a runnable FSP configuration.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::instruction::control::ServerMachineType;

/// Core server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    // --- INFO block ---
    /// Machine type reported in the INFO response.
    pub machine_type: ServerMachineType,
    /// JTAG TMS line mask.
    pub tms_mask: u32,
    /// JTAG TCK line mask.
    pub tck_mask: u32,
    /// JTAG TDI line mask.
    pub tdi_mask: u32,
    /// JTAG TDO line mask.
    pub tdo_mask: u32,
    /// Capability flags advertised to clients.
    pub info_flags: u32,

    // --- Server behaviour ---
    /// Accept more than one client connection at a time.
    pub multi_client: bool,
    /// Flight recorder ring capacity (entries).
    pub flight_recorder_capacity: usize,

    // --- VERSION response ---
    /// Component name → version number listing returned by VERSION.
    pub versions: BTreeMap<String, u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut versions = BTreeMap::new();
        versions.insert("server".to_owned(), 0x30);
        versions.insert("instruction".to_owned(), 0x04);

        Self {
            machine_type: ServerMachineType::Fsp,
            tms_mask: 0x0000_0001,
            tck_mask: 0x0000_0002,
            tdi_mask: 0x0000_0004,
            tdo_mask: 0x0000_0008,
            info_flags: 0,

            multi_client: false,
            flight_recorder_capacity: 128,

            versions,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|_| ConfigError::Io)?;
        let config: Self = serde_json::from_str(&text).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check the loaded values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flight_recorder_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "flight_recorder_capacity must be nonzero",
            ));
        }
        Ok(())
    }
}

/// Errors from configuration loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be read.
    Io,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

//! Session configuration.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::protocol::constants::{
    FREQ_DEFAULT, MAX_CAPTURE_PAIRS, MAX_CHUNK_PAIRS, USBIR_HID_INTERFACE, USBIR_PRODUCT_ID,
    USBIR_VENDOR_ID,
};

/// Configuration for an IR session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// USB vendor ID to match.
    pub vendor_id: u16,
    /// USB product ID to match.
    pub product_id: u16,
    /// HID interface carrying the IR command channel.
    pub interface: u8,
    /// Carrier frequency in Hz for capture and transmit.
    pub frequency: u32,
    /// Per-transfer timeout in milliseconds.
    pub timeout_ms: u64,
    /// Upper bound on read-chunk round trips for one capture read.
    pub max_read_rounds: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vendor_id: USBIR_VENDOR_ID,
            product_id: USBIR_PRODUCT_ID,
            interface: USBIR_HID_INTERFACE,
            frequency: FREQ_DEFAULT,
            timeout_ms: 1000,
            // A full capture buffer in 14-pair replies, plus the terminator.
            max_read_rounds: MAX_CAPTURE_PAIRS.div_ceil(MAX_CHUNK_PAIRS) + 1,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

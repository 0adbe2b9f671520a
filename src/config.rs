//! Portal settings.
//!
//! Every field has a default matching the deployed page, so an empty JSON
//! object (or no file at all) is a valid configuration.

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use alloy_primitives::address;

use crate::chain::Address;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortalConfig {
    /// Deployed referral contract.
    pub contract_address: Address,
    /// Number of levels listed when the contract has no `levelCount()`.
    pub level_count: u64,
    /// Gas hint sent with `register`.
    pub gas_limit: u64,
    pub notification_ms: u64,
    pub copy_feedback_ms: u64,
    pub balance_poll_secs: u64,
    /// Characters of the formatted balance shown in the header.
    pub balance_chars: usize,
    pub hash_preview_chars: usize,
    pub error_preview_chars: usize,
}

pub const DEFAULT_CONTRACT_ADDRESS: Address =
    address!("5FbDB2315678afecb367f032d93F642f64180aa3");

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS,
            level_count: 5,
            gas_limit: 200_000,
            notification_ms: 5_000,
            copy_feedback_ms: 2_000,
            balance_poll_secs: 15,
            balance_chars: 7,
            hash_preview_chars: 10,
            error_preview_chars: 80,
        }
    }
}

impl PortalConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: PortalConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gas_limit == 0 {
            return Err(ConfigError::Invalid("gas_limit must be > 0"));
        }
        if self.balance_poll_secs == 0 {
            return Err(ConfigError::Invalid("balance_poll_secs must be > 0"));
        }
        if self.contract_address.is_zero() {
            return Err(ConfigError::Invalid("contract_address must not be the zero address"));
        }
        Ok(())
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_ms)
    }

    pub fn copy_feedback_duration(&self) -> Duration {
        Duration::from_millis(self.copy_feedback_ms)
    }

    pub fn balance_poll_interval(&self) -> Duration {
        Duration::from_secs(self.balance_poll_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn default_contract_address_is_checksummed() {
        assert_eq!(
            DEFAULT_CONTRACT_ADDRESS.to_checksum(None),
            "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        );
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"gas_limit": 250000, "level_count": 7}}"#).unwrap();
        let config = PortalConfig::load(file.path()).unwrap();
        assert_eq!(
            config,
            PortalConfig {
                gas_limit: 250_000,
                level_count: 7,
                ..PortalConfig::default()
            }
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"gas": 1}}"#).unwrap();
        assert_matches!(
            PortalConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        );
    }

    #[test]
    fn zero_poll_interval_is_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"balance_poll_secs": 0}}"#).unwrap();
        assert_matches!(
            PortalConfig::load(file.path()),
            Err(ConfigError::Invalid(_))
        );
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            PortalConfig::load(&dir.path().join("absent.json")),
            Err(ConfigError::Io { .. })
        );
    }
}

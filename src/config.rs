//! Notary node configuration
//!
//! Loaded from a JSON file; every field has a default so a partial (or
//! missing) file is enough to start.

use crate::core::{FeePolicy, FeeRate, FixedFee, SizeEstimateFee, MIN_FEE};
use bitcoin::Network;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
}

/// How withdrawal fees are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeConfig {
    /// Constant fee per withdrawal
    Fixed { sat: u64 },
    /// Rate applied to the estimated transaction size
    PerByte { sat_per_byte: u64 },
}

impl Default for FeeConfig {
    fn default() -> Self {
        FeeConfig::Fixed { sat: MIN_FEE }
    }
}

impl FeeConfig {
    pub fn into_policy(self) -> Box<dyn FeePolicy> {
        match self {
            FeeConfig::Fixed { sat } => Box::new(FixedFee(sat)),
            FeeConfig::PerByte { sat_per_byte } => Box::new(SizeEstimateFee::new(
                FeeRate::from_sat_per_byte(sat_per_byte),
            )),
        }
    }
}

/// Notary node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotaryConfig {
    /// Bitcoin network addresses must belong to
    pub network: Network,
    /// Confirmations required before an output can be spent
    pub confidence_level: u32,
    /// Federation address receiving change
    pub change_address: Option<String>,
    pub fee: FeeConfig,
    /// This node's ledger account, used as writer of signature details
    pub notary_account_id: String,
    /// Paths are relative to the data directory unless absolute
    pub wallet_path: PathBuf,
    pub registry_path: PathBuf,
    pub ledger_dir: PathBuf,
    pub unsigned_path: PathBuf,
    /// Pending withdrawal requests per worker
    pub queue_capacity: usize,
}

impl Default for NotaryConfig {
    fn default() -> Self {
        Self {
            network: Network::Regtest,
            confidence_level: 6,
            change_address: None,
            fee: FeeConfig::default(),
            notary_account_id: "notary@notary".to_string(),
            wallet_path: PathBuf::from("wallet.json"),
            registry_path: PathBuf::from("registry.json"),
            ledger_dir: PathBuf::from("ledger"),
            unsigned_path: PathBuf::from("unsigned.json"),
            queue_capacity: 100,
        }
    }
}

impl NotaryConfig {
    /// Load from file, falling back to defaults if the file is absent
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Configured change address
    pub fn change_address(&self) -> Result<&str, ConfigError> {
        self.change_address
            .as_deref()
            .ok_or(ConfigError::Missing("change_address"))
    }

    /// Resolve a configured path against the data directory
    pub fn resolve(&self, data_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            data_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempdir().unwrap();
        let config = NotaryConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, NotaryConfig::default());
        assert_eq!(config.confidence_level, 6);
        assert_eq!(config.fee, FeeConfig::Fixed { sat: 1_000 });
        assert!(config.change_address().is_err());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"confidence_level": 3, "fee": {"type": "per_byte", "sat_per_byte": 2}}"#,
        )
        .unwrap();

        let config = NotaryConfig::load(&path).unwrap();
        assert_eq!(config.confidence_level, 3);
        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.fee.into_policy().fee(1, 2), 516);
    }

    #[test]
    fn test_save_load_and_resolve() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = NotaryConfig {
            change_address: Some("2Nchange".to_string()),
            notary_account_id: "notary_a@notary".to_string(),
            ..NotaryConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = NotaryConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.change_address().unwrap(), "2Nchange");

        let wallet = loaded.resolve(dir.path(), &loaded.wallet_path);
        assert_eq!(wallet, dir.path().join("wallet.json"));
        let absolute = dir.path().join("elsewhere.json");
        assert_eq!(loaded.resolve(Path::new("/data"), &absolute), absolute);
    }
}

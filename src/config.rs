//! Treasury configuration
//!
//! Stored as `config.json` in the data directory by `treasury init`.

use crate::permit::{FeePolicy, FeeRate, MAX_BASIS_POINTS};
use crate::token::{TokenError, TokenMetadata};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

/// Default chain identifier (local development chain)
pub const DEFAULT_CHAIN_ID: u64 = 1337;

/// Default relay API port
pub const DEFAULT_API_PORT: u16 = 3000;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid token settings: {0}")]
    InvalidToken(#[from] TokenError),
    #[error("Invalid fee rate: {0} basis points (at most 10000)")]
    InvalidFeeRate(u16),
    #[error("Chain id must be non-zero")]
    InvalidChainId,
    #[error("A charging fee policy needs a non-zero collector")]
    MissingFeeCollector,
}

/// Top-level settings of a treasury deployment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreasuryConfig {
    /// Chain identifier bound into every permit
    pub chain_id: u64,
    /// Token deployed at init
    pub token: TokenMetadata,
    /// Protocol fee applied by fee-carrying relays
    pub fee: FeePolicy,
    /// Port of the relay API
    pub api_port: u16,
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            token: TokenMetadata {
                name: "Treasury Token".to_string(),
                symbol: "TRS".to_string(),
                decimals: 18,
                supply_cap: 10u128.pow(29),
            },
            fee: FeePolicy::none(),
            api_port: DEFAULT_API_PORT,
        }
    }
}

impl TreasuryConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config: TreasuryConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let file = fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id == 0 {
            return Err(ConfigError::InvalidChainId);
        }

        TokenMetadata::new(
            self.token.name.clone(),
            self.token.symbol.clone(),
            self.token.decimals,
            self.token.supply_cap,
        )?;

        if let FeeRate::BasisPoints(bps) = self.fee.rate {
            if bps > MAX_BASIS_POINTS {
                return Err(ConfigError::InvalidFeeRate(bps));
            }
        }
        if !self.fee.is_valid() {
            return Err(ConfigError::MissingFeeCollector);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Address;

    #[test]
    fn test_default_is_valid() {
        TreasuryConfig::default().validate().unwrap();
    }

    #[test]
    fn test_save_load_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");

        let config = TreasuryConfig {
            chain_id: 5,
            fee: FeePolicy::new(FeeRate::BasisPoints(30), Address::new([9; 20])),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = TreasuryConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validation() {
        let bad_fee = TreasuryConfig {
            fee: FeePolicy::new(FeeRate::BasisPoints(10_001), Address::new([9; 20])),
            ..Default::default()
        };
        assert!(matches!(
            bad_fee.validate(),
            Err(ConfigError::InvalidFeeRate(10_001))
        ));

        let mut bad_token = TreasuryConfig::default();
        bad_token.token.symbol = String::new();
        assert!(matches!(
            bad_token.validate(),
            Err(ConfigError::InvalidToken(TokenError::InvalidSymbol))
        ));

        let bad_chain = TreasuryConfig {
            chain_id: 0,
            ..Default::default()
        };
        assert!(matches!(bad_chain.validate(), Err(ConfigError::InvalidChainId)));

        let no_collector = TreasuryConfig {
            fee: FeePolicy::new(FeeRate::BasisPoints(30), Address::ZERO),
            ..Default::default()
        };
        assert!(matches!(
            no_collector.validate(),
            Err(ConfigError::MissingFeeCollector)
        ));
    }
}

//! Federation configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use surety_pool::UnderwritingRules;
use surety_registry::RegistryRules;
use surety_types::Identity;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
///
/// Every section is optional in TOML; omitted keys keep their defaults.
/// Amounts are given in minor units (1 unit = 1_000_000 minor).
///
/// ```toml
/// escrow_account = "surety-escrow"
///
/// [registry]
/// direct_admission_limit = 4
/// min_funding = 10000000
/// quorum = { numerator = 1, denominator = 2 }
///
/// [underwriting]
/// max_premium = 10000000
/// payout_multiplier = { numerator = 3, denominator = 2 }
///
/// [storage]
/// snapshot_path = "data/surety.json"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuretyConfig {
    pub registry: RegistryRules,
    pub underwriting: UnderwritingRules,
    /// Ledger account holding premiums and airline funding.
    pub escrow_account: Identity,
    pub storage: StorageConfig,
}

impl Default for SuretyConfig {
    fn default() -> Self {
        Self {
            registry: RegistryRules::default(),
            underwriting: UnderwritingRules::default(),
            escrow_account: Identity::new("surety-escrow"),
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot written after every committed mutation. In-memory only
    /// when unset.
    pub snapshot_path: Option<PathBuf>,
}

impl SuretyConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: SuretyConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let quorum = self.registry.quorum;
        if quorum.denominator == 0 {
            return Err(ConfigError::Invalid(
                "registry.quorum denominator must be non-zero".into(),
            ));
        }
        if quorum.numerator > quorum.denominator {
            return Err(ConfigError::Invalid(
                "registry.quorum cannot exceed 1".into(),
            ));
        }
        if self.registry.min_funding.is_zero() {
            return Err(ConfigError::Invalid(
                "registry.min_funding must be non-zero".into(),
            ));
        }
        if self.underwriting.max_premium.is_zero() {
            return Err(ConfigError::Invalid(
                "underwriting.max_premium must be non-zero".into(),
            ));
        }
        if self.underwriting.payout_multiplier.denominator == 0 {
            return Err(ConfigError::Invalid(
                "underwriting.payout_multiplier denominator must be non-zero".into(),
            ));
        }
        // A single maximal policy must be payable without overflow.
        let underwriting = &self.underwriting;
        if underwriting
            .payout_multiplier
            .apply(underwriting.max_premium)
            .is_none()
        {
            return Err(ConfigError::Invalid(
                "underwriting.max_premium times payout_multiplier overflows".into(),
            ));
        }
        if self.escrow_account.as_str().is_empty() {
            return Err(ConfigError::Invalid("escrow_account must be set".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surety_types::Amount;

    #[test]
    fn test_default_config() {
        let config = SuretyConfig::default();
        assert_eq!(config.registry.direct_admission_limit, 4);
        assert_eq!(config.registry.min_funding, Amount::units(10));
        assert_eq!(config.underwriting.max_premium, Amount::units(10));
        assert!(config.storage.snapshot_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_config() {
        let config = SuretyConfig::load("/nonexistent/path/surety.toml").unwrap();
        assert_eq!(config, SuretyConfig::default());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SuretyConfig::from_toml_str(
            r#"
            escrow_account = "pool"

            [registry]
            direct_admission_limit = 2

            [underwriting]
            payout_multiplier = { numerator = 2, denominator = 1 }
            "#,
        )
        .unwrap();

        assert_eq!(config.escrow_account, Identity::new("pool"));
        assert_eq!(config.registry.direct_admission_limit, 2);
        assert_eq!(config.registry.min_funding, Amount::units(10));
        assert_eq!(config.underwriting.payout_multiplier.numerator, 2);
        assert_eq!(config.underwriting.max_premium, Amount::units(10));
    }

    #[test]
    fn zero_denominators_and_caps_are_rejected() {
        for toml in [
            "[registry]\nquorum = { numerator = 1, denominator = 0 }",
            "[underwriting]\npayout_multiplier = { numerator = 3, denominator = 0 }",
            "[underwriting]\nmax_premium = 0",
            "[registry]\nmin_funding = 0",
        ] {
            assert!(
                matches!(SuretyConfig::from_toml_str(toml), Err(ConfigError::Invalid(_))),
                "accepted {toml}"
            );
        }
    }

    #[test]
    fn unpayable_premium_cap_is_rejected() {
        let mut config = SuretyConfig::default();
        config.underwriting.max_premium = Amount::minor(u64::MAX);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.underwriting.max_premium = Amount::minor(u64::MAX / 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surety.toml");
        std::fs::write(&path, "[storage]\nsnapshot_path = \"state.json\"\n").unwrap();

        let config = SuretyConfig::load(&path).unwrap();
        assert_eq!(config.storage.snapshot_path, Some(PathBuf::from("state.json")));
    }
}

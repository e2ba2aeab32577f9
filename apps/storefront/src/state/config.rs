//! # Configuration State
//!
//! Stores storefront configuration loaded at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. CLI flags (`--db`, `--config`)
//! 2. Environment variables (`DOKAN_*`)
//! 3. Config file (`storefront.toml`)
//! 4. Defaults (this file)
//!
//! ## Example `storefront.toml`
//! ```toml
//! store_name = "Dokan"
//! currency_code = "BDT"
//! currency_symbol = "৳"
//! cart_delivery_fee = "0"
//!
//! [pricing]
//! oversize_surcharge = "50"
//! oversize_prefix = "XXL"
//!
//! [delivery]
//! fallback = "outside"
//!
//! [[delivery.zones]]
//! key = "inside"
//! label = "Inside Dhaka City"
//! fee = "80"
//! keywords = ["dhaka"]
//! ```
//!
//! ## Thread Safety
//! Configuration is read-only after initialization and shared as
//! `Arc<ConfigState>`.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use dokan_core::{DeliveryRules, DeliveryZone, Money, PricingEngine, PricingPolicy};

use crate::error::{ApiError, ApiResult};

/// The delivery table as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTable {
    pub zones: Vec<DeliveryZone>,
    /// Key of the zone used when nothing matches.
    pub fallback: String,
}

impl Default for DeliveryTable {
    fn default() -> Self {
        let rules = DeliveryRules::default();
        DeliveryTable {
            zones: rules.zones().to_vec(),
            fallback: rules.fallback().key.clone(),
        }
    }
}

/// Storefront configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigState {
    /// Store name (shown in CLI headers)
    pub store_name: String,

    /// Currency code (ISO 4217)
    pub currency_code: String,

    /// Currency symbol (for display)
    pub currency_symbol: String,

    /// Oversize surcharge and its size prefix
    pub pricing: PricingPolicy,

    /// Delivery zones and fees used at checkout
    pub delivery: DeliveryTable,

    /// Delivery fee shown on the cart page, before a destination is known
    pub cart_delivery_fee: Money,

    /// Local database file. Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
}

impl Default for ConfigState {
    /// Returns the shop's current configuration.
    ///
    /// ## Default Values
    /// - Store: "Dokan"
    /// - Currency: BDT (৳)
    /// - Oversize surcharge: 50 on XXL and larger
    /// - Cart-page delivery fee: 0 (checkout quotes the real fee)
    fn default() -> Self {
        ConfigState {
            store_name: "Dokan".to_string(),
            currency_code: "BDT".to_string(),
            currency_symbol: "৳".to_string(),
            pricing: PricingPolicy::default(),
            delivery: DeliveryTable::default(),
            cart_delivery_fee: Money::zero(),
            database_path: None,
        }
    }
}

impl ConfigState {
    /// Loads configuration from file, environment, and defaults.
    pub fn load(config_path: Option<PathBuf>) -> ApiResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Storefront config not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parses one TOML file without consulting the environment.
    pub fn from_file(path: &Path) -> ApiResult<Self> {
        info!(?path, "Loading storefront config from file");
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ApiError::config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| ApiError::config(format!("Invalid {}: {}", path.display(), e)))
    }

    /// Applies `DOKAN_*` overrides read through `lookup`.
    ///
    /// ## Environment Variables
    /// - `DOKAN_STORE_NAME`
    /// - `DOKAN_CURRENCY_CODE`, `DOKAN_CURRENCY_SYMBOL`
    /// - `DOKAN_OVERSIZE_SURCHARGE` (e.g. "75")
    /// - `DOKAN_CART_DELIVERY_FEE` (e.g. "80")
    /// - `DOKAN_DB_PATH`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("DOKAN_STORE_NAME") {
            self.store_name = name;
        }

        if let Some(code) = lookup("DOKAN_CURRENCY_CODE") {
            self.currency_code = code;
        }

        if let Some(symbol) = lookup("DOKAN_CURRENCY_SYMBOL") {
            self.currency_symbol = symbol;
        }

        if let Some(raw) = lookup("DOKAN_OVERSIZE_SURCHARGE") {
            match raw.trim().parse::<Decimal>() {
                Ok(amount) => self.pricing.oversize_surcharge = Money::new(amount),
                Err(_) => warn!(value = %raw, "Ignoring invalid DOKAN_OVERSIZE_SURCHARGE"),
            }
        }

        if let Some(raw) = lookup("DOKAN_CART_DELIVERY_FEE") {
            match raw.trim().parse::<Decimal>() {
                Ok(amount) => self.cart_delivery_fee = Money::new(amount),
                Err(_) => warn!(value = %raw, "Ignoring invalid DOKAN_CART_DELIVERY_FEE"),
            }
        }

        if let Some(path) = lookup("DOKAN_DB_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> ApiResult<()> {
        self.delivery_rules()?;

        if self.pricing.oversize_surcharge.is_negative() {
            return Err(ApiError::config("oversize_surcharge must not be negative"));
        }

        if self.cart_delivery_fee.is_negative() {
            return Err(ApiError::config("cart_delivery_fee must not be negative"));
        }

        if let Some(zone) = self.delivery.zones.iter().find(|z| z.fee.is_negative()) {
            return Err(ApiError::config(format!(
                "Delivery fee for zone '{}' must not be negative",
                zone.key
            )));
        }

        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "dokan", "storefront")
            .map(|dirs| dirs.config_dir().join("storefront.toml"))
    }

    /// The delivery table as checked rules.
    pub fn delivery_rules(&self) -> ApiResult<DeliveryRules> {
        Ok(DeliveryRules::new(
            self.delivery.zones.clone(),
            self.delivery.fallback.clone(),
        )?)
    }

    pub fn pricing_engine(&self) -> PricingEngine {
        PricingEngine::new(self.pricing.clone())
    }

    /// Formats an amount with the currency symbol.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let config = ConfigState::default();
    /// assert_eq!(config.format_currency(Money::from_major(80)), "৳80.00");
    /// ```
    pub fn format_currency(&self, amount: Money) -> String {
        if amount.is_negative() {
            format!("-{}{}", self.currency_symbol, Money::zero() - amount)
        } else {
            format!("{}{}", self.currency_symbol, amount)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_format_currency_positive() {
        let config = ConfigState::default();
        assert_eq!(config.format_currency(Money::from_major(80)), "৳80.00");
        assert_eq!(config.format_currency(Money::zero()), "৳0.00");
    }

    #[test]
    fn test_format_currency_negative() {
        let config = ConfigState::default();
        assert_eq!(config.format_currency(Money::from_major(-15)), "-৳15.00");
    }

    #[test]
    fn test_default_delivery_table_is_valid() {
        let config = ConfigState::default();
        let rules = config.delivery_rules().unwrap();
        assert_eq!(rules.fallback().key, "outside");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_fallback_is_config_error() {
        let mut config = ConfigState::default();
        config.delivery.fallback = "mars".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ConfigError);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DOKAN_STORE_NAME", "Test Shop"),
            ("DOKAN_CART_DELIVERY_FEE", "80"),
            ("DOKAN_OVERSIZE_SURCHARGE", "not-a-number"),
            ("DOKAN_DB_PATH", "/tmp/dokan-test.db"),
        ]
        .into_iter()
        .collect();

        let mut config = ConfigState::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.store_name, "Test Shop");
        assert_eq!(config.cart_delivery_fee, Money::from_major(80));
        // invalid value leaves the default alone
        assert_eq!(config.pricing, PricingPolicy::default());
        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/tmp/dokan-test.db"))
        );
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
store_name = "Pop-up"
cart_delivery_fee = 60

[pricing]
oversize_surcharge = "75"
"#
        )
        .unwrap();

        let config = ConfigState::from_file(file.path()).unwrap();
        assert_eq!(config.store_name, "Pop-up");
        assert_eq!(config.cart_delivery_fee, Money::from_major(60));
        assert_eq!(config.pricing.oversize_surcharge, Money::from_major(75));
        // untouched sections keep their defaults
        assert_eq!(config.delivery, DeliveryTable::default());
        assert_eq!(config.currency_code, "BDT");
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "store_name = [").unwrap();
        assert!(ConfigState::from_file(file.path()).is_err());
    }
}

//! Rule table parsing from YAML/JSON.

use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::facts::UserTier;

use super::schema::validate_rule_table_schema;

/// Errors that can occur when loading a rule table.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read rule table file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Rule table does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Rule table validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

fn dec(num: i64, scale: u32) -> Decimal {
    Decimal::new(num, scale)
}

/// Spend thresholds for tier promotion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TierTable {
    /// Lifetime spend at which a user becomes VIP (inclusive)
    pub vip_threshold: Decimal,

    /// Lifetime spend at which a user becomes SVIP (inclusive)
    pub svip_threshold: Decimal,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            vip_threshold: dec(5000, 0),
            svip_threshold: dec(10000, 0),
        }
    }
}

/// A volume discount step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeTier {
    /// Minimum order amount (inclusive)
    pub threshold: Decimal,

    /// Multiplier applied to the order amount
    pub rate: Decimal,
}

/// Discount rates. Rates are multipliers: 0.95 means 5% off.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiscountTable {
    pub vip_rate: Decimal,
    pub svip_rate: Decimal,
    pub first_order_rate: Decimal,

    /// Higher volume step; subsumes `volume_low` when it fires
    pub volume_high: VolumeTier,
    pub volume_low: VolumeTier,
}

impl Default for DiscountTable {
    fn default() -> Self {
        Self {
            vip_rate: dec(95, 2),
            svip_rate: dec(90, 2),
            first_order_rate: dec(98, 2),
            volume_high: VolumeTier {
                threshold: dec(10000, 0),
                rate: dec(90, 2),
            },
            volume_low: VolumeTier {
                threshold: dec(5000, 0),
                rate: dec(95, 2),
            },
        }
    }
}

/// Which amount the free-shipping threshold is compared against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AmountBasis {
    /// Pre-discount order amount
    #[default]
    OrderAmount,

    /// Amount after the resolved discount
    DiscountedAmount,
}

/// Shipping fees, ETAs and remote-area policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShippingTable {
    pub free_shipping_threshold: Decimal,
    pub free_shipping_basis: AmountBasis,
    pub standard_fee: Decimal,
    pub remote_surcharge: Decimal,
    pub standard_eta_days: u32,
    pub next_day_eta_days: u32,

    /// Tiers that do not pay the remote surcharge
    pub remote_surcharge_exempt: Vec<UserTier>,

    /// Region names that mark a shipping address as remote
    pub remote_regions: Vec<String>,
}

impl Default for ShippingTable {
    fn default() -> Self {
        Self {
            free_shipping_threshold: dec(500, 0),
            free_shipping_basis: AmountBasis::OrderAmount,
            standard_fee: dec(15, 0),
            remote_surcharge: dec(30, 0),
            standard_eta_days: 3,
            next_day_eta_days: 1,
            remote_surcharge_exempt: Vec::new(),
            remote_regions: ["西藏", "新疆", "内蒙古", "Tibet", "Xinjiang", "Inner Mongolia"]
                .iter()
                .map(|r| r.to_string())
                .collect(),
        }
    }
}

/// Return windows by tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReturnTable {
    pub regular_window_days: u32,

    /// Window for VIP and SVIP
    pub member_window_days: u32,
}

impl Default for ReturnTable {
    fn default() -> Self {
        Self {
            regular_window_days: 7,
            member_window_days: 15,
        }
    }
}

/// Cancellation windows by order status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CancellationTable {
    pub pending_window_hours: Decimal,
    pub paid_window_hours: Decimal,
}

impl Default for CancellationTable {
    fn default() -> Self {
        Self {
            pending_window_hours: dec(24, 0),
            paid_window_hours: dec(12, 0),
        }
    }
}

fn default_currency_scale() -> u32 {
    2
}

/// The complete rule table.
///
/// Loaded once at startup and never mutated. Reloading means building a new
/// table and swapping the engine that owns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleTable {
    /// Version of this table (semver-ish)
    pub table_version: String,

    /// Human-readable name
    #[serde(default)]
    pub name: Option<String>,

    /// Decimal places money is rounded to
    #[serde(default = "default_currency_scale")]
    pub currency_scale: u32,

    #[serde(default)]
    pub tier: TierTable,

    #[serde(default)]
    pub discount: DiscountTable,

    #[serde(default)]
    pub shipping: ShippingTable,

    #[serde(default)]
    pub returns: ReturnTable,

    #[serde(default)]
    pub cancellation: CancellationTable,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            table_version: "1.0".to_string(),
            name: Some("Reference commerce policy".to_string()),
            currency_scale: default_currency_scale(),
            tier: TierTable::default(),
            discount: DiscountTable::default(),
            shipping: ShippingTable::default(),
            returns: ReturnTable::default(),
            cancellation: CancellationTable::default(),
        }
    }
}

impl RuleTable {
    /// Parse a rule table from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a rule table from JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a rule table from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a rule table from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load from a file, picking the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_yaml_file(path),
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        validate_rule_table_schema(&value).map_err(ConfigError::SchemaError)?;
        let table: RuleTable = serde_json::from_value(value)?;
        table.validate()?;
        tracing::debug!(
            version = %table.table_version,
            name = table.name.as_deref().unwrap_or("unnamed"),
            "rule table loaded"
        );
        Ok(table)
    }

    /// Validate semantic consistency the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_version.is_empty() {
            return Err(ConfigError::MissingField("table_version".to_string()));
        }

        if self.tier.svip_threshold <= self.tier.vip_threshold {
            return Err(ConfigError::ValidationError(format!(
                "tier.svip_threshold ({}) must exceed tier.vip_threshold ({})",
                self.tier.svip_threshold, self.tier.vip_threshold
            )));
        }

        if self.discount.volume_high.threshold <= self.discount.volume_low.threshold {
            return Err(ConfigError::ValidationError(format!(
                "discount.volume_high.threshold ({}) must exceed discount.volume_low.threshold ({})",
                self.discount.volume_high.threshold, self.discount.volume_low.threshold
            )));
        }

        let rates = [
            ("discount.vip_rate", self.discount.vip_rate),
            ("discount.svip_rate", self.discount.svip_rate),
            ("discount.first_order_rate", self.discount.first_order_rate),
            ("discount.volume_high.rate", self.discount.volume_high.rate),
            ("discount.volume_low.rate", self.discount.volume_low.rate),
        ];
        for (field, rate) in rates {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be within [0, 1], got {}",
                    field, rate
                )));
            }
        }

        let amounts = [
            ("tier.vip_threshold", self.tier.vip_threshold),
            ("shipping.free_shipping_threshold", self.shipping.free_shipping_threshold),
            ("shipping.standard_fee", self.shipping.standard_fee),
            ("shipping.remote_surcharge", self.shipping.remote_surcharge),
            ("cancellation.pending_window_hours", self.cancellation.pending_window_hours),
            ("cancellation.paid_window_hours", self.cancellation.paid_window_hours),
        ];
        for (field, amount) in amounts {
            if amount < Decimal::ZERO {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be non-negative, got {}",
                    field, amount
                )));
            }
        }

        if self.shipping.standard_eta_days == 0 || self.shipping.next_day_eta_days == 0 {
            return Err(ConfigError::ValidationError(
                "shipping ETAs must be at least one day".to_string(),
            ));
        }

        if self.shipping.remote_regions.iter().any(|r| r.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "shipping.remote_regions must not contain empty names".to_string(),
            ));
        }

        Ok(())
    }

    /// Return window for a tier.
    pub fn return_window(&self, tier: UserTier) -> u32 {
        if tier.is_member() {
            self.returns.member_window_days
        } else {
            self.returns.regular_window_days
        }
    }
}

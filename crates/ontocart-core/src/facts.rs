//! Fact model for rule inference.
//!
//! Facts are immutable value objects built fresh for every inference call.
//! They carry only what the rule families read: spend and order history for
//! tier inference, the cart aggregate for discount and shipping, product
//! attributes for returns, and order state for cancellation.
//!
//! Monetary values are `Decimal`; nothing here is ever a float.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A fact was malformed or out of range.
///
/// Always names the offending field so the caller can report it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid fact `{field}`: {reason}")]
pub struct InvalidFactError {
    /// Field that failed (e.g. "order_amount")
    pub field: String,

    /// Why it failed
    pub reason: String,
}

impl InvalidFactError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    fn negative(field: &str, value: Decimal) -> Self {
        Self::new(field, format!("must be non-negative, got {}", value))
    }
}

/// Reject negative decimals.
pub(crate) fn ensure_non_negative(field: &str, value: Decimal) -> Result<(), InvalidFactError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(InvalidFactError::negative(field, value));
    }
    Ok(())
}

/// Round money to `scale` decimal places, half to even.
pub fn round_currency(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven)
}

// =============================================================================
// User tier
// =============================================================================

/// Customer loyalty tier.
///
/// Ordered `Regular < Vip < Svip`, so tier comparisons follow spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum UserTier {
    #[serde(rename = "Regular")]
    Regular,
    #[serde(rename = "VIP")]
    Vip,
    #[serde(rename = "SVIP")]
    Svip,
}

impl UserTier {
    /// Canonical label.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserTier::Regular => "Regular",
            UserTier::Vip => "VIP",
            UserTier::Svip => "SVIP",
        }
    }

    /// VIP and SVIP both count as members.
    pub fn is_member(&self) -> bool {
        matches!(self, UserTier::Vip | UserTier::Svip)
    }
}

impl Default for UserTier {
    fn default() -> Self {
        UserTier::Regular
    }
}

impl fmt::Display for UserTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserTier {
    type Err = InvalidFactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(UserTier::Regular),
            "vip" => Ok(UserTier::Vip),
            "svip" => Ok(UserTier::Svip),
            other => Err(InvalidFactError::new(
                "tier",
                format!("unknown tier '{}' (expected Regular, VIP or SVIP)", other),
            )),
        }
    }
}

impl TryFrom<String> for UserTier {
    type Error = InvalidFactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Inputs to tier inference.
///
/// No `tier` field: the tier is always recomputed
/// from `lifetime_spend`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserTierFacts {
    /// Total spend across all completed orders
    pub lifetime_spend: Decimal,

    /// Number of orders placed so far
    #[serde(default)]
    pub order_count: u32,
}

impl UserTierFacts {
    pub fn new(lifetime_spend: Decimal, order_count: u32) -> Result<Self, InvalidFactError> {
        let facts = Self {
            lifetime_spend,
            order_count,
        };
        facts.validate()?;
        Ok(facts)
    }

    /// A user with no prior orders is on their first order.
    pub fn is_first_order(&self) -> bool {
        self.order_count == 0
    }

    pub fn validate(&self) -> Result<(), InvalidFactError> {
        ensure_non_negative("lifetime_spend", self.lifetime_spend)
    }
}

// =============================================================================
// Order aggregate
// =============================================================================

/// Cart aggregate used by discount and shipping inference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderFacts {
    /// Pre-discount order amount
    pub order_amount: Decimal,

    #[serde(default)]
    pub is_first_order: bool,

    #[serde(default)]
    pub is_remote_area: bool,

    #[serde(default)]
    pub tier: UserTier,
}

impl OrderFacts {
    pub fn new(
        order_amount: Decimal,
        is_first_order: bool,
        is_remote_area: bool,
        tier: UserTier,
    ) -> Result<Self, InvalidFactError> {
        let facts = Self {
            order_amount,
            is_first_order,
            is_remote_area,
            tier,
        };
        facts.validate()?;
        Ok(facts)
    }

    /// Same facts evaluated under a different tier.
    pub fn with_tier(&self, tier: UserTier) -> Self {
        Self {
            tier,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), InvalidFactError> {
        ensure_non_negative("order_amount", self.order_amount)
    }
}

// =============================================================================
// Returns
// =============================================================================

/// Product category as seen by the return policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum ProductCategory {
    Electronics,
    Accessory,
    Service,
    Other,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Electronics => "Electronics",
            ProductCategory::Accessory => "Accessory",
            ProductCategory::Service => "Service",
            ProductCategory::Other => "Other",
        }
    }
}

impl Default for ProductCategory {
    fn default() -> Self {
        ProductCategory::Other
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductCategory {
    type Err = InvalidFactError;

    /// Accepts the canonical names plus the catalog's storefront labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "electronics" | "phone" | "手机" => Ok(ProductCategory::Electronics),
            "accessory" | "accessories" | "配件" => Ok(ProductCategory::Accessory),
            "service" | "services" | "服务" => Ok(ProductCategory::Service),
            "other" | "" => Ok(ProductCategory::Other),
            _ => Err(InvalidFactError::new(
                "product_category",
                format!("unknown category '{}'", trimmed),
            )),
        }
    }
}

impl TryFrom<String> for ProductCategory {
    type Error = InvalidFactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn default_true() -> bool {
    true
}

/// Inputs to return policy inference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReturnFacts {
    #[serde(default)]
    pub tier: UserTier,

    #[serde(default)]
    pub product_category: ProductCategory,

    #[serde(default)]
    pub is_activated: bool,

    #[serde(default = "default_true")]
    pub packaging_intact: bool,
}

impl ReturnFacts {
    pub fn new(tier: UserTier, product_category: ProductCategory) -> Self {
        Self {
            tier,
            product_category,
            is_activated: false,
            packaging_intact: true,
        }
    }

    pub fn activated(mut self, is_activated: bool) -> Self {
        self.is_activated = is_activated;
        self
    }

    pub fn packaging_intact(mut self, intact: bool) -> Self {
        self.packaging_intact = intact;
        self
    }

    pub fn with_tier(&self, tier: UserTier) -> Self {
        Self {
            tier,
            ..self.clone()
        }
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Lifecycle status of a placed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = InvalidFactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            "returned" => Ok(OrderStatus::Returned),
            other => Err(InvalidFactError::new(
                "order_status",
                format!("unknown order status '{}'", other),
            )),
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = InvalidFactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Inputs to cancellation policy inference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CancellationFacts {
    #[serde(default)]
    pub status: OrderStatus,

    /// Hours elapsed since the order was created
    #[serde(default)]
    pub hours_since_created: Decimal,

    /// Whether a shipment record already exists
    #[serde(default)]
    pub has_shipment: bool,
}

impl CancellationFacts {
    pub fn new(
        status: OrderStatus,
        hours_since_created: Decimal,
        has_shipment: bool,
    ) -> Result<Self, InvalidFactError> {
        let facts = Self {
            status,
            hours_since_created,
            has_shipment,
        };
        facts.validate()?;
        Ok(facts)
    }

    /// Build from the order's creation time and the current time.
    ///
    /// Clock skew can put `created_at` after `now`; elapsed time is clamped
    /// at zero in that case.
    pub fn from_timestamps(
        status: OrderStatus,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
        has_shipment: bool,
    ) -> Self {
        let seconds = (now - created_at).num_seconds().max(0);
        let hours = (Decimal::from(seconds) / Decimal::from(3600)).round_dp(4);
        Self {
            status,
            hours_since_created: hours,
            has_shipment,
        }
    }

    pub fn validate(&self) -> Result<(), InvalidFactError> {
        ensure_non_negative("hours_since_created", self.hours_since_created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tier_parse_is_case_insensitive() {
        assert_eq!("vip".parse::<UserTier>().unwrap(), UserTier::Vip);
        assert_eq!("SVIP".parse::<UserTier>().unwrap(), UserTier::Svip);
        assert_eq!(" Regular ".parse::<UserTier>().unwrap(), UserTier::Regular);
    }

    #[test]
    fn test_unknown_tier_names_field() {
        let err = "gold".parse::<UserTier>().unwrap_err();
        assert_eq!(err.field, "tier");
        assert!(err.reason.contains("gold"));
    }

    #[test]
    fn test_tier_ordering_follows_spend() {
        assert!(UserTier::Regular < UserTier::Vip);
        assert!(UserTier::Vip < UserTier::Svip);
        assert!(!UserTier::Regular.is_member());
        assert!(UserTier::Svip.is_member());
    }

    #[test]
    fn test_tier_serializes_with_canonical_labels() {
        let json = serde_json::to_string(&UserTier::Svip).unwrap();
        assert_eq!(json, "\"SVIP\"");
        let back: UserTier = serde_json::from_str("\"vip\"").unwrap();
        assert_eq!(back, UserTier::Vip);
    }

    #[test]
    fn test_negative_order_amount_rejected() {
        let err = OrderFacts::new(Decimal::new(-1, 0), false, false, UserTier::Regular)
            .unwrap_err();
        assert_eq!(err.field, "order_amount");
    }

    #[test]
    fn test_negative_lifetime_spend_rejected() {
        let err = UserTierFacts::new(Decimal::new(-5000, 2), 3).unwrap_err();
        assert_eq!(err.field, "lifetime_spend");
    }

    #[test]
    fn test_zero_amount_is_valid() {
        assert!(OrderFacts::new(Decimal::ZERO, true, false, UserTier::Regular).is_ok());
    }

    #[test]
    fn test_first_order_from_count() {
        assert!(UserTierFacts::new(Decimal::ZERO, 0).unwrap().is_first_order());
        assert!(!UserTierFacts::new(Decimal::ZERO, 2).unwrap().is_first_order());
    }

    #[test]
    fn test_category_aliases() {
        assert_eq!("手机".parse::<ProductCategory>().unwrap(), ProductCategory::Electronics);
        assert_eq!("accessory".parse::<ProductCategory>().unwrap(), ProductCategory::Accessory);
        assert_eq!("Service".parse::<ProductCategory>().unwrap(), ProductCategory::Service);
        assert_eq!("".parse::<ProductCategory>().unwrap(), ProductCategory::Other);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = "furniture".parse::<ProductCategory>().unwrap_err();
        assert_eq!(err.field, "product_category");
    }

    #[test]
    fn test_return_facts_defaults_from_yaml() {
        let facts: ReturnFacts = serde_yaml::from_str("tier: VIP\n").unwrap();
        assert_eq!(facts.product_category, ProductCategory::Other);
        assert!(facts.packaging_intact);
        assert!(!facts.is_activated);
    }

    #[test]
    fn test_unknown_category_fails_deserialization() {
        let result: Result<ReturnFacts, _> =
            serde_yaml::from_str("tier: VIP\nproduct_category: furniture\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_cancellation_hours_from_timestamps() {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 0).unwrap();
        let facts = CancellationFacts::from_timestamps(OrderStatus::Paid, created, now, false);
        assert_eq!(facts.hours_since_created, Decimal::new(25, 1));
    }

    #[test]
    fn test_cancellation_clock_skew_clamped() {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let facts = CancellationFacts::from_timestamps(OrderStatus::Pending, created, now, false);
        assert_eq!(facts.hours_since_created, Decimal::ZERO);
    }

    #[test]
    fn test_round_currency_half_even() {
        assert_eq!(round_currency(Decimal::new(12345, 3), 2), Decimal::new(1234, 2));
        assert_eq!(round_currency(Decimal::new(12355, 3), 2), Decimal::new(1236, 2));
        assert_eq!(round_currency(Decimal::new(1176, 0), 2), Decimal::new(1176, 0));
    }

    #[test]
    fn test_order_status_parse() {
        assert_eq!("Canceled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("lost".parse::<OrderStatus>().is_err());
    }
}

//! Shipping inference.
//!
//! Base rules are evaluated in order and the first match wins. The remote
//! surcharge is applied afterwards, on top of whatever the base rule set,
//! so free shipping never survives remote delivery unless the tier is listed
//! in `remote_surcharge_exempt`.

use std::fmt;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::ShippingTable;
use crate::facts::{OrderFacts, UserTier};
use crate::trace::ExplanationTrace;

use super::{RuleEvaluator, RuleFamily};

/// Delivery method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShippingMethod {
    Standard,
    NextDay,
}

impl fmt::Display for ShippingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShippingMethod::Standard => f.write_str("Standard"),
            ShippingMethod::NextDay => f.write_str("NextDay"),
        }
    }
}

/// Shipping decision for an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShippingOutcome {
    pub fee: Decimal,
    pub method: ShippingMethod,
    pub eta_days: u32,
}

impl ShippingOutcome {
    pub fn is_free(&self) -> bool {
        self.fee.is_zero()
    }
}

/// Base shipping rules in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShippingRule {
    SvipNextDay,
    MemberFreeShipping,
    FreeShippingThreshold,
    StandardFee,
}

impl ShippingRule {
    pub const ORDER: [ShippingRule; 4] = [
        ShippingRule::SvipNextDay,
        ShippingRule::MemberFreeShipping,
        ShippingRule::FreeShippingThreshold,
        ShippingRule::StandardFee,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ShippingRule::SvipNextDay => "SVIPNextDayShippingRule",
            ShippingRule::MemberFreeShipping => "MemberFreeShippingRule",
            ShippingRule::FreeShippingThreshold => "FreeShippingThresholdRule",
            ShippingRule::StandardFee => "StandardShippingFeeRule",
        }
    }
}

/// Name of the surcharge rule, applied after the base rule.
pub const REMOTE_SURCHARGE_RULE: &str = "RemoteAreaSurchargeRule";

/// Evaluates shipping rules.
pub struct ShippingEvaluator<'a> {
    table: &'a ShippingTable,
}

impl<'a> ShippingEvaluator<'a> {
    pub fn new(table: &'a ShippingTable) -> Self {
        Self { table }
    }

    /// Why `rule` applies to `facts`, or `None` when it does not.
    fn condition(&self, rule: ShippingRule, facts: &OrderFacts) -> Option<String> {
        let threshold = self.table.free_shipping_threshold;
        match rule {
            ShippingRule::SvipNextDay => {
                (facts.tier == UserTier::Svip).then(|| "tier is SVIP".to_string())
            }
            ShippingRule::MemberFreeShipping => facts
                .tier
                .is_member()
                .then(|| format!("tier is {}", facts.tier)),
            ShippingRule::FreeShippingThreshold => (facts.order_amount >= threshold)
                .then(|| format!("order amount {} >= {}", facts.order_amount, threshold)),
            ShippingRule::StandardFee => Some(format!(
                "no free-shipping rule applied (order amount {} < {})",
                facts.order_amount, threshold
            )),
        }
    }

    fn base_rule(&self, facts: &OrderFacts) -> (ShippingRule, String) {
        ShippingRule::ORDER
            .into_iter()
            .find_map(|rule| self.condition(rule, facts).map(|because| (rule, because)))
            .unwrap_or_else(|| {
                (
                    ShippingRule::StandardFee,
                    "no free-shipping rule applied".to_string(),
                )
            })
    }

    fn base_outcome(&self, rule: ShippingRule) -> ShippingOutcome {
        let standard = |fee| ShippingOutcome {
            fee,
            method: ShippingMethod::Standard,
            eta_days: self.table.standard_eta_days,
        };
        match rule {
            ShippingRule::SvipNextDay => ShippingOutcome {
                fee: Decimal::ZERO,
                method: ShippingMethod::NextDay,
                eta_days: self.table.next_day_eta_days,
            },
            ShippingRule::MemberFreeShipping | ShippingRule::FreeShippingThreshold => {
                standard(Decimal::ZERO)
            }
            ShippingRule::StandardFee => standard(self.table.standard_fee),
        }
    }
}

impl RuleEvaluator for ShippingEvaluator<'_> {
    type Facts = OrderFacts;
    type Outcome = ShippingOutcome;

    fn family(&self) -> RuleFamily {
        RuleFamily::Shipping
    }

    fn evaluate(&self, facts: &OrderFacts, trace: &mut ExplanationTrace) -> ShippingOutcome {
        let (rule, because) = self.base_rule(facts);
        trace.fired(self.family(), rule.name(), because);
        let mut outcome = self.base_outcome(rule);

        if facts.is_remote_area {
            if self.table.remote_surcharge_exempt.contains(&facts.tier) {
                trace.fired(
                    self.family(),
                    "RemoteAreaSurchargeExemption",
                    format!("delivery is remote but tier {} is exempt", facts.tier),
                );
            } else {
                outcome.fee += self.table.remote_surcharge;
                trace.fired(
                    self.family(),
                    REMOTE_SURCHARGE_RULE,
                    format!(
                        "delivery address is in a remote area (+{})",
                        self.table.remote_surcharge
                    ),
                );
            }
        }

        outcome
    }
}

/// Decides whether a free-text shipping address is in a remote region.
///
/// Region names are matched case-insensitively anywhere in the address.
#[derive(Debug, Clone)]
pub struct RemoteAreaMatcher {
    pattern: Option<Regex>,
}

impl RemoteAreaMatcher {
    pub fn new(regions: &[String]) -> Result<Self, regex::Error> {
        if regions.is_empty() {
            return Ok(Self::disabled());
        }
        let alternatives: Vec<String> = regions.iter().map(|r| regex::escape(r.trim())).collect();
        let pattern = Regex::new(&format!("(?i)(?:{})", alternatives.join("|")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// A matcher that never reports an address as remote.
    pub fn disabled() -> Self {
        Self { pattern: None }
    }

    pub fn is_remote(&self, address: &str) -> bool {
        self.pattern
            .as_ref()
            .map(|p| p.is_match(address))
            .unwrap_or(false)
    }

    /// The region that matched, if any.
    pub fn matched_region<'t>(&self, address: &'t str) -> Option<&'t str> {
        self.pattern
            .as_ref()
            .and_then(|p| p.find(address))
            .map(|m| m.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ship(amount: i64, tier: UserTier, remote: bool) -> ShippingOutcome {
        let table = ShippingTable::default();
        let facts = OrderFacts::new(Decimal::new(amount, 0), false, remote, tier).unwrap();
        ShippingEvaluator::new(&table).evaluate(&facts, &mut ExplanationTrace::new())
    }

    #[test]
    fn test_svip_next_day() {
        let outcome = ship(3000, UserTier::Svip, false);
        assert_eq!(outcome.fee, Decimal::ZERO);
        assert_eq!(outcome.method, ShippingMethod::NextDay);
        assert_eq!(outcome.eta_days, 1);
    }

    #[test]
    fn test_vip_free_standard() {
        let outcome = ship(100, UserTier::Vip, false);
        assert!(outcome.is_free());
        assert_eq!(outcome.method, ShippingMethod::Standard);
        assert_eq!(outcome.eta_days, 3);
    }

    #[test]
    fn test_threshold_free_for_regular() {
        assert!(ship(500, UserTier::Regular, false).is_free());
        assert!(ship(1200, UserTier::Regular, false).is_free());
    }

    #[test]
    fn test_standard_fee_below_threshold() {
        let outcome = ship(499, UserTier::Regular, false);
        assert_eq!(outcome.fee, Decimal::new(15, 0));
        assert_eq!(outcome.eta_days, 3);
    }

    #[test]
    fn test_remote_adds_to_fee() {
        assert_eq!(ship(100, UserTier::Regular, true).fee, Decimal::new(45, 0));
    }

    #[test]
    fn test_remote_cancels_free_shipping() {
        let outcome = ship(100, UserTier::Svip, true);
        assert_eq!(outcome.fee, Decimal::new(30, 0));
        assert_eq!(outcome.method, ShippingMethod::NextDay);
    }

    #[test]
    fn test_exempt_tier_keeps_free_shipping() {
        let table = ShippingTable {
            remote_surcharge_exempt: vec![UserTier::Svip],
            ..ShippingTable::default()
        };
        let facts = OrderFacts::new(Decimal::new(100, 0), false, true, UserTier::Svip).unwrap();
        let mut trace = ExplanationTrace::new();
        let outcome = ShippingEvaluator::new(&table).evaluate(&facts, &mut trace);
        assert!(outcome.is_free());
        assert!(trace.contains_rule("RemoteAreaSurchargeExemption"));
    }

    #[test]
    fn test_trace_has_base_then_surcharge() {
        let table = ShippingTable::default();
        let facts = OrderFacts::new(Decimal::new(100, 0), false, true, UserTier::Regular).unwrap();
        let mut trace = ExplanationTrace::new();
        ShippingEvaluator::new(&table).evaluate(&facts, &mut trace);
        let rules: Vec<_> = trace.entries().iter().map(|e| e.rule.as_str()).collect();
        assert_eq!(rules, vec!["StandardShippingFeeRule", REMOTE_SURCHARGE_RULE]);
    }

    #[test]
    fn test_remote_matcher() {
        let matcher = RemoteAreaMatcher::new(&ShippingTable::default().remote_regions).unwrap();
        assert!(matcher.is_remote("新疆乌鲁木齐市天山区"));
        assert!(matcher.is_remote("12 Main Rd, inner mongolia"));
        assert_eq!(matcher.matched_region("Lhasa, TIBET"), Some("TIBET"));
        assert!(!matcher.is_remote("上海市徐汇区漕溪北路"));
    }

    #[test]
    fn test_empty_region_list_never_remote() {
        let matcher = RemoteAreaMatcher::new(&[]).unwrap();
        assert!(!matcher.is_remote("Tibet"));
    }

    fn any_tier() -> impl Strategy<Value = UserTier> {
        prop_oneof![Just(UserTier::Regular), Just(UserTier::Vip), Just(UserTier::Svip)]
    }

    proptest! {
        #[test]
        fn prop_remote_surcharge(amount in 0i64..20_000, tier in any_tier()) {
            let base = ship(amount, tier, false).fee;
            let remote = ship(amount, tier, true).fee;
            if base > Decimal::ZERO {
                prop_assert_eq!(remote, base + Decimal::new(30, 0));
            } else {
                prop_assert_eq!(remote, Decimal::new(30, 0));
            }
        }
    }
}

//! Human-readable listing of every rule, with thresholds and rates taken
//! from the active rule table.

use serde::{Deserialize, Serialize};

use crate::config::RuleTable;

use super::shipping::REMOTE_SURCHARGE_RULE;
use super::{CancellationRule, DiscountRule, ReturnRule, RuleFamily, ShippingRule, TierRule};

/// One rule as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    pub name: String,
    pub family: RuleFamily,
    pub condition: String,
    pub action: String,

    /// Higher runs (or wins ties) first within the family
    pub priority: u32,
}

impl RuleDescriptor {
    fn new(
        name: &str,
        family: RuleFamily,
        condition: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            family,
            condition: condition.into(),
            action: action.into(),
            priority: 0,
        }
    }
}

/// List the rules of `family`, or of every family, highest priority first.
pub fn rule_catalog(table: &RuleTable, family: Option<RuleFamily>) -> Vec<RuleDescriptor> {
    let families: Vec<RuleFamily> = match family {
        Some(family) => vec![family],
        None => RuleFamily::ALL.to_vec(),
    };

    families
        .into_iter()
        .flat_map(|family| {
            let mut rules = family_rules(table, family);
            let count = rules.len() as u32;
            for (index, rule) in rules.iter_mut().enumerate() {
                rule.priority = count - index as u32;
            }
            rules
        })
        .collect()
}

/// Rules of one family in evaluation (or precedence) order.
fn family_rules(table: &RuleTable, family: RuleFamily) -> Vec<RuleDescriptor> {
    match family {
        RuleFamily::Tier => tier_rules(table),
        RuleFamily::Discount => discount_rules(table),
        RuleFamily::Shipping => shipping_rules(table),
        RuleFamily::Return => return_rules(table),
        RuleFamily::Cancellation => cancellation_rules(table),
    }
}

fn tier_rules(table: &RuleTable) -> Vec<RuleDescriptor> {
    TierRule::ORDER
        .iter()
        .map(|rule| {
            let condition = match rule {
                TierRule::Svip => format!("lifetime_spend >= {}", table.tier.svip_threshold),
                TierRule::Vip => format!("lifetime_spend >= {}", table.tier.vip_threshold),
                TierRule::Regular => "otherwise".to_string(),
            };
            RuleDescriptor::new(
                rule.name(),
                RuleFamily::Tier,
                condition,
                format!("tier = {}", rule.tier()),
            )
        })
        .collect()
}

fn discount_rules(table: &RuleTable) -> Vec<RuleDescriptor> {
    let discount = &table.discount;
    DiscountRule::BY_PRECEDENCE
        .iter()
        .map(|rule| {
            let condition = match rule {
                DiscountRule::FirstOrder => "is_first_order".to_string(),
                DiscountRule::Svip => "tier = SVIP".to_string(),
                DiscountRule::Vip => "tier = VIP".to_string(),
                DiscountRule::VolumeHigh => {
                    format!("order_amount >= {}", discount.volume_high.threshold)
                }
                DiscountRule::VolumeLow => format!(
                    "{} <= order_amount < {}",
                    discount.volume_low.threshold, discount.volume_high.threshold
                ),
            };
            RuleDescriptor::new(
                rule.name(),
                RuleFamily::Discount,
                condition,
                format!("discount_rate = {}", rule.rate(discount)),
            )
        })
        .collect()
}

fn shipping_rules(table: &RuleTable) -> Vec<RuleDescriptor> {
    let shipping = &table.shipping;
    let mut rules: Vec<RuleDescriptor> = ShippingRule::ORDER
        .iter()
        .map(|rule| {
            let (condition, action) = match rule {
                ShippingRule::SvipNextDay => (
                    "tier = SVIP".to_string(),
                    format!("fee 0, NextDay, eta {} day(s)", shipping.next_day_eta_days),
                ),
                ShippingRule::MemberFreeShipping => (
                    "tier in {VIP, SVIP}".to_string(),
                    format!("fee 0, Standard, eta {} days", shipping.standard_eta_days),
                ),
                ShippingRule::FreeShippingThreshold => (
                    format!("order_amount >= {}", shipping.free_shipping_threshold),
                    format!("fee 0, Standard, eta {} days", shipping.standard_eta_days),
                ),
                ShippingRule::StandardFee => (
                    "otherwise".to_string(),
                    format!(
                        "fee {}, Standard, eta {} days",
                        shipping.standard_fee, shipping.standard_eta_days
                    ),
                ),
            };
            RuleDescriptor::new(rule.name(), RuleFamily::Shipping, condition, action)
        })
        .collect();

    let exempt = if shipping.remote_surcharge_exempt.is_empty() {
        String::new()
    } else {
        let tiers: Vec<&str> = shipping
            .remote_surcharge_exempt
            .iter()
            .map(|t| t.as_str())
            .collect();
        format!(" (except {})", tiers.join(", "))
    };
    rules.push(RuleDescriptor::new(
        REMOTE_SURCHARGE_RULE,
        RuleFamily::Shipping,
        format!("is_remote_area{}", exempt),
        format!("fee += {}", shipping.remote_surcharge),
    ));
    rules
}

fn return_rules(table: &RuleTable) -> Vec<RuleDescriptor> {
    let returns = &table.returns;
    let entry = |rule: ReturnRule, condition: &str, action: String| {
        RuleDescriptor::new(rule.name(), RuleFamily::Return, condition, action)
    };
    vec![
        RuleDescriptor::new(
            "BaseReturnWindowRule",
            RuleFamily::Return,
            "always",
            format!(
                "window = {} days (Regular), {} days (VIP, SVIP)",
                returns.regular_window_days, returns.member_window_days
            ),
        ),
        entry(
            ReturnRule::ActivatedElectronics,
            "category = Electronics and is_activated",
            "not returnable".to_string(),
        ),
        entry(
            ReturnRule::SealedElectronics,
            "category = Electronics and not is_activated",
            "returnable within base window".to_string(),
        ),
        entry(
            ReturnRule::IntactAccessory,
            "category = Accessory and packaging_intact",
            "returnable within base window".to_string(),
        ),
        entry(
            ReturnRule::OpenedAccessory,
            "category = Accessory and not packaging_intact",
            "not returnable".to_string(),
        ),
        entry(
            ReturnRule::ServiceItem,
            "category = Service",
            "not returnable".to_string(),
        ),
        entry(
            ReturnRule::StandardReturn,
            "category = Other",
            "returnable within base window".to_string(),
        ),
    ]
}

fn cancellation_rules(table: &RuleTable) -> Vec<RuleDescriptor> {
    let cancellation = &table.cancellation;
    let entry = |rule: CancellationRule, condition: String, action: &str| {
        RuleDescriptor::new(rule.name(), RuleFamily::Cancellation, condition, action)
    };
    vec![
        entry(
            CancellationRule::ShippedBlock,
            "status in {shipped, delivered} or has_shipment".to_string(),
            "deny; use the return process",
        ),
        entry(
            CancellationRule::PendingWindow,
            format!(
                "status = pending and hours_since_created <= {}",
                cancellation.pending_window_hours
            ),
            "allow",
        ),
        entry(
            CancellationRule::PaidWindow,
            format!(
                "status = paid and hours_since_created <= {}",
                cancellation.paid_window_hours
            ),
            "allow after review",
        ),
        entry(
            CancellationRule::AlreadyTerminated,
            "status in {cancelled, returned}".to_string(),
            "deny",
        ),
        entry(
            CancellationRule::Default,
            "otherwise".to_string(),
            "deny; contact support",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_catalog_in_precedence_order() {
        let rules = rule_catalog(&RuleTable::default(), Some(RuleFamily::Discount));
        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "FirstOrderDiscountRule",
                "SVIPDiscountRule",
                "VolumeDiscount10kRule",
                "VIPDiscountRule",
                "VolumeDiscount5kRule",
            ]
        );
        assert_eq!(rules[0].priority, 5);
        assert_eq!(rules[4].priority, 1);
        assert_eq!(rules[1].action, "discount_rate = 0.90");
    }

    #[test]
    fn test_priorities_descend_within_family() {
        for rule_family in RuleFamily::ALL {
            let rules = rule_catalog(&RuleTable::default(), Some(rule_family));
            assert!(!rules.is_empty());
            assert!(rules.windows(2).all(|w| w[0].priority > w[1].priority));
            assert!(rules.iter().all(|r| r.family == rule_family));
        }
    }

    #[test]
    fn test_full_catalog_covers_all_families() {
        let rules = rule_catalog(&RuleTable::default(), None);
        assert_eq!(rules.len(), 3 + 5 + 5 + 7 + 5);
        assert_eq!(rules[0].family, RuleFamily::Tier);
    }

    #[test]
    fn test_catalog_reflects_table_values() {
        let mut table = RuleTable::default();
        table.shipping.remote_surcharge_exempt = vec![crate::facts::UserTier::Svip];
        let rules = rule_catalog(&table, Some(RuleFamily::Shipping));
        let surcharge = rules.last().unwrap();
        assert_eq!(surcharge.name, "RemoteAreaSurchargeRule");
        assert!(surcharge.condition.contains("except SVIP"));
        assert_eq!(surcharge.action, "fee += 30");
    }
}

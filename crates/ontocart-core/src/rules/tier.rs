//! Tier inference.
//!
//! Thresholds are evaluated high to low and the first match wins, so a user
//! exactly on a boundary lands in the higher tier.

use rust_decimal::Decimal;

use crate::config::TierTable;
use crate::facts::{UserTier, UserTierFacts};
use crate::trace::ExplanationTrace;

use super::{RuleEvaluator, RuleFamily};

/// Tier rules in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierRule {
    Svip,
    Vip,
    Regular,
}

impl TierRule {
    pub const ORDER: [TierRule; 3] = [TierRule::Svip, TierRule::Vip, TierRule::Regular];

    pub fn name(&self) -> &'static str {
        match self {
            TierRule::Svip => "SVIPTierRule",
            TierRule::Vip => "VIPTierRule",
            TierRule::Regular => "RegularTierRule",
        }
    }

    pub fn tier(&self) -> UserTier {
        match self {
            TierRule::Svip => UserTier::Svip,
            TierRule::Vip => UserTier::Vip,
            TierRule::Regular => UserTier::Regular,
        }
    }

    /// Inclusive spend threshold; `None` for the catch-all rule.
    fn threshold(&self, table: &TierTable) -> Option<Decimal> {
        match self {
            TierRule::Svip => Some(table.svip_threshold),
            TierRule::Vip => Some(table.vip_threshold),
            TierRule::Regular => None,
        }
    }
}

/// Evaluates tier rules against lifetime spend.
pub struct TierEvaluator<'a> {
    table: &'a TierTable,
}

impl<'a> TierEvaluator<'a> {
    pub fn new(table: &'a TierTable) -> Self {
        Self { table }
    }

    /// Tier for a spend amount, without a trace.
    pub fn tier_for(&self, lifetime_spend: Decimal) -> UserTier {
        self.matching_rule(lifetime_spend).tier()
    }

    fn matching_rule(&self, lifetime_spend: Decimal) -> TierRule {
        TierRule::ORDER
            .into_iter()
            .find(|rule| match rule.threshold(self.table) {
                Some(threshold) => lifetime_spend >= threshold,
                None => true,
            })
            .unwrap_or(TierRule::Regular)
    }
}

impl RuleEvaluator for TierEvaluator<'_> {
    type Facts = UserTierFacts;
    type Outcome = UserTier;

    fn family(&self) -> RuleFamily {
        RuleFamily::Tier
    }

    fn evaluate(&self, facts: &UserTierFacts, trace: &mut ExplanationTrace) -> UserTier {
        let rule = self.matching_rule(facts.lifetime_spend);
        let because = match rule.threshold(self.table) {
            Some(threshold) => format!(
                "lifetime spend {} >= {}",
                facts.lifetime_spend, threshold
            ),
            None => format!(
                "lifetime spend {} < {}",
                facts.lifetime_spend, self.table.vip_threshold
            ),
        };
        trace.fired(self.family(), rule.name(), because);
        rule.tier()
    }
}

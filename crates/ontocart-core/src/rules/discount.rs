//! Discount inference.
//!
//! Every rule whose condition holds becomes a candidate. Candidates are not
//! stacked; `ConflictResolver` picks exactly one of them.

use std::fmt;

use serde::{Deserialize, Serialize};

use rust_decimal::Decimal;

use crate::config::DiscountTable;
use crate::facts::{OrderFacts, UserTier};
use crate::trace::ExplanationTrace;

use super::{RuleEvaluator, RuleFamily};

/// Discount rules.
///
/// `precedence` breaks ties between candidates with equal rates. The order
/// is a fixed policy choice, not derived from the rates:
/// first order > SVIP > volume 10k > VIP > volume 5k.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscountRule {
    #[serde(rename = "FirstOrderDiscountRule")]
    FirstOrder,
    #[serde(rename = "SVIPDiscountRule")]
    Svip,
    #[serde(rename = "VolumeDiscount10kRule")]
    VolumeHigh,
    #[serde(rename = "VIPDiscountRule")]
    Vip,
    #[serde(rename = "VolumeDiscount5kRule")]
    VolumeLow,
}

impl DiscountRule {
    /// All rules, highest precedence first.
    pub const BY_PRECEDENCE: [DiscountRule; 5] = [
        DiscountRule::FirstOrder,
        DiscountRule::Svip,
        DiscountRule::VolumeHigh,
        DiscountRule::Vip,
        DiscountRule::VolumeLow,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DiscountRule::FirstOrder => "FirstOrderDiscountRule",
            DiscountRule::Svip => "SVIPDiscountRule",
            DiscountRule::VolumeHigh => "VolumeDiscount10kRule",
            DiscountRule::Vip => "VIPDiscountRule",
            DiscountRule::VolumeLow => "VolumeDiscount5kRule",
        }
    }

    /// Tie-break rank; higher wins.
    pub fn precedence(&self) -> u8 {
        match self {
            DiscountRule::FirstOrder => 5,
            DiscountRule::Svip => 4,
            DiscountRule::VolumeHigh => 3,
            DiscountRule::Vip => 2,
            DiscountRule::VolumeLow => 1,
        }
    }

    /// Configured rate for this rule.
    pub fn rate(&self, table: &DiscountTable) -> Decimal {
        match self {
            DiscountRule::FirstOrder => table.first_order_rate,
            DiscountRule::Svip => table.svip_rate,
            DiscountRule::VolumeHigh => table.volume_high.rate,
            DiscountRule::Vip => table.vip_rate,
            DiscountRule::VolumeLow => table.volume_low.rate,
        }
    }
}

impl fmt::Display for DiscountRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A discount rule that fired, before conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscountCandidate {
    pub rule: DiscountRule,
    pub rate: Decimal,
}

/// Evaluates discount rules against order facts.
pub struct DiscountEvaluator<'a> {
    table: &'a DiscountTable,
}

impl<'a> DiscountEvaluator<'a> {
    pub fn new(table: &'a DiscountTable) -> Self {
        Self { table }
    }

    fn candidate(&self, rule: DiscountRule) -> DiscountCandidate {
        DiscountCandidate {
            rule,
            rate: rule.rate(self.table),
        }
    }
}

impl RuleEvaluator for DiscountEvaluator<'_> {
    type Facts = OrderFacts;
    type Outcome = Vec<DiscountCandidate>;

    fn family(&self) -> RuleFamily {
        RuleFamily::Discount
    }

    fn evaluate(&self, facts: &OrderFacts, trace: &mut ExplanationTrace) -> Vec<DiscountCandidate> {
        let mut candidates = Vec::new();
        let mut fire = |rule: DiscountRule, because: String| {
            let candidate = self.candidate(rule);
            trace.fired(
                RuleFamily::Discount,
                rule.name(),
                format!("{} (rate {})", because, candidate.rate),
            );
            candidates.push(candidate);
        };

        // 1. Membership
        match facts.tier {
            UserTier::Svip => fire(DiscountRule::Svip, "tier is SVIP".to_string()),
            UserTier::Vip => fire(DiscountRule::Vip, "tier is VIP".to_string()),
            UserTier::Regular => {}
        }

        // 2. Volume; the higher step subsumes the lower one
        let volume_high = &self.table.volume_high;
        let volume_low = &self.table.volume_low;
        if facts.order_amount >= volume_high.threshold {
            fire(
                DiscountRule::VolumeHigh,
                format!("order amount {} >= {}", facts.order_amount, volume_high.threshold),
            );
        } else if facts.order_amount >= volume_low.threshold {
            fire(
                DiscountRule::VolumeLow,
                format!("order amount {} >= {}", facts.order_amount, volume_low.threshold),
            );
        }

        // 3. First order
        if facts.is_first_order {
            fire(DiscountRule::FirstOrder, "this is the user's first order".to_string());
        }

        candidates
    }
}

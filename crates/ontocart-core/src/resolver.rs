//! Resolver: picks one discount out of the fired candidates.
//!
//! The resolver applies strict, non-configurable policy rules:
//! 1. No candidates → `NoDiscount` at rate 1.0
//! 2. Otherwise the lowest rate wins (best value for the customer)
//! 3. Equal rates → highest `DiscountRule::precedence` wins
//!
//! Discounts never stack. Rule 3 is a fixed policy ordering, not a tuning knob.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::facts::round_currency;
use crate::rules::{DiscountCandidate, RuleFamily};
use crate::trace::ExplanationTrace;

/// Rule name reported when nothing fired.
pub const NO_DISCOUNT: &str = "NoDiscount";

/// The single discount applied to an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscountOutcome {
    pub rule_name: String,

    /// Multiplier applied to the order amount (0.95 = 5% off)
    pub discount_rate: Decimal,

    /// `order_amount × discount_rate`, rounded to currency precision
    pub final_amount: Decimal,
}

impl DiscountOutcome {
    /// Whether any discount rule won.
    pub fn is_applied(&self) -> bool {
        self.rule_name != NO_DISCOUNT
    }

    /// Amount saved relative to `order_amount`.
    pub fn discount_amount(&self, order_amount: Decimal) -> Decimal {
        order_amount - self.final_amount
    }
}

/// The ConflictResolver picks the winning discount.
pub struct ConflictResolver {
    currency_scale: u32,
}

impl ConflictResolver {
    pub fn new(currency_scale: u32) -> Self {
        Self { currency_scale }
    }

    /// Pick the winning candidate, if any.
    pub fn select(&self, candidates: &[DiscountCandidate]) -> Option<DiscountCandidate> {
        candidates.iter().copied().min_by(compare_candidates)
    }

    /// Resolve candidates into one outcome for `order_amount`.
    ///
    /// The winner and every losing candidate are recorded in `trace`.
    pub fn resolve(
        &self,
        candidates: &[DiscountCandidate],
        order_amount: Decimal,
        trace: &mut ExplanationTrace,
    ) -> DiscountOutcome {
        let Some(winner) = self.select(candidates) else {
            trace.fired(
                RuleFamily::Discount,
                NO_DISCOUNT,
                "no discount rule applied (rate 1.0)",
            );
            return DiscountOutcome {
                rule_name: NO_DISCOUNT.to_string(),
                discount_rate: Decimal::ONE,
                final_amount: round_currency(order_amount, self.currency_scale),
            };
        };

        let final_amount = round_currency(order_amount * winner.rate, self.currency_scale);

        let others: Vec<&str> = candidates
            .iter()
            .filter(|c| c.rule != winner.rule)
            .map(|c| c.rule.name())
            .collect();
        let because = if others.is_empty() {
            format!("it was the only applicable discount (rate {})", winner.rate)
        } else {
            format!(
                "rate {} is the best of {} candidates; not stacked with {}",
                winner.rate,
                candidates.len(),
                others.join(", ")
            )
        };
        trace.fired(RuleFamily::Discount, format!("{} selected", winner.rule.name()), because);

        DiscountOutcome {
            rule_name: winner.rule.name().to_string(),
            discount_rate: winner.rate,
            final_amount,
        }
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Lower rate first; on equal rates, higher precedence first.
fn compare_candidates(a: &DiscountCandidate, b: &DiscountCandidate) -> Ordering {
    a.rate
        .cmp(&b.rate)
        .then_with(|| b.rule.precedence().cmp(&a.rule.precedence()))
}

//! Rule families.
//!
//! Each family is a fixed, ordered set of tagged rules evaluated in code
//! order. Families never consult each other: tier inference runs first and
//! its result is passed into the others as a fact.

pub mod cancellation;
pub mod catalog;
pub mod discount;
pub mod returns;
pub mod shipping;
pub mod tier;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::facts::InvalidFactError;
use crate::trace::ExplanationTrace;

pub use cancellation::{CancellationEvaluator, CancellationOutcome, CancellationRule};
pub use catalog::{rule_catalog, RuleDescriptor};
pub use discount::{DiscountCandidate, DiscountEvaluator, DiscountRule};
pub use returns::{ReturnEvaluator, ReturnOutcome, ReturnRule};
pub use shipping::{
    RemoteAreaMatcher, ShippingEvaluator, ShippingMethod, ShippingOutcome, ShippingRule,
};
pub use tier::{TierEvaluator, TierRule};

/// A group of rules sharing an output type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleFamily {
    Tier,
    Discount,
    Shipping,
    Return,
    Cancellation,
}

impl RuleFamily {
    pub const ALL: [RuleFamily; 5] = [
        RuleFamily::Tier,
        RuleFamily::Discount,
        RuleFamily::Shipping,
        RuleFamily::Return,
        RuleFamily::Cancellation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleFamily::Tier => "tier",
            RuleFamily::Discount => "discount",
            RuleFamily::Shipping => "shipping",
            RuleFamily::Return => "return",
            RuleFamily::Cancellation => "cancellation",
        }
    }
}

impl fmt::Display for RuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleFamily {
    type Err = InvalidFactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tier" | "user_level" => Ok(RuleFamily::Tier),
            "discount" => Ok(RuleFamily::Discount),
            "shipping" => Ok(RuleFamily::Shipping),
            "return" | "returns" => Ok(RuleFamily::Return),
            "cancellation" | "cancel" => Ok(RuleFamily::Cancellation),
            other => Err(InvalidFactError::new(
                "rule_family",
                format!("unknown rule family '{}'", other),
            )),
        }
    }
}

/// Trait implemented by every rule family.
///
/// Evaluation is pure: the same facts always give the same outcome and the
/// same trace entries.
pub trait RuleEvaluator {
    /// Facts the family reads
    type Facts;

    /// What the family decides
    type Outcome;

    /// Which family this is.
    fn family(&self) -> RuleFamily;

    /// Evaluate the facts, recording every rule that fires.
    fn evaluate(&self, facts: &Self::Facts, trace: &mut ExplanationTrace) -> Self::Outcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_parse_round_trips_display() {
        for family in RuleFamily::ALL {
            assert_eq!(family.to_string().parse::<RuleFamily>().unwrap(), family);
        }
    }

    #[test]
    fn test_unknown_family_rejected() {
        assert!("loyalty".parse::<RuleFamily>().is_err());
    }
}

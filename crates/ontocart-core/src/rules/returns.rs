//! Return policy inference.
//!
//! The tier sets a base window; the product category then decides whether
//! the item is returnable at all and which conditions apply.

use serde::{Deserialize, Serialize};

use crate::config::RuleTable;
use crate::facts::{ProductCategory, ReturnFacts};
use crate::trace::ExplanationTrace;

use super::{RuleEvaluator, RuleFamily};

/// Return decision for one item.
///
/// `returnable == false` always comes with `window_days == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReturnOutcome {
    pub returnable: bool,
    pub window_days: u32,
    pub conditions: Vec<String>,
}

impl ReturnOutcome {
    fn returnable(window_days: u32, conditions: Vec<String>) -> Self {
        Self {
            returnable: true,
            window_days,
            conditions,
        }
    }

    fn not_returnable(conditions: Vec<String>) -> Self {
        Self {
            returnable: false,
            window_days: 0,
            conditions,
        }
    }
}

/// Category rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnRule {
    ActivatedElectronics,
    SealedElectronics,
    IntactAccessory,
    OpenedAccessory,
    ServiceItem,
    StandardReturn,
}

impl ReturnRule {
    pub fn name(&self) -> &'static str {
        match self {
            ReturnRule::ActivatedElectronics => "ActivatedElectronicsReturnRule",
            ReturnRule::SealedElectronics => "UnactivatedElectronicsReturnRule",
            ReturnRule::IntactAccessory => "IntactAccessoryReturnRule",
            ReturnRule::OpenedAccessory => "OpenedAccessoryReturnRule",
            ReturnRule::ServiceItem => "ServiceNonReturnableRule",
            ReturnRule::StandardReturn => "StandardReturnRule",
        }
    }

    /// The category rule that applies to `facts`.
    pub fn for_facts(facts: &ReturnFacts) -> Self {
        match facts.product_category {
            ProductCategory::Electronics if facts.is_activated => ReturnRule::ActivatedElectronics,
            ProductCategory::Electronics => ReturnRule::SealedElectronics,
            ProductCategory::Accessory if facts.packaging_intact => ReturnRule::IntactAccessory,
            ProductCategory::Accessory => ReturnRule::OpenedAccessory,
            ProductCategory::Service => ReturnRule::ServiceItem,
            ProductCategory::Other => ReturnRule::StandardReturn,
        }
    }

    fn because(&self) -> &'static str {
        match self {
            ReturnRule::ActivatedElectronics => "electronics item has been activated",
            ReturnRule::SealedElectronics => "electronics item is unactivated",
            ReturnRule::IntactAccessory => "accessory packaging is intact",
            ReturnRule::OpenedAccessory => "accessory packaging is not intact",
            ReturnRule::ServiceItem => "service items cannot be returned",
            ReturnRule::StandardReturn => "no category restriction applies",
        }
    }
}

/// Evaluates return policy rules.
pub struct ReturnEvaluator<'a> {
    table: &'a RuleTable,
}

impl<'a> ReturnEvaluator<'a> {
    pub fn new(table: &'a RuleTable) -> Self {
        Self { table }
    }
}

impl RuleEvaluator for ReturnEvaluator<'_> {
    type Facts = ReturnFacts;
    type Outcome = ReturnOutcome;

    fn family(&self) -> RuleFamily {
        RuleFamily::Return
    }

    fn evaluate(&self, facts: &ReturnFacts, trace: &mut ExplanationTrace) -> ReturnOutcome {
        let base_window = self.table.return_window(facts.tier);
        trace.fired(
            self.family(),
            "BaseReturnWindowRule",
            format!("tier is {} ({} day window)", facts.tier, base_window),
        );

        let rule = ReturnRule::for_facts(facts);
        trace.fired(self.family(), rule.name(), rule.because());

        match rule {
            ReturnRule::ActivatedElectronics => {
                ReturnOutcome::not_returnable(vec!["device must be unactivated".to_string()])
            }
            ReturnRule::SealedElectronics => ReturnOutcome::returnable(
                base_window,
                vec!["factory-seal/activation state verified".to_string()],
            ),
            ReturnRule::IntactAccessory => ReturnOutcome::returnable(
                base_window,
                vec!["packaging must remain intact".to_string()],
            ),
            ReturnRule::OpenedAccessory => ReturnOutcome::not_returnable(Vec::new()),
            ReturnRule::ServiceItem => {
                ReturnOutcome::not_returnable(vec!["service items are non-returnable".to_string()])
            }
            ReturnRule::StandardReturn => ReturnOutcome::returnable(base_window, Vec::new()),
        }
    }
}

//! Explanation traces for inference results.
//!
//! Every rule that fires records why it fired. The trace is ordered in
//! evaluation order so a caller can replay the reasoning step by step.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rules::RuleFamily;

/// One rule firing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TraceEntry {
    /// Family the rule belongs to
    pub family: RuleFamily,

    /// Rule name (e.g. "VIPDiscountRule")
    pub rule: String,

    /// Condition that held
    pub because: String,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] rule {} fired because {}", self.family, self.rule, self.because)
    }
}

/// Ordered list of rule firings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ExplanationTrace {
    entries: Vec<TraceEntry>,
}

impl ExplanationTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `rule` fired because `because` held.
    pub fn fired(
        &mut self,
        family: RuleFamily,
        rule: impl Into<String>,
        because: impl Into<String>,
    ) {
        let entry = TraceEntry {
            family,
            rule: rule.into(),
            because: because.into(),
        };
        tracing::debug!(
            family = %entry.family,
            rule = %entry.rule,
            because = %entry.because,
            "rule fired"
        );
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries belonging to one family.
    pub fn for_family(&self, family: RuleFamily) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(move |e| e.family == family)
    }

    /// Whether a rule with this name fired.
    pub fn contains_rule(&self, rule: &str) -> bool {
        self.entries.iter().any(|e| e.rule == rule)
    }

    /// Human-readable lines, one per firing.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_order() {
        let mut trace = ExplanationTrace::new();
        trace.fired(RuleFamily::Tier, "VIPTierRule", "lifetime spend 6000 >= 5000");
        trace.fired(RuleFamily::Discount, "VIPDiscountRule", "tier is VIP");

        let rules: Vec<_> = trace.entries().iter().map(|e| e.rule.as_str()).collect();
        assert_eq!(rules, vec!["VIPTierRule", "VIPDiscountRule"]);
    }

    #[test]
    fn test_line_format() {
        let mut trace = ExplanationTrace::new();
        trace.fired(RuleFamily::Shipping, "StandardFeeRule", "order amount 120 < 500");
        assert_eq!(
            trace.lines(),
            vec!["[shipping] rule StandardFeeRule fired because order amount 120 < 500"]
        );
    }

    #[test]
    fn test_for_family_filters() {
        let mut trace = ExplanationTrace::new();
        trace.fired(RuleFamily::Tier, "RegularTierRule", "spend below 5000");
        trace.fired(RuleFamily::Return, "BaseReturnWindowRule", "tier is Regular");
        assert_eq!(trace.for_family(RuleFamily::Return).count(), 1);
        assert!(trace.contains_rule("RegularTierRule"));
        assert!(!trace.contains_rule("SVIPTierRule"));
    }

    #[test]
    fn test_serializes_as_list() {
        let mut trace = ExplanationTrace::new();
        trace.fired(RuleFamily::Discount, "NoDiscount", "no discount rule applied");
        let value = serde_json::to_value(&trace).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["rule"], "NoDiscount");
        assert_eq!(value[0]["family"], "discount");
    }
}

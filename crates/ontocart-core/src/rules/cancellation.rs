//! Cancellation policy inference.
//!
//! Whether a placed order may still be cancelled depends on its status, on
//! whether a shipment exists, and on how long ago it was created.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::CancellationTable;
use crate::facts::{CancellationFacts, OrderStatus};
use crate::trace::ExplanationTrace;

use super::{RuleEvaluator, RuleFamily};

/// Cancellation rules in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancellationRule {
    #[serde(rename = "ShippedCancellationBlockRule")]
    ShippedBlock,
    #[serde(rename = "Pending24hCancellationRule")]
    PendingWindow,
    #[serde(rename = "Paid12hCancellationRule")]
    PaidWindow,
    #[serde(rename = "AlreadyTerminatedCancellationRule")]
    AlreadyTerminated,
    #[serde(rename = "DefaultCancellationRule")]
    Default,
}

impl CancellationRule {
    pub fn name(&self) -> &'static str {
        match self {
            CancellationRule::ShippedBlock => "ShippedCancellationBlockRule",
            CancellationRule::PendingWindow => "Pending24hCancellationRule",
            CancellationRule::PaidWindow => "Paid12hCancellationRule",
            CancellationRule::AlreadyTerminated => "AlreadyTerminatedCancellationRule",
            CancellationRule::Default => "DefaultCancellationRule",
        }
    }
}

/// Cancellation decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CancellationOutcome {
    pub allowed: bool,
    pub rule_name: CancellationRule,

    /// Cancellation window in hours, when the status has one
    pub deadline_hours: Option<Decimal>,

    pub reason: String,
}

/// Evaluates cancellation rules.
pub struct CancellationEvaluator<'a> {
    table: &'a CancellationTable,
}

impl<'a> CancellationEvaluator<'a> {
    pub fn new(table: &'a CancellationTable) -> Self {
        Self { table }
    }

    fn decide(&self, facts: &CancellationFacts) -> CancellationOutcome {
        let hours = facts.hours_since_created;
        let denied = |rule_name, deadline_hours, reason: String| CancellationOutcome {
            allowed: false,
            rule_name,
            deadline_hours,
            reason,
        };

        if matches!(facts.status, OrderStatus::Shipped | OrderStatus::Delivered)
            || facts.has_shipment
        {
            return denied(
                CancellationRule::ShippedBlock,
                Some(Decimal::ZERO),
                "order has shipped; use the return process instead".to_string(),
            );
        }

        match facts.status {
            OrderStatus::Pending => {
                let window = self.table.pending_window_hours;
                if hours <= window {
                    CancellationOutcome {
                        allowed: true,
                        rule_name: CancellationRule::PendingWindow,
                        deadline_hours: Some(window),
                        reason: format!(
                            "pending order can be cancelled within {} hours ({} elapsed)",
                            window, hours
                        ),
                    }
                } else {
                    denied(
                        CancellationRule::Default,
                        Some(window),
                        format!("exceeded the {} hour window for pending orders", window),
                    )
                }
            }
            OrderStatus::Paid => {
                let window = self.table.paid_window_hours;
                if hours <= window {
                    CancellationOutcome {
                        allowed: true,
                        rule_name: CancellationRule::PaidWindow,
                        deadline_hours: Some(window),
                        reason: format!(
                            "paid, unshipped order can be cancelled within {} hours after review",
                            window
                        ),
                    }
                } else {
                    denied(
                        CancellationRule::Default,
                        Some(window),
                        format!("exceeded the {} hour window for paid orders", window),
                    )
                }
            }
            OrderStatus::Cancelled | OrderStatus::Returned => denied(
                CancellationRule::AlreadyTerminated,
                None,
                format!("order is already {}", facts.status),
            ),
            _ => denied(
                CancellationRule::Default,
                None,
                format!(
                    "orders in status '{}' cannot be cancelled automatically; contact support",
                    facts.status
                ),
            ),
        }
    }
}

impl RuleEvaluator for CancellationEvaluator<'_> {
    type Facts = CancellationFacts;
    type Outcome = CancellationOutcome;

    fn family(&self) -> RuleFamily {
        RuleFamily::Cancellation
    }

    fn evaluate(
        &self,
        facts: &CancellationFacts,
        trace: &mut ExplanationTrace,
    ) -> CancellationOutcome {
        let outcome = self.decide(facts);
        trace.fired(self.family(), outcome.rule_name.name(), outcome.reason.clone());
        outcome
    }
}

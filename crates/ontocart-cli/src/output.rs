//! Output rendering for CLI commands.

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

use ontocart_core::{
    CancellationOutcome, DiscountExplanation, ExplanationTrace, OrderDecision, RuleDescriptor,
    ValidationReport,
};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
    /// YAML
    Yaml,
}

/// Something the CLI can print in every format.
pub trait Render: Serialize {
    fn text(&self) -> String;
}

pub fn print<T: Render>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", value.text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn trace_text(trace: &ExplanationTrace, out: &mut String) {
    out.push_str("\nWhy:\n");
    for line in trace.lines() {
        out.push_str(&format!("  - {}\n", line));
    }
}

impl Render for OrderDecision {
    fn text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Tier:      {}\n", self.tier));
        if let Some(assessment) = &self.tier_assessment {
            if assessment.should_upgrade {
                let recorded = assessment
                    .recorded
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "none".to_string());
                out.push_str(&format!(
                    "           (recorded {}, should become {})\n",
                    recorded, assessment.inferred
                ));
            }
        }
        out.push_str(&format!(
            "Discount:  {} (rate {})\n",
            self.discount.rule_name, self.discount.discount_rate
        ));
        out.push_str(&format!(
            "Shipping:  fee {}, {}, {} day(s)\n",
            self.shipping.fee, self.shipping.method, self.shipping.eta_days
        ));
        if let Some(policy) = &self.return_policy {
            if policy.returnable {
                out.push_str(&format!("Returns:   within {} days\n", policy.window_days));
            } else {
                out.push_str("Returns:   not returnable\n");
            }
            for condition in &policy.conditions {
                out.push_str(&format!("           * {}\n", condition));
            }
        }

        let summary = &self.summary;
        out.push_str(&format!("\nOriginal:  {}\n", summary.original_amount));
        out.push_str(&format!("Discount: -{}\n", summary.discount_amount));
        out.push_str(&format!("Subtotal:  {}\n", summary.subtotal));
        out.push_str(&format!("Shipping: +{}\n", summary.shipping_fee));
        out.push_str(&format!("Total:     {}\n", summary.total_payable));

        trace_text(&self.explanation_trace, &mut out);
        out
    }
}

impl Render for DiscountExplanation {
    fn text(&self) -> String {
        let mut out = String::new();
        if self.discount_applied {
            out.push_str(&format!(
                "{} applies: rate {}, {} off, pay {}\n",
                self.rule_name, self.discount_rate, self.discount_amount, self.final_amount
            ));
        } else {
            out.push_str(&format!("No discount applies; pay {}\n", self.final_amount));
        }
        trace_text(&self.explanation_trace, &mut out);
        out
    }
}

/// Cancellation outcome with the trace that produced it.
#[derive(Serialize)]
pub struct CancellationReport {
    #[serde(flatten)]
    pub outcome: CancellationOutcome,
    pub explanation_trace: ExplanationTrace,
}

impl Render for CancellationReport {
    fn text(&self) -> String {
        let verdict = if self.outcome.allowed {
            "ALLOWED"
        } else {
            "DENIED"
        };
        let mut out = format!("{}: {}\n", verdict, self.outcome.reason);
        out.push_str(&format!("Rule: {}\n", self.outcome.rule_name.name()));
        if let Some(deadline) = self.outcome.deadline_hours {
            out.push_str(&format!("Window: {} hours\n", deadline));
        }
        trace_text(&self.explanation_trace, &mut out);
        out
    }
}

impl Render for ValidationReport {
    fn text(&self) -> String {
        if self.conforms {
            return format!("CONFORMS ({} triples checked)\n", self.triple_count);
        }
        let mut out = format!(
            "DOES NOT CONFORM: {} violation(s) in {} triples\n",
            self.violation_count, self.triple_count
        );
        for violation in &self.violations {
            out.push_str(&format!("  - {}\n", violation));
        }
        out
    }
}

/// A rule listing.
#[derive(Serialize)]
#[serde(transparent)]
pub struct Catalog(pub Vec<RuleDescriptor>);

impl Render for Catalog {
    fn text(&self) -> String {
        let mut out = String::new();
        let mut family = None;
        for rule in &self.0 {
            if family != Some(rule.family) {
                out.push_str(&format!("\n[{}]\n", rule.family));
                family = Some(rule.family);
            }
            out.push_str(&format!(
                "  {:>2}  {:<36} if {} then {}\n",
                rule.priority, rule.name, rule.condition, rule.action
            ));
        }
        out
    }
}

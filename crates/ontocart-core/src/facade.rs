//! The inference engine: one entry point over every rule family.
//!
//! Families are evaluated in a fixed order (tier, discount, shipping,
//! return) and every firing lands in a single explanation trace. The engine
//! owns only immutable data and can be shared across threads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AmountBasis, ConfigError, RuleTable};
use crate::facts::{
    ensure_non_negative, round_currency, CancellationFacts, InvalidFactError, OrderFacts,
    ProductCategory, ReturnFacts, UserTier, UserTierFacts,
};
use crate::resolver::{ConflictResolver, DiscountOutcome};
use crate::rules::{
    rule_catalog, CancellationEvaluator, CancellationOutcome, DiscountEvaluator,
    RemoteAreaMatcher, ReturnEvaluator, ReturnOutcome, RuleDescriptor, RuleEvaluator,
    RuleFamily, ShippingEvaluator, ShippingOutcome, TierEvaluator,
};
use crate::trace::ExplanationTrace;
use crate::validator::{
    LineItem, OrderRecord, ProductLookup, ShapeSet, StructuralValidator, ValidationReport,
};

/// Recorded tier versus the tier the spend implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAssessment {
    pub recorded: Option<UserTier>,
    pub inferred: UserTier,

    /// The stored tier is stale and should be replaced by `inferred`
    pub should_upgrade: bool,
}

impl TierAssessment {
    fn new(recorded: Option<UserTier>, inferred: UserTier) -> Self {
        Self {
            recorded,
            inferred,
            should_upgrade: recorded.is_some_and(|r| r != inferred),
        }
    }
}

/// What the customer pays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub original_amount: Decimal,
    pub discount_amount: Decimal,

    /// Discounted amount before shipping
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total_payable: Decimal,
}

/// Everything the engine decided about one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDecision {
    pub tier: UserTier,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_assessment: Option<TierAssessment>,

    pub discount: DiscountOutcome,
    pub shipping: ShippingOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_policy: Option<ReturnOutcome>,

    pub summary: OrderSummary,
    pub explanation_trace: ExplanationTrace,
}

/// Result of `InferenceEngine::explain_discount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountExplanation {
    pub discount_applied: bool,
    pub rule_name: String,
    pub discount_rate: Decimal,
    pub final_amount: Decimal,
    pub discount_amount: Decimal,
    pub explanation_trace: ExplanationTrace,
}

/// Raw commerce data for one order, before facts are derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub lifetime_spend: Decimal,

    /// Orders placed before this one
    #[serde(default)]
    pub order_count: u32,

    /// Tier currently stored for the user, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_tier: Option<UserTier>,

    pub order_amount: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,

    /// Overrides address-based remote detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_remote_area: Option<bool>,

    /// Set to also infer the return policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_category: Option<ProductCategory>,

    #[serde(default)]
    pub is_activated: bool,

    #[serde(default = "default_true")]
    pub packaging_intact: bool,
}

fn default_true() -> bool {
    true
}

impl OrderRequest {
    pub fn new(lifetime_spend: Decimal, order_count: u32, order_amount: Decimal) -> Self {
        Self {
            lifetime_spend,
            order_count,
            recorded_tier: None,
            order_amount,
            shipping_address: None,
            is_remote_area: None,
            product_category: None,
            is_activated: false,
            packaging_intact: true,
        }
    }
}

/// One line of a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: String,
    pub unit_price: Decimal,

    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// An order about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub order_id: String,

    /// Customer placing the order; empty when unknown
    #[serde(default)]
    pub customer_id: String,

    #[serde(default)]
    pub lifetime_spend: Decimal,

    #[serde(default)]
    pub order_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_tier: Option<UserTier>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,

    #[serde(default)]
    pub items: Vec<CheckoutItem>,
}

/// A checkout that passed validation and may be committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutDecision {
    pub record: OrderRecord,
    pub decision: OrderDecision,
    pub validation: ValidationReport,
    pub decided_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error(transparent)]
    InvalidFact(#[from] InvalidFactError),

    /// The record failed structural validation; the report is complete.
    #[error("Order rejected by structural validation: {}", format_violations(.0))]
    Rejected(ValidationReport),
}

fn format_violations(report: &ValidationReport) -> String {
    report
        .violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Deterministic rule inference over one rule table.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    table: RuleTable,
    remote_areas: RemoteAreaMatcher,
    validator: StructuralValidator,
}

impl InferenceEngine {
    /// Build an engine over a validated rule table.
    pub fn new(table: RuleTable) -> Result<Self, ConfigError> {
        Self::with_shapes(table, ShapeSet::default())
    }

    /// Build an engine with a custom shape set for order validation.
    pub fn with_shapes(table: RuleTable, shapes: ShapeSet) -> Result<Self, ConfigError> {
        table.validate()?;
        let remote_areas = RemoteAreaMatcher::new(&table.shipping.remote_regions).map_err(|e| {
            ConfigError::ValidationError(format!("shipping.remote_regions: {}", e))
        })?;
        Ok(Self {
            table,
            remote_areas,
            validator: StructuralValidator::new(shapes),
        })
    }

    /// The active rule table.
    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Whether a free-text shipping address is in a remote region.
    pub fn is_remote_address(&self, address: &str) -> bool {
        self.remote_areas.is_remote(address)
    }

    /// Tier implied by `user`.
    pub fn infer_tier(&self, user: &UserTierFacts, trace: &mut ExplanationTrace) -> UserTier {
        TierEvaluator::new(&self.table.tier).evaluate(user, trace)
    }

    /// Run every family for one order.
    ///
    /// The tier is recomputed from `user`; any tier carried by `order` or
    /// `returns` is replaced by it.
    pub fn infer_order_details(
        &self,
        user: &UserTierFacts,
        order: &OrderFacts,
        returns: Option<&ReturnFacts>,
    ) -> Result<OrderDecision, InvalidFactError> {
        user.validate()?;
        order.validate()?;

        let mut trace = ExplanationTrace::new();
        let tier = self.infer_tier(user, &mut trace);
        let order = order.with_tier(tier);

        let discount = self.resolve_discount(&order, &mut trace);
        let shipping = self.infer_shipping(&order, &discount, &mut trace);
        let return_policy = returns.map(|facts| {
            ReturnEvaluator::new(&self.table).evaluate(&facts.with_tier(tier), &mut trace)
        });

        let summary = self.summarize(order.order_amount, &discount, &shipping);
        tracing::info!(
            tier = %tier,
            discount = %discount.rule_name,
            total_payable = %summary.total_payable,
            "order inferred"
        );

        Ok(OrderDecision {
            tier,
            tier_assessment: None,
            discount,
            shipping,
            return_policy,
            summary,
            explanation_trace: trace,
        })
    }

    /// Derive facts from raw commerce data and run every family.
    pub fn infer_request(&self, request: &OrderRequest) -> Result<OrderDecision, InvalidFactError> {
        let user = UserTierFacts::new(request.lifetime_spend, request.order_count)?;
        let is_remote = request.is_remote_area.unwrap_or_else(|| {
            request
                .shipping_address
                .as_deref()
                .is_some_and(|address| self.is_remote_address(address))
        });
        let order = OrderFacts::new(
            request.order_amount,
            user.is_first_order(),
            is_remote,
            request.recorded_tier.unwrap_or_default(),
        )?;
        let returns = request.product_category.map(|category| {
            ReturnFacts::new(UserTier::Regular, category)
                .activated(request.is_activated)
                .packaging_intact(request.packaging_intact)
        });

        let mut decision = self.infer_order_details(&user, &order, returns.as_ref())?;
        let assessment = TierAssessment::new(request.recorded_tier, decision.tier);
        if assessment.should_upgrade {
            tracing::info!(
                recorded = ?assessment.recorded,
                inferred = %assessment.inferred,
                "stored tier is stale"
            );
        }
        decision.tier_assessment = Some(assessment);
        Ok(decision)
    }

    /// Explain which discount applies, without shipping or returns.
    pub fn explain_discount(
        &self,
        tier: UserTier,
        order_amount: Decimal,
        is_first_order: bool,
    ) -> Result<DiscountExplanation, InvalidFactError> {
        let order = OrderFacts::new(order_amount, is_first_order, false, tier)?;
        let mut trace = ExplanationTrace::new();
        let discount = self.resolve_discount(&order, &mut trace);
        Ok(DiscountExplanation {
            discount_applied: discount.is_applied(),
            discount_amount: discount.discount_amount(order_amount),
            rule_name: discount.rule_name,
            discount_rate: discount.discount_rate,
            final_amount: discount.final_amount,
            explanation_trace: trace,
        })
    }

    /// Whether an order may still be cancelled.
    pub fn infer_cancellation(
        &self,
        facts: &CancellationFacts,
    ) -> Result<(CancellationOutcome, ExplanationTrace), InvalidFactError> {
        facts.validate()?;
        let mut trace = ExplanationTrace::new();
        let outcome =
            CancellationEvaluator::new(&self.table.cancellation).evaluate(facts, &mut trace);
        tracing::info!(
            status = %facts.status,
            allowed = outcome.allowed,
            rule = outcome.rule_name.name(),
            "cancellation inferred"
        );
        Ok((outcome, trace))
    }

    /// Check an order record before it is committed.
    pub fn validate_order(
        &self,
        record: &OrderRecord,
        catalog: &dyn ProductLookup,
    ) -> ValidationReport {
        self.validator.validate(record, catalog)
    }

    /// Check a raw JSON order payload; literal types are checked too.
    pub fn validate_payload(
        &self,
        payload: &serde_json::Value,
        catalog: &dyn ProductLookup,
    ) -> ValidationReport {
        self.validator.validate_json(payload, catalog)
    }

    /// Price, infer and validate a new order.
    ///
    /// Nothing is committed here; a non-conforming record comes back as
    /// `CheckoutError::Rejected` with the full report.
    pub fn checkout(
        &self,
        request: &CheckoutRequest,
        catalog: &dyn ProductLookup,
    ) -> Result<CheckoutDecision, CheckoutError> {
        let mut order_amount = Decimal::ZERO;
        for item in &request.items {
            ensure_non_negative("unit_price", item.unit_price)?;
            order_amount = item
                .unit_price
                .checked_mul(Decimal::from(item.quantity))
                .and_then(|line_total| order_amount.checked_add(line_total))
                .ok_or_else(|| InvalidFactError::new("order_amount", "line item total overflows"))?;
        }

        let order = OrderRequest {
            recorded_tier: request.recorded_tier,
            shipping_address: request.shipping_address.clone(),
            ..OrderRequest::new(request.lifetime_spend, request.order_count, order_amount)
        };
        let decision = self.infer_request(&order)?;

        let customer_id = request.customer_id.trim();
        let record = OrderRecord {
            order_id: request.order_id.clone(),
            customer_ids: if customer_id.is_empty() {
                Vec::new()
            } else {
                vec![customer_id.to_string()]
            },
            total_amount: Some(order_amount),
            discount_rate: Some(decision.discount.discount_rate),
            items: request
                .items
                .iter()
                .map(|item| LineItem::new(item.product_id.clone(), item.quantity))
                .collect(),
        };

        let validation = self.validate_order(&record, catalog);
        if !validation.conforms {
            return Err(CheckoutError::Rejected(validation));
        }

        tracing::info!(
            order = %request.order_id,
            total_payable = %decision.summary.total_payable,
            "checkout accepted"
        );
        Ok(CheckoutDecision {
            record,
            decision,
            validation,
            decided_at: Utc::now(),
        })
    }

    /// Rules of one family, or all of them, highest priority first.
    pub fn rule_catalog(&self, family: Option<RuleFamily>) -> Vec<RuleDescriptor> {
        rule_catalog(&self.table, family)
    }

    fn resolve_discount(
        &self,
        order: &OrderFacts,
        trace: &mut ExplanationTrace,
    ) -> DiscountOutcome {
        let candidates = DiscountEvaluator::new(&self.table.discount).evaluate(order, trace);
        ConflictResolver::new(self.table.currency_scale).resolve(
            &candidates,
            order.order_amount,
            trace,
        )
    }

    fn infer_shipping(
        &self,
        order: &OrderFacts,
        discount: &DiscountOutcome,
        trace: &mut ExplanationTrace,
    ) -> ShippingOutcome {
        let evaluator = ShippingEvaluator::new(&self.table.shipping);
        match self.table.shipping.free_shipping_basis {
            AmountBasis::OrderAmount => evaluator.evaluate(order, trace),
            AmountBasis::DiscountedAmount => {
                let discounted = OrderFacts {
                    order_amount: discount.final_amount,
                    ..order.clone()
                };
                evaluator.evaluate(&discounted, trace)
            }
        }
    }

    fn summarize(
        &self,
        order_amount: Decimal,
        discount: &DiscountOutcome,
        shipping: &ShippingOutcome,
    ) -> OrderSummary {
        let scale = self.table.currency_scale;
        let subtotal = discount.final_amount;
        OrderSummary {
            original_amount: round_currency(order_amount, scale),
            discount_amount: round_currency(discount.discount_amount(order_amount), scale),
            subtotal,
            shipping_fee: shipping.fee,
            total_payable: round_currency(subtotal + shipping.fee, scale),
        }
    }
}

impl Default for InferenceEngine {
    /// Engine over the reference rule table.
    fn default() -> Self {
        let table = RuleTable::default();
        let remote_areas = RemoteAreaMatcher::new(&table.shipping.remote_regions)
            .unwrap_or_else(|_| RemoteAreaMatcher::disabled());
        Self {
            table,
            remote_areas,
            validator: StructuralValidator::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ShippingMethod;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn user(spend: i64, orders: u32) -> UserTierFacts {
        UserTierFacts::new(dec(spend), orders).unwrap()
    }

    fn order(amount: i64, first: bool, remote: bool) -> OrderFacts {
        OrderFacts::new(dec(amount), first, remote, UserTier::Regular).unwrap()
    }

    #[test]
    fn test_regular_first_order() {
        let engine = InferenceEngine::default();
        let decision = engine
            .infer_order_details(&user(0, 0), &order(1200, true, false), None)
            .unwrap();

        assert_eq!(decision.tier, UserTier::Regular);
        assert_eq!(decision.discount.rule_name, "FirstOrderDiscountRule");
        assert_eq!(decision.discount.discount_rate, Decimal::new(98, 2));
        assert_eq!(decision.discount.final_amount, dec(1176));
        // 1200 clears the 500 free-shipping threshold
        assert!(decision.shipping.is_free());
        assert_eq!(decision.summary.total_payable, dec(1176));
        assert_eq!(decision.summary.discount_amount, dec(24));
    }

    #[test]
    fn test_regular_first_order_below_threshold_pays_shipping() {
        let engine = InferenceEngine::default();
        let decision = engine
            .infer_order_details(&user(0, 0), &order(400, true, false), None)
            .unwrap();
        assert_eq!(decision.summary.subtotal, dec(392));
        assert_eq!(decision.shipping.fee, dec(15));
        assert_eq!(decision.summary.total_payable, dec(407));
    }

    #[test]
    fn test_vip_volume_tie() {
        let engine = InferenceEngine::default();
        let decision = engine
            .infer_order_details(&user(6000, 3), &order(8000, false, false), None)
            .unwrap();

        assert_eq!(decision.tier, UserTier::Vip);
        assert_eq!(decision.discount.rule_name, "VIPDiscountRule");
        assert_eq!(decision.discount.final_amount, dec(7600));
        assert!(decision.shipping.is_free());
        assert!(decision.explanation_trace.contains_rule("VolumeDiscount5kRule"));
    }

    #[test]
    fn test_svip_next_day() {
        let engine = InferenceEngine::default();
        let decision = engine
            .infer_order_details(&user(20000, 12), &order(3000, false, false), None)
            .unwrap();

        assert_eq!(decision.tier, UserTier::Svip);
        assert_eq!(decision.discount.rule_name, "SVIPDiscountRule");
        assert_eq!(decision.discount.final_amount, dec(2700));
        assert_eq!(decision.shipping.fee, Decimal::ZERO);
        assert_eq!(decision.shipping.method, ShippingMethod::NextDay);
        assert_eq!(decision.shipping.eta_days, 1);
    }

    #[test]
    fn test_activated_electronics_never_returnable() {
        let engine = InferenceEngine::default();
        let returns =
            ReturnFacts::new(UserTier::Regular, ProductCategory::Electronics).activated(true);
        for spend in [0, 6000, 20000] {
            let decision = engine
                .infer_order_details(&user(spend, 1), &order(100, false, false), Some(&returns))
                .unwrap();
            let policy = decision.return_policy.unwrap();
            assert!(!policy.returnable);
            assert_eq!(policy.window_days, 0);
        }
    }

    #[test]
    fn test_opened_accessory_regular() {
        let engine = InferenceEngine::default();
        let returns =
            ReturnFacts::new(UserTier::Regular, ProductCategory::Accessory).packaging_intact(false);
        let decision = engine
            .infer_order_details(&user(0, 1), &order(100, false, false), Some(&returns))
            .unwrap();
        let policy = decision.return_policy.unwrap();
        assert!(!policy.returnable);
        assert_eq!(policy.window_days, 0);
    }

    #[test]
    fn test_return_window_uses_inferred_tier() {
        let engine = InferenceEngine::default();
        // Facts claim Regular, spend says VIP
        let returns = ReturnFacts::new(UserTier::Regular, ProductCategory::Other);
        let decision = engine
            .infer_order_details(&user(7000, 4), &order(100, false, false), Some(&returns))
            .unwrap();
        assert_eq!(decision.return_policy.unwrap().window_days, 15);
    }

    #[test]
    fn test_negative_amount_names_field() {
        let engine = InferenceEngine::default();
        let bad = OrderFacts {
            order_amount: dec(-5),
            is_first_order: false,
            is_remote_area: false,
            tier: UserTier::Regular,
        };
        let err = engine.infer_order_details(&user(0, 0), &bad, None).unwrap_err();
        assert_eq!(err.field, "order_amount");
    }

    #[test]
    fn test_unknown_tier_in_request_rejected() {
        let payload = serde_json::json!({
            "order_amount": "100",
            "recorded_tier": "Gold"
        });
        let err = serde_json::from_value::<OrderRequest>(payload).unwrap_err();
        assert!(err.to_string().contains("tier"));
    }

    #[test]
    fn test_trace_follows_family_order() {
        let engine = InferenceEngine::default();
        let returns = ReturnFacts::new(UserTier::Regular, ProductCategory::Other);
        let decision = engine
            .infer_order_details(&user(0, 0), &order(100, true, true), Some(&returns))
            .unwrap();
        let families: Vec<RuleFamily> =
            decision.explanation_trace.entries().iter().map(|e| e.family).collect();
        let mut sorted = families.clone();
        sorted.sort();
        assert_eq!(families, sorted);
        assert_eq!(families[0], RuleFamily::Tier);
    }

    #[test]
    fn test_explain_non_applicable_discount() {
        let engine = InferenceEngine::default();
        let explanation = engine.explain_discount(UserTier::Regular, dec(300), false).unwrap();
        assert!(!explanation.discount_applied);
        assert_eq!(explanation.rule_name, "NoDiscount");
        assert_eq!(explanation.discount_rate, Decimal::ONE);
        assert_eq!(explanation.final_amount, dec(300));
        assert_eq!(explanation.discount_amount, Decimal::ZERO);
    }

    #[test]
    fn test_explain_applied_discount() {
        let engine = InferenceEngine::default();
        let explanation = engine.explain_discount(UserTier::Vip, dec(12000), false).unwrap();
        assert!(explanation.discount_applied);
        assert_eq!(explanation.rule_name, "VolumeDiscount10kRule");
        assert_eq!(explanation.discount_amount, dec(1200));
    }

    #[test]
    fn test_request_detects_remote_address() {
        let engine = InferenceEngine::default();
        let request = OrderRequest {
            shipping_address: Some("西藏拉萨市城关区".to_string()),
            ..OrderRequest::new(dec(0), 2, dec(100))
        };
        let decision = engine.infer_request(&request).unwrap();
        assert_eq!(decision.shipping.fee, dec(45));
        assert!(decision.explanation_trace.contains_rule("RemoteAreaSurchargeRule"));
    }

    #[test]
    fn test_request_tier_assessment() {
        let engine = InferenceEngine::default();
        let request = OrderRequest {
            recorded_tier: Some(UserTier::Regular),
            ..OrderRequest::new(dec(12000), 9, dec(100))
        };
        let assessment = engine.infer_request(&request).unwrap().tier_assessment.unwrap();
        assert_eq!(assessment.inferred, UserTier::Svip);
        assert!(assessment.should_upgrade);

        let unrecorded = engine
            .infer_request(&OrderRequest::new(dec(12000), 9, dec(100)))
            .unwrap()
            .tier_assessment
            .unwrap();
        assert!(!unrecorded.should_upgrade);
    }

    #[test]
    fn test_request_first_order_from_count() {
        let engine = InferenceEngine::default();
        let decision = engine.infer_request(&OrderRequest::new(dec(0), 0, dec(1000))).unwrap();
        assert_eq!(decision.discount.rule_name, "FirstOrderDiscountRule");
    }

    #[test]
    fn test_discounted_amount_basis() {
        let mut table = RuleTable::default();
        table.shipping.free_shipping_basis = AmountBasis::DiscountedAmount;
        let engine = InferenceEngine::new(table).unwrap();
        // 505 * 0.98 = 494.90, below the 500 threshold
        let decision = engine
            .infer_order_details(&user(0, 0), &order(505, true, false), None)
            .unwrap();
        assert_eq!(decision.shipping.fee, dec(15));
    }

    #[test]
    fn test_cancellation() {
        let engine = InferenceEngine::default();
        let facts =
            CancellationFacts::new(crate::facts::OrderStatus::Pending, dec(3), false).unwrap();
        let (outcome, trace) = engine.infer_cancellation(&facts).unwrap();
        assert!(outcome.allowed);
        assert!(trace.contains_rule("Pending24hCancellationRule"));
    }

    fn catalog() -> HashSet<String> {
        ["P-1".to_string(), "P-2".to_string()].into_iter().collect()
    }

    fn checkout_request() -> CheckoutRequest {
        CheckoutRequest {
            order_id: "O-1".to_string(),
            customer_id: "U-1".to_string(),
            lifetime_spend: dec(6000),
            order_count: 4,
            recorded_tier: Some(UserTier::Vip),
            shipping_address: None,
            items: vec![
                CheckoutItem {
                    product_id: "P-1".to_string(),
                    unit_price: dec(300),
                    quantity: 2,
                },
                CheckoutItem {
                    product_id: "P-2".to_string(),
                    unit_price: Decimal::new(4950, 2),
                    quantity: 1,
                },
            ],
        }
    }

    #[test]
    fn test_checkout_accepts_valid_order() {
        let engine = InferenceEngine::default();
        let accepted = engine.checkout(&checkout_request(), &catalog()).unwrap();
        assert_eq!(accepted.record.total_amount, Some(Decimal::new(64950, 2)));
        assert_eq!(accepted.record.discount_rate, Some(Decimal::new(95, 2)));
        assert!(accepted.validation.conforms);
        assert_eq!(accepted.decision.summary.subtotal, Decimal::new(61702, 2));
    }

    #[test]
    fn test_checkout_rejects_missing_customer() {
        let engine = InferenceEngine::default();
        let request = CheckoutRequest {
            customer_id: String::new(),
            ..checkout_request()
        };
        match engine.checkout(&request, &catalog()) {
            Err(CheckoutError::Rejected(report)) => {
                assert!(!report.conforms);
                assert!(report.violation_count >= 1);
                assert!(report.violations.iter().any(|v| v.path == "hasCustomer"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_checkout_rejects_unknown_product() {
        let engine = InferenceEngine::default();
        let mut request = checkout_request();
        request.items[1].product_id = "P-404".to_string();
        let err = engine.checkout(&request, &catalog()).unwrap_err();
        assert!(err.to_string().contains("hasProduct"));
    }

    #[test]
    fn test_checkout_rejects_empty_cart() {
        let engine = InferenceEngine::default();
        let request = CheckoutRequest {
            items: Vec::new(),
            ..checkout_request()
        };
        assert!(matches!(
            engine.checkout(&request, &catalog()),
            Err(CheckoutError::Rejected(_))
        ));
    }

    #[test]
    fn test_checkout_negative_price() {
        let engine = InferenceEngine::default();
        let mut request = checkout_request();
        request.items[0].unit_price = dec(-1);
        assert!(matches!(
            engine.checkout(&request, &catalog()),
            Err(CheckoutError::InvalidFact(ref e)) if e.field == "unit_price"
        ));
    }

    #[test]
    fn test_checkout_total_overflow_is_invalid_fact() {
        let engine = InferenceEngine::default();
        let mut request = checkout_request();
        request.items[0].unit_price = Decimal::MAX;
        request.items[0].quantity = 2;
        assert!(matches!(
            engine.checkout(&request, &catalog()),
            Err(CheckoutError::InvalidFact(ref e)) if e.field == "order_amount"
        ));
    }

    #[test]
    fn test_checkout_sum_overflow_is_invalid_fact() {
        let engine = InferenceEngine::default();
        let mut request = checkout_request();
        for item in &mut request.items {
            item.unit_price = Decimal::MAX;
            item.quantity = 1;
        }
        request.items.push(request.items[0].clone());
        assert!(matches!(
            engine.checkout(&request, &catalog()),
            Err(CheckoutError::InvalidFact(ref e)) if e.field == "order_amount"
        ));
    }

    #[test]
    fn test_invalid_table_rejected() {
        let mut table = RuleTable::default();
        table.tier.svip_threshold = dec(100);
        assert!(InferenceEngine::new(table).is_err());
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InferenceEngine>();
    }

    proptest! {
        #[test]
        fn prop_inference_is_idempotent(
            spend in 0i64..30_000,
            orders in 0u32..20,
            amount in 0i64..20_000,
            remote in any::<bool>(),
        ) {
            let engine = InferenceEngine::default();
            let facts = order(amount, orders == 0, remote);
            let first = engine.infer_order_details(&user(spend, orders), &facts, None).unwrap();
            let second = engine.infer_order_details(&user(spend, orders), &facts, None).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_total_is_subtotal_plus_shipping(
            spend in 0i64..30_000,
            amount in 0i64..20_000,
        ) {
            let engine = InferenceEngine::default();
            let decision = engine
                .infer_order_details(&user(spend, 1), &order(amount, false, false), None)
                .unwrap();
            let summary = decision.summary;
            prop_assert_eq!(summary.total_payable, summary.subtotal + summary.shipping_fee);
            prop_assert!(summary.subtotal <= summary.original_amount);
        }
    }
}

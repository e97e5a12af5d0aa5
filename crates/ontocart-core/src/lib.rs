//! # ontocart-core
//!
//! Deterministic rule inference for e-commerce orders.
//!
//! This crate answers, for one order:
//! - Which loyalty tier does the customer belong to?
//! - Which single discount applies?
//! - What does shipping cost, and how fast is it?
//! - Can the item be returned, and can the order still be cancelled?
//!
//! It also gates order creation with a structural validator that checks an
//! order record for missing or malformed fields before it is committed.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same facts always produce the same decision
//! 2. **No stacking**: Exactly one discount wins, lowest rate first
//! 3. **Traceable**: Every decision carries the rules that fired and why
//! 4. **Exact money**: All amounts are `Decimal`, rounded half to even
//!
//! ## Example
//!
//! ```rust,ignore
//! use ontocart_core::{InferenceEngine, OrderFacts, RuleTable, UserTier, UserTierFacts};
//!
//! let table = RuleTable::from_yaml_file("rules/default.yaml")?;
//! let engine = InferenceEngine::new(table)?;
//!
//! let user = UserTierFacts::new(dec!(6000), 3)?;
//! let order = OrderFacts::new(dec!(8000), false, false, UserTier::Regular)?;
//! let decision = engine.infer_order_details(&user, &order, None)?;
//!
//! println!("{} -> {}", decision.discount.rule_name, decision.summary.total_payable);
//! for line in decision.explanation_trace.lines() {
//!     println!("  {}", line);
//! }
//! ```

pub mod config;
pub mod facade;
pub mod facts;
pub mod resolver;
pub mod rules;
pub mod trace;
pub mod validator;

use std::sync::OnceLock;

use rust_decimal::Decimal;

// Re-export main types at crate root
pub use config::{AmountBasis, ConfigError, RuleTable};
pub use facade::{
    CheckoutDecision, CheckoutError, CheckoutItem, CheckoutRequest, DiscountExplanation,
    InferenceEngine, OrderDecision, OrderRequest, OrderSummary, TierAssessment,
};
pub use facts::{
    round_currency, CancellationFacts, InvalidFactError, OrderFacts, OrderStatus,
    ProductCategory, ReturnFacts, UserTier, UserTierFacts,
};
pub use resolver::{ConflictResolver, DiscountOutcome, NO_DISCOUNT};
pub use rules::{
    CancellationOutcome, CancellationRule, DiscountCandidate, DiscountRule, ReturnOutcome,
    ReturnRule, RuleDescriptor, RuleEvaluator, RuleFamily, ShippingMethod, ShippingOutcome,
    ShippingRule, TierRule,
};
pub use trace::{ExplanationTrace, TraceEntry};
pub use validator::{
    LineItem, OrderRecord, ProductLookup, ShapeSet, StructuralValidator, ValidationReport,
    Violation,
};

/// Engine over the reference rule table (built once, reused).
static DEFAULT_ENGINE: OnceLock<InferenceEngine> = OnceLock::new();

/// The shared engine over the reference rule table.
pub fn default_engine() -> &'static InferenceEngine {
    DEFAULT_ENGINE.get_or_init(InferenceEngine::default)
}

/// Infer tier, discount, shipping and (optionally) return policy under the
/// reference rule table.
///
/// # Arguments
///
/// * `user` - Spend and order history; the tier is recomputed from it
/// * `order` - The cart aggregate
/// * `returns` - Item attributes, when a return policy is wanted
pub fn infer_order_details(
    user: &UserTierFacts,
    order: &OrderFacts,
    returns: Option<&ReturnFacts>,
) -> Result<OrderDecision, InvalidFactError> {
    default_engine().infer_order_details(user, order, returns)
}

/// Explain the discount for a tier and amount under the reference table.
///
/// A scenario where no rule applies is not an error: it comes back with
/// `discount_applied == false` and rate 1.0.
pub fn explain_discount(
    tier: UserTier,
    order_amount: Decimal,
    is_first_order: bool,
) -> Result<DiscountExplanation, InvalidFactError> {
    default_engine().explain_discount(tier, order_amount, is_first_order)
}

/// Validate an order record with the default order shapes.
pub fn validate_order(record: &OrderRecord, catalog: &dyn ProductLookup) -> ValidationReport {
    default_engine().validate_order(record, catalog)
}

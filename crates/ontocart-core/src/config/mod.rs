//! Rule table loading and validation.
//!
//! Rule tables are structured data validated against JSON Schema, then
//! checked for semantic consistency. A loaded table is immutable; evaluators
//! borrow it for the lifetime of an engine.

mod parser;
mod schema;

pub use parser::{
    AmountBasis, CancellationTable, ConfigError, DiscountTable, ReturnTable, RuleTable,
    ShippingTable, TierTable, VolumeTier,
};
pub use schema::validate_rule_table_schema;

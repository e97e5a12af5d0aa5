//! JSON Schema validation for rule tables.
//!
//! Rule tables are validated against schema/rule-table.schema.json before
//! they are deserialized, so shape errors are reported with their location.

use std::sync::OnceLock;

/// Embedded rule table schema (loaded at compile time).
const RULE_TABLE_SCHEMA_JSON: &str = include_str!("../../../../schema/rule-table.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(RULE_TABLE_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result.as_ref().map_err(|e| e.clone())
}

/// Validate a rule table JSON value against the schema.
///
/// Returns every schema violation, each suffixed with its instance path.
pub fn validate_rule_table_schema(table_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(table_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_table_passes_schema() {
        let value = serde_json::json!({ "table_version": "1.0" });
        assert!(validate_rule_table_schema(&value).is_ok());
    }

    #[test]
    fn test_invalid_version_format_fails() {
        let value = serde_json::json!({ "table_version": "latest" });
        assert!(validate_rule_table_schema(&value).is_err());
    }

    #[test]
    fn test_malformed_amount_string_fails() {
        let value = serde_json::json!({
            "table_version": "1.0",
            "shipping": { "standard_fee": "fifteen" }
        });
        let errors = validate_rule_table_schema(&value).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("standard_fee")));
    }

    #[test]
    fn test_unknown_exempt_tier_fails() {
        let value = serde_json::json!({
            "table_version": "1.0",
            "shipping": { "remote_surcharge_exempt": ["Gold"] }
        });
        assert!(validate_rule_table_schema(&value).is_err());
    }

    #[test]
    fn test_volume_tier_requires_rate() {
        let value = serde_json::json!({
            "table_version": "1.0",
            "discount": { "volume_high": { "threshold": "10000" } }
        });
        assert!(validate_rule_table_schema(&value).is_err());
    }

    #[test]
    fn test_full_table_passes() {
        let value = serde_json::json!({
            "table_version": "1.2.0",
            "name": "Holiday policy",
            "currency_scale": 2,
            "tier": { "vip_threshold": "4000", "svip_threshold": "9000" },
            "discount": {
                "vip_rate": "0.93",
                "svip_rate": 0.88,
                "first_order_rate": "0.98",
                "volume_high": { "threshold": "10000", "rate": "0.90" },
                "volume_low": { "threshold": "5000", "rate": "0.95" }
            },
            "shipping": {
                "free_shipping_threshold": "300",
                "free_shipping_basis": "discounted_amount",
                "standard_fee": "10",
                "remote_surcharge": "25",
                "standard_eta_days": 2,
                "next_day_eta_days": 1,
                "remote_surcharge_exempt": ["SVIP"],
                "remote_regions": ["Tibet"]
            },
            "returns": { "regular_window_days": 7, "member_window_days": 30 },
            "cancellation": { "pending_window_hours": "48", "paid_window_hours": "6" }
        });
        assert!(validate_rule_table_schema(&value).is_ok());
    }
}

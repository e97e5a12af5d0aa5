//! Structural validation of orders before they are committed.
//!
//! An order is lowered to a `FactGraph` and every shape in the `ShapeSet` is
//! checked independently. All violations are collected; a non-conforming
//! order is a normal result, never an error.

pub mod graph;
pub mod shapes;

use std::collections::{BTreeSet, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use graph::{Datatype, FactGraph, Term, Triple};
pub use shapes::{NodeShape, PropertyShape, ShapeError, ShapeSet};

/// Product existence check used when lowering line items.
pub trait ProductLookup {
    fn contains_product(&self, product_id: &str) -> bool;
}

impl ProductLookup for HashSet<String> {
    fn contains_product(&self, product_id: &str) -> bool {
        self.contains(product_id)
    }
}

impl ProductLookup for BTreeSet<String> {
    fn contains_product(&self, product_id: &str) -> bool {
        self.contains(product_id)
    }
}

/// One line of an order record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub product_id: Option<String>,

    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl LineItem {
    pub fn new(product_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: Some(product_id.into()),
            quantity,
        }
    }
}

/// The order about to be committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,

    #[serde(default)]
    pub customer_ids: Vec<String>,

    #[serde(default)]
    pub total_amount: Option<Decimal>,

    #[serde(default)]
    pub discount_rate: Option<Decimal>,

    #[serde(default)]
    pub items: Vec<LineItem>,
}

/// A single failed constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Predicate the constraint is on
    pub path: String,
    pub message: String,

    /// Node that failed the constraint
    pub focus_node: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.focus_node, self.path, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub conforms: bool,
    pub violation_count: usize,
    pub violations: Vec<Violation>,

    /// Size of the graph that was checked
    pub triple_count: usize,
}

impl ValidationReport {
    fn new(violations: Vec<Violation>, triple_count: usize) -> Self {
        Self {
            conforms: violations.is_empty(),
            violation_count: violations.len(),
            violations,
            triple_count,
        }
    }

    /// Violations on one predicate.
    pub fn violations_on<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Violation> {
        self.violations.iter().filter(move |v| v.path == path)
    }
}

/// Checks fact graphs against a shape set.
#[derive(Debug, Clone, Default)]
pub struct StructuralValidator {
    shapes: ShapeSet,
}

impl StructuralValidator {
    pub fn new(shapes: ShapeSet) -> Self {
        Self { shapes }
    }

    /// Validate a typed order record against the catalog.
    pub fn validate(&self, record: &OrderRecord, catalog: &dyn ProductLookup) -> ValidationReport {
        let graph = FactGraph::from_record(record, catalog);
        self.report(&graph, &record.order_id)
    }

    /// Validate a raw JSON order payload.
    pub fn validate_json(&self, payload: &Value, catalog: &dyn ProductLookup) -> ValidationReport {
        let graph = FactGraph::from_json(payload, catalog);
        let label = payload
            .get("order_id")
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .unwrap_or_else(|| "order".to_string());
        self.report(&graph, &label)
    }

    fn report(&self, graph: &FactGraph, label: &str) -> ValidationReport {
        let report = self.validate_graph(graph);
        if report.conforms {
            tracing::debug!(order = label, triples = report.triple_count, "order conforms");
        } else {
            tracing::warn!(
                order = label,
                violations = report.violation_count,
                "order failed structural validation"
            );
        }
        report
    }

    /// Check every shape against `graph`.
    pub fn validate_graph(&self, graph: &FactGraph) -> ValidationReport {
        let mut violations = Vec::new();
        for shape in &self.shapes.shapes {
            for focus in graph.instances_of(&shape.target_class) {
                for property in &shape.properties {
                    check_property(graph, focus, property, &mut violations);
                }
            }
        }
        ValidationReport::new(violations, graph.len())
    }
}

fn check_property(
    graph: &FactGraph,
    focus: &str,
    property: &PropertyShape,
    violations: &mut Vec<Violation>,
) {
    let mut violate = |detail: String| {
        let message = match &property.message {
            Some(message) => format!("{} ({})", message, detail),
            None => detail,
        };
        violations.push(Violation {
            path: property.path.clone(),
            message,
            focus_node: focus.to_string(),
        });
    };

    let values = graph.objects(focus, &property.path);

    if let Some(min) = property.min_count {
        if (values.len() as u32) < min {
            violate(format!("found {} value(s), expected at least {}", values.len(), min));
        }
    }
    if let Some(max) = property.max_count {
        if values.len() as u32 > max {
            violate(format!("found {} value(s), expected at most {}", values.len(), max));
        }
    }

    for value in values {
        if let Some(required) = property.datatype {
            match value {
                Term::Literal { datatype, .. } if datatype.satisfies(required) => {}
                other => violate(format!("value {} is not a {} literal", other, required)),
            }
        }

        if let Some(class) = &property.class {
            match value {
                Term::Node(node) if graph.has_type(node, class) => {}
                other => violate(format!("value {} is not a known {}", other, class)),
            }
        }

        if property.min_inclusive.is_some() || property.max_inclusive.is_some() {
            if let Term::Literal { lexical, datatype } = value {
                if datatype.satisfies(Datatype::Decimal) {
                    check_range(lexical, property, &mut violate);
                }
            }
        }
    }
}

fn check_range(lexical: &str, property: &PropertyShape, violate: &mut impl FnMut(String)) {
    let Ok(number) = lexical.parse::<Decimal>() else {
        violate(format!("value {} is not a number", lexical));
        return;
    };
    if let Some(min) = property.min_inclusive {
        if number < min {
            violate(format!("value {} is below {}", number, min));
        }
    }
    if let Some(max) = property.max_inclusive {
        if number > max {
            violate(format!("value {} is above {}", number, max));
        }
    }
}

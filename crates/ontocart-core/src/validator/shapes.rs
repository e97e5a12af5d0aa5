//! Shapes: declarative constraints over the fact graph.
//!
//! A `NodeShape` targets every node of a class and lists `PropertyShape`s
//! for the predicates leaving that node. Shapes are plain data and can be
//! loaded from YAML.

use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::graph::{
    Datatype, CUSTOMER_CLASS, DISCOUNT_RATE, HAS_CUSTOMER, HAS_ITEM, HAS_PRODUCT, ORDER_CLASS,
    ORDER_ITEM_CLASS, PRODUCT_CLASS, QUANTITY, TOTAL_AMOUNT,
};

lazy_static! {
    /// Class names and predicate paths: a letter, then letters, digits,
    /// `_` or `:`.
    static ref IDENTIFIER_PATTERN: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_:]*$").unwrap();
}

#[derive(Error, Debug)]
pub enum ShapeError {
    #[error("Failed to read shapes file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse shapes YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid shape `{shape}`: {reason}")]
    InvalidShape { shape: String, reason: String },
}

/// Constraints on the values of one predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyShape {
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<u32>,

    /// Required literal datatype
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<Datatype>,

    /// Required class of node values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_inclusive: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_inclusive: Option<Decimal>,

    /// Replaces the generated violation message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PropertyShape {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            min_count: None,
            max_count: None,
            datatype: None,
            class: None,
            min_inclusive: None,
            max_inclusive: None,
            message: None,
        }
    }

    pub fn count(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_count = min;
        self.max_count = max;
        self
    }

    /// Exactly one value.
    pub fn exactly_one(self) -> Self {
        self.count(Some(1), Some(1))
    }

    pub fn datatype(mut self, datatype: Datatype) -> Self {
        self.datatype = Some(datatype);
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn range(mut self, min: Option<Decimal>, max: Option<Decimal>) -> Self {
        self.min_inclusive = min;
        self.max_inclusive = max;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Constraints applied to every node of `target_class`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeShape {
    pub name: String,
    pub target_class: String,

    #[serde(default)]
    pub properties: Vec<PropertyShape>,
}

/// A set of node shapes, evaluated independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeSet {
    pub shapes: Vec<NodeShape>,
}

impl ShapeSet {
    pub fn new(shapes: Vec<NodeShape>) -> Result<Self, ShapeError> {
        let set = Self { shapes };
        set.validate()?;
        Ok(set)
    }

    /// Parse a shape set from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ShapeError> {
        let set: ShapeSet = serde_yaml::from_str(yaml)?;
        set.validate()?;
        tracing::debug!(shapes = set.shapes.len(), "loaded shape set");
        Ok(set)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ShapeError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Check that every shape is well formed.
    pub fn validate(&self) -> Result<(), ShapeError> {
        for shape in &self.shapes {
            let invalid = |reason: String| ShapeError::InvalidShape {
                shape: shape.name.clone(),
                reason,
            };

            if !IDENTIFIER_PATTERN.is_match(&shape.target_class) {
                return Err(invalid(format!(
                    "target class `{}` is not a valid identifier",
                    shape.target_class
                )));
            }

            for property in &shape.properties {
                if !IDENTIFIER_PATTERN.is_match(&property.path) {
                    return Err(invalid(format!(
                        "path `{}` is not a valid identifier",
                        property.path
                    )));
                }
                if let Some(class) = &property.class {
                    if !IDENTIFIER_PATTERN.is_match(class) {
                        return Err(invalid(format!(
                            "class `{}` on `{}` is not a valid identifier",
                            class, property.path
                        )));
                    }
                }
                if let (Some(min), Some(max)) = (property.min_count, property.max_count) {
                    if min > max {
                        return Err(invalid(format!(
                            "min_count {} exceeds max_count {} on `{}`",
                            min, max, property.path
                        )));
                    }
                }
                if let (Some(min), Some(max)) = (property.min_inclusive, property.max_inclusive) {
                    if min > max {
                        return Err(invalid(format!(
                            "min_inclusive {} exceeds max_inclusive {} on `{}`",
                            min, max, property.path
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for ShapeSet {
    /// Shapes gating order creation.
    fn default() -> Self {
        Self {
            shapes: vec![
                NodeShape {
                    name: "OrderShape".to_string(),
                    target_class: ORDER_CLASS.to_string(),
                    properties: vec![
                        PropertyShape::new(HAS_CUSTOMER)
                            .count(Some(1), None)
                            .class(CUSTOMER_CLASS)
                            .message("order must reference at least one customer"),
                        PropertyShape::new(HAS_ITEM)
                            .count(Some(1), None)
                            .class(ORDER_ITEM_CLASS)
                            .message("order must contain at least one line item"),
                        PropertyShape::new(TOTAL_AMOUNT)
                            .exactly_one()
                            .datatype(Datatype::Decimal)
                            .range(Some(Decimal::ZERO), None)
                            .message("order must have exactly one non-negative decimal total amount"),
                        PropertyShape::new(DISCOUNT_RATE)
                            .exactly_one()
                            .datatype(Datatype::Decimal)
                            .range(Some(Decimal::ZERO), Some(Decimal::ONE))
                            .message("order must have exactly one decimal discount rate between 0 and 1"),
                    ],
                },
                NodeShape {
                    name: "OrderItemShape".to_string(),
                    target_class: ORDER_ITEM_CLASS.to_string(),
                    properties: vec![
                        PropertyShape::new(HAS_PRODUCT)
                            .exactly_one()
                            .class(PRODUCT_CLASS)
                            .message("line item must reference exactly one known product"),
                        PropertyShape::new(QUANTITY)
                            .exactly_one()
                            .datatype(Datatype::Integer)
                            .range(Some(Decimal::ONE), None)
                            .message("line item quantity must be a single integer of at least 1"),
                    ],
                },
            ],
        }
    }
}

//! Fact graphs: the triple view of an order that shapes are checked against.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{OrderRecord, ProductLookup};

/// Predicate linking a node to its class.
pub const RDF_TYPE: &str = "rdf:type";

pub const ORDER_CLASS: &str = "Order";
pub const CUSTOMER_CLASS: &str = "Customer";
pub const ORDER_ITEM_CLASS: &str = "OrderItem";
pub const PRODUCT_CLASS: &str = "Product";

pub const HAS_CUSTOMER: &str = "hasCustomer";
pub const HAS_ITEM: &str = "hasItem";
pub const HAS_PRODUCT: &str = "hasProduct";
pub const TOTAL_AMOUNT: &str = "totalAmount";
pub const DISCOUNT_RATE: &str = "discountRate";
pub const QUANTITY: &str = "quantity";

/// Literal datatypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    Decimal,
    Integer,
    String,
    Boolean,
}

impl Datatype {
    /// Whether a literal of type `self` satisfies a `required` datatype.
    ///
    /// Integers are a subset of decimals.
    pub fn satisfies(&self, required: Datatype) -> bool {
        *self == required || (*self == Datatype::Integer && required == Datatype::Decimal)
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Datatype::Decimal => "decimal",
            Datatype::Integer => "integer",
            Datatype::String => "string",
            Datatype::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// Object position of a triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Node(String),
    Literal { lexical: String, datatype: Datatype },
}

impl Term {
    pub fn node(id: impl Into<String>) -> Self {
        Term::Node(id.into())
    }

    pub fn literal(lexical: impl Into<String>, datatype: Datatype) -> Self {
        Term::Literal {
            lexical: lexical.into(),
            datatype,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Node(id) => f.write_str(id),
            Term::Literal { lexical, datatype } => write!(f, "\"{}\"^^{}", lexical, datatype),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

/// An insertion-ordered set of triples, indexed by subject and by class.
#[derive(Debug, Clone, Default)]
pub struct FactGraph {
    triples: Vec<Triple>,
    seen: HashSet<Triple>,
    by_subject: HashMap<String, Vec<usize>>,
    by_class: HashMap<String, Vec<usize>>,
}

impl FactGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a triple; duplicates are ignored.
    pub fn insert(&mut self, subject: &str, predicate: &str, object: Term) {
        let triple = Triple {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object,
        };
        if self.seen.contains(&triple) {
            return;
        }
        let index = self.triples.len();
        self.by_subject
            .entry(triple.subject.clone())
            .or_default()
            .push(index);
        if triple.predicate == RDF_TYPE {
            if let Term::Node(class) = &triple.object {
                self.by_class.entry(class.clone()).or_default().push(index);
            }
        }
        self.seen.insert(triple.clone());
        self.triples.push(triple);
    }

    fn insert_type(&mut self, subject: &str, class: &str) {
        self.insert(subject, RDF_TYPE, Term::node(class));
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    fn about<'g>(&'g self, subject: &str) -> impl Iterator<Item = &'g Triple> + 'g {
        self.by_subject
            .get(subject)
            .into_iter()
            .flatten()
            .map(|&i| &self.triples[i])
    }

    /// Objects of every `(subject, predicate, _)` triple.
    pub fn objects<'g>(&'g self, subject: &str, predicate: &str) -> Vec<&'g Term> {
        self.about(subject)
            .filter(|t| t.predicate == predicate)
            .map(|t| &t.object)
            .collect()
    }

    /// Subjects typed as `class`, in first-seen order.
    pub fn instances_of(&self, class: &str) -> Vec<&str> {
        self.by_class
            .get(class)
            .into_iter()
            .flatten()
            .map(|&i| self.triples[i].subject.as_str())
            .collect()
    }

    pub fn has_type(&self, node: &str, class: &str) -> bool {
        self.about(node).any(|t| {
            t.predicate == RDF_TYPE && matches!(&t.object, Term::Node(c) if c == class)
        })
    }

    /// Lower a typed order record.
    ///
    /// Products are only typed as `Product` when the catalog knows them, so
    /// an unknown product shows up as a class violation on `hasProduct`.
    pub fn from_record(record: &OrderRecord, catalog: &dyn ProductLookup) -> Self {
        let mut graph = Self::new();
        let order = order_node(&record.order_id);
        graph.insert_type(&order, ORDER_CLASS);

        for customer_id in &record.customer_ids {
            let customer = format!("customer:{}", customer_id);
            graph.insert(&order, HAS_CUSTOMER, Term::node(&customer));
            graph.insert_type(&customer, CUSTOMER_CLASS);
        }

        if let Some(total) = record.total_amount {
            graph.insert(&order, TOTAL_AMOUNT, Term::literal(total.to_string(), Datatype::Decimal));
        }
        if let Some(rate) = record.discount_rate {
            graph.insert(&order, DISCOUNT_RATE, Term::literal(rate.to_string(), Datatype::Decimal));
        }

        for (index, item) in record.items.iter().enumerate() {
            let node = item_node(&record.order_id, index);
            graph.insert(&order, HAS_ITEM, Term::node(&node));
            graph.insert_type(&node, ORDER_ITEM_CLASS);
            graph.insert(
                &node,
                QUANTITY,
                Term::literal(item.quantity.to_string(), Datatype::Integer),
            );
            if let Some(product_id) = &item.product_id {
                graph.insert_product(&node, product_id, catalog);
            }
        }

        graph
    }

    /// Lower a loosely-typed JSON order payload.
    ///
    /// Literal datatypes follow the JSON value types, so a string where a
    /// number belongs surfaces as a datatype violation instead of a parse
    /// error. Accepts `customer_id` or `customer_ids` and `items` with
    /// `product_id` and `quantity`.
    pub fn from_json(payload: &Value, catalog: &dyn ProductLookup) -> Self {
        let mut graph = Self::new();
        let order_id = payload
            .get("order_id")
            .map(plain_string)
            .unwrap_or_else(|| "order".to_string());
        let order = order_node(&order_id);
        graph.insert_type(&order, ORDER_CLASS);

        let customers: Vec<String> = match (payload.get("customer_ids"), payload.get("customer_id"))
        {
            (Some(Value::Array(ids)), _) => ids
                .iter()
                .filter(|v| !v.is_null())
                .map(plain_string)
                .collect(),
            (_, Some(id)) if !id.is_null() => vec![plain_string(id)],
            _ => Vec::new(),
        };
        for customer_id in customers {
            let customer = format!("customer:{}", customer_id);
            graph.insert(&order, HAS_CUSTOMER, Term::node(&customer));
            graph.insert_type(&customer, CUSTOMER_CLASS);
        }

        for (key, predicate) in [("total_amount", TOTAL_AMOUNT), ("discount_rate", DISCOUNT_RATE)] {
            if let Some(term) = payload.get(key).and_then(literal_from_json) {
                graph.insert(&order, predicate, term);
            }
        }

        let items = payload
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for (index, item) in items.iter().enumerate() {
            let node = item_node(&order_id, index);
            graph.insert(&order, HAS_ITEM, Term::node(&node));
            graph.insert_type(&node, ORDER_ITEM_CLASS);
            if let Some(term) = item.get("quantity").and_then(literal_from_json) {
                graph.insert(&node, QUANTITY, term);
            }
            if let Some(product_id) = item.get("product_id").filter(|v| !v.is_null()) {
                graph.insert_product(&node, &plain_string(product_id), catalog);
            }
        }

        graph
    }

    fn insert_product(&mut self, item: &str, product_id: &str, catalog: &dyn ProductLookup) {
        let product = format!("product:{}", product_id);
        self.insert(item, HAS_PRODUCT, Term::node(&product));
        if catalog.contains_product(product_id) {
            self.insert_type(&product, PRODUCT_CLASS);
        }
    }
}

pub(crate) fn order_node(order_id: &str) -> String {
    format!("order:{}", order_id)
}

fn item_node(order_id: &str, index: usize) -> String {
    format!("order:{}/item/{}", order_id, index)
}

fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn literal_from_json(value: &Value) -> Option<Term> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(Term::literal(b.to_string(), Datatype::Boolean)),
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            Some(Term::literal(n.to_string(), Datatype::Integer))
        }
        Value::Number(n) => Some(Term::literal(n.to_string(), Datatype::Decimal)),
        Value::String(s) => Some(Term::literal(s.clone(), Datatype::String)),
        other => Some(Term::literal(other.to_string(), Datatype::String)),
    }
}

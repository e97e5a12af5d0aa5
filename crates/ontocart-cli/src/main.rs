//! `ontocart`: command-line front end for the rule inference engine.
//!
//! # Usage
//!
//! ```text
//! ontocart infer order.yaml
//! ontocart explain-discount --tier VIP --amount 8000
//! ontocart validate order.json --products products.yaml
//! ontocart cancellation --status paid --hours 3
//! ontocart rules --family discount --output json
//! ```

mod output;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;

use ontocart_core::{
    CancellationFacts, CheckoutError, CheckoutRequest, InferenceEngine, OrderRequest,
    OrderStatus, RuleFamily, RuleTable, ShapeSet, UserTier,
};

use output::{print, CancellationReport, Catalog, OutputFormat};

/// Deterministic e-commerce rule inference.
#[derive(Parser)]
#[command(name = "ontocart", version, about = "Deterministic e-commerce rule inference")]
struct Cli {
    /// Rule table (YAML or JSON); the built-in reference table if omitted
    #[arg(long, global = true, value_name = "FILE")]
    rules: Option<PathBuf>,

    /// Shape set (YAML) for order validation; the built-in shapes if omitted
    #[arg(long, global = true, value_name = "FILE")]
    shapes: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Log every rule firing
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer tier, discount, shipping and return policy for an order
    Infer {
        /// Order request (YAML or JSON)
        file: PathBuf,
    },

    /// Explain which discount applies to an amount
    ExplainDiscount {
        /// Customer tier (Regular, VIP, SVIP)
        #[arg(long, default_value = "Regular")]
        tier: UserTier,

        /// Order amount before discount
        #[arg(long)]
        amount: Decimal,

        /// This is the customer's first order
        #[arg(long)]
        first_order: bool,
    },

    /// Check an order record before it is committed (exit code 1 if it does not conform)
    Validate {
        /// Order record (YAML or JSON)
        file: PathBuf,

        /// Known product ids (YAML or JSON list).
        /// If omitted, every referenced product counts as known (logged as a warning).
        #[arg(long, value_name = "FILE")]
        products: Option<PathBuf>,
    },

    /// Price, infer and validate a new order (exit code 1 if rejected)
    Checkout {
        /// Checkout request (YAML or JSON)
        file: PathBuf,

        /// Known product ids (YAML or JSON list)
        #[arg(long, value_name = "FILE")]
        products: PathBuf,
    },

    /// Decide whether an order can still be cancelled
    Cancellation {
        /// Order status (pending, paid, processing, shipped, delivered, cancelled, returned)
        #[arg(long)]
        status: OrderStatus,

        /// Hours since the order was created
        #[arg(long)]
        hours: Decimal,

        /// A shipment record already exists
        #[arg(long)]
        has_shipment: bool,
    },

    /// List rules in priority order
    Rules {
        /// Only this family (tier, discount, shipping, return, cancellation)
        #[arg(long)]
        family: Option<RuleFamily>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {:#}", err);
            process::exit(2);
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run one command; returns the process exit code.
fn run(cli: Cli) -> Result<i32> {
    let engine = load_engine(cli.rules.as_deref(), cli.shapes.as_deref())?;
    let format = cli.output;

    match cli.command {
        Commands::Infer { file } => {
            let request: OrderRequest = read_document(&file)?;
            let decision = engine
                .infer_request(&request)
                .with_context(|| format!("inferring {}", file.display()))?;
            print(&decision, format)?;
            Ok(0)
        }

        Commands::ExplainDiscount {
            tier,
            amount,
            first_order,
        } => {
            let explanation = engine.explain_discount(tier, amount, first_order)?;
            print(&explanation, format)?;
            Ok(0)
        }

        Commands::Validate { file, products } => {
            let payload: serde_json::Value = read_document(&file)?;
            let catalog = match products {
                Some(path) => read_document::<BTreeSet<String>>(&path)?,
                None => {
                    tracing::warn!(
                        file = %file.display(),
                        "no --products catalog given; product references are not checked"
                    );
                    referenced_products(&payload)
                }
            };
            let report = engine.validate_payload(&payload, &catalog);
            print(&report, format)?;
            Ok(if report.conforms { 0 } else { 1 })
        }

        Commands::Checkout { file, products } => {
            let request: CheckoutRequest = read_document(&file)?;
            let catalog: BTreeSet<String> = read_document(&products)?;
            match engine.checkout(&request, &catalog) {
                Ok(accepted) => {
                    print(&accepted.decision, format)?;
                    Ok(0)
                }
                Err(CheckoutError::Rejected(report)) => {
                    print(&report, format)?;
                    Ok(1)
                }
                Err(err) => Err(anyhow::Error::new(err)
                    .context(format!("checking out {}", file.display()))),
            }
        }

        Commands::Cancellation {
            status,
            hours,
            has_shipment,
        } => {
            let facts = CancellationFacts::new(status, hours, has_shipment)?;
            let (outcome, explanation_trace) = engine.infer_cancellation(&facts)?;
            print(
                &CancellationReport {
                    outcome,
                    explanation_trace,
                },
                format,
            )?;
            Ok(0)
        }

        Commands::Rules { family } => {
            print(&Catalog(engine.rule_catalog(family)), format)?;
            Ok(0)
        }
    }
}

fn load_engine(rules: Option<&Path>, shapes: Option<&Path>) -> Result<InferenceEngine> {
    let table = match rules {
        Some(path) => RuleTable::from_file(path)
            .with_context(|| format!("loading rule table {}", path.display()))?,
        None => RuleTable::default(),
    };
    let shapes = match shapes {
        Some(path) => ShapeSet::from_yaml_file(path)
            .with_context(|| format!("loading shapes {}", path.display()))?,
        None => ShapeSet::default(),
    };
    let engine = InferenceEngine::with_shapes(table, shapes)?;
    tracing::debug!(
        table_version = %engine.table().table_version,
        name = engine.table().name.as_deref().unwrap_or("unnamed"),
        "rule table loaded"
    );
    Ok(engine)
}

/// Read a YAML or JSON document, chosen by extension.
fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content).with_context(|| format!("parsing JSON {}", path.display()))
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("parsing YAML {}", path.display()))
    }
}

/// Every product id the payload mentions.
fn referenced_products(payload: &serde_json::Value) -> BTreeSet<String> {
    payload
        .get("items")
        .and_then(|items| items.as_array())
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("product_id"))
        .map(|id| match id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_explain_discount() {
        let cli = Cli::try_parse_from([
            "ontocart",
            "explain-discount",
            "--tier",
            "vip",
            "--amount",
            "8000",
            "--output",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::ExplainDiscount { tier, amount, first_order } => {
                assert_eq!(tier, UserTier::Vip);
                assert_eq!(amount, Decimal::new(8000, 0));
                assert!(!first_order);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        let result =
            Cli::try_parse_from(["ontocart", "cancellation", "--status", "lost", "--hours", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_engine_defaults_to_reference_table() {
        let engine = load_engine(None, None).unwrap();
        assert_eq!(engine.table(), &RuleTable::default());
    }

    #[test]
    fn test_load_engine_missing_rules_file() {
        let err = load_engine(Some(Path::new("does/not/exist.yaml")), None)
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("loading rule table"));
    }

    #[test]
    fn test_referenced_products() {
        let payload = serde_json::json!({
            "items": [{ "product_id": "P-1" }, { "product_id": 42 }, { "quantity": 1 }]
        });
        let products = referenced_products(&payload);
        assert_eq!(products.len(), 2);
        assert!(products.contains("P-1"));
        assert!(products.contains("42"));
    }
}

//! Core contracts and helpers for SpecMint.
//!
//! This crate defines the schema tree, the cross-field rule descriptors, the
//! schema loader, and record helpers shared by the generator, the validator,
//! and the CLI.

pub mod error;
pub mod parser;
pub mod record;
pub mod rules;
pub mod schema;

pub use error::{Error, Result};
pub use parser::{DEFAULT_OPTIONAL_PROBABILITY, parse_schema, parse_schema_str};
pub use record::Record;
pub use rules::{
    CrossFieldRule, PatchRule, PatchStrategy, RuleKind, Severity, rules_json_schema,
};
pub use schema::{SchemaNode, SchemaType, StringFormat};

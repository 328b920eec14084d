//! Cross-field validation and patching for SpecMint records.
//!
//! [`RuleEngine`] evaluates declared rules and [`patch`] applies their
//! repairs. [`DomainRegistry`] holds built-in domain checks, with the HL7 code
//! tables in [`hl7`]. [`RecordValidator`] runs the validate, patch and
//! re-validate sequence used by the pipeline.

pub mod domain;
pub mod errors;
pub mod expr;
pub mod hl7;
pub mod patch;
pub mod rules;
pub mod validator;

pub use domain::{DomainRegistry, DomainRule};
pub use errors::{PatchError, RuleOrigin, RuleViolation, ViolationKind};
pub use expr::{CompareOp, Comparison, Expr};
pub use patch::{patch, violated_rule_names};
pub use rules::{RuleEngine, SUM_TOLERANCE};
pub use validator::{RecordValidator, ValidationOutcome};

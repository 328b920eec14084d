use std::fmt;

use serde::Serialize;
use specmint_core::Severity;
use thiserror::Error;

/// Why a rule reported a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The record breaks the invariant. Only these trigger patches.
    Violated,
    /// The rule itself could not be evaluated (unknown kind, bad arity,
    /// unparseable expression, non-string date).
    EngineError,
}

/// Where a violated rule came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOrigin {
    /// Declared in the schema under `x-cross-field-rules`.
    CrossField,
    /// Built-in rule of the named domain.
    Domain(String),
}

/// A single rule failure for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleViolation {
    pub rule: String,
    pub severity: Severity,
    pub kind: ViolationKind,
    pub origin: RuleOrigin,
    pub message: String,
}

impl RuleViolation {
    pub fn violated(rule: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity,
            kind: ViolationKind::Violated,
            origin: RuleOrigin::CrossField,
            message: message.into(),
        }
    }

    pub fn engine_error(
        rule: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: ViolationKind::EngineError,
            ..Self::violated(rule, severity, message)
        }
    }

    pub fn domain(
        domain: &str,
        rule: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            origin: RuleOrigin::Domain(domain.to_string()),
            ..Self::violated(rule, severity, message)
        }
    }

    pub fn is_violation(&self) -> bool {
        self.kind == ViolationKind::Violated
    }
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            RuleOrigin::CrossField => {
                write!(f, "Cross-field rule '{}' failed: {}", self.rule, self.message)
            }
            RuleOrigin::Domain(_) => {
                write!(f, "[{}] {}: {}", self.severity.as_str(), self.rule, self.message)
            }
        }
    }
}

/// Errors raised while applying patches.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("patch for rule '{rule}' on '{target}' requires an 'adjustment' or 'factor' parameter")]
    MissingAdjustment { rule: String, target: String },
}

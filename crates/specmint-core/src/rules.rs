use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use schemars::schema::RootSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declarative business invariant spanning several fields of one record.
///
/// Declared in a schema under `x-cross-field-rules`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CrossFieldRule {
    /// Identifier, unique within a record type.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Field references; meaning depends on `kind`.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Rule kind (`date_ordering`, `amount_range`, ...).
    #[serde(rename = "rule")]
    #[schemars(with = "String")]
    pub kind: RuleKind,
    /// Comparison expression such as `diastolic < systolic`.
    #[serde(
        default,
        rename = "constraint",
        skip_serializing_if = "Option::is_none"
    )]
    pub constraint_expression: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    /// Repair applied when the rule is violated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<PatchRule>,
}

/// Supported cross-field rule kinds.
///
/// Unrecognized kinds are preserved so the rule engine can report them per
/// record instead of rejecting the schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleKind {
    DateOrdering,
    AmountRange,
    Comparison,
    ConditionalRequired,
    MutualExclusion,
    SumConstraint,
    Unknown(String),
}

impl RuleKind {
    pub fn as_str(&self) -> &str {
        match self {
            RuleKind::DateOrdering => "date_ordering",
            RuleKind::AmountRange => "amount_range",
            RuleKind::Comparison => "comparison",
            RuleKind::ConditionalRequired => "conditional_required",
            RuleKind::MutualExclusion => "mutual_exclusion",
            RuleKind::SumConstraint => "sum_constraint",
            RuleKind::Unknown(value) => value.as_str(),
        }
    }
}

impl From<String> for RuleKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "date_ordering" => RuleKind::DateOrdering,
            "amount_range" => RuleKind::AmountRange,
            "comparison" => RuleKind::Comparison,
            "conditional_required" => RuleKind::ConditionalRequired,
            "mutual_exclusion" => RuleKind::MutualExclusion,
            "sum_constraint" => RuleKind::SumConstraint,
            _ => RuleKind::Unknown(value),
        }
    }
}

impl From<RuleKind> for String {
    fn from(kind: RuleKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity attached to a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// Declarative repair applied to a record when its rule is violated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PatchRule {
    pub strategy: PatchStrategy,
    /// Field reference to repair.
    pub target: String,
    /// Literal written by `set_value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// `adjustment` or `factor` for `adjust_field`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
}

impl PatchRule {
    pub fn adjustment(&self) -> Option<f64> {
        self.params.get("adjustment").and_then(Value::as_f64)
    }

    pub fn factor(&self) -> Option<f64> {
        self.params.get("factor").and_then(Value::as_f64)
    }
}

/// Repair strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PatchStrategy {
    SetValue,
    AdjustField,
    RemoveField,
}

/// JSON Schema describing the `x-cross-field-rules` extension.
pub fn rules_json_schema() -> RootSchema {
    schemars::schema_for!(Vec<CrossFieldRule>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_rule_kind_is_preserved() {
        let rule: CrossFieldRule = serde_json::from_value(json!({
            "name": "weird",
            "fields": ["a"],
            "rule": "cosine_similarity"
        }))
        .expect("parse rule");

        assert_eq!(rule.kind, RuleKind::Unknown("cosine_similarity".to_string()));
        assert_eq!(rule.severity, Severity::Error);
        assert_eq!(
            serde_json::to_value(&rule).expect("serialize")["rule"],
            json!("cosine_similarity")
        );
    }

    #[test]
    fn patch_params_expose_adjustment_and_factor() {
        let patch: PatchRule = serde_json::from_value(json!({
            "strategy": "adjust_field",
            "target": "total",
            "params": {"factor": 1.5}
        }))
        .expect("parse patch");

        assert_eq!(patch.strategy, PatchStrategy::AdjustField);
        assert_eq!(patch.factor(), Some(1.5));
        assert_eq!(patch.adjustment(), None);
    }

    #[test]
    fn unknown_patch_strategy_is_rejected() {
        let result = serde_json::from_value::<PatchRule>(json!({
            "strategy": "shuffle",
            "target": "total"
        }));
        assert!(result.is_err());
    }
}

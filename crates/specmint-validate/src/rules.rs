use specmint_core::record::{is_present, is_truthy, lookup, numeric_value};
use specmint_core::{CrossFieldRule, Record, RuleKind};
use tracing::warn;

use crate::errors::RuleViolation;
use crate::expr::Comparison;

/// Allowed slack between the summands and the target of `sum_constraint`.
pub const SUM_TOLERANCE: f64 = 0.01;

/// A rule prepared for repeated evaluation.
#[derive(Debug, Clone)]
struct CompiledRule {
    rule: CrossFieldRule,
    check: Check,
}

/// Per-kind evaluation plan. Problems found at compile time are kept and
/// reported on every record so one bad rule never hides the others.
#[derive(Debug, Clone)]
enum Check {
    DateOrdering,
    AmountRange,
    Comparison(Comparison),
    ConditionalRequired,
    MutualExclusion,
    SumConstraint,
    Broken(String),
}

/// Evaluates declared cross-field rules against records.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
}

impl RuleEngine {
    /// Compile rules once; comparison expressions are parsed here.
    pub fn new(rules: Vec<CrossFieldRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let check = compile(&rule);
                if let Check::Broken(reason) = &check {
                    warn!(rule = %rule.name, kind = %rule.kind, reason = %reason, "cross-field rule cannot be evaluated");
                }
                CompiledRule { rule, check }
            })
            .collect();
        Self { rules }
    }

    /// Declared rules in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = &CrossFieldRule> {
        self.rules.iter().map(|compiled| &compiled.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule independently and collect all problems.
    pub fn validate(&self, record: &Record) -> Vec<RuleViolation> {
        self.rules
            .iter()
            .filter_map(|compiled| evaluate(compiled, record))
            .collect()
    }
}

fn compile(rule: &CrossFieldRule) -> Check {
    let fields = rule.fields.len();
    match &rule.kind {
        RuleKind::DateOrdering if fields < 2 => {
            Check::Broken("date_ordering requires at least 2 fields".into())
        }
        RuleKind::DateOrdering => Check::DateOrdering,
        RuleKind::AmountRange if fields != 3 => {
            Check::Broken("amount_range requires exactly 3 fields: amount, min, max".into())
        }
        RuleKind::AmountRange => Check::AmountRange,
        RuleKind::Comparison if fields < 2 => {
            Check::Broken("comparison rule requires at least 2 fields".into())
        }
        RuleKind::Comparison => match rule.constraint_expression.as_deref() {
            Some(expression) => match Comparison::parse(expression) {
                Ok(comparison) => Check::Comparison(comparison),
                Err(reason) => Check::Broken(reason),
            },
            None => Check::Broken("comparison rule requires a constraint expression".into()),
        },
        RuleKind::ConditionalRequired if fields != 2 => Check::Broken(
            "conditional_required requires exactly 2 fields: condition, required".into(),
        ),
        RuleKind::ConditionalRequired => Check::ConditionalRequired,
        RuleKind::MutualExclusion => Check::MutualExclusion,
        RuleKind::SumConstraint if fields < 3 => Check::Broken(
            "sum_constraint requires at least 3 fields: field1, field2, ..., target_sum".into(),
        ),
        RuleKind::SumConstraint => Check::SumConstraint,
        RuleKind::Unknown(kind) => Check::Broken(format!("unknown rule type: {kind}")),
    }
}

fn evaluate(compiled: &CompiledRule, record: &Record) -> Option<RuleViolation> {
    let rule = &compiled.rule;
    let outcome = match &compiled.check {
        Check::Broken(reason) => {
            return Some(RuleViolation::engine_error(&rule.name, rule.severity, reason));
        }
        Check::DateOrdering => match date_ordering(record, &rule.fields) {
            Ok(outcome) => outcome,
            Err(reason) => {
                return Some(RuleViolation::engine_error(&rule.name, rule.severity, reason));
            }
        },
        Check::AmountRange => amount_range(record, &rule.fields),
        Check::Comparison(comparison) => comparison.check(record),
        Check::ConditionalRequired => conditional_required(record, &rule.fields),
        Check::MutualExclusion => mutual_exclusion(record, &rule.fields),
        Check::SumConstraint => sum_constraint(record, &rule.fields),
    };
    outcome
        .err()
        .map(|message| RuleViolation::violated(&rule.name, rule.severity, message))
}

/// Outer error: the rule cannot be evaluated. Inner error: violation.
fn date_ordering(record: &Record, fields: &[String]) -> Result<Result<(), String>, String> {
    let mut previous: Option<(&str, &str)> = None;
    for field in fields {
        let Some(value) = lookup(record, field) else {
            continue;
        };
        let current = value
            .as_str()
            .ok_or_else(|| format!("field {field} is not a string date"))?;
        if let Some((previous_field, previous_value)) = previous
            && previous_value > current
        {
            return Ok(Err(format!(
                "date ordering violation: {previous_field} ({previous_value}) should be <= {field} ({current})"
            )));
        }
        previous = Some((field.as_str(), current));
    }
    Ok(Ok(()))
}

fn amount_range(record: &Record, fields: &[String]) -> Result<(), String> {
    let amount = numeric_value(lookup(record, &fields[0]));
    let min = numeric_value(lookup(record, &fields[1]));
    let max = numeric_value(lookup(record, &fields[2]));
    if amount < min || amount > max {
        return Err(format!("amount {amount:.6} is outside range [{min:.6}, {max:.6}]"));
    }
    Ok(())
}

fn conditional_required(record: &Record, fields: &[String]) -> Result<(), String> {
    let (condition, required) = (&fields[0], &fields[1]);
    if is_truthy(lookup(record, condition)) && !is_present(record, required) {
        return Err(format!(
            "field {required} is required when {condition} is present"
        ));
    }
    Ok(())
}

fn mutual_exclusion(record: &Record, fields: &[String]) -> Result<(), String> {
    let present: Vec<&str> = fields
        .iter()
        .filter(|field| is_present(record, field))
        .map(String::as_str)
        .collect();
    if present.len() > 1 {
        return Err(format!(
            "mutually exclusive fields present: {}",
            present.join(", ")
        ));
    }
    Ok(())
}

fn sum_constraint(record: &Record, fields: &[String]) -> Result<(), String> {
    let Some((target, summands)) = fields.split_last() else {
        return Ok(());
    };
    let sum: f64 = summands
        .iter()
        .map(|field| numeric_value(lookup(record, field)))
        .sum();
    let expected = numeric_value(lookup(record, target));
    if (sum - expected).abs() > SUM_TOLERANCE {
        return Err(format!(
            "sum constraint violation: sum of {} = {sum:.6}, expected {expected:.6}",
            summands.join("+")
        ));
    }
    Ok(())
}

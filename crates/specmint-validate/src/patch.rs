use std::collections::BTreeSet;

use serde_json::{Number, Value};
use specmint_core::record::{lookup, numeric_value, remove_field, set_field};
use specmint_core::{CrossFieldRule, PatchStrategy, Record};

use crate::errors::{PatchError, RuleOrigin, RuleViolation};

/// Names of rules that were genuinely violated. Engine errors and domain
/// rules are excluded because neither can carry a patch.
pub fn violated_rule_names(violations: &[RuleViolation]) -> BTreeSet<String> {
    violations
        .iter()
        .filter(|violation| {
            violation.is_violation() && violation.origin == RuleOrigin::CrossField
        })
        .map(|violation| violation.rule.clone())
        .collect()
}

/// Apply the declared repairs of every violated rule, in declaration order.
///
/// Works on a shallow copy; on error the caller keeps the original record.
/// A single pass: the result is not re-validated here.
pub fn patch<'a>(
    record: &Record,
    violated: &BTreeSet<String>,
    rules: impl IntoIterator<Item = &'a CrossFieldRule>,
) -> Result<Record, PatchError> {
    let mut patched = record.clone();
    for rule in rules {
        let Some(patch) = &rule.patch else {
            continue;
        };
        if !violated.contains(&rule.name) {
            continue;
        }

        match patch.strategy {
            PatchStrategy::SetValue => {
                set_field(
                    &mut patched,
                    &patch.target,
                    patch.value.clone().unwrap_or(Value::Null),
                );
            }
            PatchStrategy::AdjustField => {
                let current = numeric_value(lookup(&patched, &patch.target));
                let adjusted = if let Some(adjustment) = patch.adjustment() {
                    current + adjustment
                } else if let Some(factor) = patch.factor() {
                    current * factor
                } else {
                    return Err(PatchError::MissingAdjustment {
                        rule: rule.name.clone(),
                        target: patch.target.clone(),
                    });
                };
                // Non-finite results are written as null.
                let value = Number::from_f64(adjusted).map_or(Value::Null, Value::Number);
                set_field(&mut patched, &patch.target, value);
            }
            PatchStrategy::RemoveField => {
                remove_field(&mut patched, &patch.target);
            }
        }
    }
    Ok(patched)
}

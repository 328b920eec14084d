//! Comparison expressions used by `comparison` rules.
//!
//! The grammar is intentionally flat: one comparison operator, and each side
//! is a field, a `+`-joined sum, or a single `-` / `*` pair. There is no
//! precedence and no nesting.

use std::fmt;

use specmint_core::Record;
use specmint_core::record::{lookup, numeric_value};

/// Comparison operators in match priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Ge,
    Le,
    Gt,
    Lt,
}

impl CompareOp {
    const PRIORITY: [CompareOp; 4] = [CompareOp::Ge, CompareOp::Le, CompareOp::Gt, CompareOp::Lt];

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
        }
    }

    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Ge => left >= right,
            CompareOp::Le => left <= right,
            CompareOp::Gt => left > right,
            CompareOp::Lt => left < right,
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Field(String),
    Sum(Vec<String>),
    Difference(String, String),
    Product(String, String),
}

impl Expr {
    /// Parse one side. Anything that is not a recognized shape is treated
    /// as a single field name, including `/` expressions.
    pub fn parse(side: &str) -> Expr {
        let side = side.trim();
        if !side.contains(['+', '-', '*', '/']) {
            return Expr::Field(side.to_string());
        }
        if side.contains('+') {
            return Expr::Sum(side.split('+').map(|part| part.trim().to_string()).collect());
        }
        if let Some((left, right)) = split_pair(side, '-') {
            return Expr::Difference(left, right);
        }
        if let Some((left, right)) = split_pair(side, '*') {
            return Expr::Product(left, right);
        }
        Expr::Field(side.to_string())
    }

    pub fn evaluate(&self, record: &Record) -> f64 {
        let value = |field: &str| numeric_value(lookup(record, field));
        match self {
            Expr::Field(field) => value(field),
            Expr::Sum(fields) => fields.iter().map(|field| value(field)).sum(),
            Expr::Difference(left, right) => value(left) - value(right),
            Expr::Product(left, right) => value(left) * value(right),
        }
    }
}

fn split_pair(side: &str, separator: char) -> Option<(String, String)> {
    let mut parts = side.split(separator);
    let left = parts.next()?;
    let right = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((left.trim().to_string(), right.trim().to_string()))
}

/// A parsed `left <op> right` constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub left: Expr,
    pub op: CompareOp,
    pub right: Expr,
    left_text: String,
    right_text: String,
}

impl Comparison {
    /// Parse a constraint expression such as `diastolic < systolic`.
    pub fn parse(expression: &str) -> Result<Self, String> {
        let expression = expression.trim();
        let op = CompareOp::PRIORITY
            .into_iter()
            .find(|op| expression.contains(op.symbol()))
            .ok_or_else(|| format!("unsupported comparison operator in constraint: {expression}"))?;

        let sides: Vec<&str> = expression.split(op.symbol()).collect();
        let [left, right] = sides.as_slice() else {
            return Err(format!("invalid constraint format: {expression}"));
        };
        let (left, right) = (left.trim(), right.trim());

        Ok(Self {
            left: Expr::parse(left),
            op,
            right: Expr::parse(right),
            left_text: left.to_string(),
            right_text: right.to_string(),
        })
    }

    /// `Ok(())` when the comparison holds, otherwise the violation message.
    pub fn check(&self, record: &Record) -> Result<(), String> {
        let left = self.left.evaluate(record);
        let right = self.right.evaluate(record);
        if self.op.holds(left, right) {
            return Ok(());
        }
        Err(format!(
            "constraint violation: {} ({left:.6}) should be {} {} ({right:.6})",
            self.left_text,
            self.op.symbol(),
            self.right_text,
        ))
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left_text, self.op.symbol(), self.right_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn parses_sides_into_tagged_expressions() {
        assert_eq!(Expr::parse(" total "), Expr::Field("total".into()));
        assert_eq!(
            Expr::parse("a + b + c"),
            Expr::Sum(vec!["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(
            Expr::parse("gross - fees"),
            Expr::Difference("gross".into(), "fees".into())
        );
        assert_eq!(
            Expr::parse("qty * price"),
            Expr::Product("qty".into(), "price".into())
        );
        assert_eq!(Expr::parse("a - b - c"), Expr::Field("a - b - c".into()));
        assert_eq!(Expr::parse("a / b"), Expr::Field("a / b".into()));
    }

    #[test]
    fn operator_priority_prefers_two_character_forms() {
        let comparison = Comparison::parse("paid >= due").expect("parse");
        assert_eq!(comparison.op, CompareOp::Ge);
        assert_eq!(comparison.to_string(), "paid >= due");

        let comparison = Comparison::parse("a < b").expect("parse");
        assert_eq!(comparison.op, CompareOp::Lt);
    }

    #[test]
    fn rejects_chained_or_missing_operators() {
        assert!(Comparison::parse("a < b < c").is_err());
        assert!(Comparison::parse("a == b").is_err());
    }

    #[test]
    fn evaluates_against_record() {
        let comparison = Comparison::parse("subtotal + tax <= total").expect("parse");
        let ok = record(json!({"subtotal": 10, "tax": "2.5", "total": 12.5}));
        let bad = record(json!({"subtotal": 10, "tax": 3, "total": 12.5}));

        assert!(comparison.check(&ok).is_ok());
        let message = comparison.check(&bad).expect_err("violation");
        assert!(message.starts_with("constraint violation: subtotal + tax (13.000000)"));
    }
}

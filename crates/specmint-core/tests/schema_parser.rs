use serde_json::json;
use specmint_core::{
    Error, PatchStrategy, RuleKind, SchemaType, Severity, StringFormat, parse_schema,
    parse_schema_str,
};

fn order_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["order_id", "lines"],
        "x-cross-field-rules": [
            {
                "name": "total_matches_lines",
                "fields": ["subtotal", "tax", "total"],
                "rule": "sum_constraint",
                "patch": {"strategy": "adjust_field", "target": "total", "params": {"adjustment": 0}}
            },
            {
                "name": "discount_below_total",
                "fields": ["discount", "total"],
                "rule": "comparison",
                "constraint": "discount < total",
                "severity": "warning"
            }
        ],
        "properties": {
            "order_id": {"type": "string", "pattern": "^PO[0-9]{8}$"},
            "contact": {"type": "string", "format": "email", "description": "LLM: customer contact"},
            "notes": {"type": ["string", "null"], "x-llm": true, "maxLength": 3, "minLength": 9},
            "lines": {
                "type": "array",
                "minItems": 2,
                "items": {
                    "type": "object",
                    "required": ["sku"],
                    "x-optional-probability": 0.25,
                    "properties": {
                        "sku": {"type": "string"},
                        "gift": {"type": "boolean"}
                    }
                }
            },
            "total": {"type": "number", "minimum": 50, "maximum": 10}
        }
    })
}

#[test]
fn builds_paths_and_constraints() {
    let root = parse_schema(&order_schema()).expect("parse schema");

    assert_eq!(root.path, "");
    assert_eq!(root.schema_type, SchemaType::Object);
    assert_eq!(root.required, vec!["order_id", "lines"]);

    let lines = &root.properties["lines"];
    assert_eq!(lines.path, "lines");
    assert_eq!(lines.min_items, Some(2));
    let item = lines.items.as_deref().expect("items node");
    assert_eq!(item.path, "lines[]");
    assert_eq!(item.properties["sku"].path, "lines[].sku");

    let notes = &root.properties["notes"];
    assert_eq!(notes.schema_type, SchemaType::String);
    assert_eq!((notes.min_length, notes.max_length), (Some(9), Some(9)));

    let total = &root.properties["total"];
    assert_eq!((total.minimum, total.maximum), (Some(50.0), Some(50.0)));

    assert_eq!(
        root.properties["contact"].string_format(),
        Some(StringFormat::Email)
    );
}

#[test]
fn optional_probability_is_inherited() {
    let root = parse_schema(&order_schema()).expect("parse schema");
    let item = root.properties["lines"].items.as_deref().expect("items");

    assert_eq!(root.optional_probability, 0.9);
    assert_eq!(item.optional_probability, 0.25);
    assert_eq!(item.properties["gift"].optional_probability, 0.25);
}

#[test]
fn collects_llm_fields_and_rules() {
    let root = parse_schema(&order_schema()).expect("parse schema");

    assert_eq!(root.llm_fields(), vec!["contact", "notes"]);

    let rules = root.collect_rules();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].kind, RuleKind::SumConstraint);
    assert_eq!(
        rules[0].patch.as_ref().map(|patch| patch.strategy),
        Some(PatchStrategy::AdjustField)
    );
    assert_eq!(rules[1].severity, Severity::Warning);
    assert_eq!(
        rules[1].constraint_expression.as_deref(),
        Some("discount < total")
    );
}

#[test]
fn rejects_required_name_missing_from_properties() {
    let err = parse_schema(&json!({
        "type": "object",
        "required": ["ghost"],
        "properties": {"real": {"type": "string"}}
    }))
    .expect_err("missing required property");

    match err {
        Error::InvalidSchema { path, message } => {
            assert_eq!(path, "<root>");
            assert!(message.contains("ghost"), "message: {message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn rejects_malformed_shapes() {
    let cases = [
        json!({"type": "object", "properties": {"a": {"type": "string", "minLength": -1}}}),
        json!({"type": "object", "x-optional-probability": 1.5}),
        json!({"type": 7}),
        json!({"type": "object", "properties": {"a": "string"}}),
        json!({"type": "string", "x-llm": "yes"}),
        json!({
            "type": "object",
            "x-cross-field-rules": [{"name": "r", "rule": "comparison", "patch": {"strategy": "shuffle", "target": "a"}}]
        }),
    ];

    for case in cases {
        let result = parse_schema(&case);
        assert!(
            matches!(result, Err(Error::InvalidSchema { .. })),
            "expected schema error for {case}"
        );
    }
}

#[test]
fn rejects_duplicate_rule_names_across_the_tree() {
    let err = parse_schema(&json!({
        "type": "object",
        "x-cross-field-rules": [{"name": "dup", "fields": ["a", "b"], "rule": "mutual_exclusion"}],
        "properties": {
            "nested": {
                "type": "object",
                "x-cross-field-rules": [{"name": "dup", "fields": ["a", "b"], "rule": "mutual_exclusion"}]
            }
        }
    }))
    .expect_err("duplicate rule names");

    assert!(err.to_string().contains("duplicate cross-field rule name 'dup'"));
}

#[test]
fn reports_invalid_json() {
    let result = parse_schema_str("{not json");
    assert!(matches!(result, Err(Error::Json(_))));
}

#[test]
fn keeps_unknown_types_and_rule_kinds() {
    let root = parse_schema(&json!({
        "type": "object",
        "x-cross-field-rules": [{"name": "odd", "fields": ["a"], "rule": "levenshtein"}],
        "properties": {"blob": {"type": "binary"}, "untyped": {}}
    }))
    .expect("parse schema");

    assert_eq!(
        root.properties["blob"].schema_type,
        SchemaType::Other("binary".to_string())
    );
    assert_eq!(
        root.properties["untyped"].schema_type,
        SchemaType::Other(String::new())
    );
    assert_eq!(
        root.cross_field_rules[0].kind,
        RuleKind::Unknown("levenshtein".to_string())
    );
}

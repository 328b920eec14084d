//! Schema loader: JSON-Schema-like document to [`SchemaNode`] tree.
//!
//! The loader fails fast on shape errors so generation never starts from a
//! malformed tree. Vocabulary outside the supported subset is ignored.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::rules::CrossFieldRule;
use crate::schema::{SchemaNode, SchemaType};

/// Inclusion chance for non-required properties when the schema sets none.
pub const DEFAULT_OPTIONAL_PROBABILITY: f64 = 0.9;

const LLM_MARKER: &str = "x-llm";
const RULES_KEYWORD: &str = "x-cross-field-rules";
const OPTIONAL_PROBABILITY_KEYWORD: &str = "x-optional-probability";
const LLM_DESCRIPTION_PREFIX: &str = "llm:";

/// Parse a schema document from text.
pub fn parse_schema_str(input: &str) -> Result<SchemaNode> {
    let raw: Value = serde_json::from_str(input)?;
    parse_schema(&raw)
}

/// Parse a schema document into the root node (path `""`).
pub fn parse_schema(raw: &Value) -> Result<SchemaNode> {
    let root = build_node(raw, "", DEFAULT_OPTIONAL_PROBABILITY)?;
    ensure_unique_rule_names(&root)?;

    let mut nodes = 0usize;
    root.walk(&mut |_| nodes += 1);
    debug!(
        root_type = %root.schema_type,
        nodes,
        rules = root.collect_rules().len(),
        llm_fields = root.llm_fields().len(),
        "schema parsed"
    );
    Ok(root)
}

fn build_node(raw: &Value, path: &str, inherited_probability: f64) -> Result<SchemaNode> {
    let object = raw
        .as_object()
        .ok_or_else(|| Error::invalid(path, "schema node must be a JSON object"))?;

    let mut node = SchemaNode::new(read_type(object, path)?, path);

    node.optional_probability = match object.get(OPTIONAL_PROBABILITY_KEYWORD) {
        Some(value) => {
            let probability = value.as_f64().ok_or_else(|| {
                Error::invalid(path, format!("{OPTIONAL_PROBABILITY_KEYWORD} must be a number"))
            })?;
            if !(0.0..=1.0).contains(&probability) {
                return Err(Error::invalid(
                    path,
                    format!("{OPTIONAL_PROBABILITY_KEYWORD} {probability} is outside [0, 1]"),
                ));
            }
            probability
        }
        None => inherited_probability,
    };

    node.description = read_string(object, "description", path)?;
    node.format = read_string(object, "format", path)?;
    node.pattern = read_string(object, "pattern", path)?;
    node.enum_values = read_array(object, "enum", path)?;
    node.examples = read_array(object, "examples", path)?;

    node.minimum = read_number(object, "minimum", path)?;
    node.maximum = read_number(object, "maximum", path)?;
    node.multiple_of = read_number(object, "multipleOf", path)?;
    if let (Some(min), Some(max)) = (node.minimum, node.maximum)
        && max < min
    {
        node.maximum = Some(min);
    }

    (node.min_length, node.max_length) = read_bounds(object, "minLength", "maxLength", path)?;
    (node.min_items, node.max_items) = read_bounds(object, "minItems", "maxItems", path)?;

    node.llm_enhanced = match object.get(LLM_MARKER) {
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return Err(Error::invalid(path, format!("{LLM_MARKER} must be a boolean"))),
        None => false,
    } || node.description.as_deref().is_some_and(has_llm_prefix);

    if let Some(rules) = object.get(RULES_KEYWORD) {
        node.cross_field_rules = serde_json::from_value::<Vec<CrossFieldRule>>(rules.clone())
            .map_err(|err| Error::invalid(path, format!("malformed {RULES_KEYWORD}: {err}")))?;
    }

    match node.schema_type {
        SchemaType::Object => {
            node.required = read_required(object, path)?;
            node.properties = read_properties(object, path, node.optional_probability)?;
            if let Some(missing) = node
                .required
                .iter()
                .find(|name| !node.properties.contains_key(*name))
            {
                return Err(Error::invalid(
                    path,
                    format!("required property '{missing}' is not declared in properties"),
                ));
            }
        }
        SchemaType::Array => {
            if let Some(items) = object.get("items") {
                let item_path = format!("{path}[]");
                node.items = Some(Box::new(build_node(
                    items,
                    &item_path,
                    node.optional_probability,
                )?));
            }
        }
        _ => {}
    }

    Ok(node)
}

fn read_type(object: &Map<String, Value>, path: &str) -> Result<SchemaType> {
    match object.get("type") {
        None => Ok(SchemaType::Other(String::new())),
        Some(Value::String(keyword)) => Ok(SchemaType::from_keyword(keyword)),
        // `["string", "null"]` style unions collapse to their first non-null member.
        Some(Value::Array(options)) => {
            let mut keywords = Vec::with_capacity(options.len());
            for option in options {
                let keyword = option
                    .as_str()
                    .ok_or_else(|| Error::invalid(path, "type array must contain strings"))?;
                keywords.push(keyword);
            }
            let chosen = keywords
                .iter()
                .copied()
                .find(|keyword| *keyword != "null")
                .or(keywords.first().copied())
                .unwrap_or_default();
            Ok(SchemaType::from_keyword(chosen))
        }
        Some(_) => Err(Error::invalid(path, "type must be a string or an array of strings")),
    }
}

fn read_string(object: &Map<String, Value>, key: &str, path: &str) -> Result<Option<String>> {
    match object.get(key) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(Error::invalid(path, format!("{key} must be a string"))),
    }
}

fn read_array(object: &Map<String, Value>, key: &str, path: &str) -> Result<Vec<Value>> {
    match object.get(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(values)) => Ok(values.clone()),
        Some(_) => Err(Error::invalid(path, format!("{key} must be an array"))),
    }
}

fn read_number(object: &Map<String, Value>, key: &str, path: &str) -> Result<Option<f64>> {
    match object.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| Error::invalid(path, format!("{key} must be a number"))),
    }
}

fn read_count(object: &Map<String, Value>, key: &str, path: &str) -> Result<Option<usize>> {
    match object.get(key) {
        None => Ok(None),
        Some(value) => {
            let count = value.as_u64().ok_or_else(|| {
                Error::invalid(path, format!("{key} must be a non-negative integer"))
            })?;
            usize::try_from(count)
                .map(Some)
                .map_err(|_| Error::invalid(path, format!("{key} is too large")))
        }
    }
}

/// Read a min/max pair, clamping `max` up to `min` when inverted.
fn read_bounds(
    object: &Map<String, Value>,
    min_key: &str,
    max_key: &str,
    path: &str,
) -> Result<(Option<usize>, Option<usize>)> {
    let min = read_count(object, min_key, path)?;
    let mut max = read_count(object, max_key, path)?;
    if let (Some(min), Some(current)) = (min, max)
        && current < min
    {
        max = Some(min);
    }
    Ok((min, max))
}

fn read_required(object: &Map<String, Value>, path: &str) -> Result<Vec<String>> {
    let Some(raw) = object.get("required") else {
        return Ok(Vec::new());
    };
    let names = raw
        .as_array()
        .ok_or_else(|| Error::invalid(path, "required must be an array"))?;

    let mut required = Vec::with_capacity(names.len());
    for name in names {
        let name = name
            .as_str()
            .ok_or_else(|| Error::invalid(path, "required entries must be strings"))?;
        if !required.iter().any(|existing| existing == name) {
            required.push(name.to_string());
        }
    }
    Ok(required)
}

fn read_properties(
    object: &Map<String, Value>,
    path: &str,
    optional_probability: f64,
) -> Result<BTreeMap<String, SchemaNode>> {
    let Some(raw) = object.get("properties") else {
        return Ok(BTreeMap::new());
    };
    let raw = raw
        .as_object()
        .ok_or_else(|| Error::invalid(path, "properties must be an object"))?;

    let mut properties = BTreeMap::new();
    for (name, child) in raw {
        let child_path = if path.is_empty() {
            name.clone()
        } else {
            format!("{path}.{name}")
        };
        properties.insert(
            name.clone(),
            build_node(child, &child_path, optional_probability)?,
        );
    }
    Ok(properties)
}

fn has_llm_prefix(description: &str) -> bool {
    description
        .get(..LLM_DESCRIPTION_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(LLM_DESCRIPTION_PREFIX))
}

fn ensure_unique_rule_names(root: &SchemaNode) -> Result<()> {
    let mut seen = HashSet::new();
    let mut duplicate = None;
    root.walk(&mut |node| {
        for rule in &node.cross_field_rules {
            if !seen.insert(rule.name.clone()) && duplicate.is_none() {
                duplicate = Some((node.path.clone(), rule.name.clone()));
            }
        }
    });

    match duplicate {
        Some((path, name)) => Err(Error::invalid(
            &path,
            format!("duplicate cross-field rule name '{name}'"),
        )),
        None => Ok(()),
    }
}

//! Hook for external enrichment of marked fields.
//!
//! The generator never talks to a model backend itself. An [`Enricher`]
//! receives each field marked with `x-llm` (or an `llm:` description) along
//! with a deterministic per-field seed and may hand back a replacement value.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use specmint_core::Record;
use specmint_core::record::set_field;

use crate::errors::GenerationError;
use crate::seed::derive_seed;

/// What an enricher sees for one field of one record.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentRequest<'a> {
    /// Dotted path of the marked field. Array elements appear as their
    /// index, e.g. `lines.0.note`.
    pub field: &'a str,
    /// `derive_seed(base_seed, field, record_index)`.
    pub seed: i64,
    pub record_index: u64,
    /// The record as generated so far, including earlier enrichments.
    pub record: &'a Record,
}

/// Implemented by adapters that can replace deterministic field values.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Short identifier used in logs (e.g. `ollama`).
    fn name(&self) -> &'static str;

    /// Return `Some(value)` to replace the field, `None` to keep it.
    async fn enrich(&self, request: EnrichmentRequest<'_>) -> Result<Option<Value>, GenerationError>;
}

/// Outcome of enriching one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub calls: u64,
    pub applied: u64,
}

/// Run `enricher` over `fields` in order. Failures keep the generated value.
///
/// Item fields (`lines[].note`) are offered once per generated element, under
/// the element's concrete path (`lines.0.note`).
pub async fn enrich_record(
    enricher: &dyn Enricher,
    record: &mut Record,
    fields: &[String],
    base_seed: i64,
    record_index: u64,
) -> EnrichmentSummary {
    let mut summary = EnrichmentSummary::default();
    for field in fields {
        let item_field = field.contains(ITEMS_MARKER);
        let targets = if item_field {
            item_locations(record, field)
        } else {
            vec![field.clone()]
        };

        for target in &targets {
            let request = EnrichmentRequest {
                field: target,
                seed: derive_seed(base_seed, target, record_index),
                record_index,
                record: &*record,
            };
            summary.calls += 1;
            match enricher.enrich(request).await {
                Ok(Some(value)) => {
                    let applied = if item_field {
                        set_item_value(record, target, value)
                    } else {
                        set_field(record, target, value);
                        true
                    };
                    if applied {
                        summary.applied += 1;
                    }
                }
                Ok(None) => {
                    debug!(enricher = enricher.name(), field = %target, record_index, "enricher kept value");
                }
                Err(err) => {
                    warn!(
                        enricher = enricher.name(),
                        field = %target,
                        record_index,
                        error = %err,
                        "enrichment failed; keeping generated value"
                    );
                }
            }
        }
    }
    summary
}

const ITEMS_MARKER: &str = "[]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathStep<'a> {
    Key(&'a str),
    EachItem,
}

fn parse_item_path(field: &str) -> Vec<PathStep<'_>> {
    let mut steps = Vec::new();
    for segment in field.split('.') {
        let key = segment.trim_end_matches(ITEMS_MARKER);
        if !key.is_empty() {
            steps.push(PathStep::Key(key));
        }
        let depth = (segment.len() - key.len()) / ITEMS_MARKER.len();
        steps.extend(std::iter::repeat_n(PathStep::EachItem, depth));
    }
    steps
}

/// Concrete dotted paths for an item field, one per element that carries it.
fn item_locations(record: &Record, field: &str) -> Vec<String> {
    let steps = parse_item_path(field);
    let mut out = Vec::new();
    if let Some((PathStep::Key(key), rest)) = steps.split_first()
        && let Some(value) = record.get(*key)
    {
        collect_locations(value, rest, key.to_string(), &mut out);
    }
    out
}

fn collect_locations(current: &Value, steps: &[PathStep<'_>], prefix: String, out: &mut Vec<String>) {
    let Some((step, rest)) = steps.split_first() else {
        out.push(prefix);
        return;
    };
    match step {
        PathStep::Key(key) => {
            if let Some(next) = current.as_object().and_then(|object| object.get(*key)) {
                collect_locations(next, rest, format!("{prefix}.{key}"), out);
            }
        }
        PathStep::EachItem => {
            if let Some(items) = current.as_array() {
                for (index, item) in items.iter().enumerate() {
                    collect_locations(item, rest, format!("{prefix}.{index}"), out);
                }
            }
        }
    }
}

/// Write `value` at a concrete path whose numeric segments index arrays.
fn set_item_value(record: &mut Record, path: &str, value: Value) -> bool {
    let Some((parent_path, leaf)) = path.rsplit_once('.') else {
        return false;
    };
    let mut segments = parent_path.split('.');
    let Some(mut current) = segments.next().and_then(|first| record.get_mut(first)) else {
        return false;
    };
    for segment in segments {
        let next = match current {
            Value::Object(object) => object.get_mut(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        };
        let Some(next) = next else {
            return false;
        };
        current = next;
    }
    match current {
        Value::Object(object) => {
            object.insert(leaf.to_string(), value);
            true
        }
        Value::Array(items) => match leaf.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Upper;

    #[async_trait]
    impl Enricher for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        async fn enrich(&self, request: EnrichmentRequest<'_>) -> Result<Option<Value>, GenerationError> {
            match request.field {
                "broken" => Err(GenerationError::Enrich {
                    field: request.field.to_string(),
                    message: "backend unavailable".into(),
                }),
                "skip" => Ok(None),
                field => Ok(Some(json!(format!("{field}:{}", request.seed)))),
            }
        }
    }

    #[tokio::test]
    async fn applies_values_and_keeps_failures() {
        let mut record = json!({"title": "a", "broken": "b", "skip": "c"})
            .as_object()
            .cloned()
            .expect("object");
        let fields = vec!["title".to_string(), "broken".to_string(), "skip".to_string()];

        let summary = enrich_record(&Upper, &mut record, &fields, 9, 3).await;

        assert_eq!(summary, EnrichmentSummary { calls: 3, applied: 1 });
        let expected = format!("title:{}", derive_seed(9, "title", 3));
        assert_eq!(record["title"], json!(expected));
        assert_eq!(record["broken"], json!("b"));
        assert_eq!(record["skip"], json!("c"));
    }

    #[tokio::test]
    async fn item_fields_expand_to_each_element() {
        let mut record = json!({
            "lines": [{"note": "a"}, {"sku": "x"}, {"note": "c"}],
            "grid": [[{"note": "g"}]]
        })
        .as_object()
        .cloned()
        .expect("object");
        let fields = vec!["lines[].note".to_string(), "grid[][].note".to_string()];

        let summary = enrich_record(&Upper, &mut record, &fields, 9, 0).await;

        assert_eq!(summary, EnrichmentSummary { calls: 3, applied: 3 });
        let first = format!("lines.0.note:{}", derive_seed(9, "lines.0.note", 0));
        assert_eq!(record["lines"][0]["note"], json!(first));
        assert!(record["lines"][1].get("note").is_none());
        assert!(record["lines"][2]["note"].as_str().is_some_and(|v| v.starts_with("lines.2.note:")));
        assert!(record["grid"][0][0]["note"].as_str().is_some_and(|v| v.starts_with("grid.0.0.note:")));
        assert!(!record.contains_key("lines[].note"));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn item_paths_parse_into_steps() {
        assert_eq!(
            parse_item_path("a[].b[][].c"),
            vec![
                PathStep::Key("a"),
                PathStep::EachItem,
                PathStep::Key("b"),
                PathStep::EachItem,
                PathStep::EachItem,
                PathStep::Key("c"),
            ]
        );
    }
}

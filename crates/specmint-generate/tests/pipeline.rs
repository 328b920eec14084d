use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use specmint_core::{SchemaNode, parse_schema};
use specmint_generate::{
    Enricher, EnrichmentRequest, GenerateOptions, GenerationEngine, GenerationError, OutputFormat,
    ValueGenerator, dataset_file_name, derive_seed, write_records,
};

fn hash_file(path: &Path) -> Result<String, std::io::Error> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("specmint-{label}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn invoice_schema() -> Arc<SchemaNode> {
    let raw = json!({
        "type": "object",
        "required": ["invoice_id", "issued", "due", "subtotal", "discount", "summary"],
        "properties": {
            "invoice_id": {"type": "string", "pattern": "^[A-Z]{2}[0-9]{6}$"},
            "issued": {"type": "string", "format": "date"},
            "due": {"type": "string", "format": "date"},
            "subtotal": {"type": "number", "minimum": 10, "maximum": 100},
            "discount": {"type": "number", "minimum": 0, "maximum": 50},
            "summary": {"type": "string", "x-llm": true},
            "items": {
                "type": "array",
                "minItems": 1,
                "maxItems": 3,
                "items": {
                    "type": "object",
                    "required": ["sku", "qty"],
                    "properties": {
                        "sku": {"type": "string", "pattern": "^PRD-[0-9]{6}$"},
                        "qty": {"type": "integer", "minimum": 1, "maximum": 9}
                    }
                }
            }
        },
        "x-cross-field-rules": [
            {
                "name": "discount_within_subtotal",
                "rule": "comparison",
                "fields": ["discount", "subtotal"],
                "constraint": "discount <= subtotal",
                "patch": {"strategy": "set_value", "target": "discount", "value": 0}
            },
            {
                "name": "due_after_issue",
                "rule": "date_ordering",
                "fields": ["issued", "due"],
                "severity": "warning"
            }
        ]
    });
    Arc::new(parse_schema(&raw).expect("parse schema"))
}

fn options(count: u64, workers: usize) -> GenerateOptions {
    GenerateOptions {
        seed: 2024,
        count,
        workers,
        ..GenerateOptions::default()
    }
}

#[tokio::test]
async fn records_come_back_in_index_order() {
    let engine = GenerationEngine::new(options(25, 4));
    let result = engine.generate(invoice_schema()).await.expect("generate");

    let indices: Vec<u64> = result.records.iter().map(|r| r.record_index).collect();
    assert_eq!(indices, (0..25).collect::<Vec<_>>());
    assert_eq!(result.report.records_requested, 25);
    assert_eq!(result.report.records_generated, 25);
    assert_eq!(result.report.records_failed, 0);
    assert!(!result.report.timed_out);
}

#[tokio::test]
async fn worker_count_does_not_change_output() {
    let schema = invoice_schema();
    let single = GenerationEngine::new(options(30, 1))
        .generate(Arc::clone(&schema))
        .await
        .expect("generate");
    let many = GenerationEngine::new(options(30, 8))
        .generate(schema)
        .await
        .expect("generate");

    assert_eq!(single.records, many.records);
}

#[tokio::test]
async fn records_without_violations_match_direct_generation() {
    let schema = invoice_schema();
    let result = GenerationEngine::new(options(20, 3))
        .generate(Arc::clone(&schema))
        .await
        .expect("generate");
    let generator = ValueGenerator::new(2024);

    for record in result.records.iter().filter(|r| r.validation_errors.is_empty()) {
        let direct = generator
            .generate(&schema, record.record_index)
            .expect("generate");
        assert_eq!(Value::Object(record.data.clone()), direct);
    }
}

#[tokio::test]
async fn comparison_violations_are_patched_and_counted() {
    let result = GenerationEngine::new(options(60, 4))
        .generate(invoice_schema())
        .await
        .expect("generate");
    let report = &result.report;

    assert!(report.patched > 0);
    assert_eq!(
        report.violations_by_rule.get("discount_within_subtotal").copied(),
        Some(report.patched)
    );

    for record in result.records.iter().filter(|r| r.patched) {
        assert_eq!(record.data["discount"], json!(0));
        assert!(
            record
                .validation_errors
                .iter()
                .any(|message| message.contains("discount_within_subtotal"))
        );
        assert!(
            record
                .residual_errors
                .iter()
                .all(|message| !message.contains("discount_within_subtotal"))
        );
    }
    assert_eq!(report.records_generated, result.records.len() as u64);
}

struct EchoEnricher;

#[async_trait]
impl Enricher for EchoEnricher {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn enrich(&self, request: EnrichmentRequest<'_>) -> Result<Option<Value>, GenerationError> {
        Ok(Some(json!(format!("{}#{}", request.field, request.seed))))
    }
}

#[tokio::test]
async fn enricher_replaces_marked_fields_with_seeded_values() {
    let result = GenerationEngine::new(options(10, 2))
        .with_enricher(Arc::new(EchoEnricher))
        .generate(invoice_schema())
        .await
        .expect("generate");

    assert_eq!(result.report.llm_enhanced, 10);
    assert_eq!(result.report.llm_calls, 10);
    for record in &result.records {
        assert!(record.llm_enhanced);
        let expected = format!("summary#{}", derive_seed(2024, "summary", record.record_index));
        assert_eq!(record.data["summary"], json!(expected));
    }
}

#[tokio::test]
async fn enricher_reaches_marked_fields_inside_array_items() {
    let schema = Arc::new(
        parse_schema(&json!({
            "type": "object",
            "required": ["lines"],
            "properties": {
                "lines": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": 3,
                    "items": {
                        "type": "object",
                        "required": ["note"],
                        "properties": {"note": {"type": "string", "x-llm": true}}
                    }
                }
            }
        }))
        .expect("parse"),
    );

    let result = GenerationEngine::new(options(5, 2))
        .with_enricher(Arc::new(EchoEnricher))
        .generate(schema)
        .await
        .expect("generate");

    for record in &result.records {
        assert!(record.llm_enhanced);
        assert_eq!(record.data.len(), 1, "unexpected keys: {:?}", record.data.keys());
        let lines = record.data["lines"].as_array().expect("lines");
        for (position, line) in lines.iter().enumerate() {
            let path = format!("lines.{position}.note");
            let expected = format!("{path}#{}", derive_seed(2024, &path, record.record_index));
            assert_eq!(line["note"], json!(expected));
        }
    }
    let items: u64 = result
        .records
        .iter()
        .map(|record| record.data["lines"].as_array().map_or(0, Vec::len) as u64)
        .sum();
    assert_eq!(result.report.llm_calls, items);
}

#[tokio::test]
async fn cancelled_engine_returns_cancelled() {
    let engine = GenerationEngine::new(options(1_000, 4));
    engine.cancel();

    let err = engine.generate(invoice_schema()).await.expect_err("cancelled");
    assert!(matches!(err, GenerationError::Cancelled));
}

#[tokio::test]
async fn elapsed_timeout_returns_partial_report() {
    let engine = GenerationEngine::new(GenerateOptions {
        timeout: Some(Duration::ZERO),
        ..options(1_000, 4)
    });

    let result = engine.generate(invoice_schema()).await.expect("generate");
    assert!(result.report.timed_out);
    assert!(result.records.is_empty());
}

#[tokio::test]
async fn non_object_root_is_rejected() {
    let schema = Arc::new(parse_schema(&json!({"type": "array", "items": {"type": "string"}})).expect("parse"));

    let err = GenerationEngine::new(options(5, 1))
        .generate(schema)
        .await
        .expect_err("must fail");
    assert!(matches!(err, GenerationError::InvalidSchema(_)));
}

#[tokio::test]
async fn repeated_runs_write_identical_datasets() {
    let mut hashes = Vec::new();
    for run in 0..2 {
        let result = GenerationEngine::new(options(50, 4))
            .generate(invoice_schema())
            .await
            .expect("generate");
        let dir = temp_dir(&format!("golden-{run}"));
        let path = dir.join(dataset_file_name(OutputFormat::Jsonl));
        let bytes = write_records(&path, OutputFormat::Jsonl, &result.records).expect("write");
        assert!(bytes > 0);
        assert_eq!(std::fs::metadata(&path).expect("metadata").len(), bytes);
        hashes.push(hash_file(&path).expect("hash"));
        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    assert_eq!(hashes[0], hashes[1]);
}

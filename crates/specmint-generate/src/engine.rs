use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use specmint_core::{SchemaNode, SchemaType};
use specmint_validate::{DomainRegistry, RecordValidator};

use crate::enrich::{Enricher, enrich_record};
use crate::errors::GenerationError;
use crate::generators::{PatternCatalog, ValueGenerator};
use crate::model::{GenerateOptions, GeneratedRecord, GenerationReport};

/// Result of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Records sorted by `record_index`.
    pub records: Vec<GeneratedRecord>,
    pub report: GenerationReport,
}

/// Entry point for generating records from a parsed schema.
#[derive(Clone)]
pub struct GenerationEngine {
    options: GenerateOptions,
    catalog: Arc<PatternCatalog>,
    domains: Arc<DomainRegistry>,
    enricher: Option<Arc<dyn Enricher>>,
    cancelled: Arc<AtomicBool>,
}

impl fmt::Debug for GenerationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationEngine")
            .field("options", &self.options)
            .field("enricher", &self.enricher.as_ref().map(|e| e.name()))
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Everything a worker needs, shared read-only across tasks.
struct RecordBuilder {
    schema: Arc<SchemaNode>,
    generator: ValueGenerator,
    validator: RecordValidator,
    enricher: Option<Arc<dyn Enricher>>,
    llm_fields: Vec<String>,
    base_seed: i64,
}

struct BuiltRecord {
    record: GeneratedRecord,
    violated_rules: Vec<String>,
    llm_calls: u64,
}

impl GenerationEngine {
    pub fn new(options: GenerateOptions) -> Self {
        Self {
            options,
            catalog: Arc::new(PatternCatalog::builtin()),
            domains: Arc::new(DomainRegistry::builtin()),
            enricher: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<PatternCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_domains(mut self, domains: Arc<DomainRegistry>) -> Self {
        self.domains = domains;
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Stop claiming new record indices. Records already in progress finish;
    /// the run then returns [`GenerationError::Cancelled`].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Generate `options.count` records with a pool of worker tasks.
    ///
    /// A record whose generation fails is logged and counted in
    /// `records_failed`. When the timeout elapses the records finished so far
    /// are returned with `report.timed_out` set.
    pub async fn generate(&self, schema: Arc<SchemaNode>) -> Result<GenerationResult, GenerationError> {
        if schema.schema_type != SchemaType::Object {
            return Err(GenerationError::InvalidSchema(format!(
                "root must be an object, found '{}'",
                schema.schema_type
            )));
        }

        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let count = self.options.count;
        let workers = worker_count(self.options.workers, count);
        let deadline = self.options.timeout.map(|timeout| start + timeout);
        let mut report = GenerationReport::new(run_id.clone(), self.options.seed, count);

        let builder = Arc::new(self.record_builder(Arc::clone(&schema)));

        info!(
            run_id = %run_id,
            records = count,
            workers,
            seed = self.options.seed,
            epoch = %self.options.epoch,
            rules = builder.validator.engine().len(),
            domain = self.options.domain.as_deref().unwrap_or("-"),
            enricher = self.enricher.as_ref().map(|e| e.name()).unwrap_or("-"),
            "generation started"
        );

        let next_index = Arc::new(AtomicU64::new(0));
        let (tx, mut rx) = mpsc::channel::<(u64, Result<BuiltRecord, GenerationError>)>(workers * 2);

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let builder = Arc::clone(&builder);
            let next_index = Arc::clone(&next_index);
            let cancelled = Arc::clone(&self.cancelled);
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    if cancelled.load(Ordering::SeqCst) {
                        debug!(worker, "worker stopping: cancelled");
                        return false;
                    }
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        debug!(worker, "worker stopping: deadline reached");
                        return true;
                    }
                    let index = next_index.fetch_add(1, Ordering::SeqCst);
                    if index >= count {
                        return false;
                    }
                    let built = builder.build(index).await;
                    if tx.send((index, built)).await.is_err() {
                        return false;
                    }
                }
            }));
        }
        drop(tx);

        let mut records = Vec::new();
        while let Some((index, built)) = rx.recv().await {
            match built {
                Ok(built) => {
                    debug!(
                        record_index = index,
                        patched = built.record.patched,
                        violations = built.record.validation_errors.len(),
                        "record generated"
                    );
                    report.record_generated(&built.record);
                    report.record_llm_calls(built.llm_calls);
                    for rule in &built.violated_rules {
                        report.record_violation(rule);
                    }
                    records.push(built.record);
                }
                Err(err) => {
                    error!(run_id = %run_id, record_index = index, error = %err, "record generation failed");
                    report.record_failure();
                }
            }
        }

        for handle in handles {
            let timed_out = handle
                .await
                .map_err(|err| GenerationError::Worker(err.to_string()))?;
            report.timed_out |= timed_out;
        }

        if self.is_cancelled() {
            warn!(run_id = %run_id, finished = records.len(), "generation cancelled");
            return Err(GenerationError::Cancelled);
        }

        records.sort_by_key(|record| record.record_index);
        report.duration_ms = start.elapsed().as_millis() as u64;

        if report.timed_out {
            warn!(
                run_id = %run_id,
                generated = report.records_generated,
                requested = count,
                "generation timed out; returning partial dataset"
            );
        }
        info!(
            run_id = %run_id,
            generated = report.records_generated,
            failed = report.records_failed,
            patched = report.patched,
            still_invalid = report.still_invalid,
            llm_enhanced = report.llm_enhanced,
            duration_ms = report.duration_ms,
            "generation completed"
        );

        Ok(GenerationResult { records, report })
    }

    fn record_builder(&self, schema: Arc<SchemaNode>) -> RecordBuilder {
        let generator = ValueGenerator::new(self.options.seed)
            .with_epoch(self.options.epoch)
            .with_array_seeding(self.options.array_seeding)
            .with_catalog(Arc::clone(&self.catalog));
        let validator = RecordValidator::new(schema.collect_rules())
            .with_domain(Arc::clone(&self.domains), self.options.domain.clone())
            .with_revalidation(self.options.revalidate_after_patch);
        let llm_fields = if self.enricher.is_some() {
            schema.llm_fields()
        } else {
            Vec::new()
        };

        RecordBuilder {
            schema,
            generator,
            validator,
            enricher: self.enricher.clone(),
            llm_fields,
            base_seed: self.options.seed,
        }
    }
}

impl RecordBuilder {
    async fn build(&self, record_index: u64) -> Result<BuiltRecord, GenerationError> {
        let mut data = match self.generator.generate(&self.schema, record_index)? {
            Value::Object(map) => map,
            other => {
                return Err(GenerationError::InvalidSchema(format!(
                    "root generated a non-object value: {other}"
                )));
            }
        };

        let mut llm_enhanced = false;
        let mut llm_calls = 0;
        if let Some(enricher) = &self.enricher
            && !self.llm_fields.is_empty()
        {
            let summary = enrich_record(
                enricher.as_ref(),
                &mut data,
                &self.llm_fields,
                self.base_seed,
                record_index,
            )
            .await;
            llm_enhanced = summary.applied > 0;
            llm_calls = summary.calls;
        }

        let outcome = self.validator.process(data);
        let violated_rules = outcome
            .violations
            .iter()
            .filter(|violation| violation.is_violation())
            .map(|violation| violation.rule.clone())
            .collect();

        Ok(BuiltRecord {
            record: GeneratedRecord {
                record_index,
                validation_errors: outcome.violations.iter().map(ToString::to_string).collect(),
                residual_errors: outcome.residual.iter().map(ToString::to_string).collect(),
                patched: outcome.patched,
                data: outcome.record,
                llm_enhanced,
            },
            violated_rules,
            llm_calls,
        })
    }
}

fn worker_count(requested: usize, count: u64) -> usize {
    let cap = usize::try_from(count).unwrap_or(usize::MAX);
    requested.max(1).min(cap.max(1))
}

//! Offline checks for an existing dataset file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use jsonschema::JSONSchema;
use serde::Serialize;
use serde_json::Value;

use specmint_core::{Severity, parse_schema};
use specmint_validate::{DomainRegistry, RecordValidator, ViolationKind};

use crate::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Parse,
    Structural,
    Rule,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetIssue {
    /// 1-based position in the dataset.
    pub record: u64,
    pub kind: IssueKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetReport {
    pub records: u64,
    pub invalid_records: u64,
    pub errors: u64,
    pub warnings: u64,
    pub violations_by_rule: BTreeMap<String, u64>,
    #[serde(skip)]
    pub issues: Vec<DatasetIssue>,
}

/// JSON Schema structure checks plus cross-field and domain rules.
pub struct DatasetValidator {
    structural: JSONSchema,
    rules: RecordValidator,
}

impl DatasetValidator {
    pub fn new(raw_schema: &Value, domain: Option<String>) -> Result<Self, CliError> {
        let structural = JSONSchema::compile(raw_schema)
            .map_err(|err| CliError::InvalidArgument(format!("schema does not compile: {err}")))?;
        let schema = parse_schema(raw_schema)?;
        let rules = RecordValidator::new(schema.collect_rules())
            .with_domain(Arc::new(DomainRegistry::builtin()), domain);
        Ok(Self { structural, rules })
    }

    /// Issues for one decoded record.
    pub fn check(&self, record: u64, instance: &Value) -> Vec<DatasetIssue> {
        let mut issues = Vec::new();
        if let Err(errors) = self.structural.validate(instance) {
            for error in errors {
                let path = error.instance_path.to_string();
                let location = if path.is_empty() { "/".to_string() } else { path };
                issues.push(DatasetIssue {
                    record,
                    kind: IssueKind::Structural,
                    severity: Severity::Error,
                    rule: None,
                    message: format!("{location}: {error}"),
                });
            }
        }

        if let Some(object) = instance.as_object() {
            for violation in self.rules.validate(object) {
                let severity = match violation.kind {
                    ViolationKind::EngineError => Severity::Error,
                    ViolationKind::Violated => violation.severity,
                };
                issues.push(DatasetIssue {
                    record,
                    kind: IssueKind::Rule,
                    severity,
                    message: violation.to_string(),
                    rule: Some(violation.rule),
                });
            }
        }
        issues
    }

    /// Check every record of a JSON Lines file, or of a JSON array when the
    /// file has a `.json` extension.
    pub fn check_file(&self, path: &Path) -> Result<DatasetReport, CliError> {
        let mut report = DatasetReport::default();
        let is_array = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_array {
            let values: Vec<Value> = serde_json::from_reader(BufReader::new(File::open(path)?))?;
            for value in values {
                let index = report.records + 1;
                let issues = self.check(index, &value);
                report.push(issues);
            }
            return Ok(report);
        }

        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let index = report.records + 1;
            let issues = match serde_json::from_str::<Value>(&line) {
                Ok(value) => self.check(index, &value),
                Err(err) => vec![DatasetIssue {
                    record: index,
                    kind: IssueKind::Parse,
                    severity: Severity::Error,
                    rule: None,
                    message: format!("JSON parse error: {err}"),
                }],
            };
            report.push(issues);
        }
        Ok(report)
    }
}

impl DatasetReport {
    fn push(&mut self, issues: Vec<DatasetIssue>) {
        self.records += 1;
        let mut invalid = false;
        for issue in &issues {
            match issue.severity {
                Severity::Error => {
                    self.errors += 1;
                    invalid = true;
                }
                Severity::Warning => self.warnings += 1,
            }
            if let Some(rule) = &issue.rule {
                *self.violations_by_rule.entry(rule.clone()).or_insert(0) += 1;
            }
        }
        if invalid {
            self.invalid_records += 1;
        }
        self.issues.extend(issues);
    }
}

/// Guess a built-in domain from the schema file name.
pub fn detect_domain(schema_path: &Path) -> Option<String> {
    let name = schema_path.to_string_lossy().to_lowercase();
    let domain = if name.contains("hl7") || name.contains("fhir") {
        "hl7"
    } else if name.contains("healthcare") || name.contains("patient") {
        "healthcare"
    } else if name.contains("fintech") || name.contains("transaction") {
        "fintech"
    } else if name.contains("ecommerce") || name.contains("product") {
        "ecommerce"
    } else {
        return None;
    };
    Some(domain.to_string())
}

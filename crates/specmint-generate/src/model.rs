use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use specmint_core::Record;

/// Default generation epoch: `2024-01-01T00:00:00Z`.
pub fn default_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// How array items derive their seeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArraySeeding {
    /// Items vary with the enclosing record index.
    #[default]
    PerRecord,
    /// Items use record index 0, so a path yields the same items in every
    /// record of a run.
    Stable,
}

impl FromStr for ArraySeeding {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "per-record" | "per_record" => Ok(ArraySeeding::PerRecord),
            "stable" => Ok(ArraySeeding::Stable),
            other => Err(format!(
                "unknown array seeding '{other}' (expected per-record or stable)"
            )),
        }
    }
}

/// Options for the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Base seed every per-field seed derives from.
    pub seed: i64,
    /// Number of records to produce.
    pub count: u64,
    /// Worker tasks pulling record indices.
    pub workers: usize,
    /// Instant that date and date-time windows end at.
    pub epoch: DateTime<Utc>,
    pub array_seeding: ArraySeeding,
    /// Built-in domain whose rules run next to the declared ones.
    pub domain: Option<String>,
    /// Re-run validation once after a patch.
    pub revalidate_after_patch: bool,
    /// Stop claiming new records once this much time has passed.
    #[serde(default, with = "duration_secs")]
    pub timeout: Option<Duration>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            count: 100,
            workers: 4,
            epoch: default_epoch(),
            array_seeding: ArraySeeding::PerRecord,
            domain: None,
            revalidate_after_patch: true,
            timeout: None,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        secs.map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// One generated record with its validation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedRecord {
    pub record_index: u64,
    pub data: Record,
    pub llm_enhanced: bool,
    /// Messages from the first validation pass.
    pub validation_errors: Vec<String>,
    /// Messages still present after patching and re-validation.
    pub residual_errors: Vec<String>,
    pub patched: bool,
}

/// Report for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub seed: i64,
    pub records_requested: u64,
    pub records_generated: u64,
    pub records_failed: u64,
    pub llm_enhanced: u64,
    pub llm_calls: u64,
    pub validation_failed: u64,
    pub patched: u64,
    pub still_invalid: u64,
    pub timed_out: bool,
    pub violations_by_rule: BTreeMap<String, u64>,
    pub duration_ms: u64,
}

impl GenerationReport {
    pub fn new(run_id: String, seed: i64, records_requested: u64) -> Self {
        Self {
            run_id,
            seed,
            records_requested,
            records_generated: 0,
            records_failed: 0,
            llm_enhanced: 0,
            llm_calls: 0,
            validation_failed: 0,
            patched: 0,
            still_invalid: 0,
            timed_out: false,
            violations_by_rule: BTreeMap::new(),
            duration_ms: 0,
        }
    }

    /// Fold one finished record into the counters.
    pub fn record_generated(&mut self, record: &GeneratedRecord) {
        self.records_generated += 1;
        if record.llm_enhanced {
            self.llm_enhanced += 1;
        }
        if !record.validation_errors.is_empty() {
            self.validation_failed += 1;
        }
        if record.patched {
            self.patched += 1;
        }
        if !record.residual_errors.is_empty() {
            self.still_invalid += 1;
        }
    }

    pub fn record_failure(&mut self) {
        self.records_failed += 1;
    }

    pub fn record_llm_calls(&mut self, calls: u64) {
        self.llm_calls += calls;
    }

    pub fn record_violation(&mut self, rule: &str) {
        *self.violations_by_rule.entry(rule.to_string()).or_insert(0) += 1;
    }
}

/// Summary written next to the dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub schema_path: Option<String>,
    pub record_count: u64,
    pub seed: i64,
    pub epoch: DateTime<Utc>,
    pub array_seeding: ArraySeeding,
    pub domain: Option<String>,
    pub dataset_file: String,
    pub dataset_bytes: u64,
    pub report: GenerationReport,
}

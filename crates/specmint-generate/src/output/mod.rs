//! Dataset and manifest writers.

pub mod jsonl;

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::GenerationError;
use crate::model::{GeneratedRecord, Manifest};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Serialization used for the dataset file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line.
    #[default]
    Jsonl,
    /// A single pretty-printed JSON array.
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "jsonl" | "ndjson" => Ok(OutputFormat::Jsonl),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{other}' (expected jsonl or json)")),
        }
    }
}

/// `dataset.jsonl` or `dataset.json`.
pub fn dataset_file_name(format: OutputFormat) -> String {
    format!("dataset.{}", format.extension())
}

/// Write the plain records (no metadata) in `format`. Returns bytes written.
pub fn write_records(
    path: &Path,
    format: OutputFormat,
    records: &[GeneratedRecord],
) -> Result<u64, GenerationError> {
    let writer = CountingWriter::new(BufWriter::new(File::create(path)?));
    let mut writer = match format {
        OutputFormat::Jsonl => jsonl::write_lines(writer, records)?,
        OutputFormat::Json => jsonl::write_array(writer, records)?,
    };
    writer.flush()?;
    Ok(writer.bytes_written())
}

/// Write `manifest.json` into `dir`.
pub fn write_manifest(dir: &Path, manifest: &Manifest) -> Result<(), GenerationError> {
    std::fs::write(dir.join(MANIFEST_FILE), serde_json::to_vec_pretty(manifest)?)?;
    Ok(())
}

pub(crate) struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

//! Deterministic record generation for SpecMint.
//!
//! Values are derived from `(base_seed, field path, record index)`, so a
//! schema, seed and epoch fully determine the dataset regardless of worker
//! count. Generated records are validated and patched through
//! `specmint-validate` before they reach a writer.

pub mod engine;
pub mod enrich;
pub mod errors;
pub mod generators;
pub mod model;
pub mod output;
pub mod seed;

pub use engine::{GenerationEngine, GenerationResult};
pub use enrich::{Enricher, EnrichmentRequest, EnrichmentSummary};
pub use errors::GenerationError;
pub use generators::{PatternCatalog, ValueGenerator};
pub use model::{
    ArraySeeding, GenerateOptions, GeneratedRecord, GenerationReport, Manifest, default_epoch,
};
pub use output::{OutputFormat, dataset_file_name, write_manifest, write_records};
pub use seed::{derive_seed, seeded_rng};

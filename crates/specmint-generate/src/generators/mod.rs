//! Deterministic value generation for schema nodes.

pub mod formats;
pub mod pattern;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distr::uniform::{self, Uniform};
use rand::distr::Distribution;
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};
use serde_json::{Map, Number, Value};
use tracing::warn;

use specmint_core::{SchemaNode, SchemaType};

use crate::errors::GenerationError;
use crate::model::{ArraySeeding, default_epoch};
use crate::seed::{derive_seed, seeded_rng};

pub use pattern::PatternCatalog;

const EXAMPLE_PROBABILITY: f64 = 0.7;
const DEFAULT_MIN_LENGTH: usize = 5;
const DEFAULT_MAX_LENGTH: usize = 20;
const DEFAULT_MIN_ITEMS: usize = 1;
const DEFAULT_MAX_ITEMS: usize = 5;
const DEFAULT_MINIMUM: f64 = 0.0;
const DEFAULT_MAXIMUM: f64 = 1000.0;

/// Walks schema nodes and produces reproducible values.
///
/// Stateless apart from configuration, so one instance can be shared by all
/// workers.
#[derive(Debug, Clone)]
pub struct ValueGenerator {
    base_seed: i64,
    epoch: DateTime<Utc>,
    array_seeding: ArraySeeding,
    catalog: Arc<PatternCatalog>,
}

impl ValueGenerator {
    pub fn new(base_seed: i64) -> Self {
        Self {
            base_seed,
            epoch: default_epoch(),
            array_seeding: ArraySeeding::default(),
            catalog: Arc::new(PatternCatalog::builtin()),
        }
    }

    pub fn with_epoch(mut self, epoch: DateTime<Utc>) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn with_array_seeding(mut self, array_seeding: ArraySeeding) -> Self {
        self.array_seeding = array_seeding;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<PatternCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn base_seed(&self) -> i64 {
        self.base_seed
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    /// Generate a value for `node`, seeding from the node's own path.
    pub fn generate(&self, node: &SchemaNode, record_index: u64) -> Result<Value, GenerationError> {
        let mut rng = seeded_rng(derive_seed(self.base_seed, &node.path, record_index));
        self.generate_with(node, record_index, &mut rng)
    }

    /// Generate from an existing stream. Object properties share `rng`;
    /// array items are reseeded per element.
    pub fn generate_with(
        &self,
        node: &SchemaNode,
        record_index: u64,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        if let Some(value) = node.enum_values.choose(rng) {
            return Ok(value.clone());
        }
        if !node.examples.is_empty()
            && rng.random_bool(EXAMPLE_PROBABILITY)
            && let Some(value) = node.examples.choose(rng)
        {
            return Ok(value.clone());
        }

        match &node.schema_type {
            SchemaType::Object => self.generate_object(node, record_index, rng),
            SchemaType::Array => self.generate_array(node, record_index, rng),
            SchemaType::Integer => generate_integer(node, rng),
            SchemaType::Number => generate_number(node, rng),
            SchemaType::Boolean => Ok(Value::Bool(rng.random_bool(0.5))),
            SchemaType::Null => Ok(Value::Null),
            SchemaType::String | SchemaType::Other(_) => self.generate_string(node, rng),
        }
    }

    fn generate_string(&self, node: &SchemaNode, rng: &mut dyn RngCore) -> Result<Value, GenerationError> {
        if let Some(format) = node.string_format() {
            return formats::generate(format, rng, self.epoch)
                .map(Value::String)
                .ok_or_else(|| {
                    GenerationError::unsatisfiable(&node.path, "date window is outside the calendar")
                });
        }
        if let Some(pattern) = &node.pattern {
            return Ok(Value::String(self.catalog.synthesize(pattern, rng)));
        }

        let (min, max) = length_bounds(
            node.min_length,
            node.max_length,
            DEFAULT_MIN_LENGTH,
            DEFAULT_MAX_LENGTH,
        );
        let len = rng.random_range(min..=max);
        Ok(Value::String(pattern::alphanumeric(rng, len)))
    }

    fn generate_array(
        &self,
        node: &SchemaNode,
        record_index: u64,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        let Some(items) = node.items.as_deref() else {
            return Ok(Value::Array(Vec::new()));
        };

        let item_index = match self.array_seeding {
            ArraySeeding::PerRecord => record_index,
            ArraySeeding::Stable => 0,
        };
        let (min, max) = length_bounds(
            node.min_items,
            node.max_items,
            DEFAULT_MIN_ITEMS,
            DEFAULT_MAX_ITEMS,
        );
        let len = rng.random_range(min..=max);

        let mut values = Vec::with_capacity(len);
        for i in 0..len {
            let item_path = format!("{}[{i}]", node.path);
            let mut item_rng = seeded_rng(derive_seed(self.base_seed, &item_path, item_index));
            let value = self
                .generate_with(items, item_index, &mut item_rng)
                .map_err(|err| GenerationError::field(&item_path, err))?;
            values.push(value);
        }
        Ok(Value::Array(values))
    }

    fn generate_object(
        &self,
        node: &SchemaNode,
        record_index: u64,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        let mut object = Map::new();

        for name in &node.required {
            let Some(child) = node.properties.get(name) else {
                continue;
            };
            let value = self
                .generate_with(child, record_index, rng)
                .map_err(|err| GenerationError::field(&child.path, err))?;
            object.insert(name.clone(), value);
        }

        for (name, child) in &node.properties {
            if node.is_required(name) {
                continue;
            }
            if !rng.random_bool(child.optional_probability) {
                continue;
            }
            match self.generate_with(child, record_index, rng) {
                Ok(value) => {
                    object.insert(name.clone(), value);
                }
                Err(err) => {
                    warn!(path = %child.path, error = %err, "optional field skipped");
                }
            }
        }

        Ok(Value::Object(object))
    }
}

/// Resolve a length-like pair. A missing side takes its default, moved so
/// the explicit side is always honored.
fn length_bounds(
    min: Option<usize>,
    max: Option<usize>,
    default_min: usize,
    default_max: usize,
) -> (usize, usize) {
    match (min, max) {
        (Some(min), Some(max)) => (min, max.max(min)),
        (Some(min), None) => (min, default_max.max(min)),
        (None, Some(max)) => (default_min.min(max), max),
        (None, None) => (default_min, default_max),
    }
}

/// Resolve a numeric pair. A missing side keeps the default window width
/// when the explicit side falls outside the default range.
fn numeric_bounds(node: &SchemaNode) -> (f64, f64) {
    let width = DEFAULT_MAXIMUM - DEFAULT_MINIMUM;
    match (node.minimum, node.maximum) {
        (Some(min), Some(max)) => (min, max.max(min)),
        (Some(min), None) if min > DEFAULT_MAXIMUM => (min, min + width),
        (Some(min), None) => (min, DEFAULT_MAXIMUM),
        (None, Some(max)) if max < DEFAULT_MINIMUM => (max - width, max),
        (None, Some(max)) => (DEFAULT_MINIMUM, max),
        (None, None) => (DEFAULT_MINIMUM, DEFAULT_MAXIMUM),
    }
}

fn generate_integer(node: &SchemaNode, rng: &mut dyn RngCore) -> Result<Value, GenerationError> {
    let (min, max) = numeric_bounds(node);
    let (low, high) = (min.ceil(), max.floor());
    if low > high || !low.is_finite() || !high.is_finite() {
        return Err(GenerationError::unsatisfiable(
            &node.path,
            format!("no integer in [{min}, {max}]"),
        ));
    }
    let (low, high) = (low as i64, high as i64);
    let mut value = rng.random_range(low..=high);

    if let Some(step) = node.multiple_of.and_then(integer_step) {
        let no_multiple = || {
            GenerationError::unsatisfiable(
                &node.path,
                format!("no multiple of {step} in [{low}, {high}]"),
            )
        };
        value -= value % step;
        if value < low {
            value = value.checked_add(step).ok_or_else(no_multiple)?;
        }
        if value > high {
            value = value.checked_sub(step).ok_or_else(no_multiple)?;
        }
        if value < low || value > high {
            return Err(no_multiple());
        }
    }
    Ok(Value::from(value))
}

/// Smallest positive integer that is a multiple of `k`.
fn integer_step(k: f64) -> Option<i64> {
    if k.is_nan() || k <= 0.0 || k.is_infinite() {
        return None;
    }
    (1..=1000)
        .map(|n| k * f64::from(n))
        .find(|candidate| (candidate - candidate.round()).abs() < 1e-9)
        .map(|candidate| candidate.round() as i64)
        .filter(|step| *step > 0)
}

fn generate_number(node: &SchemaNode, rng: &mut dyn RngCore) -> Result<Value, GenerationError> {
    let (min, max) = numeric_bounds(node);
    if !min.is_finite() || !max.is_finite() {
        return Err(GenerationError::unsatisfiable(&node.path, "bounds must be finite"));
    }
    let mut value = match Uniform::new_inclusive(min, max) {
        Ok(uniform) => uniform.sample(rng),
        // The span overflows f64; draw around the halved bounds instead.
        Err(uniform::Error::NonFinite) => {
            let unit: f64 = rng.random();
            ((min / 2.0 + unit * (max / 2.0 - min / 2.0)) * 2.0).clamp(min, max)
        }
        Err(err) => {
            return Err(GenerationError::unsatisfiable(
                &node.path,
                format!("cannot sample [{min}, {max}]: {err}"),
            ));
        }
    };

    if let Some(step) = node.multiple_of.filter(|k| *k > 0.0 && k.is_finite()) {
        value = (value / step).round() * step;
        if value < min {
            value += step;
        }
        if value > max {
            value -= step;
        }
        if value < min || value > max {
            return Err(GenerationError::unsatisfiable(
                &node.path,
                format!("no multiple of {step} in [{min}, {max}]"),
            ));
        }
    }

    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| GenerationError::unsatisfiable(&node.path, "value is not finite"))
}

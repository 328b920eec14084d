//! String synthesis for `pattern` constraints.
//!
//! This is not a regex engine. Exact pattern strings listed in the catalog
//! produce conforming values; anything else gets a structural guess that is
//! not guaranteed to match.

use std::collections::HashMap;
use std::fmt;

use rand::{Rng, RngCore};

/// Generator for one catalog pattern.
pub type PatternFn = fn(&mut dyn RngCore) -> String;

const DIGITS: &[u8] = b"0123456789";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const UPPER_ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const DEFAULT_DIGIT_LENGTH: usize = 6;
const MAX_DIGIT_LENGTH: usize = 256;

/// Exact-match table from pattern text to generator.
#[derive(Clone)]
pub struct PatternCatalog {
    entries: HashMap<&'static str, PatternFn>,
}

impl fmt::Debug for PatternCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut patterns: Vec<&str> = self.entries.keys().copied().collect();
        patterns.sort_unstable();
        f.debug_struct("PatternCatalog")
            .field("patterns", &patterns)
            .finish()
    }
}

impl Default for PatternCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PatternCatalog {
    /// Catalog with no entries; every pattern uses the fallback.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Identifier, medical, financial and alphanumeric-range patterns.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();

        // Identifiers.
        catalog.register(r"^[A-Z]{2}[0-9]{6}$", |rng| {
            format!("{}{}", upper(rng, 2), digits(rng, 6))
        });
        catalog.register(r"^PRD[0-9]{8}$", |rng| format!("PRD{}", digits(rng, 8)));
        catalog.register(r"^PRD-[0-9]{6}$", |rng| format!("PRD-{}", digits(rng, 6)));
        catalog.register(r"^WH[0-9]{3}$", |rng| format!("WH{}", digits(rng, 3)));
        catalog.register(r"^SUP[0-9]{5}$", |rng| format!("SUP{}", digits(rng, 5)));
        catalog.register(r"^TXN-[0-9]{10}$", |rng| format!("TXN-{}", digits(rng, 10)));
        catalog.register(r"^PO[0-9]{8}$", |rng| format!("PO{}", digits(rng, 8)));
        catalog.register(r"^RX[0-9]{8}$", |rng| format!("RX{}", digits(rng, 8)));
        catalog.register(r"^PA[0-9]{8}$", |rng| format!("PA{}", digits(rng, 8)));
        catalog.register(r"^INS[0-9]{6}$", |rng| format!("INS{}", digits(rng, 6)));
        catalog.register(r"^CLM[0-9]{10}$", |rng| format!("CLM{}", digits(rng, 10)));
        catalog.register(r"^MPN[A-Z0-9]{8,15}$", |rng| {
            format!("MPN{}", upper_alnum_range(rng, 8, 15))
        });

        // Fixed-length numeric codes.
        catalog.register(r"^[0-9]{4}$", |rng| digits(rng, 4));
        catalog.register(r"^[0-9]{5}$", |rng| digits(rng, 5));
        catalog.register(r"^[0-9]{6}$", |rng| digits(rng, 6));
        catalog.register(r"^[0-9]{9}$", |rng| digits(rng, 9));
        catalog.register(r"^[0-9]{10}$", |rng| digits(rng, 10));

        // Medical codes.
        catalog.register(r"^[A-Z][0-9]{2}\.[0-9]{1,2}$", |rng| {
            format!("{}{}.{}", upper(rng, 1), digits(rng, 2), digits(rng, 2))
        });
        catalog.register(r"^[A-Z][0-9]{2}\.[0-9A-Z]{1,4}$", |rng| {
            let len = rng.random_range(1..=4);
            format!(
                "{}{}.{}",
                upper(rng, 1),
                digits(rng, 2),
                sample(rng, UPPER_ALNUM, len)
            )
        });
        catalog.register(r"^[0-9]{5}-[0-9]{4}-[0-9]{2}$", |rng| {
            format!("{}-{}-{}", digits(rng, 5), digits(rng, 4), digits(rng, 2))
        });
        catalog.register(r"^[A-Z]{2}[0-9]{7}$", |rng| {
            format!("{}{}", upper(rng, 2), digits(rng, 7))
        });

        // Financial and postal codes.
        catalog.register(r"^[0-9]{2}-[0-9]{7}$", |rng| {
            format!("{}-{}", digits(rng, 2), digits(rng, 7))
        });
        catalog.register(r"^[0-9]{5}(-[0-9]{4})?$", |rng| {
            let zip = digits(rng, 5);
            if rng.random_bool(0.3) {
                format!("{zip}-{}", digits(rng, 4))
            } else {
                zip
            }
        });

        // Letter codes.
        catalog.register(r"^[A-Z]{2}-[A-Z]{3}-[0-9]{3}$", |rng| {
            format!("{}-{}-{}", upper(rng, 2), upper(rng, 3), digits(rng, 3))
        });
        catalog.register(r"^[A-Z]{2}$", |rng| upper(rng, 2));

        // Alphanumeric ranges.
        catalog.register(r"^[A-Z0-9]{2,15}$", |rng| upper_alnum_range(rng, 2, 15));
        catalog.register(r"^[A-Z0-9]{3,10}$", |rng| upper_alnum_range(rng, 3, 10));
        catalog.register(r"^[A-Z0-9]{5,10}$", |rng| upper_alnum_range(rng, 5, 10));
        catalog.register(r"^[A-Z0-9]{6,12}$", |rng| upper_alnum_range(rng, 6, 12));
        catalog.register(r"^[A-Z0-9]{6,20}$", |rng| upper_alnum_range(rng, 6, 20));
        catalog.register(r"^[A-Z0-9]{8,15}$", |rng| upper_alnum_range(rng, 8, 15));

        catalog
    }

    /// Add or replace the generator for an exact pattern string.
    pub fn register(&mut self, pattern: &'static str, generator: PatternFn) {
        self.entries.insert(pattern, generator);
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.entries.contains_key(pattern)
    }

    /// Registered patterns, sorted.
    pub fn patterns(&self) -> Vec<&'static str> {
        let mut patterns: Vec<&'static str> = self.entries.keys().copied().collect();
        patterns.sort_unstable();
        patterns
    }

    /// Produce a string for `pattern` from the caller's stream.
    pub fn synthesize(&self, pattern: &str, rng: &mut dyn RngCore) -> String {
        if let Some(generator) = self.entries.get(pattern) {
            return generator(rng);
        }

        let has_digit = pattern.contains("[0-9]");
        let has_upper = pattern.contains("[A-Z]");
        if has_digit && has_upper {
            return sample(rng, ALNUM, 8);
        }
        if has_digit {
            return digits(rng, explicit_length(pattern).unwrap_or(DEFAULT_DIGIT_LENGTH));
        }
        if has_upper || pattern.contains("[a-zA-Z]") {
            return sample(rng, LETTERS, 8);
        }
        sample(rng, ALNUM, 10)
    }
}

/// Length from the first `{N}` quantifier; ranges like `{2,4}` do not count.
fn explicit_length(pattern: &str) -> Option<usize> {
    let start = pattern.find('{')? + 1;
    let end = pattern.find('}')?;
    if end <= start {
        return None;
    }
    pattern[start..end]
        .parse::<usize>()
        .ok()
        .map(|len| len.min(MAX_DIGIT_LENGTH))
}

/// `len` characters drawn uniformly from `charset`.
pub(crate) fn sample(rng: &mut dyn RngCore, charset: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| char::from(charset[rng.random_range(0..charset.len())]))
        .collect()
}

pub(crate) fn alphanumeric(rng: &mut dyn RngCore, len: usize) -> String {
    sample(rng, ALNUM, len)
}

fn digits(rng: &mut dyn RngCore, len: usize) -> String {
    sample(rng, DIGITS, len)
}

fn upper(rng: &mut dyn RngCore, len: usize) -> String {
    sample(rng, UPPER, len)
}

fn upper_alnum_range(rng: &mut dyn RngCore, min: usize, max: usize) -> String {
    let len = rng.random_range(min..=max);
    sample(rng, UPPER_ALNUM, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::seeded_rng;

    #[test]
    fn fallback_follows_character_classes() {
        let catalog = PatternCatalog::empty();
        let mut rng = seeded_rng(11);

        let mixed = catalog.synthesize("^[A-Z]{3}[0-9]{2}-X$", &mut rng);
        assert_eq!(mixed.len(), 8);

        let numeric = catalog.synthesize("^Z[0-9]{12}$", &mut rng);
        assert_eq!(numeric.len(), 12);
        assert!(numeric.bytes().all(|b| b.is_ascii_digit()));

        let ranged = catalog.synthesize("^[0-9]{2,4}$", &mut rng);
        assert_eq!(ranged.len(), DEFAULT_DIGIT_LENGTH);

        let letters = catalog.synthesize("^[a-zA-Z]+$", &mut rng);
        assert_eq!(letters.len(), 8);
        assert!(letters.bytes().all(|b| b.is_ascii_alphabetic()));

        let other = catalog.synthesize("^.+@.+$", &mut rng);
        assert_eq!(other.len(), 10);
    }

    #[test]
    fn letter_only_fallback_never_emits_digits() {
        let catalog = PatternCatalog::empty();
        for seed in 0..50 {
            let mut rng = seeded_rng(seed);
            for pattern in ["^[A-Z]+$", "^[a-zA-Z]{3}$"] {
                let value = catalog.synthesize(pattern, &mut rng);
                assert_eq!(value.len(), 8);
                assert!(
                    value.bytes().all(|b| b.is_ascii_alphabetic()),
                    "{pattern} produced {value}"
                );
            }
        }
    }

    #[test]
    fn registered_patterns_override_fallback() {
        let mut catalog = PatternCatalog::empty();
        catalog.register("^fixed$", |_| "fixed".to_string());
        let mut rng = seeded_rng(1);

        assert!(catalog.contains("^fixed$"));
        assert_eq!(catalog.synthesize("^fixed$", &mut rng), "fixed");
        assert_eq!(catalog.patterns(), vec!["^fixed$"]);
    }
}

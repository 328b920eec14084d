use std::sync::Arc;

use specmint_core::{CrossFieldRule, Record};
use tracing::{debug, warn};

use crate::domain::DomainRegistry;
use crate::errors::{PatchError, RuleViolation};
use crate::patch::{patch, violated_rule_names};
use crate::rules::RuleEngine;

/// Result of validating (and possibly repairing) one record.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// The patched record when a repair applied, otherwise the input.
    pub record: Record,
    /// Problems found by the first validation pass.
    pub violations: Vec<RuleViolation>,
    /// Problems still known after patching.
    pub residual: Vec<RuleViolation>,
    pub patched: bool,
    pub patch_error: Option<PatchError>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Declared rules plus an optional domain, with the patch loop on top.
#[derive(Debug, Clone)]
pub struct RecordValidator {
    engine: RuleEngine,
    domains: Arc<DomainRegistry>,
    domain: Option<String>,
    revalidate_after_patch: bool,
}

impl RecordValidator {
    pub fn new(rules: Vec<CrossFieldRule>) -> Self {
        Self {
            engine: RuleEngine::new(rules),
            domains: Arc::new(DomainRegistry::default()),
            domain: None,
            revalidate_after_patch: true,
        }
    }

    /// Also run the rules of `domain` from `registry`.
    pub fn with_domain(mut self, registry: Arc<DomainRegistry>, domain: Option<String>) -> Self {
        if let Some(name) = &domain
            && !registry.contains(name)
        {
            warn!(domain = %name, "unknown validation domain; no domain rules will run");
        }
        self.domains = registry;
        self.domain = domain;
        self
    }

    pub fn with_revalidation(mut self, enabled: bool) -> Self {
        self.revalidate_after_patch = enabled;
        self
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// One validation pass: declared rules, then domain rules.
    pub fn validate(&self, record: &Record) -> Vec<RuleViolation> {
        let mut violations = self.engine.validate(record);
        if let Some(domain) = &self.domain {
            violations.extend(self.domains.validate(domain, record));
        }
        violations
    }

    /// Validate, patch violated rules that declare a repair, then re-validate
    /// once when enabled.
    pub fn process(&self, record: Record) -> ValidationOutcome {
        let violations = self.validate(&record);
        let violated = violated_rule_names(&violations);
        let repairable = self
            .engine
            .rules()
            .any(|rule| rule.patch.is_some() && violated.contains(&rule.name));

        if !repairable {
            return ValidationOutcome {
                record,
                residual: violations.clone(),
                violations,
                patched: false,
                patch_error: None,
            };
        }

        match patch(&record, &violated, self.engine.rules()) {
            Ok(patched) => {
                let residual = if self.revalidate_after_patch {
                    self.validate(&patched)
                } else {
                    violations.clone()
                };
                debug!(
                    rules = violated.len(),
                    before = violations.len(),
                    after = residual.len(),
                    "record patched"
                );
                ValidationOutcome {
                    record: patched,
                    violations,
                    residual,
                    patched: true,
                    patch_error: None,
                }
            }
            Err(err) => {
                warn!(error = %err, "patch failed; keeping original record");
                ValidationOutcome {
                    record,
                    residual: violations.clone(),
                    violations,
                    patched: false,
                    patch_error: Some(err),
                }
            }
        }
    }
}

//! Built-in validators for well-known record shapes.
//!
//! Domain rules inspect fixed nested paths (for example
//! `billing.total_charges`) and silently pass when those paths are absent or
//! carry an unexpected type. They never carry patches.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;
use specmint_core::record::lookup;
use specmint_core::{Record, Severity};

use crate::errors::RuleViolation;
use crate::hl7::hl7_rules;

/// Signature of a domain check: `Err` carries the violation message.
pub type DomainCheck = fn(&Record) -> Result<(), String>;

/// A named rule inside a domain.
#[derive(Debug, Clone)]
pub struct DomainRule {
    pub name: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub check: DomainCheck,
}

impl DomainRule {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        severity: Severity,
        check: DomainCheck,
    ) -> Self {
        Self {
            name,
            description,
            severity,
            check,
        }
    }
}

/// Domain name to rule list. Build once and share by reference.
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    domains: BTreeMap<String, Vec<DomainRule>>,
}

impl DomainRegistry {
    /// Registry preloaded with the healthcare, hl7, fintech and ecommerce
    /// rules.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register_domain("healthcare", healthcare_rules());
        registry.register_domain("hl7", hl7_rules());
        registry.register_domain("fintech", fintech_rules());
        registry.register_domain("ecommerce", ecommerce_rules());
        registry
    }

    /// Add rules to a domain, creating it if needed.
    pub fn register_domain(&mut self, domain: impl Into<String>, rules: Vec<DomainRule>) {
        self.domains.entry(domain.into()).or_default().extend(rules);
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains_key(domain)
    }

    pub fn rules(&self, domain: &str) -> &[DomainRule] {
        self.domains.get(domain).map(Vec::as_slice).unwrap_or_default()
    }

    /// Run every rule of `domain`. Unknown domains yield nothing.
    pub fn validate(&self, domain: &str, record: &Record) -> Vec<RuleViolation> {
        self.rules(domain)
            .iter()
            .filter_map(|rule| {
                (rule.check)(record)
                    .err()
                    .map(|message| RuleViolation::domain(domain, rule.name, rule.severity, message))
            })
            .collect()
    }
}

static ICD10: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][0-9]{2}(\.[0-9X]{1,4})?$").expect("Invalid ICD-10 regex")
});
static SKU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}[0-9]{6}$").expect("Invalid SKU regex"));
static WAREHOUSE_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{2}-[A-Z]{3}-[0-9]{3}$").expect("Invalid warehouse location regex")
});

const ISO_CURRENCIES: [&str; 10] = [
    "USD", "EUR", "GBP", "CAD", "AUD", "JPY", "CHF", "CNY", "INR", "BRL",
];
const ROUTING_WEIGHTS: [u32; 9] = [3, 7, 1, 3, 7, 1, 3, 7, 1];

fn str_at<'a>(record: &'a Record, path: &str) -> Option<&'a str> {
    lookup(record, path).and_then(Value::as_str)
}

fn f64_at(record: &Record, path: &str) -> Option<f64> {
    lookup(record, path).and_then(Value::as_f64)
}

fn healthcare_rules() -> Vec<DomainRule> {
    vec![
        DomainRule::new(
            "icd10_format",
            "Validate ICD-10 diagnosis codes format",
            Severity::Error,
            icd10_format,
        ),
        DomainRule::new(
            "charge_amount_realistic",
            "Ensure realistic charge amounts ($10 - $50,000)",
            Severity::Error,
            charge_amount_realistic,
        ),
        DomainRule::new(
            "date_ordering",
            "DOB <= Service Date <= Submitted Date",
            Severity::Error,
            clinical_date_ordering,
        ),
        DomainRule::new(
            "npi_format",
            "Validate NPI numbers format (10 digits)",
            Severity::Error,
            npi_format,
        ),
        DomainRule::new(
            "vital_signs_plausible",
            "Blood pressure values should be medically plausible",
            Severity::Warning,
            vital_signs_plausible,
        ),
    ]
}

fn fintech_rules() -> Vec<DomainRule> {
    vec![
        DomainRule::new(
            "routing_number_checksum",
            "Validate ABA routing numbers (9 digits with checksum)",
            Severity::Error,
            routing_number_checksum,
        ),
        DomainRule::new(
            "currency_code_iso",
            "Validate currency codes (ISO 4217)",
            Severity::Error,
            currency_code_iso,
        ),
        DomainRule::new(
            "risk_score_range",
            "Risk scoring logic (0-100 scale)",
            Severity::Error,
            risk_score_range,
        ),
        DomainRule::new(
            "large_transaction_approval",
            "Large transactions (>$10K) must require approval",
            Severity::Error,
            large_transaction_approval,
        ),
    ]
}

fn ecommerce_rules() -> Vec<DomainRule> {
    vec![
        DomainRule::new(
            "sku_format",
            "Validate SKU formats (e.g., AB123456)",
            Severity::Error,
            sku_format,
        ),
        DomainRule::new(
            "price_inventory_consistency",
            "Ensure price-inventory consistency",
            Severity::Warning,
            price_inventory_consistency,
        ),
        DomainRule::new(
            "sale_price_validation",
            "Sale price must be less than base price",
            Severity::Error,
            sale_price_validation,
        ),
        DomainRule::new(
            "warehouse_location_format",
            "Validate warehouse location codes",
            Severity::Error,
            warehouse_location_format,
        ),
    ]
}

fn icd10_format(record: &Record) -> Result<(), String> {
    let Some(diagnoses) = lookup(record, "clinical_data.diagnoses").and_then(Value::as_array)
    else {
        return Ok(());
    };
    for code in diagnoses
        .iter()
        .filter_map(|diagnosis| diagnosis.get("icd10_code").and_then(Value::as_str))
    {
        if !ICD10.is_match(code) {
            return Err(format!("invalid ICD-10 code: {code}"));
        }
    }
    Ok(())
}

fn charge_amount_realistic(record: &Record) -> Result<(), String> {
    if let Some(total) = f64_at(record, "billing.total_charges")
        && !(10.0..=50_000.0).contains(&total)
    {
        return Err(format!("unrealistic charge amount: ${total:.2}"));
    }
    Ok(())
}

fn parse_day(record: &Record, path: &str, label: &str) -> Result<Option<NaiveDate>, String> {
    str_at(record, path)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| format!("invalid {label} format: {raw}"))
        })
        .transpose()
}

fn clinical_date_ordering(record: &Record) -> Result<(), String> {
    let dob = parse_day(record, "patient.demographics.date_of_birth", "DOB")?;
    let service = parse_day(record, "billing.service_date", "service date")?;
    let submitted = parse_day(record, "billing.submitted_date", "submitted date")?;

    if let (Some(dob), Some(service)) = (dob, service)
        && dob > service
    {
        return Err(format!(
            "DOB ({dob}) cannot be after service date ({service})"
        ));
    }
    if let (Some(service), Some(submitted)) = (service, submitted)
        && service > submitted
    {
        return Err(format!(
            "service date ({service}) cannot be after submitted date ({submitted})"
        ));
    }
    Ok(())
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|byte| byte.is_ascii_digit())
}

fn npi_format(record: &Record) -> Result<(), String> {
    if let Some(npi) = str_at(record, "encounter.provider.npi")
        && !is_digits(npi, 10)
    {
        return Err(format!("invalid NPI format: {npi}"));
    }
    Ok(())
}

fn vital_signs_plausible(record: &Record) -> Result<(), String> {
    let systolic = f64_at(record, "clinical_data.vital_signs.blood_pressure.systolic");
    let diastolic = f64_at(record, "clinical_data.vital_signs.blood_pressure.diastolic");
    let (Some(systolic), Some(diastolic)) = (systolic, diastolic) else {
        return Ok(());
    };
    if systolic <= diastolic {
        return Err(format!(
            "systolic ({systolic}) must be greater than diastolic ({diastolic})"
        ));
    }
    if systolic - diastolic < 20.0 {
        return Err(format!("pulse pressure too narrow: {}", systolic - diastolic));
    }
    Ok(())
}

/// ABA checksum: weighted digit sum (3, 7, 1 repeating) divisible by 10.
pub fn is_valid_routing_number(routing: &str) -> bool {
    if !is_digits(routing, 9) {
        return false;
    }
    let sum: u32 = routing
        .bytes()
        .zip(ROUTING_WEIGHTS)
        .map(|(byte, weight)| u32::from(byte - b'0') * weight)
        .sum();
    sum % 10 == 0
}

fn routing_number_checksum(record: &Record) -> Result<(), String> {
    if let Some(routing) = str_at(record, "account.routing_number")
        && !is_valid_routing_number(routing)
    {
        return Err(format!("invalid routing number: {routing}"));
    }
    Ok(())
}

fn currency_code_iso(record: &Record) -> Result<(), String> {
    if let Some(currency) = str_at(record, "transaction_details.currency")
        && !ISO_CURRENCIES.iter().any(|code| *code == currency)
    {
        return Err(format!("invalid currency code: {currency}"));
    }
    Ok(())
}

fn risk_score_range(record: &Record) -> Result<(), String> {
    if let Some(score) = f64_at(record, "risk_assessment.risk_score")
        && !(0.0..=100.0).contains(&score)
    {
        return Err(format!("risk score out of range: {score}"));
    }
    Ok(())
}

fn large_transaction_approval(record: &Record) -> Result<(), String> {
    let Some(amount) = f64_at(record, "transaction_details.amount") else {
        return Ok(());
    };
    if amount <= 10_000.0 {
        return Ok(());
    }
    match str_at(record, "risk_assessment.approval_status") {
        Some(status) if status != "manual_review" && status != "approved" => Err(format!(
            "large transaction (${amount:.2}) requires approval, got status: {status}"
        )),
        _ => Ok(()),
    }
}

fn sku_format(record: &Record) -> Result<(), String> {
    if let Some(sku) = str_at(record, "sku")
        && !SKU.is_match(sku)
    {
        return Err(format!("invalid SKU format: {sku}"));
    }
    Ok(())
}

fn price_inventory_consistency(record: &Record) -> Result<(), String> {
    let base_price = f64_at(record, "pricing.base_price");
    let stock = f64_at(record, "inventory.stock_quantity");
    if let (Some(base_price), Some(stock)) = (base_price, stock)
        && base_price > 1000.0
        && stock > 1000.0
    {
        return Err(format!(
            "high-value item (${base_price:.2}) should have lower inventory ({stock})"
        ));
    }
    Ok(())
}

fn sale_price_validation(record: &Record) -> Result<(), String> {
    let base_price = f64_at(record, "pricing.base_price");
    let sale_price = f64_at(record, "pricing.sale_price");
    if let (Some(base_price), Some(sale_price)) = (base_price, sale_price)
        && sale_price >= base_price
    {
        return Err(format!(
            "sale price (${sale_price:.2}) must be less than base price (${base_price:.2})"
        ));
    }
    Ok(())
}

fn warehouse_location_format(record: &Record) -> Result<(), String> {
    if let Some(location) = str_at(record, "inventory.warehouse_location")
        && !WAREHOUSE_LOCATION.is_match(location)
    {
        return Err(format!("invalid warehouse location format: {location}"));
    }
    Ok(())
}

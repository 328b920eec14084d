//! HL7 v2 and FHIR code checks.
//!
//! Each `validate_*` function checks one value and reports why it is
//! rejected. [`hl7_rules`] wires them to flat record fields such as
//! `diagnosis_code` or `admission_date` for the `hl7` domain.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde_json::Value;
use specmint_core::record::lookup;
use specmint_core::{Record, Severity};

use crate::domain::DomainRule;

static ICD10_CM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-TV-Z][0-9]{2}(\.[0-9]{1,3})?$").expect("Invalid ICD-10-CM regex")
});
static CPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}[0-9FT]$").expect("Invalid CPT regex"));
static FHIR_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-.]{1,64}$").expect("Invalid FHIR id regex"));
static MEDICAL_RECORD_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{1,20}$").expect("Invalid MRN regex"));
static ZIP_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5}(-[0-9]{4})?$").expect("Invalid ZIP regex"));

/// `80840` prefix every NPI carries for its Luhn check, pre-summed.
const NPI_PREFIX_SUM: u32 = 24;

const FHIR_RESOURCE_TYPES: [&str; 12] = [
    "Patient",
    "Practitioner",
    "Organization",
    "Encounter",
    "Observation",
    "DiagnosticReport",
    "Condition",
    "Procedure",
    "MedicationRequest",
    "AllergyIntolerance",
    "CarePlan",
    "Goal",
];

const MESSAGE_EVENTS: [(&str, &[&str]); 9] = [
    (
        "ADT",
        &[
            "A01", "A02", "A03", "A04", "A05", "A06", "A07", "A08", "A09", "A10", "A11", "A12",
            "A13", "A14", "A15", "A16", "A17", "A18", "A19", "A20", "A21", "A22", "A23", "A24",
            "A25", "A26", "A27", "A28", "A29", "A30", "A31", "A32", "A33", "A34", "A35", "A36",
            "A37", "A38", "A39", "A40", "A41", "A42", "A43", "A44", "A45", "A46", "A47", "A48",
            "A49", "A50", "A51", "A52", "A53", "A54", "A55", "A60", "A61", "A62",
        ],
    ),
    ("ORM", &["O01", "O02", "O03"]),
    ("ORU", &["R01", "R02", "R03", "R04", "R30", "R31", "R32"]),
    ("OML", &["O21", "O22", "O23", "O24", "O33", "O34", "O35", "O36"]),
    (
        "SIU",
        &[
            "S12", "S13", "S14", "S15", "S16", "S17", "S18", "S19", "S20", "S21", "S22", "S23",
            "S24", "S25", "S26",
        ],
    ),
    (
        "MDM",
        &["T01", "T02", "T03", "T04", "T05", "T06", "T07", "T08", "T09", "T10", "T11"],
    ),
    ("BAR", &["P01", "P02", "P05", "P06", "P10", "P12"]),
    ("DFT", &["P03", "P11"]),
    ("QRY", &["A19", "P04", "PC4", "PC6", "PC7", "PC8", "R02"]),
];

const FIELD_SEPARATOR: &str = "|";
const ENCODING_CHARACTERS: &str = r"^~\&";

const GENDER_CODES: [&str; 6] = ["M", "F", "O", "U", "A", "N"];
const MARITAL_STATUS_CODES: [&str; 10] = ["A", "D", "I", "L", "M", "P", "S", "T", "U", "W"];
const PATIENT_CLASS_CODES: [&str; 8] = ["E", "I", "O", "P", "R", "B", "C", "N"];
const OBSERVATION_STATUS_CODES: [&str; 12] =
    ["C", "D", "F", "I", "N", "O", "P", "R", "S", "U", "W", "X"];

/// Pairs that must be in chronological order when both are present.
const DATE_ORDER: [(&str, &str); 3] = [
    ("birth_date", "admission_date"),
    ("admission_date", "discharge_date"),
    ("effective_time", "issued_time"),
];

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|byte| byte.is_ascii_digit())
}

fn one_of(codes: &[&str], value: &str, label: &str) -> Result<(), String> {
    if codes.contains(&value) {
        Ok(())
    } else {
        Err(format!("invalid {label}: {value}"))
    }
}

/// ICD-10-CM diagnosis code. `U` codes are reserved for WHO use.
pub fn validate_icd10_code(code: &str) -> Result<(), String> {
    if code.starts_with('U') {
        return Err(format!("U codes are reserved for WHO use: {code}"));
    }
    if !ICD10_CM.is_match(code) {
        return Err(format!("invalid ICD-10 code format: {code}"));
    }
    Ok(())
}

/// CPT procedure code: Category I (00100-99499), or a four-digit Category II
/// (`F`) or Category III (`T`) code.
pub fn validate_cpt_code(code: &str) -> Result<(), String> {
    if !CPT.is_match(code) {
        return Err(format!("invalid CPT code format: {code}"));
    }
    if code.ends_with(['F', 'T']) {
        return Ok(());
    }
    match code.parse::<u32>() {
        Ok(100..=99_499) => Ok(()),
        _ => Err(format!("CPT code outside valid ranges: {code}")),
    }
}

/// National Provider Identifier: ten digits passing the Luhn check over the
/// `80840` card-issuer prefix.
pub fn validate_npi(npi: &str) -> Result<(), String> {
    if !is_digits(npi, 10) {
        return Err(format!("invalid NPI format: {npi}"));
    }
    let sum: u32 = npi
        .bytes()
        .rev()
        .enumerate()
        .map(|(position, byte)| {
            let digit = u32::from(byte - b'0');
            if position % 2 == 1 {
                let doubled = digit * 2;
                doubled / 10 + doubled % 10
            } else {
                digit
            }
        })
        .sum();
    if (sum + NPI_PREFIX_SUM) % 10 != 0 {
        return Err(format!("invalid checksum for NPI: {npi}"));
    }
    Ok(())
}

/// Social Security Number without separators.
pub fn validate_ssn(ssn: &str) -> Result<(), String> {
    if !is_digits(ssn, 9) {
        return Err(format!("invalid SSN format: {ssn}"));
    }
    if ssn == "000000000" || ssn == "123456789" {
        return Err(format!("invalid SSN pattern: {ssn}"));
    }
    let area = &ssn[..3];
    if area == "000" || area == "666" || area.starts_with('9') {
        return Err(format!("invalid SSN area number: {area}"));
    }
    Ok(())
}

/// HL7 `DTM` value: `YYYYMMDD`, `YYYYMMDDHHMM` or `YYYYMMDDHHMMSS`.
pub fn parse_hl7_date_time(value: &str) -> Result<NaiveDateTime, String> {
    if !(8..=14).contains(&value.len()) || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(format!("invalid HL7 date/time format: {value}"));
    }
    if !matches!(value.len(), 8 | 12 | 14) {
        return Err(format!("unsupported HL7 date/time length: {}", value.len()));
    }

    let field = |start: usize, len: usize| -> u32 {
        value
            .get(start..start + len)
            .and_then(|digits| digits.parse().ok())
            .unwrap_or(0)
    };
    let invalid = || format!("invalid HL7 date/time value: {value}");

    let year = i32::try_from(field(0, 4)).map_err(|_| invalid())?;
    let date = NaiveDate::from_ymd_opt(year, field(4, 2), field(6, 2)).ok_or_else(invalid)?;
    let time =
        NaiveTime::from_hms_opt(field(8, 2), field(10, 2), field(12, 2)).ok_or_else(invalid)?;
    Ok(date.and_time(time))
}

/// Accepts any valid HL7 date/time.
pub fn validate_hl7_date_time(value: &str) -> Result<(), String> {
    parse_hl7_date_time(value).map(|_| ())
}

/// FHIR literal reference `ResourceType/id`.
pub fn validate_fhir_reference(reference: &str) -> Result<(), String> {
    let mut parts = reference.split('/');
    let (Some(resource_type), Some(id), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("invalid FHIR reference format: {reference}"));
    };
    if !FHIR_RESOURCE_TYPES.contains(&resource_type) {
        return Err(format!("invalid FHIR resource type: {resource_type}"));
    }
    if !FHIR_ID.is_match(id) {
        return Err(format!("invalid FHIR resource ID: {id}"));
    }
    Ok(())
}

/// HL7 v2 message type and trigger event combination, e.g. `ADT^A01`.
pub fn validate_message_type(message_type: &str, trigger_event: &str) -> Result<(), String> {
    let Some((_, events)) = MESSAGE_EVENTS
        .iter()
        .find(|(candidate, _)| *candidate == message_type)
    else {
        return Err(format!("invalid HL7 v2.x message type: {message_type}"));
    };
    if !events.contains(&trigger_event) {
        return Err(format!(
            "invalid trigger event {trigger_event} for message type {message_type}"
        ));
    }
    Ok(())
}

/// MSH-1 and MSH-2 must use the standard delimiters.
pub fn validate_field_separators(field_separator: &str, encoding: &str) -> Result<(), String> {
    if field_separator != FIELD_SEPARATOR {
        return Err(format!(
            "invalid field separator: expected '{FIELD_SEPARATOR}', got '{field_separator}'"
        ));
    }
    if encoding != ENCODING_CHARACTERS {
        return Err(format!(
            "invalid encoding characters: expected '{ENCODING_CHARACTERS}', got '{encoding}'"
        ));
    }
    Ok(())
}

pub fn validate_medical_record_number(mrn: &str) -> Result<(), String> {
    if !MEDICAL_RECORD_NUMBER.is_match(mrn) {
        return Err(format!("invalid medical record number format: {mrn}"));
    }
    Ok(())
}

/// Ten-digit phone number without punctuation.
pub fn validate_phone_number(phone: &str) -> Result<(), String> {
    if !is_digits(phone, 10) {
        return Err(format!("invalid phone number format: {phone}"));
    }
    if phone == "0000000000" || phone == "1111111111" {
        return Err(format!("invalid phone number pattern: {phone}"));
    }
    Ok(())
}

pub fn validate_zip_code(zip: &str) -> Result<(), String> {
    if !ZIP_CODE.is_match(zip) {
        return Err(format!("invalid ZIP code format: {zip}"));
    }
    Ok(())
}

pub fn validate_gender(code: &str) -> Result<(), String> {
    one_of(&GENDER_CODES, code, "gender code")
}

pub fn validate_marital_status(code: &str) -> Result<(), String> {
    one_of(&MARITAL_STATUS_CODES, code, "marital status code")
}

pub fn validate_patient_class(code: &str) -> Result<(), String> {
    one_of(&PATIENT_CLASS_CODES, code, "patient class")
}

pub fn validate_observation_status(code: &str) -> Result<(), String> {
    one_of(&OBSERVATION_STATUS_CODES, code, "observation status")
}

/// Rules of the `hl7` domain.
pub fn hl7_rules() -> Vec<DomainRule> {
    vec![
        DomainRule::new(
            "icd10_cm_code",
            "Diagnosis codes follow ICD-10-CM",
            Severity::Error,
            diagnosis_code,
        ),
        DomainRule::new(
            "cpt_code",
            "Procedure codes follow CPT categories",
            Severity::Error,
            procedure_code,
        ),
        DomainRule::new(
            "npi_checksum",
            "NPI numbers pass the Luhn check",
            Severity::Error,
            npi_checksum,
        ),
        DomainRule::new("ssn_format", "SSNs use valid area numbers", Severity::Error, ssn_format),
        DomainRule::new(
            "medical_record_number",
            "MRNs are 1-20 alphanumeric characters",
            Severity::Error,
            medical_record_number,
        ),
        DomainRule::new(
            "contact_format",
            "Phone numbers and ZIP codes are well formed",
            Severity::Error,
            contact_format,
        ),
        DomainRule::new(
            "coded_values",
            "Gender, marital status, patient class and observation status use HL7 tables",
            Severity::Error,
            coded_values,
        ),
        DomainRule::new(
            "fhir_references",
            "Fields ending in _reference are FHIR literal references",
            Severity::Error,
            fhir_references,
        ),
        DomainRule::new(
            "message_header",
            "Message type, trigger event and delimiters are valid",
            Severity::Error,
            message_header,
        ),
        DomainRule::new(
            "hl7_date_ordering",
            "Birth <= admission <= discharge and effective <= issued",
            Severity::Error,
            hl7_date_ordering,
        ),
        DomainRule::new(
            "final_result_value",
            "Final observations carry a value",
            Severity::Error,
            final_result_value,
        ),
        DomainRule::new(
            "cancelled_order_response",
            "Cancelled orders carry a response flag",
            Severity::Error,
            cancelled_order_response,
        ),
    ]
}

fn str_at<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    lookup(record, field).and_then(Value::as_str)
}

fn check_str(
    record: &Record,
    field: &str,
    check: fn(&str) -> Result<(), String>,
) -> Result<(), String> {
    str_at(record, field).map_or(Ok(()), check)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(_) => false,
    }
}

fn diagnosis_code(record: &Record) -> Result<(), String> {
    check_str(record, "diagnosis_code", validate_icd10_code)
}

fn procedure_code(record: &Record) -> Result<(), String> {
    check_str(record, "procedure_code", validate_cpt_code)
}

fn npi_checksum(record: &Record) -> Result<(), String> {
    check_str(record, "npi", validate_npi)
}

fn ssn_format(record: &Record) -> Result<(), String> {
    check_str(record, "ssn", validate_ssn)
}

fn medical_record_number(record: &Record) -> Result<(), String> {
    check_str(record, "medical_record_number", validate_medical_record_number)
}

fn contact_format(record: &Record) -> Result<(), String> {
    check_str(record, "phone", validate_phone_number)?;
    check_str(record, "zip_code", validate_zip_code)
}

fn coded_values(record: &Record) -> Result<(), String> {
    check_str(record, "gender", validate_gender)?;
    check_str(record, "marital_status", validate_marital_status)?;
    check_str(record, "patient_class", validate_patient_class)?;
    check_str(record, "observation_status", validate_observation_status)
}

fn fhir_references(record: &Record) -> Result<(), String> {
    for (key, value) in record {
        if let Some(reference) = value.as_str()
            && key.ends_with("_reference")
        {
            validate_fhir_reference(reference).map_err(|err| format!("{key}: {err}"))?;
        }
    }
    Ok(())
}

fn message_header(record: &Record) -> Result<(), String> {
    if let (Some(message_type), Some(trigger_event)) =
        (str_at(record, "message_type"), str_at(record, "trigger_event"))
    {
        validate_message_type(message_type, trigger_event)?;
    }
    if let (Some(separator), Some(encoding)) = (
        str_at(record, "field_separator"),
        str_at(record, "encoding_characters"),
    ) {
        validate_field_separators(separator, encoding)?;
    }
    Ok(())
}

fn hl7_date_ordering(record: &Record) -> Result<(), String> {
    for (earlier, later) in DATE_ORDER {
        let (Some(first), Some(second)) = (str_at(record, earlier), str_at(record, later)) else {
            continue;
        };
        let first_at = parse_hl7_date_time(first).map_err(|err| format!("invalid {earlier}: {err}"))?;
        let second_at =
            parse_hl7_date_time(second).map_err(|err| format!("invalid {later}: {err}"))?;
        if first_at > second_at {
            return Err(format!(
                "{earlier} ({first}) must be before or equal to {later} ({second})"
            ));
        }
    }
    Ok(())
}

fn final_result_value(record: &Record) -> Result<(), String> {
    match str_at(record, "result_status") {
        Some("F" | "final") if is_blank(lookup(record, "observation_value")) => {
            Err("final results must have observation values".to_string())
        }
        _ => Ok(()),
    }
}

fn cancelled_order_response(record: &Record) -> Result<(), String> {
    match str_at(record, "order_status") {
        Some("CA") if is_blank(lookup(record, "response_flag")) => {
            Err("cancelled orders must have response flag".to_string())
        }
        _ => Ok(()),
    }
}

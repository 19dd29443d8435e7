//! Vitals sanitisation.
//!
//! The booking form sends vitals as a loosely-typed JSON object: numbers may arrive as strings,
//! complaint-specific fields vary, and free text is unbounded. [`sanitize_vitals`] turns that
//! payload into a [`VitalsSummary`] with a fixed core and bounded text.

use crate::constants::{
    MANDATORY_VITALS, MAX_ALLERGY_LEN, MAX_EXTRA_FIELD_LEN, MAX_MEDICATIONS_LEN,
};
use crate::{ClinicError, ClinicResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const ALLERGIES: &str = "allergies";
const MEDICATIONS: &str = "medications";
const EXTRA_FIELDS: &str = "extraFields";
const BMI: &str = "bmi";

/// A pass-through vital: numbers are stored as floats, text verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VitalValue {
    Number(f64),
    Text(String),
}

/// Canonical vitals record stored with every appointment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsSummary {
    pub height_cm: f64,
    pub weight_kg: f64,
    pub blood_pressure_systolic: f64,
    pub blood_pressure_diastolic: f64,
    pub heart_rate: f64,
    pub allergies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_fields: Option<Vec<String>>,
    /// Supplied by the client, or computed from height and weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bmi: Option<VitalValue>,
    /// Complaint-specific scalars (e.g. `o2Saturation`, `smokingStatus`).
    #[serde(flatten)]
    pub extras: BTreeMap<String, VitalValue>,
}

/// Validate and normalise a raw vitals payload.
///
/// # Errors
///
/// Returns [`ClinicError::Validation`] if:
/// - `input` is not a JSON object,
/// - a mandatory vital is missing, null, or not convertible to a finite float,
/// - `allergies` is missing, not a list, or empty.
pub fn sanitize_vitals(input: &Value) -> ClinicResult<VitalsSummary> {
    let vitals = input
        .as_object()
        .ok_or_else(|| ClinicError::validation("vitals must be an object"))?;

    let mut mandatory = [0.0f64; MANDATORY_VITALS.len()];
    for (slot, field) in mandatory.iter_mut().zip(MANDATORY_VITALS) {
        let value = match vitals.get(field) {
            None | Some(Value::Null) => {
                return Err(ClinicError::validation(format!("Missing vital: {field}")))
            }
            Some(value) => value,
        };
        *slot = coerce_float(value).ok_or_else(|| {
            ClinicError::validation(format!("Invalid numeric value for {field}"))
        })?;
    }
    let [height_cm, weight_kg, blood_pressure_systolic, blood_pressure_diastolic, heart_rate] =
        mandatory;

    let allergies = match vitals.get(ALLERGIES) {
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|item| truncate(&stringify(item), MAX_ALLERGY_LEN))
            .collect(),
        _ => return Err(ClinicError::validation("allergies must be a non-empty list")),
    };

    let medications = vitals
        .get(MEDICATIONS)
        .filter(|v| is_truthy(v))
        .map(|v| truncate(&stringify(v), MAX_MEDICATIONS_LEN));

    let extra_fields = match vitals.get(EXTRA_FIELDS) {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|item| truncate(&stringify(item), MAX_EXTRA_FIELD_LEN))
                .collect(),
        ),
        _ => None,
    };

    let mut bmi = None;
    let mut extras = BTreeMap::new();
    for (key, value) in vitals {
        if MANDATORY_VITALS.contains(&key.as_str())
            || matches!(key.as_str(), ALLERGIES | MEDICATIONS | EXTRA_FIELDS)
        {
            continue;
        }
        let scalar = match value {
            Value::Number(n) => match n.as_f64() {
                Some(f) => VitalValue::Number(f),
                None => continue,
            },
            Value::String(s) => VitalValue::Text(s.clone()),
            _ => continue,
        };
        if key == BMI {
            bmi = Some(scalar);
        } else {
            extras.insert(key.clone(), scalar);
        }
    }

    if bmi.is_none() {
        bmi = compute_bmi(height_cm, weight_kg).map(VitalValue::Number);
    }

    Ok(VitalsSummary {
        height_cm,
        weight_kg,
        blood_pressure_systolic,
        blood_pressure_diastolic,
        heart_rate,
        allergies,
        medications,
        extra_fields,
        bmi,
        extras,
    })
}

/// Body-mass index rounded to one decimal, or `None` when height is not positive.
///
/// The exact binary value is rounded half-to-even, so 24.95 (stored as 24.9499...) gives 24.9.
pub fn compute_bmi(height_cm: f64, weight_kg: f64) -> Option<f64> {
    let meters = height_cm / 100.0;
    if !(meters > 0.0) {
        return None;
    }
    let bmi = weight_kg / (meters * meters);
    if !bmi.is_finite() {
        return None;
    }
    format!("{:.1}", bmi).parse().ok()
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

/// Text form of a JSON value: strings verbatim, everything else as JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truncate to at most `max` characters (not bytes).
fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

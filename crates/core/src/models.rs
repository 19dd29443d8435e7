//! Stored record shapes.

use crate::constants::LATEST_RECORD_ID;
use crate::store::Item;
use crate::vitals::VitalsSummary;
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use clinic_types::Role;
use clinic_ulid::Ulid;
use serde::{Deserialize, Serialize};

/// Canonical doctor profile. Every field is omitted when empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub avail_slots: Vec<String>,
}

impl DoctorProfile {
    pub fn is_empty(&self) -> bool {
        self.specialty.is_none()
            && self.city.is_none()
            && self.languages.is_empty()
            && self.avail_slots.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_profile: Option<DoctorProfile>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppointmentStatus {
    Pending,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub appointment_id: Ulid,
    pub doctor_id: String,
    pub patient_id: String,
    #[serde(rename = "slotISO")]
    pub slot_iso: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub chief_complaint: String,
    pub recommended_specialty: Option<String>,
    pub vitals_summary: VitalsSummary,
}

/// Snapshot of a patient's intake, keyed by (`patientId`, `recordId`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthIndexRecord {
    pub patient_id: String,
    pub record_id: String,
    pub updated_at: DateTime<Utc>,
    pub chief_complaint: String,
    pub summary: VitalsSummary,
}

impl HealthIndexRecord {
    /// The historical snapshot and the `latest` pointer written for one appointment.
    pub fn pair_for(appointment: &Appointment) -> [HealthIndexRecord; 2] {
        let record = |record_id: String| HealthIndexRecord {
            patient_id: appointment.patient_id.clone(),
            record_id,
            updated_at: appointment.created_at,
            chief_complaint: appointment.chief_complaint.clone(),
            summary: appointment.vitals_summary.clone(),
        };
        [
            record(appointment.appointment_id.to_string()),
            record(LATEST_RECORD_ID.to_string()),
        ]
    }
}

/// Serialise a record into a store item.
pub fn to_item<T: Serialize>(record: &T) -> ClinicResult<Item> {
    match serde_json::to_value(record).map_err(ClinicError::Serialization)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(ClinicError::Serialization(serde::ser::Error::custom(format!(
            "expected an object, got {other}"
        )))),
    }
}

/// Deserialise a store item into a record.
pub fn from_item<T: serde::de::DeserializeOwned>(item: Item) -> ClinicResult<T> {
    serde_json::from_value(serde_json::Value::Object(item)).map_err(ClinicError::Deserialization)
}

//! Request and response bodies shared by the core handlers and the REST layer.
//!
//! Field names follow the camelCase JSON the browser client sends and expects.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Error body returned for every non-2xx response.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub message: String,
}

/// Body of `POST /appointments`.
///
/// All fields are optional at the wire level so that missing values surface as validation
/// errors from the handler rather than as decoding failures.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentReq {
    #[serde(default)]
    pub doctor_id: Option<String>,
    #[serde(default, rename = "slotISO")]
    pub slot_iso: Option<String>,
    #[serde(default)]
    pub chief_complaint: Option<String>,
    #[serde(default)]
    pub recommended_specialty: Option<String>,
    /// Loosely-typed vitals payload; sanitized by the handler.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub vitals: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRes {
    pub appointment_id: String,
    pub status: String,
}

/// The `request` section of an account confirmation event.
///
/// A `null` or missing map reads as empty, and entries whose value is not a string are dropped.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequest {
    #[serde(default, deserialize_with = "string_entries")]
    pub user_attributes: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "string_entries")]
    pub client_metadata: BTreeMap<String, String>,
}

/// Account confirmation event delivered after a user verifies their registration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct PostConfirmationEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub request: ConfirmationRequest,
}

fn string_entries<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(s) => Some((key, s)),
            _ => None,
        })
        .collect())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Query parameters of `GET /doctors`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct DoctorSearchParams {
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Doctor profile as returned by directory search; list fields are always present.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfileView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub avail_slots: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoctorListing {
    pub user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub doctor_profile: DoctorProfileView,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DoctorListRes {
    pub items: Vec<DoctorListing>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ComplaintEntry {
    pub label: String,
    pub specialty: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ComplaintListRes {
    pub items: Vec<ComplaintEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_request_reads_slot_iso_field() {
        let req: CreateAppointmentReq = serde_json::from_value(json!({
            "doctorId": "d-1",
            "slotISO": "2030-01-01T09:00:00Z",
            "chiefComplaint": "Chest pain",
        }))
        .unwrap();

        assert_eq!(req.doctor_id.as_deref(), Some("d-1"));
        assert_eq!(req.slot_iso.as_deref(), Some("2030-01-01T09:00:00Z"));
        assert!(req.vitals.is_none());
    }

    #[test]
    fn confirmation_tolerates_null_maps_and_non_string_values() {
        let event: PostConfirmationEvent = serde_json::from_value(json!({
            "request": {
                "userAttributes": {"sub": "p-9", "email": "p@x.io", "email_verified": true},
                "clientMetadata": null,
            }
        }))
        .unwrap();

        assert_eq!(event.request.user_attributes.len(), 2);
        assert_eq!(event.request.user_attributes["sub"], "p-9");
        assert!(event.request.client_metadata.is_empty());

        let event: PostConfirmationEvent =
            serde_json::from_value(json!({"request": null})).unwrap();
        assert!(event.request.user_attributes.is_empty());
    }

    #[test]
    fn profile_view_always_emits_lists() {
        let value = serde_json::to_value(DoctorProfileView::default()).unwrap();
        assert_eq!(value, json!({"languages": [], "availSlots": []}));
    }
}

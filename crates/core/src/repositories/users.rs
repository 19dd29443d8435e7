//! User provisioning after sign-up confirmation.
//!
//! The identity provider calls back once an account is confirmed. The callback carries the
//! user's attributes and the client metadata captured by the sign-up form; doctors register
//! their specialty, city, languages and published slots through that metadata.

use crate::models::{to_item, DoctorProfile, User};
use crate::{AllowLists, ClinicError, ClinicResult, CoreConfig, Stores};
use api_shared::PostConfirmationEvent;
use chrono::{DateTime, Utc};
use clinic_types::{NonEmptyText, Role};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const SPECIALTY_KEY: &str = "doctorSpecialty";
const CITY_KEY: &str = "doctorCity";
const LANGUAGES_KEY: &str = "doctorLanguages";
const SLOTS_KEY: &str = "doctorSlots";

/// Build a canonical doctor profile from sign-up metadata.
///
/// Non-doctors always get an empty profile. For doctors, values outside the allow-lists are
/// dropped silently, and `doctorSlots` must be a JSON array of strings (malformed JSON yields
/// no slots, non-string elements are skipped).
pub fn normalise_doctor_profile(
    role: Role,
    metadata: &BTreeMap<String, String>,
    allow: &AllowLists,
) -> DoctorProfile {
    if role != Role::Doctor {
        return DoctorProfile::default();
    }

    let specialty = metadata
        .get(SPECIALTY_KEY)
        .filter(|s| allow.is_specialty(s))
        .cloned();
    let city = metadata.get(CITY_KEY).filter(|c| allow.is_city(c)).cloned();
    let languages = metadata
        .get(LANGUAGES_KEY)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty() && allow.is_language(l))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let avail_slots = metadata
        .get(SLOTS_KEY)
        .filter(|raw| !raw.is_empty())
        .map(|raw| parse_slots(raw))
        .unwrap_or_default();

    DoctorProfile {
        specialty,
        city,
        languages,
        avail_slots,
    }
}

fn parse_slots(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            tracing::warn!("ignoring unparseable doctor slots: {}", e);
            Vec::new()
        }
    }
}

/// Creates user records from confirmed sign-ups.
#[derive(Clone)]
pub struct RegistrationService {
    cfg: Arc<CoreConfig>,
    stores: Stores,
}

impl RegistrationService {
    pub fn new(cfg: Arc<CoreConfig>, stores: Stores) -> Self {
        Self { cfg, stores }
    }

    /// Persist the user described by a confirmation event.
    ///
    /// See [`RegistrationService::confirm_at`].
    pub fn confirm(&self, event: &PostConfirmationEvent) -> ClinicResult<User> {
        self.confirm_at(event, Utc::now())
    }

    /// Persist the user described by `event`, stamping `created_at` with `now`.
    ///
    /// The role comes from `custom:role`, then `role`, and defaults to `PATIENT`. A repeated
    /// confirmation for the same subject overwrites the earlier record.
    ///
    /// # Errors
    ///
    /// - [`ClinicError::Validation`] if `sub` or `email` is missing, or the role is unknown.
    /// - [`ClinicError::Store`] if the write fails.
    pub fn confirm_at(
        &self,
        event: &PostConfirmationEvent,
        now: DateTime<Utc>,
    ) -> ClinicResult<User> {
        let attrs = &event.request.user_attributes;

        let (user_id, email) = match (
            NonEmptyText::from_optional(attrs.get("sub")),
            NonEmptyText::from_optional(attrs.get("email")),
        ) {
            (Some(sub), Some(email)) => (sub, email),
            _ => {
                tracing::error!("confirmation event is missing sub or email");
                return Err(ClinicError::validation("Missing required user attributes"));
            }
        };

        let role_raw = ["custom:role", "role"]
            .iter()
            .find_map(|name| NonEmptyText::from_optional(attrs.get(*name)))
            .map(NonEmptyText::into_inner)
            .unwrap_or_else(|| Role::Patient.as_str().to_string());
        let role: Role = role_raw
            .parse()
            .map_err(|e: clinic_types::TextError| ClinicError::validation(e.to_string()))?;

        let profile = normalise_doctor_profile(
            role,
            &event.request.client_metadata,
            self.cfg.allow_lists(),
        );

        let user = User {
            user_id: user_id.into_inner(),
            email: email.into_inner(),
            role,
            first_name: attrs.get("given_name").cloned().unwrap_or_default(),
            last_name: attrs.get("family_name").cloned().unwrap_or_default(),
            created_at: now,
            doctor_profile: (!profile.is_empty()).then_some(profile),
        };
        self.stores.users.put(to_item(&user)?)?;

        tracing::info!(user_id = %user.user_id, role = %user.role, "user provisioned");
        Ok(user)
    }
}

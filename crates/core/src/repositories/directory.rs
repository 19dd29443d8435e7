//! Doctor directory search.

use crate::store::{Filter, Item};
use crate::{ClinicResult, Stores};
use api_shared::{require_role, Claims, DoctorListing, DoctorProfileView, DoctorSearchParams};
use clinic_types::Role;
use serde_json::Value;

/// Lists doctors for signed-in patients and doctors.
#[derive(Clone)]
pub struct DirectoryService {
    stores: Stores,
}

impl DirectoryService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Doctors matching `params`, ordered by city then last name.
    ///
    /// Specialty and city must match the structured profile exactly; language is a substring
    /// match over the profile's language list. Blank parameters are ignored.
    ///
    /// # Errors
    ///
    /// - [`crate::ClinicError::Auth`] unless the caller is a patient or a doctor.
    /// - [`crate::ClinicError::Store`] if the scan fails.
    pub fn search(
        &self,
        claims: &Claims,
        params: &DoctorSearchParams,
    ) -> ClinicResult<Vec<DoctorListing>> {
        require_role(claims, &[Role::Patient, Role::Doctor])?;

        let items = self.stores.users.scan(&build_filter(params))?;
        let mut listings: Vec<DoctorListing> = items.iter().map(normalise_doctor).collect();
        sort_listings(&mut listings);

        tracing::debug!(count = listings.len(), "doctor search");
        Ok(listings)
    }
}

/// Scan filter for a search: always `role = DOCTOR`, plus one term per non-empty parameter.
pub fn build_filter(params: &DoctorSearchParams) -> Filter {
    let mut filter = Filter::And(vec![Filter::eq("role", Role::Doctor.as_str())]);
    let present = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

    if let Some(specialty) = present(&params.specialty) {
        filter = filter.and(Filter::eq("doctorProfile.specialty", specialty));
    }
    if let Some(city) = present(&params.city) {
        filter = filter.and(Filter::eq("doctorProfile.city", city));
    }
    if let Some(language) = present(&params.language) {
        filter = filter.and(Filter::contains("doctorProfile.languages", language));
    }
    filter
}

/// Uniform listing view of a stored doctor.
///
/// Records without a structured `doctorProfile` fall back to the legacy top-level
/// `specialty`, `languages` and `location` attributes. Languages stored as a comma-separated
/// string are split into a list.
pub fn normalise_doctor(item: &Item) -> DoctorListing {
    let structured = item
        .get("doctorProfile")
        .and_then(Value::as_object)
        .filter(|profile| !profile.is_empty());

    let (specialty, city, languages, slots) = match structured {
        Some(profile) => (
            profile.get("specialty"),
            profile.get("city"),
            profile.get("languages"),
            profile.get("availSlots"),
        ),
        None => (
            item.get("specialty"),
            item.get("location"),
            item.get("languages"),
            None,
        ),
    };

    DoctorListing {
        user_id: text(item.get("userId")),
        first_name: text(item.get("firstName")),
        last_name: text(item.get("lastName")),
        email: text(item.get("email")),
        doctor_profile: DoctorProfileView {
            specialty: text(specialty).filter(|s| !s.is_empty()),
            city: text(city).filter(|c| !c.is_empty()),
            languages: match languages {
                Some(Value::String(joined)) => joined
                    .split(',')
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect(),
                other => strings(other),
            },
            avail_slots: strings(slots),
        },
    }
}

/// Order by (city, last name); missing values sort first as empty strings.
pub fn sort_listings(listings: &mut [DoctorListing]) {
    listings.sort_by(|a, b| {
        let key = |l: &DoctorListing| {
            (
                l.doctor_profile.city.clone().unwrap_or_default(),
                l.last_name.clone().unwrap_or_default(),
            )
        };
        key(a).cmp(&key(b))
    });
}

fn text(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

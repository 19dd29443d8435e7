//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the handlers. Nothing
//! in here reads environment variables; the binary reads them and hands the raw values to the
//! helpers below.

use crate::constants::{
    CITIES, COMPLAINTS, DEFAULT_APPOINTMENTS_TABLE, DEFAULT_HEALTH_INDEX_TABLE,
    DEFAULT_USERS_TABLE, LANGUAGES, SPECIALTIES,
};
use crate::store::Item;
use crate::{ClinicError, ClinicResult};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Immutable allow-lists consulted during validation and normalisation.
#[derive(Clone, Debug)]
pub struct AllowLists {
    complaints: Vec<(String, String)>,
    complaint_index: BTreeMap<String, usize>,
    specialties: BTreeSet<String>,
    languages: BTreeSet<String>,
    cities: BTreeSet<String>,
}

impl AllowLists {
    /// The clinic's standard complaint, specialty, language and city catalogues.
    pub fn standard() -> Self {
        let complaints: Vec<(String, String)> = COMPLAINTS
            .iter()
            .map(|(label, specialty)| (label.to_string(), specialty.to_string()))
            .collect();
        let complaint_index = complaints
            .iter()
            .enumerate()
            .map(|(i, (label, _))| (label.clone(), i))
            .collect();

        Self {
            complaints,
            complaint_index,
            specialties: SPECIALTIES.iter().map(|s| s.to_string()).collect(),
            languages: LANGUAGES.iter().map(|s| s.to_string()).collect(),
            cities: CITIES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_complaint(&self, value: &str) -> bool {
        self.complaint_index.contains_key(value)
    }

    /// Complaints in catalogue order with their specialty.
    pub fn complaints(&self) -> impl Iterator<Item = (&str, &str)> {
        self.complaints
            .iter()
            .map(|(label, specialty)| (label.as_str(), specialty.as_str()))
    }

    pub fn is_specialty(&self, value: &str) -> bool {
        self.specialties.contains(value)
    }

    pub fn is_language(&self, value: &str) -> bool {
        self.languages.contains(value)
    }

    pub fn is_city(&self, value: &str) -> bool {
        self.cities.contains(value)
    }
}

impl Default for AllowLists {
    fn default() -> Self {
        Self::standard()
    }
}

/// Names of the three document tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableNames {
    pub users: String,
    pub appointments: String,
    pub health_index: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            users: DEFAULT_USERS_TABLE.into(),
            appointments: DEFAULT_APPOINTMENTS_TABLE.into(),
            health_index: DEFAULT_HEALTH_INDEX_TABLE.into(),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    tables: TableNames,
    allow_lists: AllowLists,
    api_key: Option<String>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::InvalidConfig`] if any table name is blank.
    pub fn new(
        tables: TableNames,
        allow_lists: AllowLists,
        api_key: Option<String>,
    ) -> ClinicResult<Self> {
        for (label, name) in [
            ("users", &tables.users),
            ("appointments", &tables.appointments),
            ("health index", &tables.health_index),
        ] {
            if name.trim().is_empty() {
                return Err(ClinicError::InvalidConfig(format!(
                    "{label} table name cannot be empty"
                )));
            }
        }

        Ok(Self {
            tables,
            allow_lists,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    pub fn allow_lists(&self) -> &AllowLists {
        &self.allow_lists
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tables: TableNames::default(),
            allow_lists: AllowLists::standard(),
            api_key: None,
        }
    }
}

/// Build table names from optional raw values, falling back to defaults for missing or blank
/// entries.
pub fn table_names_from_env_values(
    users: Option<String>,
    appointments: Option<String>,
    health_index: Option<String>,
) -> TableNames {
    fn pick(value: Option<String>, default: &str) -> String {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    TableNames {
        users: pick(users, DEFAULT_USERS_TABLE),
        appointments: pick(appointments, DEFAULT_APPOINTMENTS_TABLE),
        health_index: pick(health_index, DEFAULT_HEALTH_INDEX_TABLE),
    }
}

/// Read a JSON array of user items used to pre-populate the users table.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid JSON, or any element is not an
/// object.
pub fn load_seed_items(path: &Path) -> ClinicResult<Vec<Item>> {
    let contents = std::fs::read_to_string(path).map_err(ClinicError::FileRead)?;
    let values: Vec<serde_json::Value> =
        serde_json::from_str(&contents).map_err(ClinicError::Deserialization)?;

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(ClinicError::InvalidConfig(format!(
                "seed entry {i} in {} is not an object",
                path.display()
            ))),
        })
        .collect()
}

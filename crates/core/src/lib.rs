//! # Clinic Core
//!
//! Core business logic for the clinic booking backend.
//!
//! This crate contains the three request-handling services and everything they lean on:
//! - Appointment booking with vitals sanitisation and slot validation
//! - User provisioning from sign-up confirmation events
//! - Doctor directory search over stored user records
//! - The key-value table and event-sink abstractions, with in-memory implementations
//!
//! **No API concerns**: HTTP routing, header parsing and status mapping belong in `api-rest`;
//! identity claims and wire types live in `api-shared`.

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod models;
pub mod repositories;
pub mod slot;
pub mod store;
pub mod vitals;

pub use api_shared::dto;
pub use clinic_ulid::Ulid;
pub use config::{AllowLists, CoreConfig, TableNames};
pub use error::{ClinicError, ClinicResult};
pub use events::{EventError, EventSink, RecordingEventSink, TracingEventSink};
pub use repositories::{AppointmentService, DirectoryService, RegistrationService};
pub use store::{Item, MemoryTable, StoreError, Stores, Table};

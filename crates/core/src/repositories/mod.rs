//! Request-handling services.
//!
//! Each service owns the store handles it needs and enforces its own role gate, so the HTTP
//! layer only translates requests and errors.

pub mod appointments;
pub mod catalog;
pub mod directory;
pub mod users;

pub use appointments::AppointmentService;
pub use catalog::complaint_catalog;
pub use directory::DirectoryService;
pub use users::{normalise_doctor_profile, RegistrationService};

//! # API Shared
//!
//! Shared definitions for the clinic APIs.
//!
//! Contains:
//! - Wire types for requests and responses (`dto` module)
//! - Shared services like `HealthService`
//! - Claim resolution and role checks (usable by the core handlers and the REST layer)

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{require_role, resolve_claim, AuthError, Claims};
pub use dto::*;
pub use health::HealthService;

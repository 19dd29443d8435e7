//! Time-ordered identifiers.
//!
//! Appointments are keyed by a 26-character identifier that sorts lexicographically in creation
//! order. The layout is the ULID layout:
//!
//! ```text
//!  01JA2ZQ0CB      7N3V8K4X2M9QW1RTYE
//! |----------|    |----------------|
//!  timestamp            random
//!   48 bits             80 bits
//! ```
//!
//! The 128-bit value is written in Crockford base-32 (`0-9`, `A-Z` without `I`, `L`, `O`, `U`),
//! most-significant digit first. Because the timestamp occupies the high bits and the encoding is
//! fixed-width, two identifiers from different milliseconds always compare in time order.
//! Within the same millisecond the order is decided by the random component.
//!
//! This crate provides:
//! - [`Ulid`], a wrapper around [`ulid::Ulid`] that guarantees the canonical 26-character form
//!   once constructed.
//! - [`Ulid::generate`] for allocating a fresh identifier from the system clock and a random
//!   source.

mod service;

pub use service::{Ulid, ALPHABET, ENCODED_LEN};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UlidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UlidResult<T> = Result<T, UlidError>;

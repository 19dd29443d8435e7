//! Internal implementation of the time-ordered identifier.

use crate::{UlidError, UlidResult};
use chrono::{DateTime, Utc};
use std::{fmt, str::FromStr};

use ::ulid::Ulid as RawUlid;

/// Crockford base-32 alphabet used for the canonical text form.
pub const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Length of the canonical text form.
pub const ENCODED_LEN: usize = 26;

/// A 128-bit identifier: 48-bit millisecond timestamp followed by 80 random bits.
///
/// Once constructed, the value always renders as exactly [`ENCODED_LEN`] upper-case characters
/// of [`ALPHABET`].
///
/// # Construction
/// - [`Ulid::generate`] allocates a new identifier from the system clock.
/// - [`Ulid::from_parts`] assembles one from explicit components.
/// - [`Ulid::parse`] validates an externally supplied identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ulid(RawUlid);

impl Ulid {
    /// Generates a new identifier stamped with the current millisecond.
    ///
    /// Identifiers from different milliseconds sort in time order; identifiers from the same
    /// millisecond are only distinguished by the random bits.
    pub fn generate() -> Self {
        Self(RawUlid::new())
    }

    /// Builds an identifier from a millisecond timestamp and a random component.
    ///
    /// Bits above the 48-bit timestamp or the 80-bit random field are discarded.
    pub fn from_parts(timestamp_ms: u64, random: u128) -> Self {
        Self(RawUlid::from_parts(timestamp_ms, random))
    }

    /// Validates and parses an identifier that must already be in canonical form.
    ///
    /// Lower-case input is not normalised; callers must provide the canonical representation.
    ///
    /// # Errors
    ///
    /// Returns [`UlidError::InvalidInput`] if `input` is not canonical.
    pub fn parse(input: &str) -> UlidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UlidError::InvalidInput(format!(
                "identifier must be {} upper-case Crockford base-32 characters, got: '{}'",
                ENCODED_LEN, input
            )));
        }
        RawUlid::from_string(input)
            .map(Self)
            .map_err(|e| UlidError::InvalidInput(format!("{}: '{}'", e, input)))
    }

    /// Returns true if `input` is a canonical identifier.
    ///
    /// Checks the length, the alphabet, and that the first character does not exceed `7`
    /// (the value is only 128 bits wide).
    pub fn is_canonical(input: &str) -> bool {
        input.len() == ENCODED_LEN
            && input.bytes().all(|b| ALPHABET.contains(&b))
            && input.as_bytes()[0] <= b'7'
    }

    /// Millisecond timestamp component.
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }

    /// Timestamp component as a UTC date-time.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms() as i64)
    }

    /// The 80-bit random component.
    pub fn random(&self) -> u128 {
        self.0.random()
    }
}

impl fmt::Display for Ulid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Ulid {
    type Err = UlidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Ulid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Ulid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ulid::parse(&s).map_err(serde::de::Error::custom)
    }
}

//! Appointment slot timestamps.
//!
//! Slots travel as ISO-8601 strings. Before a slot is compared with a doctor's published list
//! or written to storage it is parsed and re-serialised to one canonical form:
//! RFC 3339 with a numeric offset, seconds always present, fractional seconds only when
//! non-zero (`2030-01-07T09:30:00+00:00`). A trailing `Z` is read as UTC, and timestamps
//! without any offset are taken to be UTC.

use crate::{ClinicError, ClinicResult};
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone,
    Utc, Weekday,
};

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"];
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// First and last bookable hour (UTC) for generated slots; the last slot starts at 16:30.
const DAY_START_HOUR: u32 = 9;
const DAY_END_HOUR: u32 = 17;

/// A parsed slot timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotTime(DateTime<FixedOffset>);

impl SlotTime {
    /// Parse an ISO-8601 timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::Validation`] if `raw` is not a recognisable timestamp.
    pub fn parse(raw: &str) -> ClinicResult<Self> {
        parse_timestamp(raw.trim())
            .map(Self)
            .ok_or_else(|| ClinicError::validation("slotISO must be ISO-8601 timestamp"))
    }

    /// Canonical string form used for comparison and storage.
    pub fn canonical(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0.with_timezone(&Utc)
    }

    /// Fails unless the slot is strictly after `now`.
    pub fn ensure_future(&self, now: DateTime<Utc>) -> ClinicResult<()> {
        if self.instant() <= now {
            return Err(ClinicError::validation("slot must be in the future"));
        }
        Ok(())
    }

    /// Fails if `published` is non-empty and does not contain this slot.
    ///
    /// Published entries are normalised before comparison; entries that do not parse are
    /// compared verbatim. An empty list accepts every slot.
    pub fn ensure_published(&self, published: &[String]) -> ClinicResult<()> {
        if published.is_empty() {
            return Ok(());
        }
        let canonical = self.canonical();
        let listed = published
            .iter()
            .any(|p| *p == canonical || normalize_slot(p).as_deref() == Some(canonical.as_str()));
        if !listed {
            return Err(ClinicError::validation("slot not published by doctor"));
        }
        Ok(())
    }
}

/// Canonical form of `raw`, or `None` if it does not parse.
pub fn normalize_slot(raw: &str) -> Option<String> {
    SlotTime::parse(raw).ok().map(|slot| slot.canonical())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = match raw.strip_suffix(|c: char| c == 'Z' || c == 'z') {
        Some(rest) => format!("{rest}+00:00"),
        None => raw.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Some(dt);
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&raw, fmt) {
            return Some(dt);
        }
    }

    let utc = FixedOffset::east_opt(0)?;
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, fmt) {
            return Some(utc.from_utc_datetime(&naive));
        }
    }
    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok()?;
    Some(utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Half-hourly weekday slots (UTC, 09:00 to 16:30) for `days` days starting at `start`.
///
/// Weekends are skipped. Slots are returned in canonical form, ready to publish as a
/// doctor's availability.
pub fn generate_weekday_slots(start: NaiveDate, days: u32) -> Vec<String> {
    let mut slots = Vec::new();
    for offset in 0..days {
        let date = start + Duration::days(i64::from(offset));
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }
        for hour in DAY_START_HOUR..DAY_END_HOUR {
            for minute in [0, 30] {
                if let Some(naive) = date.and_hms_opt(hour, minute, 0) {
                    let slot = SlotTime(Utc.from_utc_datetime(&naive).fixed_offset());
                    slots.push(slot.canonical());
                }
            }
        }
    }
    slots
}

//! Human-readable report identifiers.
//!
//! Every report is addressed by an identifier of the form `R-<year>-<seq>`,
//! for example `R-2025-007`. The year is the UTC year of the creation
//! timestamp and the sequence is zero-padded to at least three digits; it
//! simply grows wider once a year passes 999 reports.
//!
//! # Allocation
//!
//! Sequences are allocated by the persistence collaborator through
//! [`ReportRepository::next_sequence`], which must be an atomic per-year
//! increment. Two concurrent creations therefore never observe the same
//! sequence number. Identifiers minted by the older count-then-format scheme
//! stay valid: the repository seeds a year's counter from the number of stored
//! reports carrying that year before the first increment.

use crate::error::ReportError;
use crate::repository::ReportRepository;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const PREFIX: &str = "R-";

/// Identifier of a report (`R-<year>-<seq>`).
///
/// Construction through [`ReportId::from_sequence`] always yields a well-formed
/// identifier. The `From<&str>`/`From<String>` conversions accept anything and
/// exist for lookups by user-supplied ids, where an unknown id should surface
/// as `NotFound` rather than a format error. Use [`ReportId::parse`] when the
/// format must be enforced.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    /// Format an identifier from a year and a sequence number.
    ///
    /// # Examples
    ///
    /// ```
    /// use reportdesk_core::ReportId;
    ///
    /// assert_eq!(ReportId::from_sequence(2025, 7).as_str(), "R-2025-007");
    /// assert_eq!(ReportId::from_sequence(2025, 1234).as_str(), "R-2025-1234");
    /// ```
    #[must_use]
    pub fn from_sequence(year: i32, sequence: u64) -> Self {
        Self(format!("{PREFIX}{year:04}-{sequence:03}"))
    }

    /// Parse and validate an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Validation`] unless the input is `R-`, a
    /// four-digit year, `-` and at least three digits.
    pub fn parse(value: &str) -> Result<Self, ReportError> {
        let invalid = || ReportError::validation(format!("invalid report id: {value}"));

        let rest = value.strip_prefix(PREFIX).ok_or_else(invalid)?;
        let (year, sequence) = rest.split_once('-').ok_or_else(invalid)?;

        let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if year.len() != 4 || !all_digits(year) || sequence.len() < 3 || !all_digits(sequence) {
            return Err(invalid());
        }

        Ok(Self(value.to_string()))
    }

    /// The year component, if the identifier is well-formed.
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.parts().and_then(|(year, _)| year.parse().ok())
    }

    /// The sequence component, if the identifier is well-formed.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.parts().and_then(|(_, seq)| seq.parse().ok())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the identifier and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// `LIKE` pattern matching every identifier minted in `year`.
    #[must_use]
    pub fn year_pattern(year: i32) -> String {
        format!("{PREFIX}{year:04}-%")
    }

    fn parts(&self) -> Option<(&str, &str)> {
        self.0.strip_prefix(PREFIX)?.split_once('-')
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReportId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ReportId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ReportId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Allocate the next report identifier for a report created at `now`.
///
/// # Errors
///
/// Returns [`ReportError::Storage`] when the sequence allocation fails.
pub async fn next_report_id(
    repository: &dyn ReportRepository,
    now: DateTime<Utc>,
) -> Result<ReportId, ReportError> {
    let year = now.year();
    let sequence = repository.next_sequence(year).await?;
    Ok(ReportId::from_sequence(year, sequence))
}

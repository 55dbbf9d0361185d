//! Academic term types
//!
//! Invoices are raised per term of an academic year. The school year is
//! split into three terms, serialized in the form the billing records use
//! ("Term 1" .. "Term 3").

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors related to term handling
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TermError {
    #[error("Unknown term: {0}")]
    UnknownTerm(String),

    #[error("Year {0} is outside the supported academic range (2000..=2100)")]
    YearOutOfRange(i32),
}

/// Bounds for a plausible academic year on an invoice
pub const MIN_ACADEMIC_YEAR: i32 = 2000;
pub const MAX_ACADEMIC_YEAR: i32 = 2100;

/// A term of the academic year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    #[serde(rename = "Term 1")]
    First,
    #[serde(rename = "Term 2")]
    Second,
    #[serde(rename = "Term 3")]
    Third,
}

impl Term {
    /// Returns the term's position within the year (1-based)
    pub fn ordinal(&self) -> u8 {
        match self {
            Term::First => 1,
            Term::Second => 2,
            Term::Third => 3,
        }
    }

    /// Validates an academic year for use on a billing record
    pub fn validate_year(year: i32) -> Result<i32, TermError> {
        if !(MIN_ACADEMIC_YEAR..=MAX_ACADEMIC_YEAR).contains(&year) {
            return Err(TermError::YearOutOfRange(year));
        }
        Ok(year)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Term {}", self.ordinal())
    }
}

impl FromStr for Term {
    type Err = TermError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Term 1" | "1" | "First" => Ok(Term::First),
            "Term 2" | "2" | "Second" => Ok(Term::Second),
            "Term 3" | "3" | "Third" => Ok(Term::Third),
            other => Err(TermError::UnknownTerm(other.to_string())),
        }
    }
}

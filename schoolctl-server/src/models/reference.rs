//! Shared reference rows (places and occupations)

use std::fmt;

use serde::Serialize;

use super::validation::required;
use super::ValidationError;

/// Width of the reference name columns
const MAX_REF_NAME_LEN: usize = 100;

/// Which lookup table a reference row lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// `lugar` (birthplaces)
    Place,
    /// `ocupacion`
    Occupation,
}

impl RefKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Place => "lugar",
            Self::Occupation => "ocupacion",
        }
    }

    pub fn id_column(self) -> &'static str {
        match self {
            Self::Place => "id_lugar",
            Self::Occupation => "id_ocupacion",
        }
    }

    pub fn name_column(self) -> &'static str {
        match self {
            Self::Place => "lugar",
            Self::Occupation => "ocupacion",
        }
    }

    /// Resource label used in error messages
    pub fn resource(self) -> &'static str {
        match self {
            Self::Place => "place",
            Self::Occupation => "occupation",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

/// Reference name. Matching is by exact string, so the value is kept as
/// given (no trimming, no case folding).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefName(String);

impl RefName {
    pub fn new(field: &'static str, s: &str) -> Result<Self, ValidationError> {
        required(field, s, MAX_REF_NAME_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A row of `lugar` or `ocupacion`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefEntry {
    pub id: i32,
    pub name: String,
}

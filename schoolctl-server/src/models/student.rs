//! Student identity, registration input and the denormalized read view

use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::validation::required;
use super::{AddressFields, ParentDni, RefName, ValidationError};

/// Maximum length for a student national ID
const MAX_DNI_LEN: usize = 20;

/// Width of the name columns
pub(crate) const MAX_NAME_LEN: usize = 100;

/// Width of the `sexo` column
const MAX_SEX_LEN: usize = 10;

/// National ID: ASCII letters and digits only.
/// Matches the `dni_estudiante VARCHAR(20)` column.
static DNI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z]{1,20}$").expect("invalid dni regex"));

/// Validated student national ID (primary key of `estudiantes`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StudentDni(String);

impl StudentDni {
    /// Create a student ID, validating its format.
    ///
    /// # Example
    /// ```
    /// use schoolctl_server::models::StudentDni;
    ///
    /// assert!(StudentDni::new("12345678").is_ok());
    /// assert!(StudentDni::new("1234 5678").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty {
                field: "DNI_estudiante",
            });
        }

        if s.len() > MAX_DNI_LEN {
            return Err(ValidationError::TooLong {
                field: "DNI_estudiante",
                max: MAX_DNI_LEN,
            });
        }

        if !DNI_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "DNI_estudiante",
                reason: "must contain only ASCII letters and digits",
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentDni {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StudentDni {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Scalar columns of an `estudiantes` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub dni: StudentDni,
    pub nombre: String,
    pub apellido_paterno: String,
    pub apellido_materno: String,
    pub sexo: String,
    pub fecha_nacimiento: NaiveDate,
}

impl StudentRecord {
    /// Build a student row, validating every required text column.
    pub fn new(
        dni: StudentDni,
        nombre: &str,
        apellido_paterno: &str,
        apellido_materno: &str,
        sexo: &str,
        fecha_nacimiento: NaiveDate,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            dni,
            nombre: required("Nombre_estudiante", nombre, MAX_NAME_LEN)?,
            apellido_paterno: required("ApellidoPaterno_estudiante", apellido_paterno, MAX_NAME_LEN)?,
            apellido_materno: required("ApellidoMaterno_estudiante", apellido_materno, MAX_NAME_LEN)?,
            sexo: required("Sexo", sexo, MAX_SEX_LEN)?,
            fecha_nacimiento,
        })
    }
}

/// Where the student's address comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressInput {
    /// Insert a new `direccion` row with these fields
    New(AddressFields),
    /// Link to an address that already exists (siblings sharing a home)
    Existing(i32),
}

/// Everything a create or update of a student may carry.
///
/// For updates `student.dni` is the path key; the other optional parts are
/// only touched when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRegistration {
    pub student: StudentRecord,
    pub address: Option<AddressInput>,
    pub birthplace: Option<RefName>,
    pub parent: Option<ParentDni>,
}

impl StudentRegistration {
    /// Registration with only the student row.
    pub fn new(student: StudentRecord) -> Self {
        Self {
            student,
            address: None,
            birthplace: None,
            parent: None,
        }
    }

    pub fn with_address(mut self, address: AddressInput) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_birthplace(mut self, place: RefName) -> Self {
        self.birthplace = Some(place);
        self
    }

    pub fn with_parent(mut self, parent: ParentDni) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Denormalized student view: student row joined with parent, address and
/// birthplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentDetail {
    #[serde(rename = "DNI_estudiante")]
    pub dni: String,
    #[serde(rename = "Nombre_estudiante")]
    pub nombre: String,
    #[serde(rename = "ApellidoPaterno_estudiante")]
    pub apellido_paterno: String,
    #[serde(rename = "ApellidoMaterno_estudiante")]
    pub apellido_materno: String,
    #[serde(rename = "Sexo")]
    pub sexo: String,
    #[serde(rename = "Fecha_nacimiento")]
    pub fecha_nacimiento: NaiveDate,
    #[serde(rename = "DNI_padre")]
    pub parent_dni: Option<i32>,
    #[serde(rename = "Nombre_padre")]
    pub parent_name: Option<String>,
    #[serde(rename = "Id_Direccion")]
    pub address_id: Option<i32>,
    #[serde(flatten)]
    pub address: AddressFields,
    #[serde(rename = "Lugar_nacimiento")]
    pub birthplace: Option<String>,
}

impl StudentDetail {
    /// View of a bare student row with no links.
    pub fn from_record(record: &StudentRecord) -> Self {
        Self {
            dni: record.dni.as_str().to_owned(),
            nombre: record.nombre.clone(),
            apellido_paterno: record.apellido_paterno.clone(),
            apellido_materno: record.apellido_materno.clone(),
            sexo: record.sexo.clone(),
            fecha_nacimiento: record.fecha_nacimiento,
            parent_dni: None,
            parent_name: None,
            address_id: None,
            address: AddressFields::default(),
            birthplace: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2012, 3, 14).unwrap()
    }

    #[test]
    fn valid_dnis() {
        assert!(StudentDni::new("12345678").is_ok());
        assert!(StudentDni::new("CE0012345").is_ok());
        assert!(StudentDni::new(&"9".repeat(20)).is_ok());
    }

    #[test]
    fn rejects_bad_dnis() {
        assert!(matches!(
            StudentDni::new("").unwrap_err(),
            ValidationError::Empty { .. }
        ));
        assert!(matches!(
            StudentDni::new(&"9".repeat(21)).unwrap_err(),
            ValidationError::TooLong { max: 20, .. }
        ));
        assert!(matches!(
            StudentDni::new("1234-5678").unwrap_err(),
            ValidationError::InvalidFormat { .. }
        ));
    }

    #[test]
    fn record_requires_names() {
        let dni = StudentDni::new("12345678").unwrap();
        let err = StudentRecord::new(dni, "Ana", "", "Quispe", "F", date()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Empty {
                field: "ApellidoPaterno_estudiante"
            }
        );
    }

    #[test]
    fn detail_serializes_column_keys() {
        let dni = StudentDni::new("12345678").unwrap();
        let record = StudentRecord::new(dni, "Ana", "Rojas", "Quispe", "F", date()).unwrap();
        let mut detail = StudentDetail::from_record(&record);
        detail.birthplace = Some("Lima".into());
        detail.address.distrito = Some("Surco".into());

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["DNI_estudiante"], "12345678");
        assert_eq!(json["Fecha_nacimiento"], "2012-03-14");
        assert_eq!(json["Lugar_nacimiento"], "Lima");
        assert_eq!(json["Distrito"], "Surco");
        assert!(json["DNI_padre"].is_null());
    }
}

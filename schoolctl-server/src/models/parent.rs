//! Parent identity and registration input

use std::fmt;

use serde::Serialize;

use super::student::MAX_NAME_LEN;
use super::validation::required;
use super::{RefName, ValidationError};

/// Validated parent national ID (primary key of `padre`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParentDni(i32);

impl ParentDni {
    /// Parent IDs are positive integers.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        match i32::try_from(value) {
            Ok(v) if v > 0 => Ok(Self(v)),
            _ => Err(ValidationError::InvalidFormat {
                field: "DNI_padre",
                reason: "must be a positive 32-bit integer",
            }),
        }
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ParentDni {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scalar columns of a `padre` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRecord {
    pub dni: ParentDni,
    pub nombre: String,
    pub apellido_paterno: String,
    pub apellido_materno: String,
    pub telefono: Option<i64>,
}

impl ParentRecord {
    pub fn new(
        dni: ParentDni,
        nombre: &str,
        apellido_paterno: &str,
        apellido_materno: &str,
        telefono: Option<i64>,
    ) -> Result<Self, ValidationError> {
        if telefono.is_some_and(|t| t < 0) {
            return Err(ValidationError::InvalidFormat {
                field: "Telefono_padre",
                reason: "must not be negative",
            });
        }

        Ok(Self {
            dni,
            nombre: required("Nombre_padre", nombre, MAX_NAME_LEN)?,
            apellido_paterno: required("ApellidoPaterno_padre", apellido_paterno, MAX_NAME_LEN)?,
            apellido_materno: required("ApellidoMaterno_padre", apellido_materno, MAX_NAME_LEN)?,
            telefono,
        })
    }

    /// "Nombre ApellidoPaterno ApellidoMaterno"
    pub fn full_name(&self) -> String {
        format!(
            "{} {} {}",
            self.nombre, self.apellido_paterno, self.apellido_materno
        )
    }
}

/// Parent create/update input: the parent row plus an optional occupation
/// resolved through get-or-create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRegistration {
    pub parent: ParentRecord,
    pub occupation: Option<RefName>,
}

/// Parent row with its occupation names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentDetail {
    #[serde(rename = "DNI_padre")]
    pub dni: i32,
    #[serde(rename = "Nombre_padre")]
    pub nombre: String,
    #[serde(rename = "ApellidoPaterno_padre")]
    pub apellido_paterno: String,
    #[serde(rename = "ApellidoMaterno_padre")]
    pub apellido_materno: String,
    #[serde(rename = "Telefono_padre")]
    pub telefono: Option<i64>,
    #[serde(rename = "Ocupaciones")]
    pub occupations: Vec<String>,
}

//! Student endpoints
//!
//! Writes go through the registration manager so that the student row,
//! its address, birthplace and parent link change together or not at all.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::non_blank;
use crate::http::error::ApiError;
use crate::http::extractors::ValidStudentDni;
use crate::http::server::AppState;
use crate::models::{
    AddressFields, AddressInput, ParentDni, RefName, StudentDetail, StudentDni, StudentRecord,
    StudentRegistration, ValidationError,
};
use crate::registry::Registrar;

/// Create/update student request
///
/// On update the path DNI is authoritative; a body DNI, if sent, must match.
#[derive(Debug, Deserialize)]
pub struct StudentRequest {
    #[serde(rename = "DNI_estudiante", default)]
    pub dni: Option<String>,
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
    #[serde(rename = "DNI_padre", default)]
    pub parent_dni: Option<i64>,
    #[serde(rename = "Lugar_nacimiento", default)]
    pub birthplace: Option<String>,
    #[serde(rename = "Id_Direccion", default)]
    pub address_id: Option<i32>,
    #[serde(flatten)]
    pub address: AddressFields,
}

impl StudentRequest {
    /// Validate into a registration keyed by `dni`.
    fn into_registration(self, dni: StudentDni) -> Result<StudentRegistration, ValidationError> {
        let student = StudentRecord::new(
            dni,
            &self.nombre,
            &self.apellido_paterno,
            &self.apellido_materno,
            &self.sexo,
            self.fecha_nacimiento,
        )?;

        let address = match (self.address_id, self.address.is_empty()) {
            (Some(_), false) => {
                return Err(ValidationError::Conflict {
                    fields: "Id_Direccion and address fields",
                })
            }
            (Some(id), true) => Some(AddressInput::Existing(id)),
            (None, false) => Some(AddressInput::New(self.address)),
            (None, true) => None,
        };

        let birthplace = non_blank(self.birthplace)
            .map(|name| RefName::new("Lugar_nacimiento", &name))
            .transpose()?;
        let parent = self.parent_dni.map(ParentDni::new).transpose()?;

        Ok(StudentRegistration {
            student,
            address,
            birthplace,
            parent,
        })
    }
}

/// Write confirmation
#[derive(Debug, Serialize)]
pub struct StudentWritten {
    #[serde(rename = "DNI_estudiante")]
    pub dni: String,
    pub message: &'static str,
}

impl StudentWritten {
    fn new(dni: &StudentDni, message: &'static str) -> Self {
        Self {
            dni: dni.as_str().to_owned(),
            message,
        }
    }
}

/// GET /api/estudiantes
async fn list_students(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StudentDetail>>, ApiError> {
    let students = Registrar::new(state.store.as_ref()).students().await?;
    Ok(Json(students))
}

/// GET /api/estudiantes/{dni}
async fn get_student(
    State(state): State<Arc<AppState>>,
    ValidStudentDni(dni): ValidStudentDni,
) -> Result<Json<StudentDetail>, ApiError> {
    let student = Registrar::new(state.store.as_ref()).student(&dni).await?;
    Ok(Json(student))
}

/// POST /api/estudiantes
async fn create_student(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StudentRequest>,
) -> Result<(StatusCode, Json<StudentWritten>), ApiError> {
    let dni = StudentDni::new(req.dni.as_deref().unwrap_or_default())?;
    let reg = req.into_registration(dni)?;

    Registrar::new(state.store.as_ref())
        .create_student(&reg)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(StudentWritten::new(&reg.student.dni, "student registered")),
    ))
}

/// PUT /api/estudiantes/{dni}
async fn update_student(
    State(state): State<Arc<AppState>>,
    ValidStudentDni(dni): ValidStudentDni,
    Json(req): Json<StudentRequest>,
) -> Result<Json<StudentWritten>, ApiError> {
    if req.dni.as_deref().is_some_and(|body| body != dni.as_str()) {
        return Err(ValidationError::Conflict {
            fields: "DNI_estudiante in path and body",
        }
        .into());
    }
    let reg = req.into_registration(dni)?;

    Registrar::new(state.store.as_ref())
        .update_student(&reg)
        .await?;

    Ok(Json(StudentWritten::new(&reg.student.dni, "student updated")))
}

/// DELETE /api/estudiantes/{dni}
async fn delete_student(
    State(state): State<Arc<AppState>>,
    ValidStudentDni(dni): ValidStudentDni,
) -> Result<Json<StudentWritten>, ApiError> {
    Registrar::new(state.store.as_ref())
        .delete_student(&dni)
        .await?;

    Ok(Json(StudentWritten::new(&dni, "student deleted")))
}

/// Student routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/estudiantes", get(list_students).post(create_student))
        .route(
            "/api/estudiantes/{dni}",
            get(get_student).put(update_student).delete(delete_student),
        )
}

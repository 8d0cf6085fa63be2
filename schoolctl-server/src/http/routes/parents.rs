//! Parent endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::non_blank;
use crate::http::error::ApiError;
use crate::http::extractors::ValidParentDni;
use crate::http::server::AppState;
use crate::models::{
    ParentDetail, ParentDni, ParentRecord, ParentRegistration, RefName, ValidationError,
};
use crate::registry::Registrar;

/// Create/update parent request
#[derive(Debug, Deserialize)]
pub struct ParentRequest {
    #[serde(rename = "DNI_padre", default)]
    pub dni: Option<i64>,
    #[serde(rename = "Nombre_padre")]
    pub nombre: String,
    #[serde(rename = "ApellidoPaterno_padre")]
    pub apellido_paterno: String,
    #[serde(rename = "ApellidoMaterno_padre")]
    pub apellido_materno: String,
    #[serde(rename = "Telefono_padre", default)]
    pub telefono: Option<i64>,
    #[serde(rename = "Ocupacion", default)]
    pub occupation: Option<String>,
}

impl ParentRequest {
    fn into_registration(self, dni: ParentDni) -> Result<ParentRegistration, ValidationError> {
        let parent = ParentRecord::new(
            dni,
            &self.nombre,
            &self.apellido_paterno,
            &self.apellido_materno,
            self.telefono,
        )?;
        let occupation = non_blank(self.occupation)
            .map(|name| RefName::new("Ocupacion", &name))
            .transpose()?;

        Ok(ParentRegistration { parent, occupation })
    }
}

/// Write confirmation
#[derive(Debug, Serialize)]
pub struct ParentWritten {
    #[serde(rename = "DNI_padre")]
    pub dni: i32,
    pub message: &'static str,
}

/// GET /api/padres
async fn list_parents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ParentDetail>>, ApiError> {
    let parents = Registrar::new(state.store.as_ref()).parents().await?;
    Ok(Json(parents))
}

/// GET /api/padres/{dni}
async fn get_parent(
    State(state): State<Arc<AppState>>,
    ValidParentDni(dni): ValidParentDni,
) -> Result<Json<ParentDetail>, ApiError> {
    let parent = Registrar::new(state.store.as_ref()).parent(dni).await?;
    Ok(Json(parent))
}

/// POST /api/padres
async fn create_parent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ParentRequest>,
) -> Result<(StatusCode, Json<ParentWritten>), ApiError> {
    let dni = req.dni.ok_or(ValidationError::Empty { field: "DNI_padre" })?;
    let dni = ParentDni::new(dni)?;
    let reg = req.into_registration(dni)?;

    Registrar::new(state.store.as_ref())
        .create_parent(&reg)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ParentWritten {
            dni: dni.get(),
            message: "parent registered",
        }),
    ))
}

/// PUT /api/padres/{dni}
async fn update_parent(
    State(state): State<Arc<AppState>>,
    ValidParentDni(dni): ValidParentDni,
    Json(req): Json<ParentRequest>,
) -> Result<Json<ParentWritten>, ApiError> {
    if req.dni.is_some_and(|body| body != i64::from(dni.get())) {
        return Err(ValidationError::Conflict {
            fields: "DNI_padre in path and body",
        }
        .into());
    }
    let reg = req.into_registration(dni)?;

    Registrar::new(state.store.as_ref())
        .update_parent(&reg)
        .await?;

    Ok(Json(ParentWritten {
        dni: dni.get(),
        message: "parent updated",
    }))
}

/// DELETE /api/padres/{dni}
async fn delete_parent(
    State(state): State<Arc<AppState>>,
    ValidParentDni(dni): ValidParentDni,
) -> Result<Json<ParentWritten>, ApiError> {
    Registrar::new(state.store.as_ref())
        .delete_parent(dni)
        .await?;

    Ok(Json(ParentWritten {
        dni: dni.get(),
        message: "parent deleted",
    }))
}

/// Parent routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/padres", get(list_parents).post(create_parent))
        .route(
            "/api/padres/{dni}",
            get(get_parent).put(update_parent).delete(delete_parent),
        )
}

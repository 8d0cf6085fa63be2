//! Place and occupation catalogs
//!
//! POST is get-or-create: posting an existing name returns its id with
//! 200 instead of inserting a second row.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::{RefEntry, RefKind, RefName, ValidationError};
use crate::registry::Registrar;

/// JSON keys `(id, name)` for each catalog
fn keys(kind: RefKind) -> (&'static str, &'static str) {
    match kind {
        RefKind::Place => ("Id_Lugar", "lugar"),
        RefKind::Occupation => ("Id_Ocupacion", "Ocupacion"),
    }
}

fn to_json(kind: RefKind, entry: RefEntry) -> Value {
    let (id_key, name_key) = keys(kind);
    let mut row = Map::new();
    row.insert(id_key.to_owned(), Value::from(entry.id));
    row.insert(name_key.to_owned(), Value::from(entry.name));
    Value::Object(row)
}

#[derive(Debug, Deserialize)]
pub struct PlaceRequest {
    #[serde(default)]
    pub lugar: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OccupationRequest {
    #[serde(rename = "Ocupacion", default)]
    pub ocupacion: Option<String>,
}

/// Get-or-create outcome
#[derive(Debug, Serialize)]
pub struct CatalogWritten {
    pub id: i32,
    pub message: &'static str,
}

async fn list(state: &AppState, kind: RefKind) -> Result<Json<Vec<Value>>, ApiError> {
    let entries = Registrar::new(state.store.as_ref()).references(kind).await?;
    Ok(Json(
        entries.into_iter().map(|e| to_json(kind, e)).collect(),
    ))
}

async fn ensure(
    state: &AppState,
    kind: RefKind,
    field: &'static str,
    name: Option<String>,
) -> Result<(StatusCode, Json<CatalogWritten>), ApiError> {
    let name = name.ok_or(ValidationError::Empty { field })?;
    let name = RefName::new(field, &name)?;

    let (entry, created) = Registrar::new(state.store.as_ref())
        .ensure_reference(kind, &name)
        .await?;

    let (status, message) = if created {
        (StatusCode::CREATED, "created")
    } else {
        (StatusCode::OK, "already exists")
    };
    Ok((
        status,
        Json(CatalogWritten {
            id: entry.id,
            message,
        }),
    ))
}

/// GET /api/lugares
async fn list_places(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Value>>, ApiError> {
    list(&state, RefKind::Place).await
}

/// POST /api/lugares
async fn create_place(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlaceRequest>,
) -> Result<(StatusCode, Json<CatalogWritten>), ApiError> {
    ensure(&state, RefKind::Place, "lugar", req.lugar).await
}

/// GET /api/ocupaciones
async fn list_occupations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Value>>, ApiError> {
    list(&state, RefKind::Occupation).await
}

/// POST /api/ocupaciones
async fn create_occupation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OccupationRequest>,
) -> Result<(StatusCode, Json<CatalogWritten>), ApiError> {
    ensure(&state, RefKind::Occupation, "Ocupacion", req.ocupacion).await
}

/// Catalog routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/lugares", get(list_places).post(create_place))
        .route(
            "/api/ocupaciones",
            get(list_occupations).post(create_occupation),
        )
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::http::test_support::{app, send};

    #[tokio::test]
    async fn place_post_is_idempotent() {
        let (app, store) = app();

        let (status, first) =
            send(&app, Method::POST, "/api/lugares", Some(json!({"lugar": "Lima"}))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, second) =
            send(&app, Method::POST, "/api/lugares", Some(json!({"lugar": "Lima"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["id"], second["id"]);
        assert_eq!(store.counts().await.places, 1);

        let (_, list) = send(&app, Method::GET, "/api/lugares", None).await;
        assert_eq!(list, json!([{"Id_Lugar": 1, "lugar": "Lima"}]));
    }

    #[tokio::test]
    async fn occupation_uses_its_own_keys() {
        let (app, _) = app();
        send(
            &app,
            Method::POST,
            "/api/ocupaciones",
            Some(json!({"Ocupacion": "Docente"})),
        )
        .await;

        let (status, list) = send(&app, Method::GET, "/api/ocupaciones", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["Ocupacion"], "Docente");
    }

    #[tokio::test]
    async fn missing_name_is_500() {
        let (app, _) = app();
        let (status, err) = send(&app, Method::POST, "/api/lugares", Some(json!({}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err["error"].as_str().unwrap().contains("lugar"));
    }
}

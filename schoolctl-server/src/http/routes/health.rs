//! Index, health and status endpoints

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::http::server::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Store reachability
#[derive(Serialize)]
pub struct StatusResponse {
    pub database: bool,
}

/// API index
#[derive(Serialize)]
pub struct IndexResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: &'static [&'static str],
}

const ENDPOINTS: &[&str] = &[
    "GET /health",
    "GET /api/status",
    "GET|POST /api/estudiantes",
    "GET|PUT|DELETE /api/estudiantes/{dni}",
    "GET|POST /api/padres",
    "GET|PUT|DELETE /api/padres/{dni}",
    "GET|POST /api/lugares",
    "GET|POST /api/ocupaciones",
];

/// GET /
async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        name: "schoolctl",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS,
    })
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/status
async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        database: state.store.ping().await,
    })
}

/// Health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/status", get(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::{app, send};
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn health_returns_ok() {
        let Json(body) = health().await;
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::GET, "/", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "schoolctl");
        assert!(body["endpoints"].as_array().unwrap().len() >= 8);
    }

    #[tokio::test]
    async fn status_reports_store() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::GET, "/api/status", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], true);
    }
}

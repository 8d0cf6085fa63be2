//! Router harness for handler tests

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use super::{build_router, AppState, ServerConfig};
use crate::db::MemoryStore;

/// Router over a fresh in-memory store, plus the store for assertions
pub(crate) fn app() -> (Router, MemoryStore) {
    let store = MemoryStore::new();
    let router = build_router(
        AppState::new(Arc::new(store.clone())),
        &ServerConfig::default(),
    );
    (router, store)
}

/// Send one request and decode the JSON response body.
pub(crate) async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub mod api;
pub mod pages;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, Json};
use axum::routing::get;
use axum::Router;
use diarist_core::storage::SessionStore;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(api::routes())
        .merge(pages::routes())
        .fallback(not_found)
}

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let storage_ok = state.storage.list_dates().await.is_ok();

    let status = if storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(serde_json::json!({
            "status": if storage_ok { "ok" } else { "degraded" },
            "storage": state.storage.backend_name(),
            "model": state.config.llm.model,
        })),
    )
}

pub(crate) async fn not_found() -> (StatusCode, Html<String>) {
    let body = r#"<!doctype html>
<html><head><title>404 — Diarist</title>
<style>body{font-family:Georgia,serif;background:#faf7f2;color:#3b3631;display:flex;justify-content:center;align-items:center;height:100vh;margin:0}
.box{text-align:center}
h1{font-size:4rem;color:#8e6c4a;margin:0}
p{color:#888;margin:0.5rem 0 1.5rem}
a{color:#8e6c4a;text-decoration:none;padding:0.5rem 1rem;border:1px solid #d8cfc4;border-radius:8px}
a:hover{border-color:#8e6c4a}</style>
</head><body><div class="box"><h1>404</h1><p>This page doesn't exist.</p><a href="/">Back to today</a></div></body></html>"#;
    (StatusCode::NOT_FOUND, Html(body.to_string()))
}

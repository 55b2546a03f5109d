use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::NaiveDate;
use diarist_core::controller::{Reply, ReplyKind};
use diarist_core::llm::TextGenerator;
use diarist_core::model::Session;
use diarist_core::storage::SessionStore;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/input", post(input))
        .route("/api/start", post(start))
        .route("/api/end", post(end))
        .route("/api/status", get(status))
        .route("/api/calendar/dates", get(calendar_dates))
        .route("/api/calendar/{date}", get(calendar_day))
        .route("/api/calendar/{date}/exists", get(calendar_exists))
}

// -- Request/Response types --

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub input: String,
}

#[derive(Debug, Serialize)]
pub struct InputResponse {
    pub response: String,
    pub kind: ReplyKind,
    pub session_status: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub session_status: String,
    pub active: bool,
    pub entry_count: usize,
    pub service_available: bool,
}

#[derive(Debug, Serialize)]
pub struct CalendarDayResponse {
    pub diary_dates: Vec<String>,
    pub diary: Session,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub date: String,
    pub exists: bool,
}

// -- Handlers --

async fn input(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InputRequest>,
) -> Json<InputResponse> {
    Json(run_command(&state, &req.input).await)
}

async fn start(State(state): State<Arc<AppState>>) -> Json<InputResponse> {
    let phrase = state.config.session.start_phrase.clone();
    Json(run_command(&state, &phrase).await)
}

async fn end(State(state): State<Arc<AppState>>) -> Json<InputResponse> {
    let phrase = state.config.session.end_phrase.clone();
    Json(run_command(&state, &phrase).await)
}

/// One command under the controller lock, including the status read after it.
async fn run_command(state: &AppState, input: &str) -> InputResponse {
    let mut controller = state.controller.lock().await;
    let Reply { text, kind } = controller.handle(input).await;
    InputResponse {
        response: text,
        kind,
        session_status: controller.status(),
    }
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (session_status, active, entry_count) = {
        let controller = state.controller.lock().await;
        let entry_count = controller
            .current_session()
            .map(|s| s.entry_count())
            .unwrap_or(0);
        (
            controller.status(),
            controller.state().is_active(),
            entry_count,
        )
    };

    // Probed outside the controller lock.
    let service_available = state.llm.is_available().await;

    Json(StatusResponse {
        session_status,
        active,
        entry_count,
        service_available,
    })
}

async fn calendar_dates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let dates = state.storage.list_dates().await?;
    Ok(Json(dates.iter().map(|d| d.to_string()).collect()))
}

async fn calendar_day(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<CalendarDayResponse>, ApiError> {
    let date = parse_date(&date)?;
    let diary = state
        .storage
        .load(date)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no diary saved for {date}")))?;
    let diary_dates = state
        .storage
        .list_dates()
        .await?
        .iter()
        .map(|d| d.to_string())
        .collect();

    Ok(Json(CalendarDayResponse { diary_dates, diary }))
}

async fn calendar_exists(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<ExistsResponse>, ApiError> {
    let parsed = parse_date(&date)?;
    let exists = state.storage.exists(parsed).await?;
    Ok(Json(ExistsResponse {
        date: parsed.to_string(),
        exists,
    }))
}

pub(crate) fn parse_date(input: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("invalid date '{input}', expected YYYY-MM-DD")))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use diarist_core::controller::{ACKNOWLEDGEMENT, NO_CONTENT, WELCOME_MESSAGE};

    use super::*;
    use crate::test_support::{test_app_state, test_router};

    async fn body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_input_response_serde() {
        let resp = InputResponse {
            response: "Got it.".into(),
            kind: ReplyKind::Recorded,
            session_status: "Diary in progress, 1 entries recorded".into(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"kind\":\"recorded\""));
        assert!(json.contains("\"session_status\""));
    }

    #[tokio::test]
    async fn test_stray_input_is_ignored() {
        let resp = test_router()
            .oneshot(post_json("/api/input", serde_json::json!({"input": "hello"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["response"], ACKNOWLEDGEMENT);
        assert_eq!(json["kind"], "ignored");
        assert_eq!(json["session_status"], "No active diary session");
    }

    #[tokio::test]
    async fn test_start_record_status() {
        let app = test_router();

        let json = body_json(app.clone().oneshot(post_empty("/api/start")).await.unwrap().into_body()).await;
        assert_eq!(json["response"], WELCOME_MESSAGE);
        assert_eq!(json["kind"], "welcome");

        let json = body_json(
            app.clone()
                .oneshot(post_json("/api/input", serde_json::json!({"input": "rainy walk"})))
                .await
                .unwrap()
                .into_body(),
        )
        .await;
        assert_eq!(json["kind"], "recorded");
        assert_eq!(json["session_status"], "Diary in progress, 1 entries recorded");

        let resp = app.oneshot(get("/api/status")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["active"], true);
        assert_eq!(json["entry_count"], 1);
        assert_eq!(json["service_available"], false);
    }

    #[tokio::test]
    async fn test_end_without_entries_returns_sentinel() {
        let app = test_router();
        app.clone().oneshot(post_empty("/api/start")).await.unwrap();

        let json = body_json(app.oneshot(post_empty("/api/end")).await.unwrap().into_body()).await;
        assert_eq!(json["response"], NO_CONTENT);
        assert_eq!(json["kind"], "no_content");
    }

    #[tokio::test]
    async fn test_end_with_unreachable_model_reports_failure() {
        let state = test_app_state();
        let app = crate::routes::router().with_state(Arc::clone(&state));
        app.clone().oneshot(post_empty("/api/start")).await.unwrap();
        app.clone()
            .oneshot(post_json("/api/input", serde_json::json!({"input": "A"})))
            .await
            .unwrap();

        let json = body_json(app.clone().oneshot(post_empty("/api/end")).await.unwrap().into_body()).await;
        assert_eq!(json["kind"], "failed");
        assert!(json["response"]
            .as_str()
            .unwrap()
            .starts_with("Failed to process the diary"));
        assert_eq!(json["session_status"], "No active diary session");

        // The per-entry snapshot is still on disk.
        let json = body_json(app.oneshot(get("/api/calendar/dates")).await.unwrap().into_body()).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_calendar_day_roundtrip() {
        let state = test_app_state();
        let app = crate::routes::router().with_state(Arc::clone(&state));
        app.clone().oneshot(post_empty("/api/start")).await.unwrap();
        app.clone()
            .oneshot(post_json("/api/input", serde_json::json!({"input": "tea"})))
            .await
            .unwrap();

        let dates = state.storage.list_dates().await.unwrap();
        let date = dates[0].to_string();

        let resp = app.clone().oneshot(get(&format!("/api/calendar/{date}"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["diary_dates"][0], date.as_str());
        assert_eq!(json["diary"]["entries"][0]["content"], "tea");

        let json = body_json(
            app.oneshot(get(&format!("/api/calendar/{date}/exists")))
                .await
                .unwrap()
                .into_body(),
        )
        .await;
        assert_eq!(json["exists"], true);
    }

    #[tokio::test]
    async fn test_calendar_missing_day_is_404() {
        let resp = test_router()
            .oneshot(get("/api/calendar/1999-01-01"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json = body_json(resp.into_body()).await;
        assert!(json["error"].as_str().unwrap().contains("1999-01-01"));
    }

    #[tokio::test]
    async fn test_calendar_bad_date_is_400() {
        let resp = test_router()
            .oneshot(get("/api/calendar/yesterday/exists"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

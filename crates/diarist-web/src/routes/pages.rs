use std::sync::Arc;

use askama::Template;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use diarist_core::llm::TextGenerator;
use diarist_core::model::{Reflection, Session};
use diarist_core::storage::SessionStore;

use crate::error::AppError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/calendar", get(calendar))
        .route("/diary/{date}", get(diary))
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    session_status: String,
    active: bool,
    service_available: bool,
    model: String,
    start_phrase: String,
    end_phrase: String,
}

#[derive(Template)]
#[template(path = "calendar.html")]
struct CalendarTemplate {
    dates: Vec<String>,
}

struct EntryView {
    time: String,
    content: String,
}

#[derive(Template)]
#[template(path = "diary.html")]
struct DiaryTemplate {
    date: String,
    title: String,
    started: String,
    closed: bool,
    entries: Vec<EntryView>,
    reflection: Option<Reflection>,
}

impl DiaryTemplate {
    fn from_session(session: &Session) -> Self {
        Self {
            date: session.date().to_string(),
            title: session.date().format("%A, %B %-d, %Y").to_string(),
            started: session.start_time().format("%H:%M").to_string(),
            closed: !session.is_active(),
            entries: session
                .entries()
                .iter()
                .map(|e| EntryView {
                    time: e.timestamp.format("%H:%M").to_string(),
                    content: e.content.clone(),
                })
                .collect(),
            reflection: session.reflection(),
        }
    }
}

async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let (session_status, active) = {
        let controller = state.controller.lock().await;
        (controller.status(), controller.state().is_active())
    };
    let service_available = state.llm.is_available().await;

    let tmpl = IndexTemplate {
        session_status,
        active,
        service_available,
        model: state.config.llm.model.clone(),
        start_phrase: state.config.session.start_phrase.clone(),
        end_phrase: state.config.session.end_phrase.clone(),
    };
    Ok(Html(tmpl.render()?))
}

async fn calendar(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let mut dates: Vec<String> = state
        .storage
        .list_dates()
        .await?
        .iter()
        .map(|d| d.to_string())
        .collect();
    dates.reverse();

    let tmpl = CalendarTemplate { dates };
    Ok(Html(tmpl.render()?))
}

async fn diary(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Response, AppError> {
    let date = chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid date '{date}': {e}"))?;

    let Some(session) = state.storage.load(date).await? else {
        return Ok(super::not_found().await.into_response());
    };

    let tmpl = DiaryTemplate::from_session(&session);
    Ok(Html(tmpl.render()?).into_response())
}

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use docqa_core::Answerer;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const INDEX_HTML: &str = include_str!("../static/index.html");
const NO_QUESTION: &str = "No question provided";

#[derive(Clone)]
pub struct AppState {
    answerer: Arc<dyn Answerer>,
}

impl AppState {
    pub fn new(answerer: Arc<dyn Answerer>) -> Self {
        Self { answerer }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ask", post(ask))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    question: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    answer: String,
}

#[derive(Debug)]
pub enum ApiError {
    MissingQuestion,
    BadRequest(String),
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingQuestion => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": NO_QUESTION }))).into_response()
            }
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let question = request
        .question
        .filter(|question| !question.is_empty())
        .ok_or(ApiError::MissingQuestion)?;

    tracing::debug!(question_chars = question.chars().count(), "answering question");
    let answer = state.answerer.answer(&question).await.map_err(|error| {
        tracing::error!(%error, "failed to answer question");
        ApiError::Internal
    })?;

    Ok(Json(AskResponse { answer }))
}

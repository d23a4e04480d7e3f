//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::{IntoResponse, Response}};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::domain::Topic;
use crate::protocol::*;
use crate::session::SessionError;
use crate::state::AppState;
use crate::logic::*;

/// Session-level rejection surfaced as a JSON error body.
pub struct ApiError(SessionError);

impl From<SessionError> for ApiError {
  fn from(e: SessionError) -> Self { Self(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self.0 {
      SessionError::UnknownTopic(_) | SessionError::UnknownConcept(_) => StatusCode::NOT_FOUND,
      SessionError::TopicDisabled(_) => StatusCode::FORBIDDEN,
      SessionError::EmptyQuestion => StatusCode::BAD_REQUEST,
      _ => StatusCode::CONFLICT,
    };
    warn!(target: "coach_backend", %status, error = %self.0, "HTTP request rejected");
    (status, Json(json!({ "error": self.0.to_string() }))).into_response()
  }
}

fn topic_out(state: &AppState, t: &Topic) -> TopicOut {
  TopicOut { topic: t.clone(), category_label: t.category.label(), enabled: state.catalog.is_enabled(t) }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, ai: state.gateway.service_name().to_string() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_topics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let topics: Vec<TopicOut> = state.catalog.topics().iter().map(|t| topic_out(&state, t)).collect();
  Json(topics)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_topic(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<TopicOut>, ApiError> {
  let t = state.catalog.get(&id).ok_or_else(|| SessionError::UnknownTopic(id.clone()))?;
  Ok(Json(topic_out(&state, t)))
}

#[instrument(level = "info", skip(state, body), fields(%body.topic_id, concept_len = body.concept.len(), analogy = ?body.analogy))]
pub async fn http_post_explain(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ExplainIn>,
) -> Result<Json<ExplainOut>, ApiError> {
  let text = explain_once(&state, &body.topic_id, &body.concept, body.analogy).await?;
  info!(target: "coach_backend", topic = %body.topic_id, html_len = text.text().len(), fallback = text.is_fallback(), "HTTP explanation served");
  let fallback = text.is_fallback();
  Ok(Json(ExplainOut { html: text.into_text(), fallback }))
}

#[instrument(level = "info", skip(state, body), fields(%body.topic_id, question_len = body.question.len()))]
pub async fn http_post_ask(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AskIn>,
) -> Result<Json<AskOut>, ApiError> {
  let text = answer_once(&state, &body.topic_id, &body.question, &body.history).await?;
  let fallback = text.is_fallback();
  Ok(Json(AskOut { html: text.into_text(), fallback }))
}

#[instrument(level = "info", skip(state, body), fields(%body.topic_id, scoped = body.concept.is_some()))]
pub async fn http_post_quiz(
  State(state): State<Arc<AppState>>,
  Json(body): Json<QuizIn>,
) -> Result<Json<QuizOut>, ApiError> {
  let questions = quiz_once(&state, &body.topic_id, body.concept.as_deref()).await?;
  info!(target: "quiz", topic = %body.topic_id, count = questions.len(), "HTTP quiz served");
  Ok(Json(QuizOut { questions }))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_plan(
  State(state): State<Arc<AppState>>,
  body: Option<Json<PlanIn>>,
) -> impl IntoResponse {
  let Json(body) = body.unwrap_or_default();
  let weeks = plan_once(&state, body.event_date, body.topics).await;
  info!(target: "coach_backend", weeks = weeks.len(), "HTTP plan served");
  Json(PlanOut { weeks })
}

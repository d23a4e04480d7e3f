//! AI gateway: turns the four coaching intents (explain, ask, quiz, plan) into
//! completion requests and maps the answers back into typed results.
//!
//! Every entry point swallows provider failures: prose calls return
//! `AiText::Fallback` with a user-facing message, structured calls return an
//! empty `Vec`. Callers never see a `GatewayError`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::Prompts;
use crate::domain::{AnalogyStyle, ChatMessage, ChatRole, QuizQuestion, WeekPlan};
use crate::util::fill_template;

pub const EXPLAIN_EMPTY: &str = "Could not generate explanation.";
pub const EXPLAIN_FAILED: &str = "Sorry, our AI coach is taking a break. Please try again later.";
pub const ASK_EMPTY: &str = "I couldn't generate an answer at this time.";
pub const ASK_FAILED: &str = "Sorry, I'm having trouble connecting to the knowledge base.";

/// Questions per quiz: concept-scoped vs topic-wide.
pub const CONCEPT_QUIZ_LEN: usize = 3;
pub const TOPIC_QUIZ_LEN: usize = 10;

/// How many transcript entries are replayed as context for a new question.
pub const ASK_HISTORY_TURNS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
  #[error("transport error: {0}")]
  Http(String),
  #[error("provider returned HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("malformed response: {0}")]
  Decode(String),
  #[error("provider returned no content")]
  EmptyResponse,
  #[error("completion service disabled (no API key)")]
  Disabled,
}

/// Provider boundary: one free-text call and one schema-constrained call.
#[async_trait]
pub trait CompletionService: Send + Sync {
  fn name(&self) -> &str;

  async fn complete_text(&self, prompt: &str) -> Result<String, GatewayError>;

  async fn complete_json(&self, prompt: &str, schema_name: &str, schema: &Value) -> Result<Value, GatewayError>;
}

/// Stand-in used when no credential is configured. Every call fails, so the
/// gateway serves its fallbacks.
pub struct DisabledService;

#[async_trait]
impl CompletionService for DisabledService {
  fn name(&self) -> &str { "disabled" }

  async fn complete_text(&self, _prompt: &str) -> Result<String, GatewayError> {
    Err(GatewayError::Disabled)
  }

  async fn complete_json(&self, _prompt: &str, _schema_name: &str, _schema: &Value) -> Result<Value, GatewayError> {
    Err(GatewayError::Disabled)
  }
}

/// Prose result: either model output or a fixed user-facing fallback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AiText {
  Generated(String),
  Fallback(String),
}

impl AiText {
  pub fn text(&self) -> &str {
    match self {
      AiText::Generated(t) | AiText::Fallback(t) => t,
    }
  }

  pub fn into_text(self) -> String {
    match self {
      AiText::Generated(t) | AiText::Fallback(t) => t,
    }
  }

  pub fn is_fallback(&self) -> bool {
    matches!(self, AiText::Fallback(_))
  }
}

#[derive(Clone)]
pub struct AiGateway {
  service: Arc<dyn CompletionService>,
  prompts: Arc<Prompts>,
}

impl AiGateway {
  pub fn new(service: Arc<dyn CompletionService>, prompts: Prompts) -> Self {
    Self { service, prompts: Arc::new(prompts) }
  }

  pub fn service_name(&self) -> &str {
    self.service.name()
  }

  // --- Prompt builders ---

  pub fn explain_prompt(&self, topic: &str, concept: &str, analogy: AnalogyStyle) -> String {
    let clause = match analogy {
      AnalogyStyle::Default => self.prompts.explain_plain_clause.clone(),
      other => fill_template(&self.prompts.explain_analogy_clause, &[("analogy", other.label())]),
    };
    fill_template(
      &self.prompts.explain_template,
      &[("concept", concept), ("topic", topic), ("analogy_clause", &clause)],
    )
  }

  pub fn ask_prompt(&self, topic: &str, question: &str, history: &[ChatMessage]) -> String {
    let context = if history.is_empty() {
      String::new()
    } else {
      let start = history.len().saturating_sub(ASK_HISTORY_TURNS);
      let lines = history[start..]
        .iter()
        .map(|m| match m.role {
          ChatRole::User => format!("Student: {}", m.text),
          ChatRole::Assistant => format!("Coach: {}", m.text),
        })
        .collect::<Vec<_>>()
        .join("\n");
      fill_template(&self.prompts.ask_context_template, &[("history", &lines)])
    };
    fill_template(
      &self.prompts.ask_template,
      &[("topic", topic), ("context", &context), ("question", question)],
    )
  }

  pub fn quiz_prompt(&self, topic: &str, concept: Option<&str>) -> String {
    let scope = match concept {
      Some(c) => fill_template(&self.prompts.quiz_concept_scope, &[("concept", c), ("topic", topic)]),
      None => fill_template(&self.prompts.quiz_topic_scope, &[("topic", topic)]),
    };
    let count = quiz_len(concept).to_string();
    fill_template(&self.prompts.quiz_template, &[("count", &count), ("scope", &scope)])
  }

  pub fn plan_prompt(&self, event_date: &str, topics: &[String]) -> String {
    fill_template(
      &self.prompts.plan_template,
      &[("event_date", event_date), ("topics", &topics.join(", "))],
    )
  }

  // --- Intents ---

  #[instrument(level = "info", skip(self, topic, concept), fields(concept_len = concept.len()))]
  pub async fn explain_concept(&self, topic: &str, concept: &str, analogy: AnalogyStyle) -> AiText {
    let prompt = self.explain_prompt(topic, concept, analogy);
    let start = std::time::Instant::now();
    match self.service.complete_text(&prompt).await {
      Ok(text) if !text.trim().is_empty() => {
        info!(elapsed = ?start.elapsed(), text_len = text.len(), "Explanation generated");
        AiText::Generated(text.trim().to_string())
      }
      Ok(_) => {
        warn!(elapsed = ?start.elapsed(), "Explanation came back empty");
        AiText::Fallback(EXPLAIN_EMPTY.into())
      }
      Err(e) => {
        error!(elapsed = ?start.elapsed(), error = %e, "Error explaining concept");
        AiText::Fallback(EXPLAIN_FAILED.into())
      }
    }
  }

  #[instrument(level = "info", skip(self, topic, question, history), fields(question_len = question.len(), history_len = history.len()))]
  pub async fn ask_question(&self, topic: &str, question: &str, history: &[ChatMessage]) -> AiText {
    let prompt = self.ask_prompt(topic, question, history);
    match self.service.complete_text(&prompt).await {
      Ok(text) if !text.trim().is_empty() => AiText::Generated(text.trim().to_string()),
      Ok(_) => {
        warn!("Answer came back empty");
        AiText::Fallback(ASK_EMPTY.into())
      }
      Err(e) => {
        error!(error = %e, "Error asking question");
        AiText::Fallback(ASK_FAILED.into())
      }
    }
  }

  /// Empty result means the quiz failed to load.
  #[instrument(level = "info", skip(self, topic, concept), fields(scoped = concept.is_some()))]
  pub async fn generate_quiz(&self, topic: &str, concept: Option<&str>) -> Vec<QuizQuestion> {
    let prompt = self.quiz_prompt(topic, concept);
    let result = self
      .service
      .complete_json(&prompt, "quiz", &quiz_schema())
      .await
      .and_then(parse_quiz);
    match result {
      Ok(questions) => {
        info!(target: "quiz", count = questions.len(), expected = quiz_len(concept), "Quiz generated");
        questions
      }
      Err(e) => {
        error!(target: "quiz", error = %e, "Error generating quiz");
        Vec::new()
      }
    }
  }

  /// Empty result means plan generation failed.
  #[instrument(level = "info", skip(self, event_date, topics), fields(topic_count = topics.len()))]
  pub async fn generate_weekly_plan(&self, event_date: &str, topics: &[String]) -> Vec<WeekPlan> {
    let prompt = self.plan_prompt(event_date, topics);
    let result = self
      .service
      .complete_json(&prompt, "weekly_plan", &plan_schema())
      .await
      .and_then(parse_plan);
    match result {
      Ok(weeks) => {
        info!(weeks = weeks.len(), "Weekly plan generated");
        weeks
      }
      Err(e) => {
        error!(error = %e, "Error generating plan");
        Vec::new()
      }
    }
  }
}

pub fn quiz_len(concept: Option<&str>) -> usize {
  if concept.is_some() { CONCEPT_QUIZ_LEN } else { TOPIC_QUIZ_LEN }
}

pub fn quiz_schema() -> Value {
  json!({
    "type": "object",
    "properties": {
      "questions": {
        "type": "array",
        "items": {
          "type": "object",
          "properties": {
            "question": { "type": "string" },
            "options": {
              "type": "array",
              "items": { "type": "string" },
              "description": "Exactly 4 options"
            },
            "correctAnswer": { "type": "string", "description": "Must exactly match one of the options" },
            "explanation": { "type": "string", "description": "Why this answer is correct" }
          },
          "required": ["question", "options", "correctAnswer", "explanation"]
        }
      }
    }
  })
}

pub fn plan_schema() -> Value {
  json!({
    "type": "array",
    "items": {
      "type": "object",
      "properties": {
        "weekNumber": { "type": "integer" },
        "focus": { "type": "string" },
        "tasks": {
          "type": "array",
          "items": {
            "type": "object",
            "properties": {
              "id": { "type": "string" },
              "title": { "type": "string" },
              "completed": { "type": "boolean" },
              "type": { "type": "string", "enum": ["read", "quiz", "build"] }
            }
          }
        }
      }
    }
  })
}

/// Decode `{questions: [...]}`; questions without text or options are dropped.
fn parse_quiz(value: Value) -> Result<Vec<QuizQuestion>, GatewayError> {
  #[derive(Deserialize)]
  struct Envelope {
    #[serde(default)]
    questions: Vec<QuizQuestion>,
  }
  let env: Envelope = serde_json::from_value(value).map_err(|e| GatewayError::Decode(e.to_string()))?;
  let total = env.questions.len();
  let questions: Vec<QuizQuestion> = env
    .questions
    .into_iter()
    .filter(|q| !q.question.trim().is_empty() && !q.options.is_empty())
    .collect();
  if questions.len() < total {
    warn!(target: "quiz", dropped = total - questions.len(), "Dropped incomplete quiz questions");
  }
  Ok(questions)
}

/// Decode the plan array. Task ids are re-minted so no two generations share identity.
fn parse_plan(value: Value) -> Result<Vec<WeekPlan>, GatewayError> {
  let mut weeks: Vec<WeekPlan> = serde_json::from_value(value).map_err(|e| GatewayError::Decode(e.to_string()))?;
  for week in &mut weeks {
    for task in &mut week.tasks {
      task.id = Uuid::new_v4().to_string();
    }
  }
  Ok(weeks)
}


#[cfg(test)]
mod tests {
  use super::testing::*;
  use super::*;

  fn gateway(svc: &Arc<ScriptedService>) -> AiGateway {
    AiGateway::new(svc.clone(), Prompts::default())
  }

  #[test]
  fn explain_prompt_mentions_analogy_only_when_not_default() {
    let svc = Arc::new(ScriptedService::new());
    let gw = gateway(&svc);
    let plain = gw.explain_prompt("Hovercraft", "Pressure (Force/Area)", AnalogyStyle::Default);
    assert!(plain.contains("\"Pressure (Force/Area)\""));
    assert!(plain.contains("\"Hovercraft\""));
    assert!(plain.contains("simple, engaging, and conceptual"));
    assert!(!plain.contains("analogy to explain"));
    assert!(plain.contains("150-250 words"));
    assert!(plain.contains("Do NOT use markdown"));

    let sports = gw.explain_prompt("Hovercraft", "Pressure (Force/Area)", AnalogyStyle::Sports);
    assert!(sports.contains("Use a \"Sports\" analogy"));
  }

  #[test]
  fn ask_prompt_keeps_only_last_four_turns() {
    let svc = Arc::new(ScriptedService::new());
    let gw = gateway(&svc);
    let history = vec![
      ChatMessage::user("q1"),
      ChatMessage::assistant("a1"),
      ChatMessage::user("q2"),
      ChatMessage::assistant("a2"),
      ChatMessage::user("q3"),
      ChatMessage::assistant("a3"),
    ];
    let p = gw.ask_prompt("Hovercraft", "How wide should the skirt be?", &history);
    assert!(!p.contains("Student: q1"));
    assert!(!p.contains("Coach: a1"));
    assert!(p.contains("Student: q2\nCoach: a2\nStudent: q3\nCoach: a3"));
    assert!(p.contains("A student asks: \"How wide should the skirt be?\""));
    assert!(p.contains("official rules"));
  }

  #[test]
  fn ask_prompt_without_history_has_no_context_block() {
    let svc = Arc::new(ScriptedService::new());
    let p = gateway(&svc).ask_prompt("Hovercraft", "Why?", &[]);
    assert!(!p.contains("Previous conversation context"));
  }

  #[test]
  fn quiz_prompt_sizes() {
    let svc = Arc::new(ScriptedService::new());
    let gw = gateway(&svc);
    assert!(gw.quiz_prompt("Hovercraft", Some("Pressure")).starts_with("Create a 3-question"));
    let full = gw.quiz_prompt("Hovercraft", None);
    assert!(full.starts_with("Create a 10-question"));
    assert!(full.contains("ALL major concepts of \"Hovercraft\""));
  }

  #[test]
  fn quiz_schema_requires_all_fields() {
    let schema = quiz_schema();
    let required = &schema["properties"]["questions"]["items"]["required"];
    assert_eq!(required, &json!(["question", "options", "correctAnswer", "explanation"]));
  }

  #[tokio::test]
  async fn explain_returns_generated_text() {
    let svc = Arc::new(ScriptedService::new());
    svc.push_text(Ok("  <p>Lift!</p>\n".into()));
    let out = gateway(&svc).explain_concept("Hovercraft", "Lift", AnalogyStyle::Default).await;
    assert_eq!(out, AiText::Generated("<p>Lift!</p>".into()));
  }

  #[tokio::test]
  async fn explain_falls_back_on_empty_and_on_error() {
    let svc = Arc::new(ScriptedService::new());
    svc.push_text(Ok("   ".into()));
    svc.push_text(Err(GatewayError::Http("connection reset".into())));
    let gw = gateway(&svc);
    let empty = gw.explain_concept("Hovercraft", "Lift", AnalogyStyle::Dance).await;
    assert_eq!(empty, AiText::Fallback(EXPLAIN_EMPTY.into()));
    let failed = gw.explain_concept("Hovercraft", "Lift", AnalogyStyle::Dance).await;
    assert_eq!(failed, AiText::Fallback(EXPLAIN_FAILED.into()));
    assert!(failed.is_fallback());
  }

  #[tokio::test]
  async fn ask_falls_back_on_error() {
    let svc = Arc::new(ScriptedService::new());
    svc.push_text(Err(GatewayError::Status { status: 500, message: "boom".into() }));
    svc.push_text(Ok(String::new()));
    let gw = gateway(&svc);
    assert_eq!(gw.ask_question("Hovercraft", "Why?", &[]).await.text(), ASK_FAILED);
    assert_eq!(gw.ask_question("Hovercraft", "Why?", &[]).await.text(), ASK_EMPTY);
  }

  #[tokio::test]
  async fn quiz_parses_questions() {
    let svc = Arc::new(ScriptedService::new());
    svc.push_json(Ok(quiz_json(3)));
    let qs = gateway(&svc).generate_quiz("Hovercraft", Some("Pressure")).await;
    assert_eq!(qs.len(), 3);
    assert_eq!(qs[0].correct_answer, "B");
    assert_eq!(qs[2].options.len(), 4);
  }

  #[tokio::test]
  async fn quiz_failures_yield_empty() {
    let svc = Arc::new(ScriptedService::new());
    svc.push_json(Ok(json!({ "questions": "not a list" })));
    svc.push_json(Ok(json!({})));
    svc.push_json(Err(GatewayError::Decode("bad json".into())));
    let gw = gateway(&svc);
    assert!(gw.generate_quiz("Hovercraft", None).await.is_empty());
    assert!(gw.generate_quiz("Hovercraft", None).await.is_empty());
    assert!(gw.generate_quiz("Hovercraft", None).await.is_empty());
  }

  #[tokio::test]
  async fn quiz_drops_questions_without_options() {
    let svc = Arc::new(ScriptedService::new());
    svc.push_json(Ok(json!({ "questions": [
      { "question": "Q?", "options": [], "correctAnswer": "A", "explanation": "-" },
      { "question": "Q2?", "options": ["A", "B", "C", "D"], "correctAnswer": "A", "explanation": "-" }
    ]})));
    let qs = gateway(&svc).generate_quiz("Hovercraft", None).await;
    assert_eq!(qs.len(), 1);
    assert_eq!(qs[0].question, "Q2?");
  }

  #[tokio::test]
  async fn plan_parses_and_remints_task_ids() {
    let svc = Arc::new(ScriptedService::new());
    svc.push_json(Ok(plan_json(4)));
    let topics = vec!["Hovercraft".to_string(), "Optics".to_string()];
    let gw = gateway(&svc);
    let plan = gw.generate_weekly_plan("April 15th", &topics).await;
    assert_eq!(plan.len(), 4);
    assert_eq!(plan[0].week_number, 1);
    assert!(plan.iter().flat_map(|w| &w.tasks).all(|t| t.id != "t1" && t.id != "t2"));
    let prompt = &svc.prompts()[0];
    assert!(prompt.contains("competition on April 15th"));
    assert!(prompt.contains("My topics are: Hovercraft, Optics."));
  }

  #[tokio::test]
  async fn plan_with_unknown_task_type_is_rejected() {
    let svc = Arc::new(ScriptedService::new());
    svc.push_json(Ok(json!([{ "weekNumber": 1, "focus": "x", "tasks": [{ "id": "a", "title": "b", "completed": false, "type": "nap" }] }])));
    assert!(gateway(&svc).generate_weekly_plan("April 15th", &[]).await.is_empty());
  }

  #[tokio::test]
  async fn disabled_service_serves_fallbacks() {
    let gw = AiGateway::new(Arc::new(DisabledService), Prompts::default());
    assert_eq!(gw.explain_concept("H", "C", AnalogyStyle::Default).await.text(), EXPLAIN_FAILED);
    assert!(gw.generate_quiz("H", None).await.is_empty());
    assert!(gw.generate_weekly_plan("d", &[]).await.is_empty());
  }
}

//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Dispatching client actions onto a connection's `Session`
//!   - Running gateway calls off the session lock and applying their results
//!   - Stateless one-shot helpers behind the HTTP API
//!
//! Session mutations happen under the lock; model calls never do. Every
//! background result is re-checked by the session (`apply_*`) before it lands,
//! and dropped outright once the connection's outbox is closed.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, instrument};

use crate::domain::{AnalogyStyle, ChatMessage, QuizQuestion, Topic, WeekPlan};
use crate::gateway::AiText;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::session::{ChatRequest, ExplainRequest, PlanRequest, QuizRequest, Session, SessionError};
use crate::state::AppState;
use crate::util::preview;
use crate::views::build_view;

pub type SharedSession = Arc<Mutex<Session>>;
pub type Outbox = mpsc::UnboundedSender<ServerWsMessage>;

/// Serialize the current session into a view and queue it. False once the socket is gone.
pub async fn push_view(session: &SharedSession, out: &Outbox) -> bool {
  let view = build_view(&*session.lock().await);
  out.send(ServerWsMessage::View { view }).is_ok()
}

fn send_error(out: &Outbox, e: impl std::fmt::Display) {
  let _ = out.send(ServerWsMessage::error(e.to_string()));
}

/// Apply one client action. Replies (views, errors, completion notices) go to `out`;
/// model-backed work is spawned and pushes its own view when it lands.
#[instrument(level = "info", skip(state, session, out, msg))]
pub async fn handle_client_message(state: &AppState, session: &SharedSession, out: &Outbox, msg: ClientWsMessage) {
  match msg {
    ClientWsMessage::Ping => {
      let _ = out.send(ServerWsMessage::Pong);
      return;
    }

    ClientWsMessage::Refresh => {}

    ClientWsMessage::SwitchTab { tab } => session.lock().await.switch_tab(tab),

    ClientWsMessage::SelectTopic { topic_id } => {
      if let Err(e) = session.lock().await.select_topic(&topic_id) {
        send_error(out, e);
        return;
      }
    }

    ClientWsMessage::Back => session.lock().await.back(),

    ClientWsMessage::SetSearch { query } => session.lock().await.set_search(&query),

    ClientWsMessage::SetAnalogy { analogy } => {
      let req = session.lock().await.set_analogy(analogy);
      push_view(session, out).await;
      if let Some(req) = req {
        tokio::spawn(explain_task(state.clone(), session.clone(), out.clone(), req));
      }
      return;
    }

    ClientWsMessage::ToggleConcept { concept } => {
      let req = session.lock().await.toggle_concept(&concept);
      match req {
        Ok(req) => {
          push_view(session, out).await;
          if let Some(req) = req {
            tokio::spawn(explain_task(state.clone(), session.clone(), out.clone(), req));
          }
        }
        Err(e) => send_error(out, e),
      }
      return;
    }

    ClientWsMessage::Ask { text } => {
      let req = session.lock().await.ask(&text);
      match req {
        Ok(req) => {
          push_view(session, out).await;
          tokio::spawn(chat_task(state.clone(), session.clone(), out.clone(), req));
        }
        Err(e) => send_error(out, e),
      }
      return;
    }

    ClientWsMessage::StartQuiz { concept } => {
      let req = session.lock().await.start_quiz(concept);
      match req {
        Ok(req) => {
          push_view(session, out).await;
          tokio::spawn(quiz_task(state.clone(), session.clone(), out.clone(), req));
        }
        Err(e) => send_error(out, e),
      }
      return;
    }

    ClientWsMessage::AnswerQuiz { option } => {
      let verdict = session.lock().await.answer_quiz(&option);
      debug!(target: "quiz", ?verdict, "Quiz answer");
    }

    ClientWsMessage::NextQuestion => {
      let reward = session.lock().await.next_question();
      if let Some(r) = reward {
        let _ = out.send(ServerWsMessage::quiz_complete(r.score, r.xp_gained));
      }
    }

    ClientWsMessage::QuitQuiz => {
      if session.lock().await.quit_quiz() {
        info!(target: "quiz", "Quiz quit without reward");
      }
    }

    ClientWsMessage::GeneratePlan => {
      let req = session.lock().await.begin_plan(&state.plan);
      match req {
        Ok(req) => {
          push_view(session, out).await;
          tokio::spawn(plan_task(state.clone(), session.clone(), out.clone(), req));
        }
        Err(e) => send_error(out, e),
      }
      return;
    }
  }
  push_view(session, out).await;
}

// -------- Background tasks --------

pub(crate) async fn explain_task(state: AppState, session: SharedSession, out: Outbox, req: ExplainRequest) {
  let (concept, analogy) = &req.key;
  let text = state.gateway.explain_concept(&req.topic_title, concept, *analogy).await;
  if out.is_closed() {
    debug!(target: "coach_backend", %concept, "Connection gone; dropping explanation");
    return;
  }
  {
    let mut s = session.lock().await;
    s.apply_explanation(req.key, text.into_text());
    debug!(target: "coach_backend", session = %s.id, cached = s.cached_explanations(), "Explanation cached");
  }
  push_view(&session, &out).await;
}

pub(crate) async fn chat_task(state: AppState, session: SharedSession, out: Outbox, req: ChatRequest) {
  let answer = state.gateway.ask_question(&req.topic_title, &req.question, &req.history).await;
  if out.is_closed() {
    return;
  }
  let applied = session.lock().await.apply_answer(req.epoch, answer.into_text());
  if applied {
    push_view(&session, &out).await;
  }
}

pub(crate) async fn quiz_task(state: AppState, session: SharedSession, out: Outbox, req: QuizRequest) {
  let questions = state.gateway.generate_quiz(&req.topic_title, req.concept.as_deref()).await;
  if out.is_closed() {
    return;
  }
  let applied = session.lock().await.apply_quiz(req.token, questions);
  if applied {
    push_view(&session, &out).await;
  }
}

pub(crate) async fn plan_task(state: AppState, session: SharedSession, out: Outbox, req: PlanRequest) {
  let weeks = state.gateway.generate_weekly_plan(&req.event_date, &req.topics).await;
  if out.is_closed() {
    return;
  }
  let count = weeks.len();
  if session.lock().await.apply_plan(req.token, weeks) {
    info!(target: "coach_backend", weeks = count, "Weekly plan applied");
    push_view(&session, &out).await;
  }
}

// -------- Stateless helpers (HTTP API) --------

fn interactive_topic<'a>(state: &'a AppState, topic_id: &str) -> Result<&'a Topic, SessionError> {
  let topic = state
    .catalog
    .get(topic_id)
    .ok_or_else(|| SessionError::UnknownTopic(topic_id.to_string()))?;
  if !state.catalog.is_enabled(topic) {
    return Err(SessionError::TopicDisabled(topic.title.clone()));
  }
  Ok(topic)
}

fn known_concept(topic: &Topic, concept: &str) -> Result<(), SessionError> {
  if topic.concepts.iter().any(|c| c == concept) {
    Ok(())
  } else {
    Err(SessionError::UnknownConcept(concept.to_string()))
  }
}

#[instrument(level = "info", skip(state))]
pub async fn explain_once(state: &AppState, topic_id: &str, concept: &str, analogy: AnalogyStyle) -> Result<AiText, SessionError> {
  let topic = interactive_topic(state, topic_id)?;
  known_concept(topic, concept)?;
  Ok(state.gateway.explain_concept(&topic.title, concept, analogy).await)
}

#[instrument(level = "info", skip(state, question, history), fields(question_len = question.len(), history_len = history.len()))]
pub async fn answer_once(state: &AppState, topic_id: &str, question: &str, history: &[ChatMessage]) -> Result<AiText, SessionError> {
  let question = question.trim();
  if question.is_empty() {
    return Err(SessionError::EmptyQuestion);
  }
  let topic = interactive_topic(state, topic_id)?;
  debug!(target: "coach_backend", question = %preview(question, 60), "HTTP ask");
  Ok(state.gateway.ask_question(&topic.title, question, history).await)
}

#[instrument(level = "info", skip(state))]
pub async fn quiz_once(state: &AppState, topic_id: &str, concept: Option<&str>) -> Result<Vec<QuizQuestion>, SessionError> {
  let topic = interactive_topic(state, topic_id)?;
  if let Some(c) = concept {
    known_concept(topic, c)?;
  }
  let questions = state.gateway.generate_quiz(&topic.title, concept).await;
  if questions.is_empty() {
    error!(target: "quiz", %topic_id, "Quiz generation returned no questions");
  }
  Ok(questions)
}

/// Plan over explicit topics, or the configured default (first catalog titles).
#[instrument(level = "info", skip(state, topics))]
pub async fn plan_once(state: &AppState, event_date: Option<String>, topics: Option<Vec<String>>) -> Vec<WeekPlan> {
  let event_date = event_date.unwrap_or_else(|| state.plan.event_date.clone());
  let topics = topics
    .filter(|t| !t.is_empty())
    .unwrap_or_else(|| state.catalog.first_titles(state.plan.max_topics));
  state.gateway.generate_weekly_plan(&event_date, &topics).await
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use serde_json::json;

  use super::*;
  use crate::catalog::Catalog;
  use crate::config::CoachConfig;
  use crate::domain::{Category, Difficulty, Tab};
  use crate::gateway::testing::{plan_json, quiz_json, ScriptedService};
  use crate::gateway::GatewayError;
  use crate::quiz::QuizPhase;
  use crate::views::{AppView, Screen};

  const PRESSURE: &str = "Pressure (Force/Area)";

  struct Harness {
    svc: Arc<ScriptedService>,
    state: AppState,
    session: SharedSession,
    out: Outbox,
    rx: mpsc::UnboundedReceiver<ServerWsMessage>,
  }

  impl Harness {
    fn with_catalog(catalog: Catalog) -> Self {
      let svc = Arc::new(ScriptedService::new());
      let state = AppState::with_service(catalog, svc.clone(), CoachConfig::default());
      let session = Arc::new(Mutex::new(state.new_session()));
      let (out, rx) = mpsc::unbounded_channel();
      Self { svc, state, session, out, rx }
    }

    fn new() -> Self {
      Self::with_catalog(Catalog::division_b())
    }

    async fn send(&self, msg: ClientWsMessage) {
      handle_client_message(&self.state, &self.session, &self.out, msg).await;
    }

    async fn next(&mut self) -> ServerWsMessage {
      self.rx.recv().await.expect("outbox open")
    }

    async fn view(&mut self) -> AppView {
      match self.next().await {
        ServerWsMessage::View { view } => view,
        other => panic!("expected view, got {other:?}"),
      }
    }

    async fn select(&mut self, id: &str) {
      self.send(ClientWsMessage::SelectTopic { topic_id: id.into() }).await;
      self.view().await;
    }

    /// Expand a concept and wait for both the loading and the loaded snapshot.
    async fn expand_and_load(&mut self, concept: &str) {
      self.send(ClientWsMessage::ToggleConcept { concept: concept.into() }).await;
      self.view().await;
      self.view().await;
    }
  }

  fn topic(id: &str, title: &str, concepts: &[&str]) -> Topic {
    Topic {
      id: id.into(),
      title: title.into(),
      category: Category::Physical,
      difficulty: Difficulty::Beginner,
      progress: 0,
      description: String::new(),
      base_summary: None,
      ai_summary: None,
      concepts: concepts.iter().map(|c| c.to_string()).collect(),
    }
  }

  #[tokio::test]
  async fn ping_gets_pong_without_view() {
    let mut h = Harness::new();
    h.send(ClientWsMessage::Ping).await;
    assert!(matches!(h.next().await, ServerWsMessage::Pong));
    assert!(h.rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn repeated_expansion_calls_the_model_once() {
    let mut h = Harness::new();
    h.select("t0").await;
    h.expand_and_load(PRESSURE).await;

    h.send(ClientWsMessage::ToggleConcept { concept: PRESSURE.into() }).await;
    h.view().await;
    h.send(ClientWsMessage::ToggleConcept { concept: PRESSURE.into() }).await;
    let view = h.view().await;

    assert_eq!(h.svc.text_calls(), 1);
    let Screen::TopicDetail(detail) = view.screen else { panic!("expected detail") };
    let row = detail.concepts.iter().find(|c| c.name == PRESSURE).expect("row");
    assert_eq!(row.explanation_html.as_deref(), Some("<p>answer 1</p>"));
  }

  #[tokio::test]
  async fn analogy_switch_fetches_new_key_once_and_reuses_old() {
    let mut h = Harness::new();
    h.select("t0").await;
    h.expand_and_load(PRESSURE).await;

    h.send(ClientWsMessage::SetAnalogy { analogy: AnalogyStyle::Sports }).await;
    h.view().await;
    h.view().await;
    assert_eq!(h.svc.text_calls(), 2);
    assert!(h.svc.prompts()[1].contains("\"Sports\" analogy"));

    h.send(ClientWsMessage::SetAnalogy { analogy: AnalogyStyle::Default }).await;
    let view = h.view().await;
    assert_eq!(h.svc.text_calls(), 2);
    let Screen::TopicDetail(detail) = view.screen else { panic!("expected detail") };
    let row = detail.concepts.iter().find(|c| c.name == PRESSURE).expect("row");
    assert_eq!(row.explanation_html.as_deref(), Some("<p>answer 1</p>"));
  }

  #[tokio::test]
  async fn topic_switch_resets_search_and_chat_but_reuses_shared_concepts() {
    let catalog = Catalog::from_topics(
      vec![topic("a", "Alpha", &["Energy", "Gears"]), topic("b", "Beta", &["Energy", "Levers"])],
      &["Alpha", "Beta"],
    );
    let mut h = Harness::with_catalog(catalog);
    h.select("a").await;
    h.expand_and_load("Energy").await;

    h.send(ClientWsMessage::SetSearch { query: "ener".into() }).await;
    h.view().await;
    h.send(ClientWsMessage::Ask { text: "What is energy?".into() }).await;
    h.view().await;
    h.view().await;
    assert_eq!(h.svc.text_calls(), 2);

    h.select("b").await;
    h.send(ClientWsMessage::ToggleConcept { concept: "Energy".into() }).await;
    let view = h.view().await;
    assert_eq!(h.svc.text_calls(), 2);

    let Screen::TopicDetail(detail) = view.screen else { panic!("expected detail") };
    assert_eq!(detail.title, "Beta");
    assert_eq!(detail.search_query, "");
    assert!(detail.chat.is_empty());
    assert_eq!(detail.concepts.len(), 2);
    let energy = detail.concepts.iter().find(|c| c.name == "Energy").expect("row");
    assert_eq!(energy.explanation_html.as_deref(), Some("<p>answer 1</p>"));
  }

  #[tokio::test]
  async fn chat_round_trip_uses_prior_history() {
    let mut h = Harness::new();
    h.select("t0").await;
    h.svc.push_text(Ok("<p>It floats on air.</p>".into()));
    h.send(ClientWsMessage::Ask { text: "How does it hover?".into() }).await;
    let pending = h.view().await;
    let Screen::TopicDetail(detail) = pending.screen else { panic!("expected detail") };
    assert!(detail.chat_pending);

    let done = h.view().await;
    let Screen::TopicDetail(detail) = done.screen else { panic!("expected detail") };
    assert!(!detail.chat_pending);
    assert_eq!(detail.chat[1].text, "<p>It floats on air.</p>");
    assert!(!h.svc.prompts()[0].contains("Previous conversation context"));
  }

  #[tokio::test]
  async fn failed_chat_call_appends_fallback() {
    let mut h = Harness::new();
    h.select("t0").await;
    h.svc.push_text(Err(GatewayError::Http("connection refused".into())));
    h.send(ClientWsMessage::Ask { text: "Hello?".into() }).await;
    h.view().await;
    let Screen::TopicDetail(detail) = h.view().await.screen else { panic!("expected detail") };
    assert_eq!(detail.chat[1].text, crate::gateway::ASK_FAILED);
  }

  #[tokio::test]
  async fn disabled_topic_actions_report_errors() {
    let mut h = Harness::new();
    h.select("t16").await;
    h.send(ClientWsMessage::StartQuiz { concept: None }).await;
    match h.next().await {
      ServerWsMessage::Error { message } => assert_eq!(message, "Optics is not available yet"),
      other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(h.svc.json_calls(), 0);
  }

  #[tokio::test]
  async fn unknown_topic_reports_error() {
    let mut h = Harness::new();
    h.send(ClientWsMessage::SelectTopic { topic_id: "zz".into() }).await;
    assert!(matches!(h.next().await, ServerWsMessage::Error { .. }));
  }

  #[tokio::test]
  async fn full_topic_quiz_awards_xp_and_streak() {
    let mut h = Harness::new();
    h.select("t0").await;
    h.svc.push_json(Ok(quiz_json(2)));
    h.send(ClientWsMessage::StartQuiz { concept: None }).await;
    let Screen::Quiz(q) = h.view().await.screen else { panic!("expected quiz") };
    assert_eq!(q.phase, QuizPhase::Loading);
    let Screen::Quiz(q) = h.view().await.screen else { panic!("expected quiz") };
    assert_eq!(q.phase, QuizPhase::Active);

    h.send(ClientWsMessage::AnswerQuiz { option: "B".into() }).await;
    h.view().await;
    h.send(ClientWsMessage::AnswerQuiz { option: "C".into() }).await;
    let Screen::Quiz(q) = h.view().await.screen else { panic!("expected quiz") };
    assert_eq!(q.score, 1);

    h.send(ClientWsMessage::NextQuestion).await;
    h.view().await;
    h.send(ClientWsMessage::AnswerQuiz { option: "A".into() }).await;
    h.view().await;
    h.send(ClientWsMessage::NextQuestion).await;
    match h.next().await {
      ServerWsMessage::QuizComplete { score, xp_gained, message } => {
        assert_eq!((score, xp_gained), (1, 50));
        assert_eq!(message, "Quiz Complete! You earned 50 XP!");
      }
      other => panic!("expected completion, got {other:?}"),
    }
    let view = h.view().await;
    assert_eq!(view.tab, Tab::Learn);
    assert!(matches!(view.screen, Screen::TopicDetail(_)));
    let s = h.session.lock().await;
    assert_eq!(s.user().xp, 1300);
    assert_eq!(s.user().streak, 6);
  }

  #[tokio::test]
  async fn empty_quiz_fails_and_quit_awards_nothing() {
    let mut h = Harness::new();
    h.select("t0").await;
    h.send(ClientWsMessage::StartQuiz { concept: Some(PRESSURE.into()) }).await;
    h.view().await;
    let Screen::Quiz(q) = h.view().await.screen else { panic!("expected quiz") };
    assert_eq!(q.phase, QuizPhase::Failed);
    assert!(q.question.is_none());

    h.send(ClientWsMessage::QuitQuiz).await;
    let view = h.view().await;
    assert!(matches!(view.screen, Screen::TopicDetail(_)));
    assert_eq!(h.session.lock().await.user().xp, 1250);
  }

  #[tokio::test]
  async fn plan_regeneration_replaces_task_identities() {
    let mut h = Harness::new();
    h.svc.push_json(Ok(plan_json(4)));
    h.svc.push_json(Ok(plan_json(4)));
    h.send(ClientWsMessage::SwitchTab { tab: Tab::Plan }).await;
    h.view().await;

    h.send(ClientWsMessage::GeneratePlan).await;
    h.view().await;
    let Screen::Plan(first) = h.view().await.screen else { panic!("expected plan") };
    assert_eq!(first.weeks.len(), 4);
    assert_eq!(first.button_label, "Regenerate");

    h.send(ClientWsMessage::GeneratePlan).await;
    h.view().await;
    let Screen::Plan(second) = h.view().await.screen else { panic!("expected plan") };

    let old: HashSet<String> = first.weeks.iter().flat_map(|w| w.tasks.iter().map(|t| t.id.clone())).collect();
    assert!(second.weeks.iter().flat_map(|w| &w.tasks).all(|t| !old.contains(&t.id)));
    assert!(h.svc.prompts()[0].contains("April 15th"));
  }

  #[tokio::test]
  async fn results_for_a_closed_connection_are_dropped() {
    let h = Harness::new();
    h.session.lock().await.select_topic("t0").expect("topic");
    let req = h.session.lock().await.toggle_concept(PRESSURE).expect("enabled").expect("fetch");
    let Harness { state, session, out, rx, .. } = h;
    drop(rx);
    explain_task(state, session.clone(), out, req).await;
    assert_eq!(session.lock().await.cached_explanations(), 0);
  }

  #[tokio::test]
  async fn http_helpers_validate_topic_and_concept() {
    let h = Harness::new();
    assert_eq!(
      explain_once(&h.state, "t16", "Scoring", AnalogyStyle::Default).await.unwrap_err(),
      SessionError::TopicDisabled("Optics".into())
    );
    assert_eq!(
      quiz_once(&h.state, "t0", Some("Scoring")).await.unwrap_err(),
      SessionError::UnknownConcept("Scoring".into())
    );
    assert_eq!(answer_once(&h.state, "t0", "  ", &[]).await.unwrap_err(), SessionError::EmptyQuestion);

    let text = explain_once(&h.state, "t0", PRESSURE, AnalogyStyle::Cooking).await.expect("explain");
    assert!(!text.is_fallback());
    assert_eq!(h.svc.text_calls(), 1);
  }

  #[tokio::test]
  async fn plan_once_defaults_to_configured_topics() {
    let h = Harness::new();
    h.svc.push_json(Ok(json!([])));
    let weeks = plan_once(&h.state, None, None).await;
    assert!(weeks.is_empty());
    let prompt = &h.svc.prompts()[0];
    assert!(prompt.contains("Hovercraft, Air Trajectory, Anatomy & Physiology"));
  }
}

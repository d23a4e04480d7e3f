//! Per-connection session state: profile, navigation, per-topic learning state,
//! explanation cache, chat transcript, quiz and weekly plan.
//!
//! Mutators never call the gateway. Actions that need the model return a
//! request value (`ExplainRequest`, `ChatRequest`, ...) carrying whatever
//! token is needed to recognize a stale result; the caller performs the call
//! and hands the result back through the matching `apply_*` method.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::catalog::{mock_user, Catalog};
use crate::config::PlanSettings;
use crate::domain::{AnalogyStyle, ChatMessage, QuizQuestion, Tab, Topic, User, WeekPlan};
use crate::quiz::{Advance, QuizSession};

/// Explanation cache key.
pub type ExplanationKey = (String, AnalogyStyle);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),
    #[error("No topic selected")]
    NoTopicSelected,
    #[error("{0} is not available yet")]
    TopicDisabled(String),
    #[error("Unknown concept: {0}")]
    UnknownConcept(String),
    #[error("Question is empty")]
    EmptyQuestion,
    #[error("Still answering the previous question")]
    ChatBusy,
    #[error("A plan is already being generated")]
    PlanBusy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplainRequest {
    pub key: ExplanationKey,
    pub topic_title: String,
}

#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub epoch: u64,
    pub topic_title: String,
    pub question: String,
    /// Transcript before the new question.
    pub history: Vec<ChatMessage>,
}

#[derive(Clone, Debug)]
pub struct QuizRequest {
    pub token: u64,
    pub topic_title: String,
    pub concept: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PlanRequest {
    pub token: u64,
    pub event_date: String,
    pub topics: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuizReward {
    pub score: u32,
    pub xp_gained: u32,
}

pub struct Session {
    pub id: String,
    catalog: Arc<Catalog>,
    user: User,
    tab: Tab,
    selected_topic: Option<String>,
    recent_topic: Option<String>,
    analogy: AnalogyStyle,
    expanded_concept: Option<String>,
    explanations: HashMap<ExplanationKey, String>,
    explanations_in_flight: HashSet<ExplanationKey>,
    search_query: String,
    chat: Vec<ChatMessage>,
    chat_pending: bool,
    // Bumped whenever the selected topic changes; chat answers carry it.
    topic_epoch: u64,
    quiz: Option<QuizSession>,
    plan: Vec<WeekPlan>,
    plan_in_flight: Option<u64>,
    next_token: u64,
}

impl Session {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            catalog,
            user: mock_user(),
            tab: Tab::Home,
            selected_topic: None,
            recent_topic: None,
            analogy: AnalogyStyle::Default,
            expanded_concept: None,
            explanations: HashMap::new(),
            explanations_in_flight: HashSet::new(),
            search_query: String::new(),
            chat: Vec::new(),
            chat_pending: false,
            topic_epoch: 0,
            quiz: None,
            plan: Vec::new(),
            plan_in_flight: None,
            next_token: 0,
        }
    }

    fn mint_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    // --- Read access for views ---

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn selected_topic(&self) -> Option<&Topic> {
        self.selected_topic.as_deref().and_then(|id| self.catalog.get(id))
    }

    pub fn recent_topic(&self) -> Option<&Topic> {
        self.recent_topic.as_deref().and_then(|id| self.catalog.get(id))
    }

    pub fn analogy(&self) -> AnalogyStyle {
        self.analogy
    }

    pub fn expanded_concept(&self) -> Option<&str> {
        self.expanded_concept.as_deref()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn chat_pending(&self) -> bool {
        self.chat_pending
    }

    pub fn quiz(&self) -> Option<&QuizSession> {
        self.quiz.as_ref()
    }

    pub fn plan(&self) -> &[WeekPlan] {
        &self.plan
    }

    pub fn plan_loading(&self) -> bool {
        self.plan_in_flight.is_some()
    }

    /// Cached explanation for `concept` under the current analogy.
    pub fn explanation_for(&self, concept: &str) -> Option<&str> {
        self.explanations
            .get(&(concept.to_string(), self.analogy))
            .map(String::as_str)
    }

    pub fn explanation_loading(&self, concept: &str) -> bool {
        self.explanations_in_flight
            .contains(&(concept.to_string(), self.analogy))
    }

    pub fn cached_explanations(&self) -> usize {
        self.explanations.len()
    }

    // --- Navigation ---

    pub fn switch_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    /// Select a topic and jump to the learn tab. Switching to a different
    /// topic resets the per-topic fields; the explanation cache is kept.
    #[instrument(level = "debug", skip(self), fields(session = %self.id))]
    pub fn select_topic(&mut self, topic_id: &str) -> Result<(), SessionError> {
        if self.catalog.get(topic_id).is_none() {
            return Err(SessionError::UnknownTopic(topic_id.to_string()));
        }
        if self.selected_topic.as_deref() != Some(topic_id) {
            self.reset_topic_state();
            debug!(target: "coach_backend", %topic_id, epoch = self.topic_epoch, "Topic switched; per-topic state reset");
        }
        self.selected_topic = Some(topic_id.to_string());
        self.recent_topic = Some(topic_id.to_string());
        self.tab = Tab::Learn;
        Ok(())
    }

    /// Leave the topic detail; the learn tab falls back to the topic list.
    pub fn back(&mut self) {
        if self.selected_topic.take().is_some() {
            self.topic_epoch += 1;
            self.chat_pending = false;
        }
    }

    fn reset_topic_state(&mut self) {
        self.expanded_concept = None;
        self.search_query.clear();
        self.chat.clear();
        self.chat_pending = false;
        self.topic_epoch += 1;
    }

    fn interactive_topic(&self) -> Result<&Topic, SessionError> {
        let topic = self.selected_topic().ok_or(SessionError::NoTopicSelected)?;
        if !self.catalog.is_enabled(topic) {
            return Err(SessionError::TopicDisabled(topic.title.clone()));
        }
        Ok(topic)
    }

    // --- Concepts & explanations ---

    pub fn set_search(&mut self, query: &str) {
        self.search_query = query.to_string();
    }

    /// Change the analogy; fetch only if a concept is expanded and the new key is uncached.
    pub fn set_analogy(&mut self, analogy: AnalogyStyle) -> Option<ExplainRequest> {
        self.analogy = analogy;
        let concept = self.expanded_concept.clone()?;
        self.request_explanation(&concept)
    }

    /// Expand (or collapse, if already expanded) a concept of the selected topic.
    pub fn toggle_concept(&mut self, concept: &str) -> Result<Option<ExplainRequest>, SessionError> {
        if self.expanded_concept.as_deref() == Some(concept) {
            self.expanded_concept = None;
            return Ok(None);
        }
        let topic = self.interactive_topic()?;
        if !topic.concepts.iter().any(|c| c == concept) {
            return Err(SessionError::UnknownConcept(concept.to_string()));
        }
        self.expanded_concept = Some(concept.to_string());
        Ok(self.request_explanation(concept))
    }

    /// Issue a fetch unless the key is cached or already in flight.
    fn request_explanation(&mut self, concept: &str) -> Option<ExplainRequest> {
        let key: ExplanationKey = (concept.to_string(), self.analogy);
        if self.explanations.contains_key(&key) || self.explanations_in_flight.contains(&key) {
            return None;
        }
        let topic_title = self.selected_topic()?.title.clone();
        self.explanations_in_flight.insert(key.clone());
        Some(ExplainRequest { key, topic_title })
    }

    /// Store a fetched explanation. The cache is session-wide, so a result
    /// that lands after a topic switch is still kept under its key.
    pub fn apply_explanation(&mut self, key: ExplanationKey, text: String) {
        self.explanations_in_flight.remove(&key);
        self.explanations.insert(key, text);
    }

    // --- Chat ---

    pub fn ask(&mut self, question: &str) -> Result<ChatRequest, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        let topic_title = self.interactive_topic()?.title.clone();
        if self.chat_pending {
            return Err(SessionError::ChatBusy);
        }
        let history = self.chat.clone();
        self.chat.push(ChatMessage::user(question));
        self.chat_pending = true;
        Ok(ChatRequest { epoch: self.topic_epoch, topic_title, question: question.to_string(), history })
    }

    /// Append an answer unless the topic changed since the question was asked.
    pub fn apply_answer(&mut self, epoch: u64, text: String) -> bool {
        if epoch != self.topic_epoch {
            debug!(target: "coach_backend", epoch, current = self.topic_epoch, "Discarding stale chat answer");
            return false;
        }
        self.chat.push(ChatMessage::assistant(text));
        self.chat_pending = false;
        true
    }

    // --- Quiz ---

    /// Open a quiz for the selected topic (optionally scoped to one concept).
    /// Any quiz already open is replaced.
    pub fn start_quiz(&mut self, concept: Option<String>) -> Result<QuizRequest, SessionError> {
        let topic = self.interactive_topic()?;
        if let Some(c) = &concept {
            if !topic.concepts.iter().any(|x| x == c) {
                return Err(SessionError::UnknownConcept(c.clone()));
            }
        }
        let (topic_id, topic_title) = (topic.id.clone(), topic.title.clone());
        let token = self.mint_token();
        self.quiz = Some(QuizSession::loading(token, topic_id, topic_title.clone(), concept.clone()));
        info!(target: "quiz", session = %self.id, token, scoped = concept.is_some(), "Quiz opened");
        Ok(QuizRequest { token, topic_title, concept })
    }

    /// Feed generated questions to the quiz that asked for them.
    pub fn apply_quiz(&mut self, token: u64, questions: Vec<QuizQuestion>) -> bool {
        match self.quiz.as_mut() {
            Some(q) if q.token == token => {
                let phase = q.load(questions);
                info!(target: "quiz", session = %self.id, token, ?phase, "Quiz loaded");
                true
            }
            _ => {
                debug!(target: "quiz", token, "Discarding stale quiz result");
                false
            }
        }
    }

    pub fn answer_quiz(&mut self, option: &str) -> Option<bool> {
        self.quiz.as_mut()?.select(option)
    }

    /// Forward action. On the last question the reward is applied and the quiz discarded.
    pub fn next_question(&mut self) -> Option<QuizReward> {
        let quiz = self.quiz.as_mut()?;
        match quiz.advance()? {
            Advance::Next => None,
            Advance::Complete { score } => {
                let xp_gained = quiz.xp_for(score);
                self.quiz = None;
                self.user.xp += xp_gained;
                self.user.streak += 1;
                info!(target: "quiz", session = %self.id, score, xp_gained, xp = self.user.xp, streak = self.user.streak, "Quiz complete");
                Some(QuizReward { score, xp_gained })
            }
        }
    }

    /// Exit without reward. Returns false when no quiz was open.
    pub fn quit_quiz(&mut self) -> bool {
        self.quiz.take().is_some()
    }

    // --- Weekly plan ---

    pub fn begin_plan(&mut self, settings: &PlanSettings) -> Result<PlanRequest, SessionError> {
        if self.plan_in_flight.is_some() {
            return Err(SessionError::PlanBusy);
        }
        let token = self.mint_token();
        self.plan_in_flight = Some(token);
        Ok(PlanRequest {
            token,
            event_date: settings.event_date.clone(),
            topics: self.catalog.first_titles(settings.max_topics),
        })
    }

    /// Replace the plan wholesale with the result of generation `token`.
    pub fn apply_plan(&mut self, token: u64, weeks: Vec<WeekPlan>) -> bool {
        if self.plan_in_flight != Some(token) {
            return false;
        }
        self.plan_in_flight = None;
        self.plan = weeks;
        true
    }
}

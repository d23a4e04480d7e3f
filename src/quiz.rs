//! Quiz session state machine.
//!
//! `Loading -> Active -> Feedback -> Active (next) | Complete`, with a terminal
//! `Failed` state when generation returns no questions. The machine is pure:
//! it never calls the gateway and never touches the user profile; the session
//! applies the reward it reports.

use serde::Serialize;

use crate::domain::QuizQuestion;

/// XP per correct answer.
pub const CONCEPT_XP_PER_POINT: u32 = 30;
pub const TOPIC_XP_PER_POINT: u32 = 50;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhase {
    Loading,
    Active,
    Feedback,
    Complete,
    Failed,
}

/// Outcome of pressing the forward button in `Feedback`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    Next,
    Complete { score: u32 },
}

#[derive(Clone, Debug)]
pub struct QuizSession {
    pub token: u64,
    pub topic_id: String,
    pub topic_title: String,
    pub concept: Option<String>,
    phase: QuizPhase,
    questions: Vec<QuizQuestion>,
    current: usize,
    selected: Option<String>,
    score: u32,
}

impl QuizSession {
    pub fn loading(token: u64, topic_id: String, topic_title: String, concept: Option<String>) -> Self {
        Self {
            token,
            topic_id,
            topic_title,
            concept,
            phase: QuizPhase::Loading,
            questions: Vec::new(),
            current: 0,
            selected: None,
            score: 0,
        }
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Only defined in `Active`/`Feedback`.
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        match self.phase {
            QuizPhase::Active | QuizPhase::Feedback => self.questions.get(self.current),
            _ => None,
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn show_feedback(&self) -> bool {
        self.phase == QuizPhase::Feedback
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn is_last_question(&self) -> bool {
        self.current + 1 >= self.questions.len()
    }

    pub fn is_concept_scoped(&self) -> bool {
        self.concept.is_some()
    }

    /// Loading -> Active, or Failed when nothing came back. Ignored outside Loading.
    pub fn load(&mut self, questions: Vec<QuizQuestion>) -> QuizPhase {
        if self.phase == QuizPhase::Loading {
            self.phase = if questions.is_empty() { QuizPhase::Failed } else { QuizPhase::Active };
            self.questions = questions;
        }
        self.phase
    }

    /// Pick an option. Returns whether it was correct, or None when the pick is
    /// ignored (not Active, or not one of the offered options).
    pub fn select(&mut self, option: &str) -> Option<bool> {
        if self.phase != QuizPhase::Active {
            return None;
        }
        let q = self.questions.get(self.current)?;
        if !q.options.iter().any(|o| o == option) {
            return None;
        }
        let correct = option == q.correct_answer;
        if correct {
            self.score += 1;
        }
        self.selected = Some(option.to_string());
        self.phase = QuizPhase::Feedback;
        Some(correct)
    }

    /// Forward action from Feedback. None when not in Feedback.
    pub fn advance(&mut self) -> Option<Advance> {
        if self.phase != QuizPhase::Feedback {
            return None;
        }
        if self.is_last_question() {
            self.phase = QuizPhase::Complete;
            Some(Advance::Complete { score: self.score })
        } else {
            self.current += 1;
            self.selected = None;
            self.phase = QuizPhase::Active;
            Some(Advance::Next)
        }
    }

    /// XP earned for `score` given this quiz's scope.
    pub fn xp_for(&self, score: u32) -> u32 {
        xp_reward(score, self.is_concept_scoped())
    }
}

pub fn xp_reward(score: u32, concept_scoped: bool) -> u32 {
    score * if concept_scoped { CONCEPT_XP_PER_POINT } else { TOPIC_XP_PER_POINT }
}

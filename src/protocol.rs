//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{AnalogyStyle, ChatMessage, QuizQuestion, Tab, Topic, WeekPlan};
use crate::views::AppView;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    SwitchTab {
        tab: Tab,
    },
    SelectTopic {
        #[serde(rename = "topicId")]
        topic_id: String,
    },
    Back,
    SetAnalogy {
        analogy: AnalogyStyle,
    },
    ToggleConcept {
        concept: String,
    },
    SetSearch {
        query: String,
    },
    Ask {
        text: String,
    },
    StartQuiz {
        #[serde(default)]
        concept: Option<String>,
    },
    AnswerQuiz {
        option: String,
    },
    NextQuestion,
    QuitQuiz,
    GeneratePlan,
    /// Ask for a fresh view snapshot.
    Refresh,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    View {
        view: AppView,
    },
    QuizComplete {
        score: u32,
        #[serde(rename = "xpGained")]
        xp_gained: u32,
        message: String,
    },
    Error {
        message: String,
    },
}

impl ServerWsMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerWsMessage::Error { message: message.into() }
    }

    pub fn quiz_complete(score: u32, xp_gained: u32) -> Self {
        ServerWsMessage::QuizComplete {
            score,
            xp_gained,
            message: format!("Quiz Complete! You earned {xp_gained} XP!"),
        }
    }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub ai: String,
}

/// Catalog entry as listed by `GET /topics`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicOut {
    #[serde(flatten)]
    pub topic: Topic,
    pub category_label: &'static str,
    pub enabled: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainIn {
    pub topic_id: String,
    pub concept: String,
    #[serde(default)]
    pub analogy: AnalogyStyle,
}
#[derive(Serialize)]
pub struct ExplainOut {
    pub html: String,
    pub fallback: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskIn {
    pub topic_id: String,
    pub question: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}
#[derive(Serialize)]
pub struct AskOut {
    pub html: String,
    pub fallback: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizIn {
    pub topic_id: String,
    #[serde(default)]
    pub concept: Option<String>,
}
#[derive(Serialize)]
pub struct QuizOut {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlanIn {
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
}
#[derive(Serialize)]
pub struct PlanOut {
    pub weeks: Vec<WeekPlan>,
}

//! View models pushed to the client. Built from `Session` + `Catalog` on every
//! state change; the client only renders them.
//!
//! An open quiz takes over the screen regardless of the active tab.

use serde::Serialize;

use crate::catalog::filter_concepts;
use crate::domain::{AnalogyStyle, ChatRole, Tab, TaskType, Topic};
use crate::quiz::{QuizPhase, QuizSession};
use crate::session::Session;

/// Streak indicator length on the home card.
pub const STREAK_DOTS: u32 = 5;

#[derive(Debug, Serialize)]
pub struct AppView {
    pub tab: Tab,
    pub nav: Vec<NavItem>,
    pub screen: Screen,
}

#[derive(Debug, Serialize)]
pub struct NavItem {
    pub tab: Tab,
    pub label: &'static str,
    pub active: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Screen {
    Home(HomeView),
    Topics(TopicListView),
    TopicDetail(Box<TopicDetailView>),
    Quiz(QuizView),
    Plan(PlanView),
    Community(CommunityView),
}

// --- Home ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeView {
    pub greeting: String,
    pub level_label: String,
    pub xp: u32,
    pub streak_dots: Vec<bool>,
    pub available: Vec<TopicCard>,
    pub disabled_groups: Vec<TopicGroup>,
    pub recent: Option<TopicCard>,
    pub recent_empty: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCard {
    pub id: String,
    pub title: String,
    pub category: &'static str,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct TopicGroup {
    pub label: &'static str,
    pub topics: Vec<TopicCard>,
}

#[derive(Debug, Serialize)]
pub struct TopicListView {
    pub title: &'static str,
    pub topics: Vec<TopicCard>,
}

// --- Topic detail ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDetailView {
    pub id: String,
    pub title: String,
    pub category: &'static str,
    pub description: String,
    pub progress: u8,
    pub interactive: bool,
    pub analogies: Vec<AnalogyChip>,
    pub search_query: String,
    pub concepts: Vec<ConceptRow>,
    pub chat: Vec<ChatBubble>,
    pub chat_pending: bool,
    pub chat_placeholder: Option<&'static str>,
    pub quiz_label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AnalogyChip {
    pub style: AnalogyStyle,
    pub active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptRow {
    pub name: String,
    pub expanded: bool,
    pub loading: Option<String>,
    /// Raw HTML from the model, or a fallback message.
    pub explanation_html: Option<String>,
    pub analogy_badge: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatBubble {
    pub role: ChatRole,
    pub text: String,
    /// Assistant text is HTML; user text is plain.
    pub html: bool,
}

// --- Quiz ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub topic_id: String,
    pub phase: QuizPhase,
    pub heading: String,
    pub subheading: Option<String>,
    pub progress_label: Option<String>,
    pub question: Option<String>,
    pub options: Vec<OptionView>,
    pub explanation: Option<String>,
    pub next_label: Option<&'static str>,
    pub score: u32,
    pub can_quit: bool,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OptionState {
    Neutral,
    Correct,
    Incorrect,
    Dimmed,
}

#[derive(Debug, Serialize)]
pub struct OptionView {
    pub text: String,
    pub state: OptionState,
    pub enabled: bool,
}

// --- Plan / community ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    pub title: &'static str,
    pub button_label: &'static str,
    pub button_enabled: bool,
    pub loading: bool,
    pub empty: Option<EmptyState>,
    pub weeks: Vec<WeekView>,
}

#[derive(Debug, Serialize)]
pub struct EmptyState {
    pub title: &'static str,
    pub hint: &'static str,
}

#[derive(Debug, Serialize)]
pub struct WeekView {
    pub heading: String,
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub kind: TaskType,
}

#[derive(Debug, Serialize)]
pub struct CommunityView {
    pub title: &'static str,
    pub body: &'static str,
}

pub fn build_view(session: &Session) -> AppView {
    let tab = session.tab();
    let screen = match (session.quiz(), tab) {
        (Some(quiz), _) => Screen::Quiz(quiz_view(quiz)),
        (None, Tab::Home) => Screen::Home(home_view(session)),
        (None, Tab::Learn) => match session.selected_topic() {
            Some(topic) => Screen::TopicDetail(Box::new(topic_detail_view(session, topic))),
            None => Screen::Topics(topic_list_view(session)),
        },
        (None, Tab::Plan) => Screen::Plan(plan_view(session)),
        (None, Tab::Community) => Screen::Community(CommunityView {
            title: "Community Coming Soon",
            body: "Share prototypes and chat with other parents.",
        }),
    };
    AppView { tab, nav: nav_items(tab), screen }
}

pub fn nav_items(active: Tab) -> Vec<NavItem> {
    [(Tab::Home, "Home"), (Tab::Learn, "Learn"), (Tab::Plan, "Plan"), (Tab::Community, "Team")]
        .into_iter()
        .map(|(tab, label)| NavItem { tab, label, active: tab == active })
        .collect()
}

fn card(session: &Session, t: &Topic) -> TopicCard {
    TopicCard {
        id: t.id.clone(),
        title: t.title.clone(),
        category: t.category.label(),
        enabled: session.catalog().is_enabled(t),
    }
}

pub fn home_view(session: &Session) -> HomeView {
    let user = session.user();
    let catalog = session.catalog();
    let recent = session.recent_topic().map(|t| card(session, t));
    HomeView {
        greeting: format!("Hi, Coach {}!", user.name),
        level_label: format!("Level {} Mentor", user.level),
        xp: user.xp,
        streak_dots: (1..=STREAK_DOTS).map(|d| d <= user.streak).collect(),
        available: catalog.enabled().map(|t| card(session, t)).collect(),
        disabled_groups: catalog
            .disabled_by_category()
            .into_iter()
            .map(|(cat, topics)| TopicGroup {
                label: cat.label(),
                topics: topics.into_iter().map(|t| card(session, t)).collect(),
            })
            .collect(),
        recent_empty: if recent.is_none() { Some("No recent sessions") } else { None },
        recent,
    }
}

pub fn topic_list_view(session: &Session) -> TopicListView {
    TopicListView {
        title: "All Events",
        topics: session.catalog().topics().iter().map(|t| card(session, t)).collect(),
    }
}

pub fn topic_detail_view(session: &Session, topic: &Topic) -> TopicDetailView {
    let analogy = session.analogy();
    let concepts = filter_concepts(&topic.concepts, session.search_query())
        .into_iter()
        .map(|name| {
            let expanded = session.expanded_concept() == Some(name);
            let loading = expanded && session.explanation_loading(name);
            let explanation_html = if expanded && !loading {
                session.explanation_for(name).map(str::to_string)
            } else {
                None
            };
            ConceptRow {
                name: name.to_string(),
                expanded,
                loading: loading.then(|| {
                    format!("Generating {} explanation...", analogy.label().to_lowercase())
                }),
                analogy_badge: (explanation_html.is_some() && analogy != AnalogyStyle::Default)
                    .then(|| format!("{} Analogy", analogy.label())),
                explanation_html,
            }
        })
        .collect();

    let chat = session
        .chat()
        .iter()
        .map(|m| ChatBubble {
            role: m.role,
            text: m.text.clone(),
            html: m.role == ChatRole::Assistant,
        })
        .collect::<Vec<_>>();
    let chat_placeholder = (chat.is_empty() && !session.chat_pending())
        .then_some("Stuck on a rule or concept? Ask anything!");

    TopicDetailView {
        id: topic.id.clone(),
        title: topic.title.clone(),
        category: topic.category.label(),
        description: topic.description.clone(),
        progress: topic.progress,
        interactive: session.catalog().is_enabled(topic),
        analogies: AnalogyStyle::ALL
            .into_iter()
            .map(|style| AnalogyChip { style, active: style == analogy })
            .collect(),
        search_query: session.search_query().to_string(),
        concepts,
        chat,
        chat_pending: session.chat_pending(),
        chat_placeholder,
        quiz_label: "Generate Quiz (10 Qs)",
    }
}

pub fn quiz_view(quiz: &QuizSession) -> QuizView {
    let mut view = QuizView {
        topic_id: quiz.topic_id.clone(),
        phase: quiz.phase(),
        heading: String::new(),
        subheading: None,
        progress_label: None,
        question: None,
        options: Vec::new(),
        explanation: None,
        next_label: None,
        score: quiz.score(),
        can_quit: true,
    };
    match quiz.phase() {
        QuizPhase::Loading => {
            view.heading = "Generating Quiz...".into();
            view.subheading = Some(match &quiz.concept {
                Some(c) => format!("Crafting questions about {c}"),
                None => format!("Building a comprehensive quiz for {}", quiz.topic_title),
            });
        }
        QuizPhase::Failed => {
            view.heading = "Failed to load questions. Please try again.".into();
        }
        QuizPhase::Complete => {
            view.heading = "Quiz Complete!".into();
        }
        QuizPhase::Active | QuizPhase::Feedback => {
            view.heading = quiz.topic_title.clone();
            if let Some(q) = quiz.current_question() {
                let feedback = quiz.show_feedback();
                view.progress_label = Some(format!("Question {}/{}", quiz.current_index() + 1, quiz.questions().len()));
                view.question = Some(q.question.clone());
                view.options = q
                    .options
                    .iter()
                    .map(|opt| OptionView {
                        text: opt.clone(),
                        state: option_state(opt, &q.correct_answer, quiz.selected(), feedback),
                        enabled: !feedback,
                    })
                    .collect();
                if feedback {
                    view.explanation = Some(q.explanation.clone());
                    view.next_label = Some(if quiz.is_last_question() { "Finish Quiz" } else { "Next Question" });
                }
            }
        }
    }
    view
}

fn option_state(option: &str, correct: &str, selected: Option<&str>, feedback: bool) -> OptionState {
    if !feedback {
        OptionState::Neutral
    } else if option == correct {
        OptionState::Correct
    } else if Some(option) == selected {
        OptionState::Incorrect
    } else {
        OptionState::Dimmed
    }
}

pub fn plan_view(session: &Session) -> PlanView {
    let plan = session.plan();
    let loading = session.plan_loading();
    PlanView {
        title: "Weekly Plan",
        button_label: if plan.is_empty() { "AI Generate Plan" } else { "Regenerate" },
        button_enabled: !loading,
        loading,
        empty: (plan.is_empty() && !loading).then_some(EmptyState {
            title: "No plan active.",
            hint: "Click the AI button to create a structured study schedule.",
        }),
        weeks: plan
            .iter()
            .map(|w| WeekView {
                heading: format!("Week {}: {}", w.week_number, w.focus),
                tasks: w
                    .tasks
                    .iter()
                    .map(|t| TaskView { id: t.id.clone(), title: t.title.clone(), completed: t.completed, kind: t.kind })
                    .collect(),
            })
            .collect(),
    }
}

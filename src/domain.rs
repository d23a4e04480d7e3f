//! Domain models used by the backend: user profile, topics and categories,
//! analogy styles, chat transcript, quiz questions and weekly plans.

use serde::{Deserialize, Serialize};

/// Who is driving the app? Only affects presentation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Parent,
  Student,
}

/// Active user profile. XP and streak only move on quiz completion.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
  pub id: String,
  pub name: String,
  pub role: Role,
  pub xp: u32,
  pub level: u32,
  pub streak: u32,
}

/// Official subject categories. Declaration order is the display order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
  Life,
  Earth,
  Physical,
  Tech,
  Inquiry,
}

impl Category {
  pub const ALL: [Category; 5] = [
    Category::Life,
    Category::Earth,
    Category::Physical,
    Category::Tech,
    Category::Inquiry,
  ];

  pub fn label(self) -> &'static str {
    match self {
      Category::Life => "Life, Personal & Social Science",
      Category::Earth => "Earth and Space Science",
      Category::Physical => "Physical Science & Chemistry",
      Category::Tech => "Technology & Engineering",
      Category::Inquiry => "Inquiry & Nature of Science",
    }
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Difficulty {
  Beginner,
  Intermediate,
  Advanced,
}

/// A competition event with its own concept list.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
  pub id: String,
  pub title: String,
  pub category: Category,
  pub difficulty: Difficulty,
  pub progress: u8,
  pub description: String,
  #[serde(default)] pub base_summary: Option<String>,
  #[serde(default)] pub ai_summary: Option<String>,
  #[serde(default)] pub concepts: Vec<String>,
}

/// Presentation lens applied to explanations. Part of the explanation cache key.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AnalogyStyle {
  #[default]
  Default,
  Sports,
  Dance,
  Cooking,
}

impl AnalogyStyle {
  pub const ALL: [AnalogyStyle; 4] = [
    AnalogyStyle::Default,
    AnalogyStyle::Sports,
    AnalogyStyle::Dance,
    AnalogyStyle::Cooking,
  ];

  pub fn label(self) -> &'static str {
    match self {
      AnalogyStyle::Default => "Default",
      AnalogyStyle::Sports => "Sports",
      AnalogyStyle::Dance => "Dance",
      AnalogyStyle::Cooking => "Cooking",
    }
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
  User,
  Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
  pub role: ChatRole,
  pub text: String,
}

impl ChatMessage {
  pub fn user(text: impl Into<String>) -> Self {
    Self { role: ChatRole::User, text: text.into() }
  }

  pub fn assistant(text: impl Into<String>) -> Self {
    Self { role: ChatRole::Assistant, text: text.into() }
  }
}

/// One multiple-choice question as returned by the structured completion.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
  pub question: String,
  pub options: Vec<String>,
  pub correct_answer: String,
  pub explanation: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
  Read,
  Quiz,
  Build,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
  #[serde(default)] pub id: String,
  pub title: String,
  #[serde(default)] pub completed: bool,
  #[serde(rename = "type")]
  pub kind: TaskType,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeekPlan {
  pub week_number: u32,
  pub focus: String,
  #[serde(default)] pub tasks: Vec<Task>,
}

/// Bottom navigation tabs.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
  #[default]
  Home,
  Learn,
  Plan,
  Community,
}

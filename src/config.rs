//! Loading coach configuration (prompt templates + plan settings) from TOML.
//!
//! See `CoachConfig`, `Prompts` and `PlanSettings` for the expected schema.
//! Every field has a default, so an empty file (or no file) is valid.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct CoachConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub plan: PlanSettings,
}

/// Weekly plan generation inputs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlanSettings {
  /// Free-form competition date handed to the model.
  pub event_date: String,
  /// How many catalog topics (in catalog order) feed the plan.
  pub max_topics: usize,
}

impl Default for PlanSettings {
  fn default() -> Self {
    Self { event_date: "April 15th".into(), max_topics: 3 }
  }
}

/// Prompt templates used by the AI gateway. Placeholders use `{name}` syntax.
/// Defaults target a middle school Science Olympiad student; override them in
/// TOML to tune tone or structure.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Concept explanation: {concept}, {topic}, {analogy_clause}
  pub explain_template: String,
  pub explain_analogy_clause: String,
  pub explain_plain_clause: String,
  // Q&A: {topic}, {context}, {question}
  pub ask_template: String,
  pub ask_context_template: String,
  // Quiz: {count}, {scope}
  pub quiz_template: String,
  pub quiz_concept_scope: String,
  pub quiz_topic_scope: String,
  // Weekly plan: {event_date}, {topics}
  pub plan_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      explain_template: "You are an expert Science Olympiad coach. Explain the concept \"{concept}\" as it relates to the event \"{topic}\" for a middle school student.{analogy_clause}

Instructions:
1. Provide a comprehensive explanation (aim for 150-250 words) that makes the concept crystal clear.
2. If there are math formulas involved (like F=ma or KE=1/2mv^2), explain them simply in text first, then show the formula.
3. Format the output using simple HTML tags for readability:
   - Use <p> for paragraphs.
   - Use <ul> and <li> for bullet points.
   - Use <strong> to highlight key terms or physics principles.
   - Use <code> for formulas.
4. Do NOT use markdown (no # or *). Do NOT wrap in ```html blocks. Just return the raw HTML string.".into(),
      explain_analogy_clause: " Use a \"{analogy}\" analogy to explain it.".into(),
      explain_plain_clause: " Keep the explanation simple, engaging, and conceptual.".into(),
      ask_template: "You are an expert Science Olympiad coach for the event \"{topic}\".
{context}
A student asks: \"{question}\"

Provide a clear, accurate, and helpful answer suited for a middle school student.
Focus on the official rules and scientific principles of the event.
Format the output with simple HTML tags (p, ul, li, strong, code) for readability. Do not use Markdown blocks.".into(),
      ask_context_template: "Previous conversation context:\n{history}\n".into(),
      quiz_template: "Create a {count}-question multiple choice quiz {scope} for a middle school science olympiad student.

Requirements:
1. Questions should test conceptual understanding.
2. If math is required, keep numbers simple enough for mental math or quick calculation.
3. Focus on accuracy regarding Science Olympiad rules and physics principles.".into(),
      quiz_concept_scope: "specifically about the concept \"{concept}\" within \"{topic}\"".into(),
      quiz_topic_scope: "covering ALL major concepts of \"{topic}\" (Rules, Physics, Construction, etc)".into(),
      plan_template: "I have a Science Olympiad competition on {event_date}.
My topics are: {topics}.
Generate a 4-week study plan.
Tasks should be small and manageable for a student.".into(),
    }
  }
}

/// Parse a TOML document into `CoachConfig`.
pub fn parse_config(src: &str) -> Result<CoachConfig, toml::de::Error> {
  toml::from_str::<CoachConfig>(src)
}

/// Attempt to load `CoachConfig` from COACH_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_coach_config_from_env() -> Option<CoachConfig> {
  let path = std::env::var("COACH_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "coach_backend", %path, "Loaded coach config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "coach_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "coach_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

//! Built-in topic catalog (Division B events) and the mock user profile.
//!
//! The catalog is read-only after construction. Only the events listed in
//! `ENABLED_EVENTS` accept AI-backed interaction; the rest are browsable
//! placeholders grouped by category.

use crate::domain::{Category, Difficulty, Role, Topic, User};

/// Events that are fully interactive in this build.
pub const ENABLED_EVENTS: &[&str] = &["Hovercraft"];

const DIVISION_B_EVENTS: &[(&str, Category)] = &[
  ("Hovercraft", Category::Physical),
  ("Air Trajectory", Category::Physical),
  ("Anatomy & Physiology", Category::Life),
  ("Codebusters", Category::Inquiry),
  ("Crime Busters", Category::Physical),
  ("Disease Detectives", Category::Life),
  ("Dynamic Planet", Category::Earth),
  ("Ecology", Category::Life),
  ("Experimental Design", Category::Inquiry),
  ("Fast Facts", Category::Inquiry),
  ("Food Science", Category::Physical),
  ("Forestry", Category::Life),
  ("Helicopter", Category::Tech),
  ("Meteorology", Category::Earth),
  ("Microbe Mission", Category::Life),
  ("Mission Possible", Category::Tech),
  ("Optics", Category::Physical),
  ("Reach for the Stars", Category::Earth),
  ("Road Scholar", Category::Earth),
  ("Scrambler", Category::Tech),
  ("Towers", Category::Tech),
  ("Wind Power", Category::Physical),
  ("Write It Do It", Category::Inquiry),
];

const HOVERCRAFT_CONCEPTS: &[&str] = &[
  "Newton's Laws of Motion (Inertia, F=ma)",
  "Kinematics (Velocity & Acceleration)",
  "Kinetic Energy & Momentum",
  "Fluid Mechanics (Flow & Viscosity)",
  "Fluid Dynamics (Bernoulli's Principle)",
  "Pressure (Force/Area)",
  "Skirt Designs & Geometries",
  "Propellers & Impulse",
  "Center of Gravity vs Pressure",
  "Electrical Units (Volts, Amps, Watts)",
  "Circuit Basics & Ohm's Law",
  "Battery Logic & Series/Parallel",
];

const PLACEHOLDER_CONCEPTS: &[&str] = &["General Rules", "Scoring", "Key Concepts"];

/// Mock profile the session starts with.
pub fn mock_user() -> User {
  User {
    id: "u1".into(),
    name: "Alex".into(),
    role: Role::Parent,
    xp: 1250,
    level: 3,
    streak: 5,
  }
}

#[derive(Clone, Debug)]
pub struct Catalog {
  topics: Vec<Topic>,
  enabled: Vec<String>,
}

impl Catalog {
  /// Catalog of all Division B events with seeded progress values.
  pub fn division_b() -> Self {
    let topics = DIVISION_B_EVENTS
      .iter()
      .enumerate()
      .map(|(idx, (title, category))| {
        let hovercraft = *title == "Hovercraft";
        let concepts = if hovercraft { HOVERCRAFT_CONCEPTS } else { PLACEHOLDER_CONCEPTS };
        Topic {
          id: format!("t{idx}"),
          title: (*title).to_string(),
          category: *category,
          difficulty: Difficulty::Intermediate,
          progress: if hovercraft { 45 } else { 0 },
          description: format!("Master the rules and concepts for {title}."),
          base_summary: Some(format!("Official preparation materials for {title}.")),
          ai_summary: None,
          concepts: concepts.iter().map(|c| c.to_string()).collect(),
        }
      })
      .collect();
    Self::from_topics(topics, ENABLED_EVENTS)
  }

  /// Build a catalog from arbitrary topics; progress is clamped to 0..=100.
  /// `enabled` lists the titles that accept AI-backed interaction.
  pub fn from_topics(mut topics: Vec<Topic>, enabled: &[&str]) -> Self {
    for t in &mut topics {
      t.progress = t.progress.min(100);
    }
    Self { topics, enabled: enabled.iter().map(|s| s.to_string()).collect() }
  }

  pub fn topics(&self) -> &[Topic] {
    &self.topics
  }

  pub fn get(&self, id: &str) -> Option<&Topic> {
    self.topics.iter().find(|t| t.id == id)
  }

  pub fn is_enabled(&self, topic: &Topic) -> bool {
    self.enabled.iter().any(|title| *title == topic.title)
  }

  pub fn enabled(&self) -> impl Iterator<Item = &Topic> {
    self.topics.iter().filter(|t| self.is_enabled(t))
  }

  /// Disabled topics grouped by category in category order; empty groups are skipped.
  pub fn disabled_by_category(&self) -> Vec<(Category, Vec<&Topic>)> {
    Category::ALL
      .iter()
      .filter_map(|cat| {
        let group: Vec<&Topic> = self
          .topics
          .iter()
          .filter(|t| t.category == *cat && !self.is_enabled(t))
          .collect();
        if group.is_empty() { None } else { Some((*cat, group)) }
      })
      .collect()
  }

  /// Titles of the first `n` topics in catalog order.
  pub fn first_titles(&self, n: usize) -> Vec<String> {
    self.topics.iter().take(n).map(|t| t.title.clone()).collect()
  }
}

/// Case-insensitive substring filter, sorted alphabetically for display.
pub fn filter_concepts<'a>(concepts: &'a [String], query: &str) -> Vec<&'a str> {
  let needle = query.to_lowercase();
  let mut out: Vec<&str> = concepts
    .iter()
    .map(String::as_str)
    .filter(|c| c.to_lowercase().contains(&needle))
    .collect();
  out.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hovercraft_is_the_only_enabled_event() {
    let cat = Catalog::division_b();
    let enabled: Vec<&str> = cat.enabled().map(|t| t.title.as_str()).collect();
    assert_eq!(enabled, vec!["Hovercraft"]);
    let hc = cat.get("t0").expect("hovercraft");
    assert_eq!(hc.progress, 45);
    assert_eq!(hc.concepts.len(), 12);
  }

  #[test]
  fn disabled_groups_follow_category_order_and_skip_enabled() {
    let cat = Catalog::division_b();
    let groups = cat.disabled_by_category();
    let order: Vec<Category> = groups.iter().map(|(c, _)| *c).collect();
    assert_eq!(order, Category::ALL.to_vec());
    let physical = &groups.iter().find(|(c, _)| *c == Category::Physical).expect("physical").1;
    assert!(physical.iter().all(|t| t.title != "Hovercraft"));
    let total: usize = groups.iter().map(|(_, g)| g.len()).sum();
    assert_eq!(total, cat.topics().len() - 1);
  }

  #[test]
  fn progress_is_clamped() {
    let mut t = Catalog::division_b().topics()[0].clone();
    t.progress = 180;
    let cat = Catalog::from_topics(vec![t], ENABLED_EVENTS);
    assert_eq!(cat.topics()[0].progress, 100);
  }

  #[test]
  fn concept_filter_is_case_insensitive_and_sorted() {
    let concepts: Vec<String> = vec!["Pressure (Force/Area)".into(), "fluid flow".into(), "Fluid Dynamics".into(), "Kinematics".into()];
    assert_eq!(filter_concepts(&concepts, "FLUID"), vec!["Fluid Dynamics", "fluid flow"]);
    assert_eq!(filter_concepts(&concepts, "").len(), 4);
    assert_eq!(filter_concepts(&concepts, "").first(), Some(&"Fluid Dynamics"));
    assert!(filter_concepts(&concepts, "zzz").is_empty());
  }

  #[test]
  fn first_titles_uses_catalog_order() {
    let cat = Catalog::division_b();
    assert_eq!(cat.first_titles(3), vec!["Hovercraft", "Air Trajectory", "Anatomy & Physiology"]);
  }
}

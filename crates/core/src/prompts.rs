//! Prompt templates for the two prompt-calling agents.
//!
//! Built-in templates are compiled in from the repository's `prompts/`
//! directory. A deployment can override any of them by dropping a markdown
//! file with the same stem into its prompts directory.

use std::collections::HashMap;
use tracing::{debug, warn};

pub const UNDERSTANDING_SYSTEM: &str = "understanding_system";
pub const UNDERSTANDING_HUMAN: &str = "understanding_human";
pub const TUTORING_SYSTEM: &str = "tutoring_system";
pub const TUTORING_HUMAN: &str = "tutoring_human";

#[derive(Debug, Clone, PartialEq)]
pub struct PromptSet {
    pub understanding_system: String,
    pub understanding_human: String,
    pub tutoring_system: String,
    pub tutoring_human: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            understanding_system: include_str!("../../../prompts/understanding_system.md")
                .to_string(),
            understanding_human: include_str!("../../../prompts/understanding_human.md")
                .to_string(),
            tutoring_system: include_str!("../../../prompts/tutoring_system.md").to_string(),
            tutoring_human: include_str!("../../../prompts/tutoring_human.md").to_string(),
        }
    }
}

impl PromptSet {
    /// The built-in templates with any matching entries of `overrides` swapped in.
    /// Keys that match no template are ignored.
    pub fn with_overrides(mut overrides: HashMap<String, String>) -> Self {
        let mut prompts = Self::default();
        for (key, slot) in [
            (UNDERSTANDING_SYSTEM, &mut prompts.understanding_system),
            (UNDERSTANDING_HUMAN, &mut prompts.understanding_human),
            (TUTORING_SYSTEM, &mut prompts.tutoring_system),
            (TUTORING_HUMAN, &mut prompts.tutoring_human),
        ] {
            if let Some(template) = overrides.remove(key) {
                debug!(prompt = key, "Using prompt override");
                *slot = template;
            }
        }
        for unknown in overrides.keys() {
            warn!(prompt = %unknown, "Ignoring prompt file that matches no template");
        }
        prompts
    }
}

/// Substitutes `{name}` placeholders. Unknown placeholders and other braces
/// are left as they are.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{name}}}"), value)
        })
}

/// How the tutor should pitch its teaching at a given understanding level.
/// Levels outside 1..=5 get the at-grade guidance.
pub fn teaching_style(level: u8) -> &'static str {
    match level {
        1 => {
            "Teaching style for level 1 (struggling):
- Start with fundamentals and basics
- Use simple, clear language
- Break concepts into very small steps
- Provide lots of examples and analogies
- Use an encouraging, supportive tone
- Check for understanding frequently
- Avoid advanced terminology"
        }
        2 => {
            "Teaching style for level 2 (below grade):
- Review foundational concepts
- Use concrete examples
- Provide step-by-step guidance
- Offer extra practice opportunities
- Give supportive but clear feedback
- Build confidence gradually"
        }
        4 => {
            "Teaching style for level 4 (above grade):
- Introduce more complex concepts
- Encourage deeper exploration
- Use more abstract examples
- Challenge with advanced problems
- Foster critical thinking
- Connect to broader applications"
        }
        5 => {
            "Teaching style for level 5 (advanced):
- Present advanced material
- Encourage independent exploration
- Use sophisticated examples
- Challenge with complex problems
- Foster creative problem-solving
- Connect to real-world applications"
        }
        _ => {
            "Teaching style for level 3 (at grade):
- Present core concepts clearly
- Use appropriate examples
- Encourage independent thinking
- Provide moderate challenge
- Give balanced feedback
- Connect to prior knowledge"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_carry_placeholders() {
        let prompts = PromptSet::default();
        assert!(prompts.understanding_human.contains("{conversation_history}"));
        assert!(prompts.tutoring_system.contains("{teaching_style}"));
        assert!(prompts.tutoring_human.contains("{latest_response_context}"));
        assert!(prompts.understanding_system.contains("\"level\""));
    }

    #[test]
    fn test_render_replaces_known_placeholders_only() {
        let out = render(
            "Hi {name}, level {level}. {\"json\": true} {missing}",
            &[("name", "Lena"), ("level", "3")],
        );
        assert_eq!(out, "Hi Lena, level 3. {\"json\": true} {missing}");
    }

    #[test]
    fn test_overrides_replace_matching_templates() {
        let mut overrides = HashMap::new();
        overrides.insert(TUTORING_SYSTEM.to_string(), "Be brief.".to_string());
        overrides.insert("unrelated".to_string(), "ignored".to_string());

        let prompts = PromptSet::with_overrides(overrides);
        assert_eq!(prompts.tutoring_system, "Be brief.");
        assert_eq!(
            prompts.understanding_system,
            PromptSet::default().understanding_system
        );
    }

    #[test]
    fn test_teaching_style_falls_back_to_at_grade() {
        assert!(teaching_style(1).contains("level 1"));
        assert!(teaching_style(5).contains("level 5"));
        assert_eq!(teaching_style(0), teaching_style(3));
        assert_eq!(teaching_style(9), teaching_style(3));
    }
}

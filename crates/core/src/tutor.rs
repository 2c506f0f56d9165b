//! Tutor-Message Agent
//!
//! Writes the tutor's next utterance with one LLM completion, pitched at the
//! session's current understanding estimate.

use crate::conversation::{ConversationSession, transcript};
use crate::error::TutorError;
use crate::llm_client::{CompletionRequest, LLMClient};
use crate::prompts::{PromptSet, render, teaching_style};
use std::sync::Arc;

const TEMPERATURE: f32 = 0.7;
const DEFAULT_STYLE_LEVEL: u8 = 3;

pub struct TutorAgent {
    llm: Arc<dyn LLMClient>,
    prompts: Arc<PromptSet>,
}

impl TutorAgent {
    pub fn new(llm: Arc<dyn LLMClient>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }

    /// Builds the prompt pair for the next tutor message.
    pub fn build_request(&self, session: &ConversationSession) -> CompletionRequest {
        let level = session.understanding_level();
        let style = teaching_style(level.map_or(DEFAULT_STYLE_LEVEL, |l| l.value()));
        let level_text = level.map_or_else(|| "not yet assessed".to_string(), |l| l.to_string());

        let history = if session.history.is_empty() {
            "No previous conversation.".to_string()
        } else {
            transcript(&session.history)
        };
        let latest_response_context = match session.latest_student_response() {
            Some(response) => format!(
                "Student's latest response: {response}\n\nAnalyse this response and give appropriate feedback or continue teaching."
            ),
            None => "This is the start of the conversation. Begin by introducing the topic and assessing the student's prior knowledge.".to_string(),
        };
        let grade_level = session.student.grade_level.to_string();

        CompletionRequest {
            system: render(&self.prompts.tutoring_system, &[("teaching_style", style)]),
            user: render(
                &self.prompts.tutoring_human,
                &[
                    ("student_name", session.student.name.as_str()),
                    ("grade_level", grade_level.as_str()),
                    ("topic_name", session.topic.name.as_str()),
                    (
                        "subject_name",
                        session.topic.subject_name.as_deref().unwrap_or("the subject"),
                    ),
                    ("understanding_level", level_text.as_str()),
                    ("conversation_history", history.as_str()),
                    ("latest_response_context", latest_response_context.as_str()),
                ],
            ),
            temperature: TEMPERATURE,
        }
    }

    /// Generates the next tutor message. A blank completion is an inference error.
    pub async fn generate(&self, session: &ConversationSession) -> Result<String, TutorError> {
        let text = self.llm.complete(self.build_request(session)).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(TutorError::Inference(
                "tutor model returned an empty message".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

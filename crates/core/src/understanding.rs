//! Understanding-Inference Agent
//!
//! Estimates a student's baseline understanding (1-5) from the conversation so
//! far with one LLM completion. The model's answer must be a JSON object with
//! an integer `level` and a `confidence` in [0, 1]; anything else is reported
//! as an inference error instead of being clamped or defaulted.

use crate::conversation::{
    ConversationSession, Role, Turn, UnderstandingEstimate, UnderstandingLevel, transcript,
};
use crate::error::TutorError;
use crate::llm_client::{CompletionRequest, LLMClient};
use crate::prompts::{PromptSet, render};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const TEMPERATURE: f32 = 0.3;
/// Tutor messages longer than this count as real teaching.
const TEACHING_MESSAGE_CHARS: usize = 100;
const BASELINE_STUDENT_MESSAGES: usize = 3;
const BASELINE_TEACHING_MESSAGES: usize = 2;

pub struct UnderstandingAgent {
    llm: Arc<dyn LLMClient>,
    prompts: Arc<PromptSet>,
}

impl UnderstandingAgent {
    pub fn new(llm: Arc<dyn LLMClient>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }

    /// Runs one inference over the session's history.
    pub async fn infer(
        &self,
        session: &ConversationSession,
    ) -> Result<UnderstandingEstimate, TutorError> {
        let window = baseline_window(&session.history);
        let history = if window.is_empty() {
            "No conversation yet.".to_string()
        } else {
            transcript(window)
        };
        let grade_level = session.student.grade_level.to_string();
        let user = render(
            &self.prompts.understanding_human,
            &[
                ("student_name", session.student.name.as_str()),
                ("grade_level", grade_level.as_str()),
                ("topic_name", session.topic.name.as_str()),
                (
                    "subject_name",
                    session.topic.subject_name.as_deref().unwrap_or("Unknown"),
                ),
                ("conversation_history", history.as_str()),
            ],
        );

        let raw = self
            .llm
            .complete(CompletionRequest {
                system: self.prompts.understanding_system.clone(),
                user,
                temperature: TEMPERATURE,
            })
            .await?;
        let estimate = parse_assessment(&raw)?;
        debug!(
            conversation_id = %session.conversation_id,
            level = %estimate.level,
            confidence = estimate.confidence,
            "Understanding inferred"
        );
        Ok(estimate)
    }
}

/// The part of the history that still reflects what the student knew before
/// being taught: everything up to the student message at which three student
/// messages have been seen or two substantial tutor explanations were given.
pub fn baseline_window(history: &[Turn]) -> &[Turn] {
    let mut student_messages = 0;
    let mut teaching_messages = 0;
    for (idx, turn) in history.iter().enumerate() {
        match turn.role {
            Role::Tutor => {
                if turn.content.chars().count() > TEACHING_MESSAGE_CHARS {
                    teaching_messages += 1;
                }
            }
            Role::Student => {
                student_messages += 1;
                if student_messages >= BASELINE_STUDENT_MESSAGES
                    || teaching_messages >= BASELINE_TEACHING_MESSAGES
                {
                    return &history[..=idx];
                }
            }
        }
    }
    history
}

/// Parses the assessor's answer, tolerating a surrounding markdown code fence
/// or prose around the JSON object.
pub fn parse_assessment(raw: &str) -> Result<UnderstandingEstimate, TutorError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| TutorError::Inference(format!("no JSON object in model output: {raw:?}")))?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| TutorError::Inference(format!("invalid JSON from model: {e}")))?;

    let level = match value.get("level") {
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u8::try_from(n).ok())
            .ok_or_else(|| TutorError::Inference(format!("level {n} is not an integer in 1..=5")))?,
        Some(other) => {
            return Err(TutorError::Inference(format!(
                "level must be an integer, got {other}"
            )));
        }
        None => return Err(TutorError::Inference("missing level".to_string())),
    };
    let level = UnderstandingLevel::try_from(level)?;

    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| TutorError::Inference("missing or non-numeric confidence".to_string()))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(TutorError::Inference(format!(
            "confidence {confidence} is outside 0.0..=1.0"
        )));
    }

    let evidence = value
        .get("evidence")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(UnderstandingEstimate {
        level,
        confidence,
        evidence,
    })
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

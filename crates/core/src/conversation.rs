//! Conversation session state.
//!
//! A [`ConversationSession`] is the bookkeeping for one tutoring dialogue: who
//! is being tutored on what, the transcript so far, how many turns have been
//! completed and the latest understanding estimate.

use crate::catalog::{Student, Topic};
use crate::error::TutorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Who spoke a message in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tutor,
    Student,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Tutor => write!(f, "TUTOR"),
            Role::Student => write!(f, "STUDENT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Student mastery on a 1 (struggling) to 5 (advanced) scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "u8", into = "u8")]
pub struct UnderstandingLevel(u8);

impl UnderstandingLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for UnderstandingLevel {
    type Error = TutorError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(TutorError::Inference(format!(
                "understanding level {value} is outside {}..={}",
                Self::MIN,
                Self::MAX
            )))
        }
    }
}

impl From<UnderstandingLevel> for u8 {
    fn from(level: UnderstandingLevel) -> Self {
        level.0
    }
}

impl fmt::Display for UnderstandingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One inference result. The latest one replaces any earlier estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UnderstandingEstimate {
    #[schema(value_type = u8, minimum = 1, maximum = 5)]
    pub level: UnderstandingLevel,
    pub confidence: f64,
    pub evidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationSession {
    pub conversation_id: String,
    pub student: Student,
    pub topic: Topic,
    pub history: Vec<Turn>,
    /// Completed tutor/student exchanges.
    pub turn_count: u32,
    pub max_turns: u32,
    pub understanding: Option<UnderstandingEstimate>,
    pub ended: bool,
}

impl ConversationSession {
    /// A fresh session: no turns, no estimate, not ended.
    pub fn new(conversation_id: String, student: Student, topic: Topic, max_turns: u32) -> Self {
        Self {
            conversation_id,
            student,
            topic,
            history: Vec::new(),
            turn_count: 0,
            max_turns,
            understanding: None,
            ended: false,
        }
    }

    /// Appends a completed exchange and counts it as one turn.
    pub fn record_exchange(&mut self, tutor_message: &str, student_response: &str) {
        self.history.push(Turn::new(Role::Tutor, tutor_message));
        self.history.push(Turn::new(Role::Student, student_response));
        self.turn_count += 1;
    }

    /// Marks the session ended once the turn budget is spent or the challenge
    /// service says the dialogue is over.
    pub fn update_ended(&mut self, upstream_complete: bool) {
        self.ended = self.ended || upstream_complete || self.turn_count >= self.max_turns;
    }

    pub fn understanding_level(&self) -> Option<UnderstandingLevel> {
        self.understanding.as_ref().map(|u| u.level)
    }

    pub fn latest_student_response(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Student)
            .map(|turn| turn.content.as_str())
    }
}

/// Renders turns as `ROLE: content` lines, the form both prompts expect.
pub fn transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

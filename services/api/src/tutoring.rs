//! Turn Orchestrator
//!
//! Opens tutoring conversations on the challenge service and drives them one
//! turn at a time: tutor message, simulated student reply, understanding
//! inference, termination check, commit, log.

use crate::{
    conversation_log::{ConversationLogger, LogRecord},
    store::SessionStore,
};
use std::sync::Arc;
use tracing::{error, info, instrument};
use tutor_core::{
    TutorError,
    catalog::{Student, Topic},
    challenge::ChallengeApi,
    conversation::{ConversationSession, Turn},
    tutor::TutorAgent,
    understanding::UnderstandingAgent,
};

/// A freshly opened conversation.
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session: ConversationSession,
    pub conversations_remaining: Option<u32>,
}

/// The result of one completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub interaction_id: String,
    pub tutor_message: String,
    pub student_response: String,
    pub turn_count: u32,
    pub understanding_level: Option<u8>,
    pub understanding_confidence: Option<f64>,
    pub history: Vec<Turn>,
    pub ended: bool,
}

pub struct TutoringService {
    challenge: Arc<dyn ChallengeApi>,
    understanding: UnderstandingAgent,
    tutor: TutorAgent,
    sessions: Arc<SessionStore>,
    log: Arc<ConversationLogger>,
    max_turns: u32,
}

impl TutoringService {
    pub fn new(
        challenge: Arc<dyn ChallengeApi>,
        understanding: UnderstandingAgent,
        tutor: TutorAgent,
        sessions: Arc<SessionStore>,
        log: Arc<ConversationLogger>,
        max_turns: u32,
    ) -> Self {
        Self {
            challenge,
            understanding,
            tutor,
            sessions,
            log,
            max_turns,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Opens a conversation for a student/topic pair known to the challenge
    /// service and stores a fresh session for it.
    #[instrument(skip(self))]
    pub async fn start(&self, student_id: &str, topic_id: &str) -> Result<StartedSession, TutorError> {
        let student = self.find_student(student_id).await?;
        let topic = self.find_topic(topic_id).await?;

        let started = self.challenge.start_conversation(student_id, topic_id).await?;
        let max_turns = match started.max_turns {
            0 => self.max_turns,
            upstream => upstream.min(self.max_turns),
        };

        let session =
            ConversationSession::new(started.conversation_id.clone(), student, topic, max_turns);
        self.sessions.insert(session.clone()).await;
        info!(
            conversation_id = %started.conversation_id,
            max_turns,
            conversations_remaining = ?started.conversations_remaining,
            "Conversation started"
        );

        Ok(StartedSession {
            session,
            conversations_remaining: started.conversations_remaining,
        })
    }

    /// Runs one turn. The session is held for the whole turn and only updated
    /// once every step has succeeded; on error the stored session is unchanged.
    #[instrument(skip(self, tutor_message))]
    pub async fn interact(
        &self,
        conversation_id: &str,
        tutor_message: Option<String>,
    ) -> Result<TurnOutcome, TutorError> {
        let mut entry = self.sessions.acquire(conversation_id).await.ok_or_else(|| {
            TutorError::NotFound(format!("Conversation '{}' not found", conversation_id))
        })?;
        if entry.session.ended {
            return Err(TutorError::InvalidState(format!(
                "Conversation '{}' has already ended",
                conversation_id
            )));
        }

        let mut session = entry.session.clone();
        let tutor_message = match tutor_message.filter(|m| !m.trim().is_empty()) {
            Some(message) => message,
            None => self.tutor.generate(&session).await?,
        };

        let reply = self.challenge.interact(conversation_id, &tutor_message).await?;
        session.record_exchange(&tutor_message, &reply.student_response);

        session.understanding = Some(self.understanding.infer(&session).await?);
        session.update_ended(reply.is_complete);

        entry.session = session.clone();
        drop(entry);

        info!(
            turn_count = session.turn_count,
            understanding_level = ?session.understanding_level().map(|l| l.value()),
            ended = session.ended,
            "Turn completed"
        );
        if session.ended {
            info!(turn_count = session.turn_count, "Conversation ended");
        }

        if let Err(e) = self.log.append(&LogRecord::snapshot(&session, Some(&reply))).await {
            error!(error = ?e, "Failed to append conversation log record");
        }

        let understanding = session.understanding.as_ref();
        Ok(TurnOutcome {
            conversation_id: session.conversation_id.clone(),
            interaction_id: reply.interaction_id,
            tutor_message,
            student_response: reply.student_response,
            turn_count: session.turn_count,
            understanding_level: understanding.map(|u| u.level.value()),
            understanding_confidence: understanding.map(|u| u.confidence),
            history: session.history,
            ended: session.ended,
        })
    }

    /// The current state of a stored conversation.
    pub async fn conversation(&self, conversation_id: &str) -> Result<ConversationSession, TutorError> {
        self.sessions.snapshot(conversation_id).await.ok_or_else(|| {
            TutorError::NotFound(format!("Conversation '{}' not found", conversation_id))
        })
    }

    async fn find_student(&self, student_id: &str) -> Result<Student, TutorError> {
        self.challenge
            .list_students(None)
            .await?
            .into_iter()
            .find(|s| s.id == student_id)
            .ok_or_else(|| TutorError::NotFound(format!("Student '{}' not found", student_id)))
    }

    async fn find_topic(&self, topic_id: &str) -> Result<Topic, TutorError> {
        self.challenge
            .list_topics(None)
            .await?
            .into_iter()
            .find(|t| t.id == topic_id)
            .ok_or_else(|| TutorError::NotFound(format!("Topic '{}' not found", topic_id)))
    }
}

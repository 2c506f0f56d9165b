//! Conversation Logger
//!
//! Appends one JSON record per completed turn to `conversations.jsonl` in the
//! log directory. This is the machine-readable transcript of tutoring
//! sessions; diagnostics go through `tracing` instead.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tutor_core::{
    catalog::{Student, Topic},
    challenge::StudentReply,
    conversation::{ConversationSession, Turn},
};

pub const LOG_FILE_NAME: &str = "conversations.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMetadata {
    pub turn_count: u32,
    pub max_turns: u32,
    pub conversation_ended: bool,
    pub interaction_id: Option<String>,
    pub upstream_turn_number: Option<u32>,
}

/// A denormalised snapshot of a session at the end of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub conversation_id: String,
    pub student_id: String,
    pub topic_id: String,
    pub understanding_level: Option<u8>,
    pub understanding_confidence: Option<f64>,
    pub understanding_evidence: Option<String>,
    pub student_profile: Student,
    pub topic_info: Topic,
    pub messages: Vec<Turn>,
    pub message_count: usize,
    pub metadata: LogMetadata,
}

impl LogRecord {
    pub fn snapshot(session: &ConversationSession, reply: Option<&StudentReply>) -> Self {
        let understanding = session.understanding.as_ref();
        Self {
            timestamp: Utc::now(),
            conversation_id: session.conversation_id.clone(),
            student_id: session.student.id.clone(),
            topic_id: session.topic.id.clone(),
            understanding_level: understanding.map(|u| u.level.value()),
            understanding_confidence: understanding.map(|u| u.confidence),
            understanding_evidence: understanding.map(|u| u.evidence.clone()),
            student_profile: session.student.clone(),
            topic_info: session.topic.clone(),
            messages: session.history.clone(),
            message_count: session.history.len(),
            metadata: LogMetadata {
                turn_count: session.turn_count,
                max_turns: session.max_turns,
                conversation_ended: session.ended,
                interaction_id: reply.map(|r| r.interaction_id.clone()),
                upstream_turn_number: reply.map(|r| r.turn_number),
            },
        }
    }
}

/// Which records to return from [`ConversationLogger::read`].
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub student_id: Option<String>,
    pub topic_id: Option<String>,
    pub limit: Option<usize>,
}

pub struct ConversationLogger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConversationLogger {
    /// Creates the log directory if needed.
    pub async fn new(log_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(log_dir)
            .await
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
        Ok(Self {
            path: log_dir.join(LOG_FILE_NAME),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `record` as a single line. The file is opened and flushed per
    /// call; appends are serialised so concurrent lines never interleave.
    pub async fn append(&self, record: &LogRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    /// Reads logged records, newest first. Records are returned as raw JSON so
    /// that lines written by older versions still load; unparseable lines are
    /// skipped.
    pub async fn read(&self, filter: &LogFilter) -> Result<Vec<Value>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to read conversation log"),
        };

        let field_is = |record: &Value, key: &str, wanted: &Option<String>| match wanted {
            Some(wanted) => record.get(key).and_then(Value::as_str) == Some(wanted.as_str()),
            None => true,
        };

        let mut records: Vec<Value> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter(|record| {
                field_is(record, "student_id", &filter.student_id)
                    && field_is(record, "topic_id", &filter.topic_id)
            })
            .collect();

        let timestamp = |record: &Value| {
            record
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        };
        records.sort_by_key(|record| std::cmp::Reverse(timestamp(record)));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

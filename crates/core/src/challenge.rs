//! Client for the external tutoring-challenge service.
//!
//! The challenge service owns the simulated students: it hands out student and
//! topic metadata, opens conversations, answers tutor messages in the
//! student's voice and scores predictions and tutoring quality.

use crate::catalog::{Student, StudentList, Subject, SubjectList, Topic, TopicList};
use crate::error::TutorError;
use crate::evaluation::{
    MseResult, PredictionBatch, SetType, TutoringEvaluation, TutoringEvaluationRequest,
};
use crate::retry::RetryPolicy;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{
    RequestBuilder, StatusCode,
    header::{HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, warn};

/// The default deployment of the challenge service.
pub const DEFAULT_BASE_URL: &str = "https://knowunity-agent-olympics-2026-api.vercel.app";

#[derive(Debug, Clone, Serialize)]
pub struct StartConversationRequest<'a> {
    pub student_id: &'a str,
    pub topic_id: &'a str,
}

/// The challenge service's answer to opening a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedConversation {
    pub conversation_id: String,
    pub student_id: String,
    pub topic_id: String,
    pub max_turns: u32,
    #[serde(default)]
    pub conversations_remaining: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InteractionRequest<'a> {
    pub conversation_id: &'a str,
    pub tutor_message: &'a str,
}

/// The simulated student's answer to one tutor message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentReply {
    pub conversation_id: String,
    pub interaction_id: String,
    pub student_response: String,
    pub turn_number: u32,
    pub is_complete: bool,
}

/// Defines the contract for talking to the challenge service.
#[async_trait]
pub trait ChallengeApi: Send + Sync {
    async fn list_students(&self, set_type: Option<SetType>) -> Result<Vec<Student>, TutorError>;

    async fn student_topics(&self, student_id: &str) -> Result<Vec<Topic>, TutorError>;

    async fn list_subjects(&self) -> Result<Vec<Subject>, TutorError>;

    async fn list_topics(&self, subject_id: Option<&str>) -> Result<Vec<Topic>, TutorError>;

    /// Opens a conversation. Fails with `QuotaExceeded` once the student/topic
    /// pair has no conversations left.
    async fn start_conversation(
        &self,
        student_id: &str,
        topic_id: &str,
    ) -> Result<StartedConversation, TutorError>;

    /// Sends one tutor message and returns the simulated student's reply.
    async fn interact(
        &self,
        conversation_id: &str,
        tutor_message: &str,
    ) -> Result<StudentReply, TutorError>;

    async fn submit_predictions(&self, batch: &PredictionBatch) -> Result<MseResult, TutorError>;

    async fn evaluate_tutoring(&self, set_type: SetType) -> Result<TutoringEvaluation, TutorError>;
}

/// `ChallengeApi` over HTTP.
///
/// Catalogue lookups are idempotent and run under the retry policy; calls that
/// consume quota or advance a conversation are sent exactly once.
pub struct HttpChallengeClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpChallengeClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let mut api_key =
            HeaderValue::from_str(api_key).context("challenge API key is not a valid header")?;
        api_key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert("X-Api-Key", api_key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to build challenge API HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, TutorError> {
        let url = self.url(path);
        self.retry
            .run(operation, || {
                send_json(CallKind::Lookup, self.http.get(&url).query(query))
            })
            .await
    }
}

/// How a non-success status is read depends on what the call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Idempotent catalogue reads: 404 is a missing resource, 429 a rate limit
    /// worth retrying.
    Lookup,
    /// Opening a conversation: 404 is an unknown student/topic, 409 and 429
    /// mean the pair has no conversations left.
    Start,
    /// Turns and scoring: any failure is an upstream failure.
    Exchange,
}

/// Sends a request and decodes a JSON body, mapping failures onto `TutorError`.
async fn send_json<T: DeserializeOwned>(
    kind: CallKind,
    request: RequestBuilder,
) -> Result<T, TutorError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(%status, body = %body, ?kind, "Challenge API returned an error status");
        return Err(status_error(kind, status, &body));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| TutorError::upstream(format!("malformed challenge API response: {e}")))
}

fn transport_error(err: reqwest::Error) -> TutorError {
    TutorError::transient(format!("challenge API unreachable: {err}"))
}

/// Classifies a non-success status from the challenge service.
pub fn status_error(kind: CallKind, status: StatusCode, body: &str) -> TutorError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };
    match (kind, status) {
        (CallKind::Lookup | CallKind::Start, StatusCode::NOT_FOUND) => TutorError::NotFound(detail),
        (CallKind::Start, StatusCode::CONFLICT | StatusCode::TOO_MANY_REQUESTS) => {
            TutorError::QuotaExceeded(detail)
        }
        (CallKind::Lookup, StatusCode::TOO_MANY_REQUESTS) => {
            TutorError::transient(format!("challenge API {detail}"))
        }
        (_, s) if s.is_server_error() => TutorError::transient(format!("challenge API {detail}")),
        _ => TutorError::upstream(format!("challenge API {detail}")),
    }
}

#[async_trait]
impl ChallengeApi for HttpChallengeClient {
    async fn list_students(&self, set_type: Option<SetType>) -> Result<Vec<Student>, TutorError> {
        let query: Vec<(&str, &str)> = set_type
            .map(|s| vec![("set_type", s.as_str())])
            .unwrap_or_default();
        let list: StudentList = self.get_json("list_students", "/students", &query).await?;
        Ok(list.students)
    }

    async fn student_topics(&self, student_id: &str) -> Result<Vec<Topic>, TutorError> {
        let path = format!("/students/{student_id}/topics");
        let list: TopicList = self.get_json("student_topics", &path, &[]).await?;
        Ok(list.topics)
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, TutorError> {
        let list: SubjectList = self.get_json("list_subjects", "/subjects", &[]).await?;
        Ok(list.subjects)
    }

    async fn list_topics(&self, subject_id: Option<&str>) -> Result<Vec<Topic>, TutorError> {
        let query: Vec<(&str, &str)> = subject_id
            .map(|id| vec![("subject_id", id)])
            .unwrap_or_default();
        let list: TopicList = self.get_json("list_topics", "/topics", &query).await?;
        Ok(list.topics)
    }

    async fn start_conversation(
        &self,
        student_id: &str,
        topic_id: &str,
    ) -> Result<StartedConversation, TutorError> {
        debug!(student_id, topic_id, "Opening challenge conversation");
        let body = StartConversationRequest {
            student_id,
            topic_id,
        };
        send_json(
            CallKind::Start,
            self.http.post(self.url("/interact/start")).json(&body),
        )
        .await
    }

    async fn interact(
        &self,
        conversation_id: &str,
        tutor_message: &str,
    ) -> Result<StudentReply, TutorError> {
        let body = InteractionRequest {
            conversation_id,
            tutor_message,
        };
        send_json(
            CallKind::Exchange,
            self.http.post(self.url("/interact")).json(&body),
        )
        .await
    }

    async fn submit_predictions(&self, batch: &PredictionBatch) -> Result<MseResult, TutorError> {
        send_json(
            CallKind::Exchange,
            self.http.post(self.url("/evaluate/mse")).json(batch),
        )
        .await
    }

    async fn evaluate_tutoring(&self, set_type: SetType) -> Result<TutoringEvaluation, TutorError> {
        let body = TutoringEvaluationRequest { set_type };
        send_json(
            CallKind::Exchange,
            self.http.post(self.url("/evaluate/tutoring")).json(&body),
        )
        .await
    }
}

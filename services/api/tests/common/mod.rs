#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use tracing::Level;
use tutor_api::{
    config::{Config, Provider},
    conversation_log::ConversationLogger,
    router::create_router,
    state::AppState,
    store::SessionStore,
    tutoring::TutoringService,
};
use tutor_core::{
    TutorError,
    catalog::{Student, Subject, Topic},
    challenge::{ChallengeApi, StartedConversation, StudentReply},
    evaluation::{MseResult, PredictionBatch, SetType, TutoringEvaluation},
    llm_client::{CompletionRequest, LLMClient},
    prompts::PromptSet,
    retry::RetryPolicy,
    tutor::TutorAgent,
    understanding::UnderstandingAgent,
};

pub const GENERATED_TUTOR_MESSAGE: &str = "What do you already know about linear equations?";

/// A deterministic challenge service with one student (`s1`) and one topic (`t1`).
#[derive(Default)]
pub struct StubChallenge {
    pub upstream_max_turns: AtomicU32,
    pub quota_exhausted: AtomicBool,
    pub fail_interact: AtomicBool,
    /// The upstream turn number at which the service reports completion; 0 never.
    pub complete_at_turn: AtomicU32,
    pub start_calls: AtomicUsize,
    pub interact_calls: AtomicUsize,
    pub last_batch: Mutex<Option<PredictionBatch>>,
    upstream_turns: AtomicU32,
}

impl StubChallenge {
    pub fn new() -> Self {
        let stub = Self::default();
        stub.upstream_max_turns.store(20, Ordering::SeqCst);
        stub
    }

    pub fn external_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst) + self.interact_calls.load(Ordering::SeqCst)
    }
}

pub fn student() -> Student {
    Student {
        id: "s1".into(),
        name: "Lena".into(),
        grade_level: 8,
    }
}

pub fn topic() -> Topic {
    Topic {
        id: "t1".into(),
        subject_id: "math".into(),
        subject_name: Some("Mathematics".into()),
        name: "Linear equations".into(),
        grade_level: 8,
    }
}

#[async_trait]
impl ChallengeApi for StubChallenge {
    async fn list_students(&self, _set_type: Option<SetType>) -> Result<Vec<Student>, TutorError> {
        Ok(vec![student()])
    }

    async fn student_topics(&self, student_id: &str) -> Result<Vec<Topic>, TutorError> {
        if student_id == "s1" {
            Ok(vec![topic()])
        } else {
            Err(TutorError::NotFound(format!("Student '{student_id}' not found")))
        }
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, TutorError> {
        Ok(vec![Subject {
            id: "math".into(),
            name: "Mathematics".into(),
        }])
    }

    async fn list_topics(&self, _subject_id: Option<&str>) -> Result<Vec<Topic>, TutorError> {
        Ok(vec![topic()])
    }

    async fn start_conversation(
        &self,
        student_id: &str,
        topic_id: &str,
    ) -> Result<StartedConversation, TutorError> {
        let n = self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.quota_exhausted.load(Ordering::SeqCst) {
            return Err(TutorError::QuotaExceeded(
                "No conversations remaining for this pair".into(),
            ));
        }
        self.upstream_turns.store(0, Ordering::SeqCst);
        Ok(StartedConversation {
            conversation_id: format!("conv-{n}"),
            student_id: student_id.into(),
            topic_id: topic_id.into(),
            max_turns: self.upstream_max_turns.load(Ordering::SeqCst),
            conversations_remaining: Some(4),
        })
    }

    async fn interact(
        &self,
        conversation_id: &str,
        tutor_message: &str,
    ) -> Result<StudentReply, TutorError> {
        self.interact_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_interact.load(Ordering::SeqCst) {
            return Err(TutorError::transient("challenge service returned 503"));
        }
        let turn_number = self.upstream_turns.fetch_add(1, Ordering::SeqCst) + 1;
        let complete_at = self.complete_at_turn.load(Ordering::SeqCst);
        Ok(StudentReply {
            conversation_id: conversation_id.into(),
            interaction_id: format!("int-{turn_number}"),
            student_response: format!("Reply {turn_number} to: {tutor_message}"),
            turn_number,
            is_complete: complete_at > 0 && turn_number >= complete_at,
        })
    }

    async fn submit_predictions(&self, batch: &PredictionBatch) -> Result<MseResult, TutorError> {
        *self.last_batch.lock().unwrap() = Some(batch.clone());
        Ok(MseResult {
            mse_score: 0.0,
            num_predictions: batch.predictions.len() as u32,
            submission_number: 1,
            submissions_remaining: Some(9),
        })
    }

    async fn evaluate_tutoring(&self, _set_type: SetType) -> Result<TutoringEvaluation, TutorError> {
        Ok(TutoringEvaluation {
            score: 7.5,
            num_conversations: 3,
            submission_number: 2,
            submissions_remaining: None,
        })
    }
}

/// Answers assessment prompts with a fixed JSON verdict and everything else
/// with a fixed tutor message.
pub struct StubLLM {
    pub assessment: Mutex<String>,
    pub calls: AtomicUsize,
}

impl StubLLM {
    pub fn new() -> Self {
        Self {
            assessment: Mutex::new(
                r#"{"level": 3, "confidence": 0.6, "evidence": "solves one-step equations"}"#
                    .to_string(),
            ),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_assessment(&self, raw: &str) {
        *self.assessment.lock().unwrap() = raw.to_string();
    }
}

#[async_trait]
impl LLMClient for StubLLM {
    async fn complete(&self, request: CompletionRequest) -> Result<String, TutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.system.contains("assessor") {
            Ok(self.assessment.lock().unwrap().clone())
        } else {
            Ok(GENERATED_TUTOR_MESSAGE.to_string())
        }
    }
}

pub struct Harness {
    pub challenge: Arc<StubChallenge>,
    pub llm: Arc<StubLLM>,
    pub state: Arc<AppState>,
    pub log_dir: tempfile::TempDir,
}

impl Harness {
    pub fn tutoring(&self) -> &TutoringService {
        &self.state.tutoring
    }

    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }

    pub fn log_lines(&self) -> Vec<Value> {
        let path = self.state.conversation_log.path();
        match std::fs::read_to_string(path) {
            Ok(content) => content
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub fn test_config(log_dir: PathBuf, max_turns: u32) -> Config {
    Config {
        bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
        challenge_api_base: "http://challenge.test".into(),
        challenge_api_key: "test-key".into(),
        provider: Provider::OpenAI,
        llm_api_key: "sk-test".into(),
        llm_api_base: Provider::OpenAI.default_api_base().into(),
        chat_model: "stub-model".into(),
        log_level: Level::INFO,
        log_dir,
        prompts_path: PathBuf::from("./prompts"),
        max_turns,
        upstream_timeout: Duration::from_secs(5),
        retry: RetryPolicy::single_attempt(),
        session_ttl: Duration::from_secs(3600),
        sweep_interval: Duration::from_secs(60),
    }
}

pub async fn harness(max_turns: u32) -> Harness {
    let challenge = Arc::new(StubChallenge::new());
    let llm = Arc::new(StubLLM::new());
    let log_dir = tempfile::tempdir().unwrap();
    let config = test_config(log_dir.path().to_path_buf(), max_turns);

    let prompts = Arc::new(PromptSet::default());
    let conversation_log = Arc::new(ConversationLogger::new(&config.log_dir).await.unwrap());
    let challenge_api: Arc<dyn ChallengeApi> = challenge.clone();
    let llm_client: Arc<dyn LLMClient> = llm.clone();

    let tutoring = Arc::new(TutoringService::new(
        challenge_api.clone(),
        UnderstandingAgent::new(llm_client.clone(), prompts.clone()),
        TutorAgent::new(llm_client, prompts),
        Arc::new(SessionStore::new(config.session_ttl)),
        conversation_log.clone(),
        config.max_turns,
    ));

    let state = Arc::new(AppState {
        tutoring,
        challenge: challenge_api,
        conversation_log,
        config: Arc::new(config),
    });

    Harness {
        challenge,
        llm,
        state,
        log_dir,
    }
}

/// Sends a request through the router and returns `(status, json_body)`.
pub async fn send(app: axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            axum::body::Body::from(json.to_string())
        }
        None => axum::body::Body::empty(),
    };
    let resp = app
        .oneshot(builder.body(body).expect("request build should succeed"))
        .await
        .expect("app should handle request");

    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("response body should be readable");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

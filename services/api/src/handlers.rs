//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests: the tutoring
//! turn endpoints, the evaluation pass-through, catalogue lookups and the
//! conversation log. It uses `utoipa` doc comments to generate OpenAPI
//! documentation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, instrument, warn};
use tutor_core::{
    TutorError,
    conversation::ConversationSession,
    evaluation::PredictionBatch,
};

use crate::{
    conversation_log::LogFilter,
    models::{
        ConversationLimits, ErrorResponse, EvaluateTutoringPayload, EvaluateTutoringResponse,
        EvaluationInfo, HealthResponse, InteractPayload, InteractResponse, LogQuery,
        LogRecordsResponse, StartTutoringPayload, StartTutoringResponse, StudentQuery,
        StudentsResponse, SubjectsResponse, SubmissionInfo, SubmitPredictionsPayload,
        SubmitPredictionsResponse, TopicQuery, TopicsResponse, WelcomeResponse,
    },
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::BadGateway(message) => {
                warn!("Bad Gateway: {}", message);
                (StatusCode::BAD_GATEWAY, message)
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<TutorError> for ApiError {
    fn from(err: TutorError) -> Self {
        match err {
            TutorError::NotFound(message) => ApiError::NotFound(message),
            TutorError::InvalidState(message) | TutorError::QuotaExceeded(message) => {
                ApiError::Conflict(message)
            }
            upstream @ (TutorError::Upstream { .. } | TutorError::Inference(_)) => {
                ApiError::BadGateway(upstream.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalServerError(err)
    }
}

fn require_id(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Service banner.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service description", body = WelcomeResponse))
)]
pub async fn root(State(state): State<Arc<AppState>>) -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "AI Tutor API".to_string(),
        description: format!(
            "Tutors simulated students on the challenge service and infers their understanding with {}",
            state.config.chat_model
        ),
    })
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Open a tutoring conversation for a student/topic pair.
#[utoipa::path(
    post,
    path = "/api/v1/tutor/start",
    request_body = StartTutoringPayload,
    responses(
        (status = 200, description = "Conversation started", body = StartTutoringResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 404, description = "Unknown student or topic", body = ErrorResponse),
        (status = 409, description = "No conversations remaining", body = ErrorResponse),
        (status = 502, description = "Challenge service failure", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(student_id = %payload.student_id, topic_id = %payload.topic_id))]
pub async fn start_tutoring(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StartTutoringPayload>,
) -> Result<Json<StartTutoringResponse>, ApiError> {
    require_id("student_id", &payload.student_id)?;
    require_id("topic_id", &payload.topic_id)?;

    let started = state
        .tutoring
        .start(&payload.student_id, &payload.topic_id)
        .await?;
    let session = started.session;

    Ok(Json(StartTutoringResponse {
        conversation_id: session.conversation_id,
        student_id: session.student.id.clone(),
        topic_id: session.topic.id.clone(),
        student_info: session.student,
        topic_info: session.topic,
        limits: ConversationLimits {
            max_turns: session.max_turns,
            conversations_remaining: started.conversations_remaining,
        },
    }))
}

/// Run one tutoring turn. A tutor message is generated when none is given.
#[utoipa::path(
    post,
    path = "/api/v1/tutor/interact",
    request_body = InteractPayload,
    responses(
        (status = 200, description = "Turn completed", body = InteractResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 404, description = "Conversation not found", body = ErrorResponse),
        (status = 409, description = "Conversation has ended", body = ErrorResponse),
        (status = 502, description = "Challenge service or model failure", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(conversation_id = %payload.conversation_id))]
pub async fn interact(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<InteractPayload>,
) -> Result<Json<InteractResponse>, ApiError> {
    require_id("conversation_id", &payload.conversation_id)?;

    let outcome = state
        .tutoring
        .interact(&payload.conversation_id, payload.tutor_message)
        .await?;

    Ok(Json(InteractResponse {
        conversation_id: outcome.conversation_id,
        interaction_id: outcome.interaction_id,
        tutor_message: outcome.tutor_message,
        student_response: outcome.student_response,
        turn_count: outcome.turn_count,
        understanding_level: outcome.understanding_level,
        understanding_confidence: outcome.understanding_confidence,
        conversation_history: outcome.history,
        conversation_ended: outcome.ended,
    }))
}

/// Get the current state of a conversation.
#[utoipa::path(
    get,
    path = "/api/v1/tutor/conversations/{conversation_id}",
    responses(
        (status = 200, description = "Conversation state", body = ConversationSession),
        (status = 404, description = "Conversation not found", body = ErrorResponse)
    ),
    params(
        ("conversation_id" = String, Path, description = "Conversation ID")
    )
)]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationSession>, ApiError> {
    Ok(Json(state.tutoring.conversation(&conversation_id).await?))
}

/// Forward understanding-level predictions for scoring.
#[utoipa::path(
    post,
    path = "/api/v1/evaluate/predictions",
    request_body = SubmitPredictionsPayload,
    responses(
        (status = 200, description = "Predictions scored", body = SubmitPredictionsResponse),
        (status = 409, description = "No submissions remaining", body = ErrorResponse),
        (status = 502, description = "Challenge service failure", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(set_type = %payload.set_type, count = payload.predictions.len()))]
pub async fn submit_predictions(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubmitPredictionsPayload>,
) -> Result<Json<SubmitPredictionsResponse>, ApiError> {
    let batch = PredictionBatch {
        set_type: payload.set_type,
        predictions: payload.predictions,
    };
    let result = state.challenge.submit_predictions(&batch).await?;

    Ok(Json(SubmitPredictionsResponse {
        mse_score: result.mse_score,
        submission_info: SubmissionInfo {
            num_predictions: result.num_predictions,
            submission_number: result.submission_number,
            submissions_remaining: result.submissions_remaining,
        },
    }))
}

/// Ask the challenge service to score the tutoring conversations of a set.
#[utoipa::path(
    post,
    path = "/api/v1/evaluate/tutoring",
    request_body = EvaluateTutoringPayload,
    responses(
        (status = 200, description = "Tutoring evaluated", body = EvaluateTutoringResponse),
        (status = 409, description = "No evaluations remaining", body = ErrorResponse),
        (status = 502, description = "Challenge service failure", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(set_type = %payload.set_type))]
pub async fn evaluate_tutoring(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EvaluateTutoringPayload>,
) -> Result<Json<EvaluateTutoringResponse>, ApiError> {
    let evaluation = state.challenge.evaluate_tutoring(payload.set_type).await?;

    Ok(Json(EvaluateTutoringResponse {
        average_score: evaluation.score,
        evaluation_info: EvaluationInfo {
            num_conversations: evaluation.num_conversations,
            submission_number: evaluation.submission_number,
            submissions_remaining: evaluation.submissions_remaining,
        },
    }))
}

/// List students, optionally restricted to one set.
#[utoipa::path(
    get,
    path = "/api/v1/catalog/students",
    params(StudentQuery),
    responses(
        (status = 200, description = "Students", body = StudentsResponse),
        (status = 502, description = "Challenge service failure", body = ErrorResponse)
    )
)]
pub async fn list_students(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StudentQuery>,
) -> Result<Json<StudentsResponse>, ApiError> {
    let students = state.challenge.list_students(query.set_type).await?;
    Ok(Json(StudentsResponse { students }))
}

/// List the topics assigned to a student.
#[utoipa::path(
    get,
    path = "/api/v1/catalog/students/{student_id}/topics",
    responses(
        (status = 200, description = "Topics of the student", body = TopicsResponse),
        (status = 404, description = "Student not found", body = ErrorResponse),
        (status = 502, description = "Challenge service failure", body = ErrorResponse)
    ),
    params(
        ("student_id" = String, Path, description = "Student ID")
    )
)]
pub async fn student_topics(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> Result<Json<TopicsResponse>, ApiError> {
    let topics = state.challenge.student_topics(&student_id).await?;
    Ok(Json(TopicsResponse { topics }))
}

/// List subjects.
#[utoipa::path(
    get,
    path = "/api/v1/catalog/subjects",
    responses(
        (status = 200, description = "Subjects", body = SubjectsResponse),
        (status = 502, description = "Challenge service failure", body = ErrorResponse)
    )
)]
pub async fn list_subjects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SubjectsResponse>, ApiError> {
    let subjects = state.challenge.list_subjects().await?;
    Ok(Json(SubjectsResponse { subjects }))
}

/// List topics, optionally restricted to one subject.
#[utoipa::path(
    get,
    path = "/api/v1/catalog/topics",
    params(TopicQuery),
    responses(
        (status = 200, description = "Topics", body = TopicsResponse),
        (status = 502, description = "Challenge service failure", body = ErrorResponse)
    )
)]
pub async fn list_topics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopicQuery>,
) -> Result<Json<TopicsResponse>, ApiError> {
    let topics = state
        .challenge
        .list_topics(query.subject_id.as_deref())
        .await?;
    Ok(Json(TopicsResponse { topics }))
}

/// Read logged turns, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/logs/conversations",
    params(LogQuery),
    responses(
        (status = 200, description = "Logged turn records", body = LogRecordsResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn conversation_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> Result<Json<LogRecordsResponse>, ApiError> {
    let records = state
        .conversation_log
        .read(&LogFilter {
            student_id: query.student_id,
            topic_id: query.topic_id,
            limit: query.limit,
        })
        .await?;
    Ok(Json(LogRecordsResponse { records }))
}

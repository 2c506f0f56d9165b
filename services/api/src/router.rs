//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and the OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ConversationLimits, ErrorResponse, EvaluateTutoringPayload, EvaluateTutoringResponse,
        EvaluationInfo, HealthResponse, InteractPayload, InteractResponse, LogRecordsResponse,
        StartTutoringPayload, StartTutoringResponse, StudentsResponse, SubjectsResponse,
        SubmissionInfo, SubmitPredictionsPayload, SubmitPredictionsResponse, TopicsResponse,
        WelcomeResponse,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tutor_core::{
    catalog::{Student, Subject, Topic},
    conversation::{ConversationSession, Role, Turn, UnderstandingEstimate},
    evaluation::{Prediction, SetType},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::root,
        handlers::health,
        handlers::start_tutoring,
        handlers::interact,
        handlers::get_conversation,
        handlers::submit_predictions,
        handlers::evaluate_tutoring,
        handlers::list_students,
        handlers::student_topics,
        handlers::list_subjects,
        handlers::list_topics,
        handlers::conversation_logs,
    ),
    components(
        schemas(
            StartTutoringPayload, StartTutoringResponse, ConversationLimits,
            InteractPayload, InteractResponse,
            SubmitPredictionsPayload, SubmitPredictionsResponse, SubmissionInfo,
            EvaluateTutoringPayload, EvaluateTutoringResponse, EvaluationInfo,
            StudentsResponse, SubjectsResponse, TopicsResponse, LogRecordsResponse,
            WelcomeResponse, HealthResponse, ErrorResponse,
            ConversationSession, Turn, Role, UnderstandingEstimate,
            Student, Subject, Topic, Prediction, SetType
        )
    ),
    tags(
        (name = "AI Tutor API", description = "Tutoring conversations, understanding inference and evaluation")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_v1 = Router::new()
        .route("/tutor/start", post(handlers::start_tutoring))
        .route("/tutor/interact", post(handlers::interact))
        .route(
            "/tutor/conversations/{conversation_id}",
            get(handlers::get_conversation),
        )
        .route("/evaluate/predictions", post(handlers::submit_predictions))
        .route("/evaluate/tutoring", post(handlers::evaluate_tutoring))
        .route("/catalog/students", get(handlers::list_students))
        .route(
            "/catalog/students/{student_id}/topics",
            get(handlers::student_topics),
        )
        .route("/catalog/subjects", get(handlers::list_subjects))
        .route("/catalog/topics", get(handlers::list_topics))
        .route("/logs/conversations", get(handlers::conversation_logs));

    let api_router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_v1)
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Merge the stateful routes with the stateless Swagger UI.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}

//! API Models
//!
//! Request and response bodies of the HTTP surface, with `utoipa` schemas for
//! the OpenAPI document.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tutor_core::{
    catalog::{Student, Subject, Topic},
    conversation::Turn,
    evaluation::{Prediction, SetType},
};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct StartTutoringPayload {
    #[schema(example = "s1")]
    pub student_id: String,
    #[schema(example = "t1")]
    pub topic_id: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ConversationLimits {
    pub max_turns: u32,
    pub conversations_remaining: Option<u32>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct StartTutoringResponse {
    pub conversation_id: String,
    pub student_id: String,
    pub topic_id: String,
    pub student_info: Student,
    pub topic_info: Topic,
    pub limits: ConversationLimits,
}

#[derive(Deserialize, ToSchema)]
pub struct InteractPayload {
    pub conversation_id: String,
    /// Generated by the tutor agent when absent or blank.
    #[serde(default)]
    pub tutor_message: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct InteractResponse {
    pub conversation_id: String,
    pub interaction_id: String,
    pub tutor_message: String,
    pub student_response: String,
    pub turn_count: u32,
    #[schema(minimum = 1, maximum = 5)]
    pub understanding_level: Option<u8>,
    pub understanding_confidence: Option<f64>,
    pub conversation_history: Vec<Turn>,
    pub conversation_ended: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitPredictionsPayload {
    pub set_type: SetType,
    pub predictions: Vec<Prediction>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SubmissionInfo {
    pub num_predictions: u32,
    pub submission_number: u32,
    pub submissions_remaining: Option<u32>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct SubmitPredictionsResponse {
    pub mse_score: f64,
    pub submission_info: SubmissionInfo,
}

#[derive(Deserialize, ToSchema)]
pub struct EvaluateTutoringPayload {
    pub set_type: SetType,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct EvaluationInfo {
    pub num_conversations: u32,
    pub submission_number: u32,
    pub submissions_remaining: Option<u32>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct EvaluateTutoringResponse {
    pub average_score: f64,
    pub evaluation_info: EvaluationInfo,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudentQuery {
    pub set_type: Option<SetType>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TopicQuery {
    pub subject_id: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct StudentsResponse {
    pub students: Vec<Student>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SubjectsResponse {
    pub subjects: Vec<Subject>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TopicsResponse {
    pub topics: Vec<Topic>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogQuery {
    pub student_id: Option<String>,
    pub topic_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct LogRecordsResponse {
    #[schema(value_type = Vec<Object>)]
    pub records: Vec<Value>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct WelcomeResponse {
    pub message: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

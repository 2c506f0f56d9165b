//! Types exchanged with the challenge service's scoring endpoints.
//!
//! Scoring itself (mean squared error of predicted levels, tutoring quality)
//! happens on the challenge service; these types only carry the data there
//! and back.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Which student set a submission or evaluation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SetType {
    MiniDev,
    Dev,
    Eval,
}

impl SetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetType::MiniDev => "mini_dev",
            SetType::Dev => "dev",
            SetType::Eval => "eval",
        }
    }
}

impl fmt::Display for SetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicted understanding level for one student/topic pair.
///
/// The level is forwarded untouched; the challenge service validates it. A
/// prediction without a level is sent as the middle of the scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Prediction {
    pub student_id: String,
    pub topic_id: String,
    #[serde(alias = "level", default = "default_predicted_level")]
    #[schema(default = 3)]
    pub predicted_level: i64,
}

fn default_predicted_level() -> i64 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PredictionBatch {
    pub set_type: SetType,
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MseResult {
    pub mse_score: f64,
    pub num_predictions: u32,
    pub submission_number: u32,
    #[serde(default)]
    pub submissions_remaining: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TutoringEvaluationRequest {
    pub set_type: SetType,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TutoringEvaluation {
    pub score: f64,
    pub num_conversations: u32,
    pub submission_number: u32,
    #[serde(default)]
    pub submissions_remaining: Option<u32>,
}

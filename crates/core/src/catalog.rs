use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A simulated student known to the challenge service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub grade_level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentList {
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Subject {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubjectList {
    pub subjects: Vec<Subject>,
}

/// A curriculum topic, belonging to one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Topic {
    pub id: String,
    pub subject_id: String,
    #[serde(default)]
    pub subject_name: Option<String>,
    pub name: String,
    pub grade_level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TopicList {
    pub topics: Vec<Topic>,
}

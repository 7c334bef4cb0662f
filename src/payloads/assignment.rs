use crate::model::assignment::{AssignmentQuestion, QuestionAnswer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_max_attempts() -> i32 {
    1
}

fn default_published() -> bool {
    true
}

/// Body of both `POST /assignments` and `PUT /assignments/{id}`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<AssignmentQuestion>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub assigned_user_ids: Vec<i64>,
    #[serde(default)]
    pub assigned_group_ids: Vec<i64>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswersPayload {
    pub answers: Vec<QuestionAnswer>,
}

/// Answers sent with the final submit replace any saved draft.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAssignmentPayload {
    #[serde(default)]
    pub answers: Option<Vec<QuestionAnswer>>,
}

use crate::model::submission::Language;
use serde::{Deserialize, Serialize};

fn default_course_difficulty() -> String {
    "beginner".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateCoursePayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_course_difficulty")]
    pub difficulty: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCoursePayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateModulePayload {
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Appended after the last module when omitted.
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub code_example: Option<String>,
    #[serde(default)]
    pub code_language: Option<Language>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateModulePayload {
    pub title: Option<String>,
    pub content: Option<String>,
    pub position: Option<i32>,
    pub video_url: Option<String>,
    pub code_example: Option<String>,
    pub code_language: Option<Language>,
}

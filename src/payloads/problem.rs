use crate::model::problem::{Difficulty, Example, TestCase};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_points() -> i32 {
    10
}

fn default_time_limit_ms() -> i32 {
    2000
}

fn default_memory_limit_kb() -> i32 {
    262_144
}

/// Body of both `POST /problems` and `PUT /problems/{id}`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProblemPayload {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub input_format: String,
    #[serde(default)]
    pub output_format: String,
    #[serde(default)]
    pub constraints: String,
    #[serde(default)]
    pub examples: Vec<Example>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub starter_code: BTreeMap<String, String>,
    #[serde(default = "default_points")]
    pub points: i32,
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: i32,
    #[serde(default = "default_memory_limit_kb")]
    pub memory_limit_kb: i32,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListProblemsParams {
    pub difficulty: Option<Difficulty>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
}

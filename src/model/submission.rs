use crate::errors::AppError;
use crate::execution::ExecutionStatus;
use crate::schema::submissions;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Javascript,
    Typescript,
    Python,
    Java,
    Cpp,
    C,
    Rust,
    Go,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::Javascript,
        Language::Typescript,
        Language::Python,
        Language::Java,
        Language::Cpp,
        Language::C,
        Language::Rust,
        Language::Go,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Python => "python",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Rust => "rust",
            Language::Go => "go",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .iter()
            .copied()
            .find(|language| language.as_str() == s)
            .ok_or_else(|| format!("unsupported language '{}'", s))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `pending` only exists between insert and evaluation; responses never carry it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Accepted,
    Partial,
    WrongAnswer,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Accepted => "accepted",
            SubmissionStatus::Partial => "partial",
            SubmissionStatus::WrongAnswer => "wrong_answer",
        }
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubmissionStatus::Pending),
            "accepted" => Ok(SubmissionStatus::Accepted),
            "partial" => Ok(SubmissionStatus::Partial),
            "wrong_answer" => Ok(SubmissionStatus::WrongAnswer),
            other => Err(format!("unknown submission status '{}'", other)),
        }
    }
}

/// Outcome of one test case. Input and expected output are withheld for hidden cases.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub index: usize,
    pub hidden: bool,
    pub status: ExecutionStatus,
    pub passed: bool,
    pub input: Option<String>,
    pub expected_output: Option<String>,
    pub actual_output: Option<String>,
    pub error: Option<String>,
    pub runtime_ms: i32,
    pub memory_kb: i32,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = submissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Submission {
    pub id: i64,
    pub problem_id: i64,
    pub user_id: i64,
    pub contest_id: Option<i64>,
    pub code: String,
    pub language: String,
    pub status: String,
    pub runtime_ms: i32,
    pub memory_kb: i32,
    pub score: BigDecimal,
    pub passed_count: i32,
    pub total_count: i32,
    pub feedback: String,
    pub test_results: JsonValue,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = submissions)]
pub struct NewSubmission {
    pub problem_id: i64,
    pub user_id: i64,
    pub contest_id: Option<i64>,
    pub code: String,
    pub language: String,
    pub status: String,
    // evaluation columns keep their DB defaults until the result is recorded
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = submissions)]
pub struct SubmissionResultChangeset {
    pub status: String,
    pub runtime_ms: i32,
    pub memory_kb: i32,
    pub score: BigDecimal,
    pub passed_count: i32,
    pub total_count: i32,
    pub feedback: String,
    pub test_results: JsonValue,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub id: i64,
    pub problem_id: i64,
    pub user_id: i64,
    pub contest_id: Option<i64>,
    pub code: String,
    pub language: String,
    pub status: String,
    pub runtime_ms: i32,
    pub memory_kb: i32,
    pub score: BigDecimal,
    pub passed_count: i32,
    pub total_count: i32,
    pub feedback: String,
    pub test_results: Vec<CaseResult>,
    pub submitted_at: DateTime<Utc>,
}

impl TryFrom<Submission> for SubmissionResponse {
    type Error = AppError;

    fn try_from(submission: Submission) -> Result<Self, Self::Error> {
        Ok(SubmissionResponse {
            id: submission.id,
            problem_id: submission.problem_id,
            user_id: submission.user_id,
            contest_id: submission.contest_id,
            test_results: serde_json::from_value(submission.test_results)?,
            code: submission.code,
            language: submission.language,
            status: submission.status,
            runtime_ms: submission.runtime_ms,
            memory_kb: submission.memory_kb,
            score: submission.score,
            passed_count: submission.passed_count,
            total_count: submission.total_count,
            feedback: submission.feedback,
            submitted_at: submission.submitted_at,
        })
    }
}

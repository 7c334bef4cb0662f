use crate::errors::AppError;
use crate::schema::problems;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!(
                "difficulty must be one of easy, medium, hard (got '{}')",
                other
            )),
        }
    }
}

/// Worked example shown in the problem statement.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Example {
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub time_limit_ms: Option<i32>,
    #[serde(default)]
    pub memory_limit_kb: Option<i32>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = problems)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Problem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub difficulty: String,
    pub tags: Vec<String>,
    pub input_format: String,
    pub output_format: String,
    pub constraints: String,
    pub examples: JsonValue,
    pub test_cases: JsonValue,
    pub starter_code: JsonValue,
    pub points: i32,
    pub time_limit_ms: i32,
    pub memory_limit_kb: i32,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Problem {
    pub fn examples(&self) -> Result<Vec<Example>, AppError> {
        Ok(serde_json::from_value(self.examples.clone())?)
    }

    pub fn test_cases(&self) -> Result<Vec<TestCase>, AppError> {
        Ok(serde_json::from_value(self.test_cases.clone())?)
    }

    pub fn starter_code(&self) -> Result<BTreeMap<String, String>, AppError> {
        Ok(serde_json::from_value(self.starter_code.clone())?)
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = problems)]
pub struct NewProblem {
    pub title: String,
    pub description: String,
    pub difficulty: String,
    pub tags: Vec<String>,
    pub input_format: String,
    pub output_format: String,
    pub constraints: String,
    pub examples: JsonValue,
    pub test_cases: JsonValue,
    pub starter_code: JsonValue,
    pub points: i32,
    pub time_limit_ms: i32,
    pub memory_limit_kb: i32,
    pub created_by: Option<i64>,
}

/// Full replacement used by `PUT /problems/{id}`.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = problems)]
pub struct ProblemChangeset {
    pub title: String,
    pub description: String,
    pub difficulty: String,
    pub tags: Vec<String>,
    pub input_format: String,
    pub output_format: String,
    pub constraints: String,
    pub examples: JsonValue,
    pub test_cases: JsonValue,
    pub starter_code: JsonValue,
    pub points: i32,
    pub time_limit_ms: i32,
    pub memory_limit_kb: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProblemSummary {
    pub id: i64,
    pub title: String,
    pub difficulty: String,
    pub tags: Vec<String>,
    pub points: i32,
    pub solved: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetail {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub difficulty: String,
    pub tags: Vec<String>,
    pub input_format: String,
    pub output_format: String,
    pub constraints: String,
    pub examples: Vec<Example>,
    pub test_cases: Vec<TestCase>,
    pub starter_code: BTreeMap<String, String>,
    pub points: i32,
    pub time_limit_ms: i32,
    pub memory_limit_kb: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProblemDetail {
    /// Builds the detail view; hidden test cases are dropped unless `include_hidden`.
    pub fn from_problem(problem: Problem, include_hidden: bool) -> Result<Self, AppError> {
        let examples = problem.examples()?;
        let starter_code = problem.starter_code()?;
        let test_cases = problem
            .test_cases()?
            .into_iter()
            .filter(|case| include_hidden || !case.is_hidden)
            .collect();

        Ok(ProblemDetail {
            id: problem.id,
            title: problem.title,
            description: problem.description,
            difficulty: problem.difficulty,
            tags: problem.tags,
            input_format: problem.input_format,
            output_format: problem.output_format,
            constraints: problem.constraints,
            examples,
            test_cases,
            starter_code,
            points: problem.points,
            time_limit_ms: problem.time_limit_ms,
            memory_limit_kb: problem.memory_limit_kb,
            created_at: problem.created_at,
            updated_at: problem.updated_at,
        })
    }
}

//! Stand-in for a sandboxed code runner.
//!
//! Nothing here parses, compiles or runs the submitted source. [`MockExecutor`]
//! fabricates a verdict per test case from a weighted coin flip plus synthetic
//! runtime and memory figures. A real backend would implement [`CodeExecutor`]
//! on top of an isolated process or container.

use crate::model::problem::TestCase;
use crate::model::submission::Language;
use rand::Rng;
use serde::{Deserialize, Serialize};

const DEFAULT_PASS_RATE: f64 = 0.8;
const RUNTIME_ERROR_SHARE: f64 = 0.1;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Passed,
    WrongAnswer,
    RuntimeError,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutionRequest<'a> {
    pub code: &'a str,
    pub language: Language,
    pub test_case: &'a TestCase,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub actual_output: String,
    pub error: Option<String>,
    pub runtime_ms: i32,
    pub memory_kb: i32,
}

impl ExecutionResult {
    pub fn passed(&self) -> bool {
        self.status == ExecutionStatus::Passed
    }
}

pub trait CodeExecutor: Send + Sync {
    fn execute(&self, request: &ExecutionRequest<'_>) -> ExecutionResult;
}

#[derive(Debug, Clone)]
pub struct MockExecutor {
    pass_rate: f64,
}

impl MockExecutor {
    /// `pass_rate` outside [0, 1] is clamped; a non-finite value falls back to the default.
    pub fn new(pass_rate: f64) -> Self {
        let pass_rate = if pass_rate.is_finite() {
            pass_rate.clamp(0.0, 1.0)
        } else {
            DEFAULT_PASS_RATE
        };
        Self { pass_rate }
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_PASS_RATE)
    }
}

impl CodeExecutor for MockExecutor {
    fn execute(&self, request: &ExecutionRequest<'_>) -> ExecutionResult {
        let mut rng = rand::rng();
        let runtime_ms = rng.random_range(5..=250);
        let memory_kb = rng.random_range(1_024..=32_768);

        if rng.random_bool(self.pass_rate) {
            return ExecutionResult {
                status: ExecutionStatus::Passed,
                actual_output: request.test_case.expected_output.clone(),
                error: None,
                runtime_ms,
                memory_kb,
            };
        }

        if rng.random_bool(RUNTIME_ERROR_SHARE) {
            ExecutionResult {
                status: ExecutionStatus::RuntimeError,
                actual_output: String::new(),
                error: Some(format!(
                    "{} program terminated with a runtime error",
                    request.language
                )),
                runtime_ms,
                memory_kb,
            }
        } else {
            ExecutionResult {
                status: ExecutionStatus::WrongAnswer,
                actual_output: "(mock output)".to_string(),
                error: None,
                runtime_ms,
                memory_kb,
            }
        }
    }
}

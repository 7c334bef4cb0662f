//! Turns per-test-case executor results into a submission verdict.

use crate::errors::AppError;
use crate::execution::{CodeExecutor, ExecutionRequest, ExecutionResult};
use crate::model::problem::TestCase;
use crate::model::submission::{CaseResult, Language, SubmissionStatus};
use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub status: SubmissionStatus,
    pub passed_count: i32,
    pub total_count: i32,
    pub score: BigDecimal,
    pub runtime_ms: i32,
    pub memory_kb: i32,
    pub feedback: String,
    pub test_results: Vec<CaseResult>,
}

/// Runs every case through the executor, once each, then aggregates.
pub fn evaluate(
    executor: &dyn CodeExecutor,
    code: &str,
    language: Language,
    cases: &[TestCase],
) -> Result<Evaluation, AppError> {
    if cases.is_empty() {
        return Err(AppError::BadRequest(
            "Problem has no test cases to evaluate against".to_string(),
        ));
    }

    let results = cases
        .iter()
        .enumerate()
        .map(|(index, test_case)| {
            let result = executor.execute(&ExecutionRequest {
                code,
                language,
                test_case,
            });
            case_result(index, test_case, result)
        })
        .collect();

    Ok(aggregate(results))
}

fn case_result(index: usize, test_case: &TestCase, result: ExecutionResult) -> CaseResult {
    let hidden = test_case.is_hidden;
    CaseResult {
        index,
        hidden,
        passed: result.passed(),
        status: result.status,
        input: (!hidden).then(|| test_case.input.clone()),
        expected_output: (!hidden).then(|| test_case.expected_output.clone()),
        actual_output: (!hidden).then_some(result.actual_output),
        error: result.error,
        runtime_ms: result.runtime_ms,
        memory_kb: result.memory_kb,
    }
}

pub fn aggregate(test_results: Vec<CaseResult>) -> Evaluation {
    let total = test_results.len();
    let passed = test_results.iter().filter(|r| r.passed).count();
    let status = derive_status(passed, total);

    Evaluation {
        status,
        passed_count: passed as i32,
        total_count: total as i32,
        score: score(passed, total),
        runtime_ms: test_results.iter().map(|r| r.runtime_ms).max().unwrap_or(0),
        memory_kb: test_results.iter().map(|r| r.memory_kb).max().unwrap_or(0),
        feedback: feedback(status, passed, total, &test_results),
        test_results,
    }
}

pub fn derive_status(passed: usize, total: usize) -> SubmissionStatus {
    if total > 0 && passed == total {
        SubmissionStatus::Accepted
    } else if passed > 0 {
        SubmissionStatus::Partial
    } else {
        SubmissionStatus::WrongAnswer
    }
}

/// `passed / total * 100`, rounded half-up to two decimals.
pub fn score(passed: usize, total: usize) -> BigDecimal {
    if total == 0 {
        return BigDecimal::from(0).with_scale(2);
    }
    let raw = BigDecimal::from(passed.min(total) as u64 * 100) / BigDecimal::from(total as u64);
    raw.with_scale_round(2, RoundingMode::HalfUp)
}

fn feedback(status: SubmissionStatus, passed: usize, total: usize, results: &[CaseResult]) -> String {
    let summary = match status {
        SubmissionStatus::Accepted => format!("All {} test cases passed.", total),
        SubmissionStatus::Partial => format!("{} of {} test cases passed.", passed, total),
        _ => format!("No test cases passed (0 of {}).", total),
    };

    match results.iter().find(|r| !r.passed) {
        Some(failure) => {
            let reason = failure.error.as_deref().unwrap_or("wrong answer");
            let label = if failure.hidden { " (hidden)" } else { "" };
            format!(
                "{} First failure on test case {}{}: {}.",
                summary,
                failure.index + 1,
                label,
                reason
            )
        }
        None => summary,
    }
}

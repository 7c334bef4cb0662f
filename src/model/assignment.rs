use crate::errors::AppError;
use crate::model::problem::TestCase;
use crate::schema::{assignment_submissions, assignments};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub text: String,
    /// Withheld (`None`) in learner-facing views.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AssignmentQuestion {
    #[serde(rename_all = "camelCase")]
    Mcq {
        #[serde(default)]
        id: String,
        prompt: String,
        points: i32,
        options: Vec<QuestionOption>,
    },
    #[serde(rename_all = "camelCase")]
    Coding {
        #[serde(default)]
        id: String,
        prompt: String,
        points: i32,
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        starter_code: Option<String>,
        #[serde(default)]
        test_cases: Vec<TestCase>,
    },
}

impl AssignmentQuestion {
    pub fn id(&self) -> &str {
        match self {
            AssignmentQuestion::Mcq { id, .. } | AssignmentQuestion::Coding { id, .. } => id,
        }
    }

    pub fn points(&self) -> i32 {
        match self {
            AssignmentQuestion::Mcq { points, .. } | AssignmentQuestion::Coding { points, .. } => {
                *points
            }
        }
    }

    pub fn is_coding(&self) -> bool {
        matches!(self, AssignmentQuestion::Coding { .. })
    }

    fn id_mut(&mut self) -> &mut String {
        match self {
            AssignmentQuestion::Mcq { id, .. } | AssignmentQuestion::Coding { id, .. } => id,
        }
    }

    pub fn has_id(&self) -> bool {
        !self.id().trim().is_empty()
    }

    /// Takes `id` only when the author did not provide one.
    pub fn inherit_id(&mut self, id: &str) {
        if !self.has_id() {
            *self.id_mut() = id.to_string();
        }
    }

    /// Assigns a fresh id when the author did not provide one.
    pub fn ensure_id(&mut self) {
        if !self.has_id() {
            *self.id_mut() = uuid::Uuid::new_v4().to_string();
        }
    }

    /// Learner view: no correctness flags, no hidden coding cases.
    pub fn redacted(&self) -> Self {
        match self.clone() {
            AssignmentQuestion::Mcq {
                id,
                prompt,
                points,
                options,
            } => AssignmentQuestion::Mcq {
                id,
                prompt,
                points,
                options: options
                    .into_iter()
                    .map(|option| QuestionOption {
                        text: option.text,
                        is_correct: None,
                    })
                    .collect(),
            },
            AssignmentQuestion::Coding {
                id,
                prompt,
                points,
                language,
                starter_code,
                test_cases,
            } => AssignmentQuestion::Coding {
                id,
                prompt,
                points,
                language,
                starter_code,
                test_cases: test_cases.into_iter().filter(|c| !c.is_hidden).collect(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnswer {
    pub question_id: String,
    #[serde(default)]
    pub selected_option: Option<usize>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: String,
    pub earned: i32,
    pub possible: i32,
    pub answered: bool,
    /// `None` for coding questions awaiting review.
    pub correct: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSubmissionStatus {
    InProgress,
    Submitted,
    Graded,
}

impl AssignmentSubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentSubmissionStatus::InProgress => "in_progress",
            AssignmentSubmissionStatus::Submitted => "submitted",
            AssignmentSubmissionStatus::Graded => "graded",
        }
    }
}

impl FromStr for AssignmentSubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AssignmentSubmissionStatus::InProgress),
            "submitted" => Ok(AssignmentSubmissionStatus::Submitted),
            "graded" => Ok(AssignmentSubmissionStatus::Graded),
            other => Err(format!("unknown assignment submission status '{}'", other)),
        }
    }
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = assignments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Assignment {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub questions: JsonValue,
    pub due_date: DateTime<Utc>,
    pub assigned_user_ids: Vec<i64>,
    pub assigned_group_ids: Vec<i64>,
    pub max_attempts: i32,
    pub is_published: bool,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn questions(&self) -> Result<Vec<AssignmentQuestion>, AppError> {
        Ok(serde_json::from_value(self.questions.clone())?)
    }

    pub fn is_untargeted(&self) -> bool {
        self.assigned_user_ids.is_empty() && self.assigned_group_ids.is_empty()
    }

    /// Whether a learner (with the given group memberships) is a target.
    pub fn targets(&self, user_id: i64, group_ids: &[i64]) -> bool {
        self.is_untargeted()
            || self.assigned_user_ids.contains(&user_id)
            || self
                .assigned_group_ids
                .iter()
                .any(|group_id| group_ids.contains(group_id))
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = assignments)]
pub struct NewAssignment {
    pub title: String,
    pub description: String,
    pub questions: JsonValue,
    pub due_date: DateTime<Utc>,
    pub assigned_user_ids: Vec<i64>,
    pub assigned_group_ids: Vec<i64>,
    pub max_attempts: i32,
    pub is_published: bool,
    pub created_by: Option<i64>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = assignments)]
pub struct AssignmentChangeset {
    pub title: String,
    pub description: String,
    pub questions: JsonValue,
    pub due_date: DateTime<Utc>,
    pub assigned_user_ids: Vec<i64>,
    pub assigned_group_ids: Vec<i64>,
    pub max_attempts: i32,
    pub is_published: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub questions: Vec<AssignmentQuestion>,
    pub due_date: DateTime<Utc>,
    pub assigned_user_ids: Vec<i64>,
    pub assigned_group_ids: Vec<i64>,
    pub max_attempts: i32,
    pub is_published: bool,
    pub total_points: i32,
    pub created_at: DateTime<Utc>,
}

impl AssignmentResponse {
    pub fn from_assignment(assignment: Assignment, redact: bool) -> Result<Self, AppError> {
        let questions = assignment.questions()?;
        let total_points = questions.iter().map(AssignmentQuestion::points).sum();
        let questions = if redact {
            questions.iter().map(AssignmentQuestion::redacted).collect()
        } else {
            questions
        };

        Ok(AssignmentResponse {
            id: assignment.id,
            title: assignment.title,
            description: assignment.description,
            questions,
            due_date: assignment.due_date,
            assigned_user_ids: assignment.assigned_user_ids,
            assigned_group_ids: assignment.assigned_group_ids,
            max_attempts: assignment.max_attempts,
            is_published: assignment.is_published,
            total_points,
            created_at: assignment.created_at,
        })
    }
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = assignment_submissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AssignmentSubmission {
    pub id: i64,
    pub assignment_id: i64,
    pub user_id: i64,
    pub attempt: i32,
    pub answers: JsonValue,
    pub results: JsonValue,
    pub score: i32,
    pub max_score: i32,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = assignment_submissions)]
pub struct NewAssignmentSubmission {
    pub assignment_id: i64,
    pub user_id: i64,
    pub attempt: i32,
    pub answers: JsonValue,
    pub max_score: i32,
    pub status: String,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = assignment_submissions)]
pub struct GradedSubmissionChangeset {
    pub answers: JsonValue,
    pub results: JsonValue,
    pub score: i32,
    pub max_score: i32,
    pub status: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSubmissionResponse {
    pub id: i64,
    pub assignment_id: i64,
    pub user_id: i64,
    pub attempt: i32,
    pub answers: Vec<QuestionAnswer>,
    pub results: Vec<QuestionResult>,
    pub score: i32,
    pub max_score: i32,
    pub percentage: i32,
    pub status: String,
    pub attempts_remaining: i32,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl AssignmentSubmissionResponse {
    pub fn build(
        submission: AssignmentSubmission,
        attempts_remaining: i32,
    ) -> Result<Self, AppError> {
        Ok(AssignmentSubmissionResponse {
            id: submission.id,
            assignment_id: submission.assignment_id,
            user_id: submission.user_id,
            attempt: submission.attempt,
            answers: serde_json::from_value(submission.answers)?,
            results: serde_json::from_value(submission.results)?,
            percentage: crate::grading::percentage(submission.score, submission.max_score),
            score: submission.score,
            max_score: submission.max_score,
            status: submission.status,
            attempts_remaining,
            started_at: submission.started_at,
            submitted_at: submission.submitted_at,
        })
    }
}

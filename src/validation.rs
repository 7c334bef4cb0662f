//! Request-shape rules for every entity, checked before anything touches storage.

use crate::errors::AppError;
use crate::model::assignment::AssignmentQuestion;
use crate::model::submission::Language;
use crate::payloads::admin::{
    AddGroupMembersPayload, CreateAnnouncementPayload, CreateGroupPayload, UpdateRolePayload,
};
use crate::payloads::assignment::{AssignmentPayload, SaveAnswersPayload, SubmitAssignmentPayload};
use crate::payloads::auth::{
    GoogleCredentialPayload, LoginPayload, RegisterPayload, UpdateProfilePayload,
};
use crate::payloads::contest::CreateContestPayload;
use crate::payloads::course::{
    CreateCoursePayload, CreateModulePayload, UpdateCoursePayload, UpdateModulePayload,
};
use crate::payloads::problem::ProblemPayload;
use crate::payloads::submission::{RunCodePayload, SubmitSolutionPayload};
use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use tracing::warn;
use url::Url;

const MAX_TITLE_LEN: usize = 255;
const MAX_CODE_BYTES: usize = 64 * 1024;
const MIN_PASSWORD_LEN: usize = 8;
const COURSE_DIFFICULTIES: [&str; 3] = ["beginner", "intermediate", "advanced"];

pub trait Validate {
    /// Returns every violated rule, not just the first.
    fn validate(&self) -> Result<(), Vec<String>>;
}

/// JSON body extractor that also runs [`Validate`].
///
/// Malformed JSON becomes `400` with the parser message; rule violations
/// become `400` with the full `errors` list.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                warn!("Rejected malformed request body: {}", rejection.body_text());
                AppError::BadRequest(rejection.body_text())
            })?;

        value.validate().map_err(|errors| {
            warn!("Request body failed validation: {:?}", errors);
            AppError::Validation(errors)
        })?;

        Ok(ValidatedJson(value))
    }
}

#[derive(Default)]
struct Violations(Vec<String>);

impl Violations {
    fn check(&mut self, ok: bool, message: impl Into<String>) {
        if !ok {
            self.0.push(message.into());
        }
    }

    fn required(&mut self, field: &str, value: &str) {
        self.check(!value.trim().is_empty(), format!("{} is required", field));
    }

    fn title(&mut self, field: &str, value: &str) {
        self.required(field, value);
        self.check(
            value.chars().count() <= MAX_TITLE_LEN,
            format!("{} must be at most {} characters", field, MAX_TITLE_LEN),
        );
    }

    fn url(&mut self, field: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.check(
                Url::parse(value).is_ok(),
                format!("{} must be a valid URL", field),
            );
        }
    }

    fn code(&mut self, code: &str) {
        self.required("code", code);
        self.check(
            code.len() <= MAX_CODE_BYTES,
            format!("code must be at most {} bytes", MAX_CODE_BYTES),
        );
    }

    fn finish(self) -> Result<(), Vec<String>> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.0)
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.trim().split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

impl Validate for RegisterPayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        v.check(is_valid_email(&self.email), "email must be a valid address");
        v.check(
            self.password.chars().count() >= MIN_PASSWORD_LEN,
            format!("password must be at least {} characters", MIN_PASSWORD_LEN),
        );
        v.title("displayName", &self.display_name);
        v.finish()
    }
}

impl Validate for LoginPayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        v.required("email", &self.email);
        v.required("password", &self.password);
        v.finish()
    }
}

impl Validate for GoogleCredentialPayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        v.required("credential", &self.credential);
        v.finish()
    }
}

impl Validate for UpdateProfilePayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        if let Some(display_name) = &self.display_name {
            v.title("displayName", display_name);
        }
        v.url("avatarUrl", self.avatar_url.as_deref());
        v.finish()
    }
}

impl Validate for ProblemPayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        v.title("title", &self.title);
        v.required("description", &self.description);
        v.check(!self.examples.is_empty(), "at least one example is required");
        v.check(
            !self.test_cases.is_empty(),
            "at least one test case is required",
        );
        v.check(self.points >= 0, "points must not be negative");
        v.check(self.time_limit_ms > 0, "timeLimitMs must be positive");
        v.check(self.memory_limit_kb > 0, "memoryLimitKb must be positive");
        v.check(
            self.tags.iter().all(|tag| !tag.trim().is_empty()),
            "tags must not be blank",
        );
        for (index, case) in self.test_cases.iter().enumerate() {
            v.check(
                case.time_limit_ms.is_none_or(|limit| limit > 0),
                format!("testCases[{}].timeLimitMs must be positive", index),
            );
            v.check(
                case.memory_limit_kb.is_none_or(|limit| limit > 0),
                format!("testCases[{}].memoryLimitKb must be positive", index),
            );
        }
        for language in self.starter_code.keys() {
            v.check(
                language.parse::<Language>().is_ok(),
                format!("starterCode has unsupported language '{}'", language),
            );
        }
        v.finish()
    }
}

impl Validate for RunCodePayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        v.code(&self.code);
        v.finish()
    }
}

impl Validate for SubmitSolutionPayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        v.code(&self.code);
        v.finish()
    }
}

impl Validate for CreateContestPayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        v.title("title", &self.title);
        v.check(
            self.end_time > self.start_time,
            "endTime must be after startTime",
        );
        v.check(
            !self.problem_ids.is_empty(),
            "at least one problem is required",
        );
        let unique: HashSet<_> = self.problem_ids.iter().collect();
        v.check(
            unique.len() == self.problem_ids.len(),
            "problemIds must not contain duplicates",
        );
        v.finish()
    }
}

fn check_course_difficulty(v: &mut Violations, difficulty: &str) {
    v.check(
        COURSE_DIFFICULTIES.contains(&difficulty),
        format!(
            "difficulty must be one of {}",
            COURSE_DIFFICULTIES.join(", ")
        ),
    );
}

impl Validate for CreateCoursePayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        v.title("title", &self.title);
        check_course_difficulty(&mut v, &self.difficulty);
        v.url("thumbnailUrl", self.thumbnail_url.as_deref());
        v.finish()
    }
}

impl Validate for UpdateCoursePayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        if let Some(title) = &self.title {
            v.title("title", title);
        }
        if let Some(difficulty) = &self.difficulty {
            check_course_difficulty(&mut v, difficulty);
        }
        v.url("thumbnailUrl", self.thumbnail_url.as_deref());
        v.finish()
    }
}

impl Validate for CreateModulePayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        v.title("title", &self.title);
        v.url("videoUrl", self.video_url.as_deref());
        v.check(
            self.position.is_none_or(|p| p >= 0),
            "position must not be negative",
        );
        v.finish()
    }
}

impl Validate for UpdateModulePayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        if let Some(title) = &self.title {
            v.title("title", title);
        }
        v.url("videoUrl", self.video_url.as_deref());
        v.check(
            self.position.is_none_or(|p| p >= 0),
            "position must not be negative",
        );
        v.finish()
    }
}

impl Validate for AssignmentPayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        v.title("title", &self.title);
        v.check(
            !self.questions.is_empty(),
            "at least one question is required",
        );
        v.check(self.max_attempts >= 1, "maxAttempts must be at least 1");

        let mut seen_ids = HashSet::new();
        for (index, question) in self.questions.iter().enumerate() {
            let id = question.id().trim();
            if !id.is_empty() {
                v.check(
                    seen_ids.insert(id.to_string()),
                    format!("questions[{}] reuses id '{}'", index, id),
                );
            }
            v.check(
                question.points() > 0,
                format!("questions[{}].points must be positive", index),
            );
            match question {
                AssignmentQuestion::Mcq {
                    prompt, options, ..
                } => {
                    v.required(&format!("questions[{}].prompt", index), prompt);
                    v.check(
                        options.len() >= 2,
                        format!("questions[{}] needs at least two options", index),
                    );
                    v.check(
                        options.iter().any(|o| o.is_correct == Some(true)),
                        format!(
                            "questions[{}] needs at least one option marked isCorrect",
                            index
                        ),
                    );
                    v.check(
                        options.iter().all(|o| !o.text.trim().is_empty()),
                        format!("questions[{}] has a blank option", index),
                    );
                }
                AssignmentQuestion::Coding {
                    prompt, language, ..
                } => {
                    v.required(&format!("questions[{}].prompt", index), prompt);
                    if let Some(language) = language {
                        v.check(
                            language.parse::<Language>().is_ok(),
                            format!(
                                "questions[{}] has unsupported language '{}'",
                                index, language
                            ),
                        );
                    }
                }
            }
        }
        v.finish()
    }
}

impl Validate for SaveAnswersPayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        let mut seen = HashSet::new();
        for answer in &self.answers {
            v.required("answers[].questionId", &answer.question_id);
            v.check(
                seen.insert(answer.question_id.as_str()),
                format!("question '{}' answered more than once", answer.question_id),
            );
        }
        v.finish()
    }
}

impl Validate for SubmitAssignmentPayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        match &self.answers {
            Some(answers) => SaveAnswersPayload {
                answers: answers.clone(),
            }
            .validate(),
            None => Ok(()),
        }
    }
}

impl Validate for UpdateRolePayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }
}

impl Validate for CreateGroupPayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        v.title("name", &self.name);
        v.finish()
    }
}

impl Validate for AddGroupMembersPayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        v.check(!self.user_ids.is_empty(), "userIds must not be empty");
        v.finish()
    }
}

impl Validate for CreateAnnouncementPayload {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Violations::default();
        v.title("title", &self.title);
        v.required("body", &self.body);
        v.finish()
    }
}

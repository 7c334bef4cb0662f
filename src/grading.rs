//! Scores a finished assignment attempt.

use crate::model::assignment::{
    AssignmentQuestion, AssignmentSubmissionStatus, QuestionAnswer, QuestionResult,
};

#[derive(Debug, Clone, PartialEq)]
pub struct GradeReport {
    pub score: i32,
    pub max_score: i32,
    pub results: Vec<QuestionResult>,
    pub status: AssignmentSubmissionStatus,
}

/// MCQ answers earn full points only when the chosen option is flagged correct.
/// Coding answers are recorded but score zero until someone reviews them, which
/// leaves the attempt `submitted` rather than `graded`.
pub fn grade(questions: &[AssignmentQuestion], answers: &[QuestionAnswer]) -> GradeReport {
    let results: Vec<QuestionResult> = questions
        .iter()
        .map(|question| {
            let answer = answers.iter().find(|a| a.question_id == question.id());
            grade_question(question, answer)
        })
        .collect();

    let has_coding = questions.iter().any(AssignmentQuestion::is_coding);

    GradeReport {
        score: results.iter().map(|r| r.earned).sum(),
        max_score: max_score(questions),
        results,
        status: if has_coding {
            AssignmentSubmissionStatus::Submitted
        } else {
            AssignmentSubmissionStatus::Graded
        },
    }
}

pub fn max_score(questions: &[AssignmentQuestion]) -> i32 {
    questions.iter().map(|q| q.points().max(0)).sum()
}

fn grade_question(question: &AssignmentQuestion, answer: Option<&QuestionAnswer>) -> QuestionResult {
    match question {
        AssignmentQuestion::Mcq {
            id,
            points,
            options,
            ..
        } => {
            let selected = answer.and_then(|a| a.selected_option);
            let correct = selected
                .and_then(|index| options.get(index))
                .map(|option| option.is_correct.unwrap_or(false))
                .unwrap_or(false);

            QuestionResult {
                question_id: id.clone(),
                earned: if correct { (*points).max(0) } else { 0 },
                possible: (*points).max(0),
                answered: selected.is_some(),
                correct: Some(correct),
            }
        }
        AssignmentQuestion::Coding { id, points, .. } => QuestionResult {
            question_id: id.clone(),
            earned: 0,
            possible: (*points).max(0),
            answered: answer
                .and_then(|a| a.code.as_deref())
                .is_some_and(|code| !code.trim().is_empty()),
            correct: None,
        },
    }
}

/// Whole-number percentage clamped to [0, 100].
pub fn percentage(score: i32, max_score: i32) -> i32 {
    if max_score <= 0 {
        return 0;
    }
    let pct = (score as f64 / max_score as f64 * 100.0).round() as i32;
    pct.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::assignment::QuestionOption;

    fn mcq(id: &str, points: i32, correct_index: usize) -> AssignmentQuestion {
        AssignmentQuestion::Mcq {
            id: id.to_string(),
            prompt: format!("Question {}", id),
            points,
            options: (0..3)
                .map(|i| QuestionOption {
                    text: format!("option {}", i),
                    is_correct: Some(i == correct_index),
                })
                .collect(),
        }
    }

    fn coding(id: &str, points: i32) -> AssignmentQuestion {
        AssignmentQuestion::Coding {
            id: id.to_string(),
            prompt: "Reverse a string".to_string(),
            points,
            language: Some("python".to_string()),
            starter_code: None,
            test_cases: vec![],
        }
    }

    fn pick(question_id: &str, option: usize) -> QuestionAnswer {
        QuestionAnswer {
            question_id: question_id.to_string(),
            selected_option: Some(option),
            code: None,
            language: None,
        }
    }

    #[test]
    fn mcq_only_attempt_is_graded() {
        let questions = vec![mcq("q1", 5, 1), mcq("q2", 3, 0)];
        let answers = vec![pick("q1", 1), pick("q2", 2)];

        let report = grade(&questions, &answers);

        assert_eq!(report.score, 5);
        assert_eq!(report.max_score, 8);
        assert_eq!(report.status, AssignmentSubmissionStatus::Graded);
        assert_eq!(report.results[0].correct, Some(true));
        assert_eq!(report.results[1].correct, Some(false));
        assert_eq!(report.results[1].earned, 0);
    }

    #[test]
    fn missing_and_out_of_range_answers_score_zero() {
        let questions = vec![mcq("q1", 5, 0), mcq("q2", 5, 0)];
        let answers = vec![pick("q2", 17)];

        let report = grade(&questions, &answers);

        assert_eq!(report.score, 0);
        assert!(!report.results[0].answered);
        assert!(report.results[1].answered);
        assert_eq!(report.results[1].correct, Some(false));
    }

    #[test]
    fn coding_question_leaves_attempt_submitted() {
        let questions = vec![mcq("q1", 2, 2), coding("c1", 10)];
        let answers = vec![
            pick("q1", 2),
            QuestionAnswer {
                question_id: "c1".to_string(),
                selected_option: None,
                code: Some("print(input()[::-1])".to_string()),
                language: Some("python".to_string()),
            },
        ];

        let report = grade(&questions, &answers);

        assert_eq!(report.score, 2);
        assert_eq!(report.max_score, 12);
        assert_eq!(report.status, AssignmentSubmissionStatus::Submitted);
        assert_eq!(report.results[1].correct, None);
        assert!(report.results[1].answered);
    }

    #[test]
    fn percentage_is_clamped() {
        assert_eq!(percentage(5, 8), 63);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(12, 10), 100);
        assert_eq!(percentage(-3, 10), 0);
    }
}

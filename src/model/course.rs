use crate::schema::{course_enrollments, course_modules, courses};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = courses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub is_public: bool,
    pub category: String,
    pub difficulty: String,
    pub thumbnail_url: Option<String>,
    pub enrollment_count: i32,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = courses)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub is_public: bool,
    pub category: String,
    pub difficulty: String,
    pub thumbnail_url: Option<String>,
    pub created_by: Option<i64>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = courses)]
pub struct CourseChangeset {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub thumbnail_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub is_public: bool,
    pub category: String,
    pub difficulty: String,
    pub thumbnail_url: Option<String>,
    pub enrollment_count: i32,
    pub module_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseResponse {
    pub fn build(course: Course, module_ids: Vec<i64>) -> Self {
        CourseResponse {
            id: course.id,
            title: course.title,
            description: course.description,
            is_public: course.is_public,
            category: course.category,
            difficulty: course.difficulty,
            thumbnail_url: course.thumbnail_url,
            enrollment_count: course.enrollment_count,
            module_ids,
            created_at: course.created_at,
            updated_at: course.updated_at,
        }
    }
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = course_modules)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct CourseModule {
    pub id: i64,
    pub course_id: i64,
    pub position: i32,
    pub title: String,
    pub content: String,
    pub video_url: Option<String>,
    pub code_example: Option<String>,
    pub code_language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = course_modules)]
pub struct NewCourseModule {
    pub course_id: i64,
    pub position: i32,
    pub title: String,
    pub content: String,
    pub video_url: Option<String>,
    pub code_example: Option<String>,
    pub code_language: Option<String>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = course_modules)]
pub struct CourseModuleChangeset {
    pub position: Option<i32>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub code_example: Option<String>,
    pub code_language: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = course_enrollments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct CourseEnrollment {
    pub id: i64,
    pub course_id: i64,
    pub user_id: i64,
    pub completed_module_ids: Vec<i64>,
    pub progress: i32,
    pub enrolled_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = course_enrollments)]
pub struct NewCourseEnrollment {
    pub course_id: i64,
    pub user_id: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EnrollResponse {
    pub enrollment: CourseEnrollment,
    pub already_enrolled: bool,
}

/// Share of the course's current modules the learner has completed, in whole percent.
/// Ids of modules that no longer exist are ignored.
pub fn compute_progress(completed: &[i64], module_ids: &[i64]) -> i32 {
    if module_ids.is_empty() {
        return 0;
    }
    let done = module_ids.iter().filter(|id| completed.contains(id)).count();
    ((done as f64 / module_ids.len() as f64) * 100.0).round() as i32
}

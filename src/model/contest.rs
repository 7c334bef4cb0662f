use crate::contest::ContestStatus;
use crate::schema::contests;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = contests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Contest {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub problem_ids: Vec<i64>,
    pub participant_ids: Vec<i64>,
    pub prize_pool: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Contest {
    pub fn status_at(&self, now: DateTime<Utc>) -> ContestStatus {
        ContestStatus::at(now, self.start_time, self.end_time)
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = contests)]
pub struct NewContest {
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub problem_ids: Vec<i64>,
    pub prize_pool: Option<String>,
    pub created_by: Option<i64>,
    // participant_ids defaults to an empty array
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ContestResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ContestStatus,
    pub problem_ids: Vec<i64>,
    pub participant_count: usize,
    pub is_registered: bool,
    pub prize_pool: Option<String>,
}

impl ContestResponse {
    pub fn build(contest: Contest, viewer_id: i64, now: DateTime<Utc>) -> Self {
        ContestResponse {
            status: contest.status_at(now),
            is_registered: contest.participant_ids.contains(&viewer_id),
            participant_count: contest.participant_ids.len(),
            id: contest.id,
            title: contest.title,
            description: contest.description,
            start_time: contest.start_time,
            end_time: contest.end_time,
            problem_ids: contest.problem_ids,
            prize_pool: contest.prize_pool,
        }
    }
}

use crate::contest::ContestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateContestPayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub problem_ids: Vec<i64>,
    #[serde(default)]
    pub prize_pool: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ListContestsParams {
    pub status: Option<ContestStatus>,
}

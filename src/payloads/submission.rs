use crate::model::submission::Language;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RunCodePayload {
    pub problem_id: i64,
    pub code: String,
    pub language: Language,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSolutionPayload {
    pub problem_id: i64,
    pub code: String,
    pub language: Language,
    #[serde(default)]
    pub contest_id: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListSubmissionsParams {
    pub problem_id: Option<i64>,
    pub user_id: Option<i64>,
    pub limit: Option<i64>,
}

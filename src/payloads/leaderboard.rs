use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct LeaderboardParams {
    pub limit: Option<i64>,
}

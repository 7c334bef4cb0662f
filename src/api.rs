pub(crate) mod helper;

pub mod admin;
pub mod assignments;
pub mod auth;
pub mod contests;
pub mod courses;
pub mod leaderboard;
pub mod problems;
pub mod submissions;

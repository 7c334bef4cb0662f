pub mod admin;
pub mod assignment;
pub mod auth;
pub mod contest;
pub mod course;
pub mod leaderboard;
pub mod problem;
pub mod submission;

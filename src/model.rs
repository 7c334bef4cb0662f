pub mod admin;
pub mod assignment;
pub mod contest;
pub mod course;
pub mod problem;
pub mod submission;
pub mod user;

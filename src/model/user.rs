use crate::schema::users;
use chrono::{DateTime, Days, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: String,
    pub role: String,
    pub problems_solved: i32,
    pub points: i32,
    pub streak: i32,
    pub last_solved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Unknown stored roles degrade to the least privileged one.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Student)
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    // stats, bio and timestamps have DB defaults
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = users)]
pub struct UserProfileChangeset {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: String,
    pub role: Role,
    pub problems_solved: i32,
    pub points: i32,
    pub streak: i32,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        let role = user.role();
        UserProfile {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            bio: user.bio,
            role,
            problems_solved: user.problems_solved,
            points: user.points,
            streak: user.streak,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: i64,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub points: i32,
    pub problems_solved: i32,
    pub streak: i32,
}

/// Consecutive-day solving streak after a first acceptance at `now`.
/// Solving again on the same day keeps it, the next day extends it, any gap restarts it.
pub fn next_streak(last_solved_at: Option<DateTime<Utc>>, streak: i32, now: DateTime<Utc>) -> i32 {
    let today = now.date_naive();
    match last_solved_at.map(|at| at.date_naive()) {
        Some(day) if day == today => streak.max(1),
        Some(day) if today.checked_sub_days(Days::new(1)) == Some(day) => streak + 1,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn streak_progression() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        assert_eq!(next_streak(None, 0, now), 1);
        assert_eq!(next_streak(Some(now - Duration::hours(2)), 3, now), 3);
        assert_eq!(next_streak(Some(now - Duration::days(1)), 3, now), 4);
        assert_eq!(next_streak(Some(now - Duration::days(3)), 3, now), 1);
    }

    #[test]
    fn role_parsing() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("teacher".parse::<Role>().is_err());
    }
}

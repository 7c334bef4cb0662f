//! Contest status derivation and standings.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Derived from the clock on every read and never stored.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContestStatus {
    Upcoming,
    Active,
    Past,
}

impl ContestStatus {
    /// The window is half-open: `[start, end)`.
    pub fn at(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if now < start {
            ContestStatus::Upcoming
        } else if now < end {
            ContestStatus::Active
        } else {
            ContestStatus::Past
        }
    }
}

/// One scored attempt considered for the standings.
#[derive(Debug, Clone)]
pub struct ScoredAttempt {
    pub user_id: i64,
    pub problem_id: i64,
    pub score: BigDecimal,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub rank: usize,
    pub user_id: i64,
    pub display_name: String,
    pub total_score: BigDecimal,
    pub solved: usize,
    pub last_improvement_at: Option<DateTime<Utc>>,
}

struct Tally {
    best: HashMap<i64, (BigDecimal, DateTime<Utc>)>,
}

/// Sums each participant's best score per problem. Ties go to whoever reached
/// their total first, then to the lower user id. Participants without
/// attempts are listed last with a zero total.
pub fn rank(participants: &[(i64, String)], attempts: &[ScoredAttempt]) -> Vec<Standing> {
    let mut tallies: HashMap<i64, Tally> = HashMap::new();

    let mut ordered: Vec<&ScoredAttempt> = attempts.iter().collect();
    ordered.sort_by_key(|a| a.submitted_at);

    for attempt in ordered {
        let tally = tallies.entry(attempt.user_id).or_insert_with(|| Tally {
            best: HashMap::new(),
        });
        let improves = tally
            .best
            .get(&attempt.problem_id)
            .is_none_or(|(best, _)| attempt.score > *best);
        if improves {
            tally.best.insert(
                attempt.problem_id,
                (attempt.score.clone(), attempt.submitted_at),
            );
        }
    }

    let hundred = BigDecimal::from(100);
    let mut standings: Vec<Standing> = participants
        .iter()
        .map(|(user_id, display_name)| {
            let (total_score, solved, last_improvement_at) = match tallies.get(user_id) {
                Some(tally) => (
                    tally
                        .best
                        .values()
                        .fold(BigDecimal::from(0), |acc, (score, _)| acc + score),
                    tally
                        .best
                        .values()
                        .filter(|(score, _)| *score >= hundred)
                        .count(),
                    tally.best.values().map(|(_, at)| *at).max(),
                ),
                None => (BigDecimal::from(0), 0, None),
            };
            Standing {
                rank: 0,
                user_id: *user_id,
                display_name: display_name.clone(),
                total_score: total_score.with_scale(2),
                solved,
                last_improvement_at,
            }
        })
        .collect();

    standings.sort_by(|a, b| {
        b.total_score
            .cmp(&a.total_score)
            .then_with(|| match (a.last_improvement_at, b.last_improvement_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    for (position, standing) in standings.iter_mut().enumerate() {
        standing.rank = position + 1;
    }
    standings
}

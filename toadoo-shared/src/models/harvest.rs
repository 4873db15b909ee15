/// Harvest history and leaderboard
///
/// Harvesting deletes a user's completed todos and credits them to the
/// lifetime `users.total_completed_count`. Every non-empty harvest also
/// appends one `harvest_history` row, which backs the weekly and monthly
/// leaderboards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// One harvest event
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct HarvestRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub count: i64,
    pub harvested_at: DateTime<Utc>,
}

/// Result of a harvest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HarvestOutcome {
    /// Completed todos removed by this harvest
    pub harvested: i64,

    /// Lifetime counter after the harvest
    pub total_completed_count: i64,
}

/// Leaderboard time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardPeriod {
    /// Lifetime counter
    #[default]
    AllTime,

    /// Harvests in the last 7 days
    Weekly,

    /// Harvests in the last 30 days
    Monthly,
}

impl LeaderboardPeriod {
    /// Length of the window, `None` for all time
    pub fn window(&self) -> Option<Duration> {
        match self {
            LeaderboardPeriod::AllTime => None,
            LeaderboardPeriod::Weekly => Some(Duration::days(7)),
            LeaderboardPeriod::Monthly => Some(Duration::days(30)),
        }
    }
}

/// Leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: u32,
    pub user_id: Uuid,
    pub username: String,
    pub completed: i64,
}

impl LeaderboardEntry {
    /// Numbers rows that are already sorted best-first
    pub fn ranked(rows: Vec<(Uuid, String, i64)>) -> Vec<Self> {
        rows.into_iter()
            .zip(1u32..)
            .map(|((user_id, username, completed), rank)| LeaderboardEntry {
                rank,
                user_id,
                username,
                completed,
            })
            .collect()
    }
}

impl HarvestRecord {
    /// Appends a harvest event
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        count: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, HarvestRecord>(
            r#"
            INSERT INTO harvest_history (id, user_id, count)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, count, harvested_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(count)
        .fetch_one(executor)
        .await
    }

    /// Deletes all history of a user
    pub async fn delete_by_user<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM harvest_history WHERE user_id = $1")
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Ranks active users by todos harvested since `since`
    pub async fn leaderboard_since<'e, E: PgExecutor<'e>>(
        executor: E,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
        let rows: Vec<(Uuid, String, i64)> = sqlx::query_as(
            r#"
            SELECT u.id, u.username, SUM(h.count)::BIGINT AS completed
            FROM harvest_history h
            JOIN users u ON u.id = h.user_id
            WHERE u.is_active AND h.harvested_at >= $1
            GROUP BY u.id, u.username
            ORDER BY completed DESC, u.username ASC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(executor)
        .await?;

        Ok(LeaderboardEntry::ranked(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_windows() {
        assert_eq!(LeaderboardPeriod::AllTime.window(), None);
        assert_eq!(LeaderboardPeriod::Weekly.window(), Some(Duration::days(7)));
        assert_eq!(LeaderboardPeriod::Monthly.window(), Some(Duration::days(30)));
    }

    #[test]
    fn test_period_serde() {
        let period: LeaderboardPeriod = serde_json::from_str("\"all_time\"").unwrap();
        assert_eq!(period, LeaderboardPeriod::AllTime);
        assert!(serde_json::from_str::<LeaderboardPeriod>("\"daily\"").is_err());
    }

    #[test]
    fn test_ranked_is_one_based() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let entries =
            LeaderboardEntry::ranked(vec![(a, "amy".to_string(), 9), (b, "bob".to_string(), 4)]);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[0].user_id, a);
        assert_eq!(entries[1].rank, 2);
        assert_eq!(entries[1].completed, 4);
    }
}

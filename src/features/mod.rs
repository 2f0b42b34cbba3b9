pub mod rolling;
pub mod team_stats;

use crate::database::MatchStatus;
use crate::error::{Error, Result};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::debug;

/// Running aggregate for one team, as stored in `team_stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, sqlx::FromRow)]
pub struct TeamStats {
    pub team_id: i32,
    pub wins: i32,
    pub draws: i32,
    pub matches_played: i32,
}

impl TeamStats {
    /// Points won as a share of points available. `None` before a team has played.
    pub fn form(&self) -> Option<f64> {
        if self.matches_played <= 0 {
            return None;
        }
        Some((self.wins * 3 + self.draws) as f64 / (self.matches_played * 3) as f64)
    }

    pub fn win_rate(&self) -> Option<f64> {
        if self.matches_played <= 0 {
            return None;
        }
        Some(self.wins as f64 / self.matches_played as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchFeatures {
    pub match_id: i32,
    pub home_team_form: Option<f64>,
    pub away_team_form: Option<f64>,
    pub home_team_win_rate: Option<f64>,
    pub away_team_win_rate: Option<f64>,
}

impl MatchFeatures {
    pub fn from_stats(match_id: i32, home: &TeamStats, away: &TeamStats) -> Self {
        Self {
            match_id,
            home_team_form: home.form(),
            away_team_form: away.form(),
            home_team_win_rate: home.win_rate(),
            away_team_win_rate: away.win_rate(),
        }
    }
}

/// Computes and stores features for a finished match in its own transaction.
pub async fn compute_features(pool: &PgPool, match_id: i32) -> Result<MatchFeatures> {
    let mut tx = pool.begin().await?;
    let features = write_features(&mut tx, match_id).await?;
    tx.commit().await?;
    Ok(features)
}

/// Computes and inserts the `match_features` row on an existing connection or transaction.
///
/// Plain insert: a second call for the same match fails with [`Error::ConstraintViolation`].
/// Callers run this once, on the transition to `FINISHED`.
pub async fn write_features(conn: &mut PgConnection, match_id: i32) -> Result<MatchFeatures> {
    let row: Option<(i32, i32, String)> = sqlx::query_as(
        r#"
        SELECT home_team_id, away_team_id, status
        FROM matches
        WHERE match_id = $1
        "#,
    )
    .bind(match_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (home_team_id, away_team_id, status) = row.ok_or(Error::Database(sqlx::Error::RowNotFound))?;

    if status != MatchStatus::Finished.as_str() {
        return Err(Error::ConstraintViolation(format!(
            "match {} is {}, features need a finished match",
            match_id, status
        )));
    }

    let stats: Vec<TeamStats> = sqlx::query_as(
        r#"
        SELECT team_id, wins, draws, matches_played
        FROM team_stats
        WHERE team_id = ANY($1)
        "#,
    )
    .bind(vec![home_team_id, away_team_id])
    .fetch_all(&mut *conn)
    .await?;

    // A team without a stats row is treated as one that has not played yet
    let lookup = |team_id: i32| {
        stats
            .iter()
            .find(|s| s.team_id == team_id)
            .copied()
            .unwrap_or(TeamStats { team_id, ..TeamStats::default() })
    };

    let features = MatchFeatures::from_stats(match_id, &lookup(home_team_id), &lookup(away_team_id));

    sqlx::query(
        r#"
        INSERT INTO match_features (
            match_id, home_team_form, away_team_form,
            home_team_win_rate, away_team_win_rate
        ) VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(features.match_id)
    .bind(features.home_team_form)
    .bind(features.away_team_form)
    .bind(features.home_team_win_rate)
    .bind(features.away_team_win_rate)
    .execute(&mut *conn)
    .await?;

    debug!("Stored features for match {}: {:?}", match_id, features);
    Ok(features)
}

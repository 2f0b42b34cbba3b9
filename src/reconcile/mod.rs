use crate::database::teams::resolve_pair;
use crate::database::MatchStatus;
use crate::error::Result;
use crate::features::write_features;
use crate::understat::{FixtureRecord, ResultRecord};
use sqlx::PgPool;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row existed for the key; one was created.
    Inserted,
    /// An existing scheduled match was settled with its result.
    Finished,
    /// The key already existed and nothing was written.
    Unchanged,
}

/// Merges fetched fixtures and results into the store, one transaction per record.
#[derive(Clone)]
pub struct Reconciler {
    pool: PgPool,
}

impl Reconciler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts a `SCHEDULED` match. An existing row for the key, finished or not, is left alone.
    pub async fn upsert_fixture(&self, record: &FixtureRecord) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let (home_team_id, away_team_id) = resolve_pair(&mut tx, &record.home_team, &record.away_team).await?;

        let inserted: Option<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO matches (home_team_id, away_team_id, match_date, season, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (match_date, home_team_id, away_team_id) DO NOTHING
            RETURNING match_id
            "#,
        )
        .bind(home_team_id)
        .bind(away_team_id)
        .bind(record.match_date)
        .bind(&record.season)
        .bind(MatchStatus::Scheduled.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        let outcome = match inserted {
            Some(match_id) => {
                debug!("Scheduled match {}: {} v {} on {}", match_id, record.home_team, record.away_team, record.match_date);
                UpsertOutcome::Inserted
            }
            None => UpsertOutcome::Unchanged,
        };
        Ok(outcome)
    }

    /// Inserts or settles a `FINISHED` match and computes its features on the transition.
    ///
    /// The status check and the write are one statement (`ON CONFLICT .. WHERE`), so
    /// overlapping passes settle a match at most once. A row comes back only when this
    /// statement created the match or moved it to `FINISHED`.
    pub async fn upsert_result(&self, record: &ResultRecord, season: &str) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let (home_team_id, away_team_id) = resolve_pair(&mut tx, &record.home_team, &record.away_team).await?;

        let written: Option<(i32, bool)> = sqlx::query_as(
            r#"
            INSERT INTO matches (
                home_team_id, away_team_id,
                home_score, away_score,
                match_date, season, status,
                home_xg, away_xg
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (match_date, home_team_id, away_team_id) DO UPDATE SET
                home_score = EXCLUDED.home_score,
                away_score = EXCLUDED.away_score,
                status = EXCLUDED.status,
                home_xg = EXCLUDED.home_xg,
                away_xg = EXCLUDED.away_xg
            WHERE matches.status <> 'FINISHED'
            RETURNING match_id, (xmax = 0) AS inserted
            "#,
        )
        .bind(home_team_id)
        .bind(away_team_id)
        .bind(record.home_score)
        .bind(record.away_score)
        .bind(record.match_date)
        .bind(season)
        .bind(MatchStatus::Finished.as_str())
        .bind(record.home_xg)
        .bind(record.away_xg)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match written {
            Some((match_id, inserted)) => {
                write_features(&mut tx, match_id).await?;
                debug!(
                    "Settled match {}: {} {}-{} {}",
                    match_id, record.home_team, record.home_score, record.away_score, record.away_team
                );
                if inserted {
                    UpsertOutcome::Inserted
                } else {
                    UpsertOutcome::Finished
                }
            }
            None => UpsertOutcome::Unchanged,
        };

        tx.commit().await?;
        Ok(outcome)
    }
}

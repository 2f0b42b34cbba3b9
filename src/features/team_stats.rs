use crate::error::Result;
use sqlx::PgPool;
use tracing::info;

/// Rebuilds `team_stats` from all finished matches.
///
/// `form_points` is the mean of the points a team took from its last five finished matches.
/// Runs outside any reconcile transaction; features computed during a pass see the stats as
/// of the previous refresh.
pub async fn refresh_team_stats(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        WITH appearances AS (
            SELECT
                home_team_id AS team_id,
                match_date,
                match_id,
                CASE
                    WHEN home_score > away_score THEN 3
                    WHEN home_score = away_score THEN 1
                    ELSE 0
                END AS points
            FROM matches
            WHERE status = 'FINISHED'
            UNION ALL
            SELECT
                away_team_id,
                match_date,
                match_id,
                CASE
                    WHEN away_score > home_score THEN 3
                    WHEN away_score = home_score THEN 1
                    ELSE 0
                END
            FROM matches
            WHERE status = 'FINISHED'
        ),
        ranked AS (
            SELECT
                team_id,
                points,
                ROW_NUMBER() OVER (PARTITION BY team_id ORDER BY match_date DESC, match_id DESC) AS recency
            FROM appearances
        )
        INSERT INTO team_stats (team_id, wins, draws, matches_played, form_points, updated_at)
        SELECT
            team_id,
            (COUNT(*) FILTER (WHERE points = 3))::INTEGER,
            (COUNT(*) FILTER (WHERE points = 1))::INTEGER,
            COUNT(*)::INTEGER,
            (AVG(points) FILTER (WHERE recency <= 5))::DOUBLE PRECISION,
            NOW()
        FROM ranked
        GROUP BY team_id
        ON CONFLICT (team_id) DO UPDATE SET
            wins = EXCLUDED.wins,
            draws = EXCLUDED.draws,
            matches_played = EXCLUDED.matches_played,
            form_points = EXCLUDED.form_points,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .execute(pool)
    .await?;

    info!("📊 Team stats refreshed for {} teams", result.rows_affected());
    Ok(result.rows_affected())
}

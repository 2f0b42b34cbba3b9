use crate::error::Result;
use sqlx::PgPool;
use tracing::info;

/// Recomputes `rolling_xg`, `rolling_xga`, `form_5` and `form_10` for every finished match of
/// `season`, from the home team's previous finished matches that season (home or away).
///
/// Windows stop one row short of the current match, so a team's first match gets NULLs.
/// Scores, xG and status are never written here.
pub async fn refresh_rolling_aggregates(pool: &PgPool, season: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        WITH appearances AS (
            SELECT
                match_id,
                match_date,
                home_team_id AS team_id,
                TRUE AS is_home,
                home_xg AS xg,
                away_xg AS xga,
                CASE
                    WHEN home_score > away_score THEN 3
                    WHEN home_score = away_score THEN 1
                    ELSE 0
                END AS points
            FROM matches
            WHERE season = $1 AND status = 'FINISHED'
            UNION ALL
            SELECT
                match_id,
                match_date,
                away_team_id,
                FALSE,
                away_xg,
                home_xg,
                CASE
                    WHEN away_score > home_score THEN 3
                    WHEN away_score = home_score THEN 1
                    ELSE 0
                END
            FROM matches
            WHERE season = $1 AND status = 'FINISHED'
        ),
        windowed AS (
            SELECT
                match_id,
                is_home,
                AVG(xg) OVER last_5 AS rolling_xg,
                AVG(xga) OVER last_5 AS rolling_xga,
                (AVG(points) OVER last_5)::DOUBLE PRECISION AS form_5,
                (AVG(points) OVER last_10)::DOUBLE PRECISION AS form_10
            FROM appearances
            WINDOW
                last_5 AS (PARTITION BY team_id ORDER BY match_date, match_id ROWS BETWEEN 5 PRECEDING AND 1 PRECEDING),
                last_10 AS (PARTITION BY team_id ORDER BY match_date, match_id ROWS BETWEEN 10 PRECEDING AND 1 PRECEDING)
        )
        UPDATE matches m
        SET rolling_xg = w.rolling_xg,
            rolling_xga = w.rolling_xga,
            form_5 = w.form_5,
            form_10 = w.form_10
        FROM windowed w
        WHERE w.match_id = m.match_id AND w.is_home
        "#,
    )
    .bind(season)
    .execute(pool)
    .await?;

    info!("📈 Rolling aggregates refreshed for {} matches in season {}", result.rows_affected(), season);
    Ok(result.rows_affected())
}

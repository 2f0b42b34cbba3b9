use crate::error::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::PgPool;

/// A match as the dashboard sees it, with team names resolved.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MatchRow {
    pub match_id: i32,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub home_xg: Option<f64>,
    pub away_xg: Option<f64>,
    pub match_date: NaiveDateTime,
    pub season: String,
    pub status: String,
    pub rolling_xg: Option<f64>,
    pub rolling_xga: Option<f64>,
    pub form_5: Option<f64>,
    pub form_10: Option<f64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MatchWithFeatures {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub game: MatchRow,
    pub home_team_form: Option<f64>,
    pub away_team_form: Option<f64>,
    pub home_team_win_rate: Option<f64>,
    pub away_team_win_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MatchSummary {
    pub total_matches: i64,
    pub completed_matches: i64,
    pub upcoming_matches: i64,
    pub latest_result: Option<NaiveDateTime>,
    pub next_fixture: Option<NaiveDateTime>,
}

const MATCH_COLUMNS: &str = r#"
    m.match_id,
    ht.team_name AS home_team,
    at.team_name AS away_team,
    m.home_score,
    m.away_score,
    m.home_xg,
    m.away_xg,
    m.match_date,
    m.season,
    m.status,
    m.rolling_xg,
    m.rolling_xga,
    m.form_5,
    m.form_10
"#;

pub async fn list_matches(pool: &PgPool) -> Result<Vec<MatchRow>> {
    let query = format!(
        r#"
        SELECT {}
        FROM matches m
        JOIN teams ht ON m.home_team_id = ht.team_id
        JOIN teams at ON m.away_team_id = at.team_id
        ORDER BY m.match_date DESC, m.match_id DESC
        "#,
        MATCH_COLUMNS
    );

    Ok(sqlx::query_as::<_, MatchRow>(&query).fetch_all(pool).await?)
}

/// Matches where `team_id` played on either side. Unknown teams simply have none.
pub async fn matches_for_team(pool: &PgPool, team_id: i32) -> Result<Vec<MatchRow>> {
    let query = format!(
        r#"
        SELECT {}
        FROM matches m
        JOIN teams ht ON m.home_team_id = ht.team_id
        JOIN teams at ON m.away_team_id = at.team_id
        WHERE m.home_team_id = $1 OR m.away_team_id = $1
        ORDER BY m.match_date DESC, m.match_id DESC
        "#,
        MATCH_COLUMNS
    );

    Ok(sqlx::query_as::<_, MatchRow>(&query)
        .bind(team_id)
        .fetch_all(pool)
        .await?)
}

pub async fn matches_with_features(pool: &PgPool) -> Result<Vec<MatchWithFeatures>> {
    let query = format!(
        r#"
        SELECT {},
            mf.home_team_form,
            mf.away_team_form,
            mf.home_team_win_rate,
            mf.away_team_win_rate
        FROM matches m
        JOIN match_features mf ON m.match_id = mf.match_id
        JOIN teams ht ON m.home_team_id = ht.team_id
        JOIN teams at ON m.away_team_id = at.team_id
        ORDER BY m.match_date DESC, m.match_id DESC
        "#,
        MATCH_COLUMNS
    );

    Ok(sqlx::query_as::<_, MatchWithFeatures>(&query).fetch_all(pool).await?)
}

pub async fn summary(pool: &PgPool) -> Result<MatchSummary> {
    let summary = sqlx::query_as::<_, MatchSummary>(
        r#"
        SELECT
            COUNT(*) AS total_matches,
            COUNT(*) FILTER (WHERE status = 'FINISHED') AS completed_matches,
            COUNT(*) FILTER (WHERE status = 'SCHEDULED') AS upcoming_matches,
            MAX(match_date) FILTER (WHERE status = 'FINISHED') AS latest_result,
            MIN(match_date) FILTER (WHERE status = 'SCHEDULED') AS next_fixture
        FROM matches
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(summary)
}

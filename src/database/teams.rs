use crate::error::{Error, Result};
use serde::Serialize;
use sqlx::{Acquire, PgConnection, PgPool, Postgres};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Team {
    pub team_id: i32,
    pub team_name: String,
}

/// Trims and collapses internal whitespace. This is the only mutation a team name ever sees.
pub fn normalize_team_name(team_name: &str) -> String {
    team_name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the id for `team_name`, creating the team if needed.
///
/// `ON CONFLICT DO NOTHING` leaves an existing row unlocked. When another transaction created
/// the name first, the follow-up `SELECT` reads its committed row.
pub async fn resolve_team<'a, A>(conn: A, team_name: &str) -> Result<i32>
where
    A: Acquire<'a, Database = Postgres>,
{
    let name = normalize_team_name(team_name);
    if name.is_empty() {
        return Err(Error::MalformedRecord("empty team name".to_string()));
    }

    let mut conn = conn.acquire().await?;
    resolve_normalized(&mut conn, &name).await
}

async fn resolve_normalized(conn: &mut PgConnection, name: &str) -> Result<i32> {
    let inserted: Option<i32> = sqlx::query_scalar(
        r#"
        INSERT INTO teams (team_name)
        VALUES ($1)
        ON CONFLICT (team_name) DO NOTHING
        RETURNING team_id
        "#,
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(team_id) = inserted {
        return Ok(team_id);
    }

    let team_id: i32 = sqlx::query_scalar("SELECT team_id FROM teams WHERE team_name = $1")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

    Ok(team_id)
}

/// Resolves both sides of a match, always in name order, so two transactions creating the
/// same pair of new teams wait on each other instead of deadlocking.
pub async fn resolve_pair(conn: &mut PgConnection, home_team: &str, away_team: &str) -> Result<(i32, i32)> {
    if normalize_team_name(home_team) <= normalize_team_name(away_team) {
        let home = resolve_team_conn(&mut *conn, home_team).await?;
        let away = resolve_team_conn(&mut *conn, away_team).await?;
        Ok((home, away))
    } else {
        let away = resolve_team_conn(&mut *conn, away_team).await?;
        let home = resolve_team_conn(&mut *conn, home_team).await?;
        Ok((home, away))
    }
}

/// Same as [`resolve_team`], specialised to a connection so callers' futures stay `Send`.
async fn resolve_team_conn(conn: &mut PgConnection, team_name: &str) -> Result<i32> {
    let name = normalize_team_name(team_name);
    if name.is_empty() {
        return Err(Error::MalformedRecord("empty team name".to_string()));
    }
    resolve_normalized(conn, &name).await
}

pub async fn list_teams(pool: &PgPool) -> Result<Vec<Team>> {
    let teams = sqlx::query_as::<_, Team>(
        r#"
        SELECT team_id, team_name
        FROM teams
        ORDER BY team_name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(teams)
}

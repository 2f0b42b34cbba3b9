//! Runs against a real Postgres. Set `TEST_DATABASE_URL` to enable; otherwise every test
//! returns early.

use chrono::NaiveDateTime;
use match_engine::database::{self, matches, teams};
use match_engine::features::{compute_features, rolling, team_stats};
use match_engine::reconcile::{Reconciler, UpsertOutcome};
use match_engine::understat::{FixtureRecord, ResultRecord};
use match_engine::Error;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    database::run_migrations(&pool).await.expect("migrations");
    Some(pool)
}

// Team names are unique per test so runs never collide on the match key.
fn team(name: &str) -> String {
    format!("{} {}", name, Uuid::new_v4().simple())
}

fn kickoff(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn fixture(home: &str, away: &str, date: &str) -> FixtureRecord {
    FixtureRecord {
        home_team: home.to_string(),
        away_team: away.to_string(),
        match_date: kickoff(date),
        season: "2023".to_string(),
    }
}

fn result(home: &str, away: &str, date: &str, score: (i32, i32)) -> ResultRecord {
    result_with_xg(home, away, date, score, (1.8, 0.9))
}

fn result_with_xg(home: &str, away: &str, date: &str, score: (i32, i32), xg: (f64, f64)) -> ResultRecord {
    ResultRecord {
        home_team: home.to_string(),
        away_team: away.to_string(),
        match_date: kickoff(date),
        home_score: score.0,
        away_score: score.1,
        home_xg: xg.0,
        away_xg: xg.1,
    }
}

async fn match_state(pool: &PgPool, home: &str, away: &str) -> Vec<(i32, String, Option<i32>, Option<i32>)> {
    sqlx::query_as(
        r#"
        SELECT m.match_id, m.status, m.home_score, m.away_score
        FROM matches m
        JOIN teams ht ON m.home_team_id = ht.team_id
        JOIN teams at ON m.away_team_id = at.team_id
        WHERE ht.team_name = $1 AND at.team_name = $2
        "#,
    )
    .bind(home)
    .bind(away)
    .fetch_all(pool)
    .await
    .unwrap()
}

async fn match_xg(pool: &PgPool, match_id: i32) -> (Option<f64>, Option<f64>) {
    sqlx::query_as("SELECT home_xg, away_xg FROM matches WHERE match_id = $1")
        .bind(match_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn feature_rows(pool: &PgPool, match_id: i32) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM match_features WHERE match_id = $1")
        .bind(match_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn fixture_then_result_settles_once() {
    let Some(pool) = test_pool().await else { return };
    let reconciler = Reconciler::new(pool.clone());
    let (arsenal, chelsea) = (team("Arsenal"), team("Chelsea"));
    let date = "2024-05-01 19:30:00";

    let outcome = reconciler.upsert_fixture(&fixture(&arsenal, &chelsea, date)).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Inserted);

    let rows = match_state(&pool, &arsenal, &chelsea).await;
    assert_eq!(rows.len(), 1);
    let (match_id, status, home_score, away_score) = rows[0].clone();
    assert_eq!(status, "SCHEDULED");
    assert_eq!((home_score, away_score), (None, None));
    assert_eq!(feature_rows(&pool, match_id).await, 0);

    let outcome = reconciler.upsert_result(&result(&arsenal, &chelsea, date, (2, 1)), "2023").await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Finished);

    let rows = match_state(&pool, &arsenal, &chelsea).await;
    assert_eq!(rows, vec![(match_id, "FINISHED".to_string(), Some(2), Some(1))]);
    assert_eq!(feature_rows(&pool, match_id).await, 1);

    let computed_at: chrono::DateTime<chrono::Utc> =
        sqlx::query_scalar("SELECT computed_at FROM match_features WHERE match_id = $1")
            .bind(match_id)
            .fetch_one(&pool)
            .await
            .unwrap();

    assert_eq!(match_xg(&pool, match_id).await, (Some(1.8), Some(0.9)));

    // A later, different result for the same key must not touch the finished row
    let corrected = result_with_xg(&arsenal, &chelsea, date, (5, 5), (3.0, 3.0));
    let outcome = reconciler.upsert_result(&corrected, "2023").await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Unchanged);

    let rows = match_state(&pool, &arsenal, &chelsea).await;
    assert_eq!(rows, vec![(match_id, "FINISHED".to_string(), Some(2), Some(1))]);
    assert_eq!(match_xg(&pool, match_id).await, (Some(1.8), Some(0.9)));
    assert_eq!(feature_rows(&pool, match_id).await, 1);

    // And so does the identical one
    let outcome = reconciler.upsert_result(&result(&arsenal, &chelsea, date, (2, 1)), "2023").await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Unchanged);

    let recomputed_at: chrono::DateTime<chrono::Utc> =
        sqlx::query_scalar("SELECT computed_at FROM match_features WHERE match_id = $1")
            .bind(match_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(computed_at, recomputed_at);
}

#[tokio::test]
async fn result_without_fixture_is_inserted_finished() {
    let Some(pool) = test_pool().await else { return };
    let reconciler = Reconciler::new(pool.clone());
    let (home, away) = (team("Brentford"), team("Fulham"));

    let outcome = reconciler
        .upsert_result(&result(&home, &away, "2023-09-16 14:00:00", (0, 0)), "2023")
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Inserted);

    let rows = match_state(&pool, &home, &away).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1, "FINISHED");
    assert_eq!(feature_rows(&pool, rows[0].0).await, 1);
}

#[tokio::test]
async fn fixture_never_reopens_finished_match() {
    let Some(pool) = test_pool().await else { return };
    let reconciler = Reconciler::new(pool.clone());
    let (home, away) = (team("Everton"), team("Wolves"));
    let date = "2024-02-03 15:00:00";

    reconciler.upsert_result(&result(&home, &away, date, (3, 0)), "2023").await.unwrap();
    let outcome = reconciler.upsert_fixture(&fixture(&home, &away, date)).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Unchanged);

    let rows = match_state(&pool, &home, &away).await;
    assert_eq!(rows.len(), 1);
    assert_eq!((rows[0].1.as_str(), rows[0].2, rows[0].3), ("FINISHED", Some(3), Some(0)));
}

#[tokio::test]
async fn second_feature_computation_is_a_constraint_violation() {
    let Some(pool) = test_pool().await else { return };
    let reconciler = Reconciler::new(pool.clone());
    let (home, away) = (team("Burnley"), team("Luton"));

    reconciler
        .upsert_result(&result(&home, &away, "2024-03-30 15:00:00", (1, 1)), "2023")
        .await
        .unwrap();
    let match_id = match_state(&pool, &home, &away).await[0].0;

    let err = compute_features(&pool, match_id).await.unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)), "{:?}", err);
    assert_eq!(feature_rows(&pool, match_id).await, 1);
}

#[tokio::test]
async fn features_require_a_finished_match() {
    let Some(pool) = test_pool().await else { return };
    let reconciler = Reconciler::new(pool.clone());
    let (home, away) = (team("Brighton"), team("Newcastle"));

    reconciler.upsert_fixture(&fixture(&home, &away, "2024-05-19 16:00:00")).await.unwrap();
    let match_id = match_state(&pool, &home, &away).await[0].0;

    let err = compute_features(&pool, match_id).await.unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)), "{:?}", err);
    assert_eq!(feature_rows(&pool, match_id).await, 0);
}

#[tokio::test]
async fn concurrent_team_resolution_yields_one_id() {
    let Some(pool) = test_pool().await else { return };
    let name = team("Tottenham");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let name = name.clone();
        handles.push(tokio::spawn(async move { teams::resolve_team(&pool, &name).await }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teams WHERE team_name = $1")
        .bind(&name)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn team_without_matches_has_empty_history() {
    let Some(pool) = test_pool().await else { return };
    let team_id = teams::resolve_team(&pool, &team("Sheffield United")).await.unwrap();

    let rows = matches::matches_for_team(&pool, team_id).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn select_query_returns_rows_as_json() {
    let Some(pool) = test_pool().await else { return };
    let name = team("Aston Villa");
    teams::resolve_team(&pool, &name).await.unwrap();

    let rows = match_engine::api::query::run_select(&pool, "  SELECT team_name FROM teams ORDER BY team_id")
        .await
        .unwrap();
    let names: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|row| row["team_name"].as_str())
        .collect();
    assert!(names.contains(&name.as_str()));
}

#[tokio::test]
async fn select_query_cannot_write() {
    let Some(pool) = test_pool().await else { return };

    // Passes the lexical check but must still fail inside the read-only transaction
    let err = match_engine::api::query::run_select(&pool, "select nextval('teams_team_id_seq')")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Database(_)), "{:?}", err);
}

#[tokio::test]
async fn reversed_pairs_upsert_concurrently_without_deadlock() {
    let Some(pool) = test_pool().await else { return };
    let reconciler = Reconciler::new(pool.clone());
    let (a, b) = (team("Crystal Palace"), team("West Ham"));

    let mut handles = Vec::new();
    for i in 0..40u32 {
        let reconciler = reconciler.clone();
        let (home, away) = if i % 2 == 0 { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
        let date = format!("2023-{:02}-{:02} 15:00:00", 8 + i / 28, 1 + i % 28);
        handles.push(tokio::spawn(async move {
            if i % 4 < 2 {
                reconciler.upsert_fixture(&fixture(&home, &away, &date)).await
            } else {
                reconciler.upsert_result(&result(&home, &away, &date, (1, 0)), "2023").await
            }
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(outcome.is_ok(), "{:?}", outcome);
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teams WHERE team_name = ANY($1)")
        .bind(vec![a.clone(), b.clone()])
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 2);

    let both_ways = match_state(&pool, &a, &b).await.len() + match_state(&pool, &b, &a).await.len();
    assert_eq!(both_ways, 40);
}

async fn match_id_on(pool: &PgPool, home: &str, date: &str) -> i32 {
    sqlx::query_scalar(
        r#"
        SELECT m.match_id
        FROM matches m
        JOIN teams ht ON m.home_team_id = ht.team_id
        WHERE ht.team_name = $1 AND m.match_date = $2
        "#,
    )
    .bind(home)
    .bind(kickoff(date))
    .fetch_one(pool)
    .await
    .unwrap()
}

type Rolling = (Option<f64>, Option<f64>, Option<f64>, Option<f64>);

async fn rolling_of(pool: &PgPool, match_id: i32) -> Rolling {
    sqlx::query_as("SELECT rolling_xg, rolling_xga, form_5, form_10 FROM matches WHERE match_id = $1")
        .bind(match_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn close(actual: Option<f64>, expected: f64) -> bool {
    actual.is_some_and(|v| (v - expected).abs() < 1e-9)
}

#[tokio::test]
async fn rolling_windows_cover_home_and_away_appearances() {
    let Some(pool) = test_pool().await else { return };
    let reconciler = Reconciler::new(pool.clone());
    let season = format!("t{}", Uuid::new_v4().simple());
    let (x, y, z, w) = (team("Leicester"), team("Ipswich"), team("Southampton"), team("Forest"));

    let first = "2024-01-01 15:00:00";
    let second = "2024-01-08 15:00:00";
    let third = "2024-01-15 15:00:00";
    reconciler.upsert_result(&result_with_xg(&x, &y, first, (2, 0), (2.0, 0.4)), &season).await.unwrap();
    reconciler.upsert_result(&result_with_xg(&z, &x, second, (1, 1), (1.5, 1.2)), &season).await.unwrap();
    reconciler.upsert_result(&result_with_xg(&x, &w, third, (0, 1), (0.9, 1.1)), &season).await.unwrap();

    let updated = rolling::refresh_rolling_aggregates(&pool, &season).await.unwrap();
    assert_eq!(updated, 3);

    // Both home sides are playing their first match of the season
    assert_eq!(rolling_of(&pool, match_id_on(&pool, &x, first).await).await, (None, None, None, None));
    assert_eq!(rolling_of(&pool, match_id_on(&pool, &z, second).await).await, (None, None, None, None));

    // Previous two: a 2-0 home win (xG 2.0, xGA 0.4) and a 1-1 away draw (xG 1.2, xGA 1.5)
    let (xg, xga, form_5, form_10) = rolling_of(&pool, match_id_on(&pool, &x, third).await).await;
    assert!(close(xg, 1.6), "{:?}", xg);
    assert!(close(xga, 0.95), "{:?}", xga);
    assert!(close(form_5, 2.0), "{:?}", form_5);
    assert!(close(form_10, 2.0), "{:?}", form_10);
}

#[tokio::test]
async fn team_stats_count_results_and_recent_form() {
    let Some(pool) = test_pool().await else { return };
    let reconciler = Reconciler::new(pool.clone());
    let side = team("Sunderland");

    // One win, one draw, then four defeats: six played, last five worth one point
    let scores = [(3, 0), (1, 1), (0, 2), (0, 1), (1, 4), (0, 3)];
    for (i, score) in scores.iter().enumerate() {
        let opponent = team("Opponent");
        let date = format!("2023-10-{:02} 15:00:00", i + 1);
        reconciler.upsert_result(&result(&side, &opponent, &date, *score), "2023").await.unwrap();
    }

    team_stats::refresh_team_stats(&pool).await.unwrap();

    let (wins, draws, played, form_points): (i32, i32, i32, Option<f64>) = sqlx::query_as(
        r#"
        SELECT s.wins, s.draws, s.matches_played, s.form_points
        FROM team_stats s
        JOIN teams t ON t.team_id = s.team_id
        WHERE t.team_name = $1
        "#,
    )
    .bind(&side)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!((wins, draws, played), (1, 1, 6));
    assert!(close(form_points, 0.2), "{:?}", form_points);
}

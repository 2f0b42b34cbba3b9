use crate::api::error::ApiError;
use crate::api::query;
use crate::api::SharedState;
use crate::config::DEFAULT_SEASON;
use crate::database::{matches, teams};
use crate::understat::is_valid_season;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn new(message: &str, data: T) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
            data,
        })
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub async fn api_test() -> impl IntoResponse {
    Json(json!({
        "message": "API is working!",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let now = Utc::now().to_rfc3339();
    match sqlx::query_scalar::<_, DateTime<Utc>>("SELECT NOW()").fetch_one(&state.db).await {
        Ok(db_now) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "connected",
                "dbTimestamp": db_now.to_rfc3339(),
            })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "timestamp": now,
                    "database": "disconnected",
                })),
            )
        }
    }
}

pub async fn list_matches(State(state): State<SharedState>) -> ApiResult<Vec<matches::MatchRow>> {
    let rows = matches::list_matches(&state.db)
        .await
        .map_err(|e| ApiError::from_error("Failed to retrieve matches", e))?;
    info!("Successfully retrieved {} matches", rows.len());
    Ok(ApiResponse::new("Matches retrieved successfully", rows))
}

pub async fn list_matches_with_features(
    State(state): State<SharedState>,
) -> ApiResult<Vec<matches::MatchWithFeatures>> {
    let rows = matches::matches_with_features(&state.db)
        .await
        .map_err(|e| ApiError::from_error("Failed to retrieve matches with features", e))?;
    Ok(ApiResponse::new("Matches with features retrieved successfully", rows))
}

pub async fn team_matches(
    State(state): State<SharedState>,
    team_id: Result<Path<i32>, PathRejection>,
) -> ApiResult<Vec<matches::MatchRow>> {
    let Path(team_id) = team_id?;
    let rows = matches::matches_for_team(&state.db, team_id)
        .await
        .map_err(|e| ApiError::from_error("Failed to retrieve team matches", e))?;
    Ok(ApiResponse::new("Team matches retrieved successfully", rows))
}

pub async fn list_teams(State(state): State<SharedState>) -> ApiResult<Vec<teams::Team>> {
    let rows = teams::list_teams(&state.db)
        .await
        .map_err(|e| ApiError::from_error("Failed to retrieve teams", e))?;
    Ok(ApiResponse::new("Teams retrieved successfully", rows))
}

pub async fn match_summary(State(state): State<SharedState>) -> ApiResult<matches::MatchSummary> {
    let summary = matches::summary(&state.db)
        .await
        .map_err(|e| ApiError::from_error("Failed to retrieve match statistics", e))?;
    Ok(ApiResponse::new("Match statistics retrieved successfully", summary))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRequest {
    pub season: Option<String>,
}

/// Starts a results pass for `season` in the background and answers straight away.
pub async fn update_data(
    State(state): State<SharedState>,
    body: Option<Json<UpdateRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let season = body
        .and_then(|Json(req)| req.season)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SEASON.to_string());

    if !is_valid_season(&season) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Season must be a four-digit year such as 2023",
        ));
    }

    let Some(guard) = state.sync.results_flight().try_acquire() else {
        return Err(ApiError::new(StatusCode::CONFLICT, "A results update is already running"));
    };

    let sync = state.sync.clone();
    let task_season = season.clone();
    tokio::spawn(async move {
        let _guard = guard;
        info!("🔄 Manual results update for season {}...", task_season);
        if let Err(e) = sync.sync_results(&task_season).await {
            error!("Manual update for season {} failed: {}", task_season, e);
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Data update triggered successfully",
            "season": season,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Read-only SQL for operators. Disabled unless a token is configured.
pub async fn run_query(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<serde_json::Value> {
    let Some(expected) = state.config.query_api_token.as_deref() else {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "Not found"));
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    if !provided.is_some_and(|token| tokens_match(token, expected)) {
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized"));
    }

    let Json(req) = body?;

    let rows = query::run_select(&state.db, &req.query)
        .await
        .map_err(|e| ApiError::from_error("Query failed", e))?;
    Ok(ApiResponse::new("Query executed successfully", rows))
}

/// Compares without exiting early on the first differing byte.
fn tokens_match(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

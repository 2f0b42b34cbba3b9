use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub run_migrations: bool,

    pub server_port: u16,
    pub frontend_url: Option<String>,
    pub query_api_token: Option<String>,

    pub understat_base_url: String,
    pub league: String,
    pub seasons: Vec<String>,
    pub http_timeout: Duration,

    pub scheduler_enabled: bool,
    pub results_interval: Duration,
    pub fixtures_interval: Duration,
    pub team_stats_refresh: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| {
            build_database_url(
                &var("POSTGRES_HOST", "db"),
                &var("POSTGRES_PORT", "5432"),
                &var("POSTGRES_DB", "premier_league"),
                &var("POSTGRES_USER", "postgres"),
                &var("POSTGRES_PASSWORD", "postgres"),
            )
        });

        let seasons = parse_seasons(&var("SEASONS", "2023,2022,2021"));

        Self {
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10),
            run_migrations: parse_flag(&lookup, "RUN_MIGRATIONS", true),

            server_port: parse_or(&lookup, "PORT", 5001),
            frontend_url: lookup("FRONTEND_URL").filter(|v| !v.trim().is_empty()),
            query_api_token: lookup("QUERY_API_TOKEN").filter(|v| !v.trim().is_empty()),

            understat_base_url: var("UNDERSTAT_BASE_URL", "https://understat.com"),
            league: var("LEAGUE", "EPL"),
            seasons,
            http_timeout: parse_secs(&lookup, "HTTP_TIMEOUT_SECS", 20),

            scheduler_enabled: parse_flag(&lookup, "SCHEDULER_ENABLED", true),
            results_interval: parse_secs(&lookup, "RESULTS_INTERVAL_SECS", 3600),
            fixtures_interval: parse_secs(&lookup, "FIXTURES_INTERVAL_SECS", 86400),
            team_stats_refresh: parse_flag(&lookup, "TEAM_STATS_REFRESH", true),
        }
    }

    /// The first tracked season is the one the hourly results job follows.
    pub fn current_season(&self) -> &str {
        self.seasons.first().map(String::as_str).unwrap_or(DEFAULT_SEASON)
    }
}

pub const DEFAULT_SEASON: &str = "2023";

fn build_database_url(host: &str, port: &str, db: &str, user: &str, password: &str) -> String {
    format!("postgres://{}:{}@{}:{}/{}", user, password, host, port, db)
}

fn parse_seasons(raw: &str) -> Vec<String> {
    let seasons: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if seasons.is_empty() {
        vec![DEFAULT_SEASON.to_string()]
    } else {
        seasons
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display + Copy,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid {} '{}', defaulting to {}", key, raw, default);
            default
        }),
        None => default,
    }
}

/// Timer periods and timeouts must be non-zero; `interval_at` panics on a zero period.
fn parse_secs<F>(lookup: &F, key: &str, default: u64) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(lookup, key, default) {
        0 => {
            warn!("{} must be greater than zero, defaulting to {}", key, default);
            Duration::from_secs(default)
        }
        secs => Duration::from_secs(secs),
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

pub mod matches;
pub mod teams;

use crate::config::Config;
use crate::error::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Scheduled,
    Finished,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Finished => "FINISHED",
        }
    }
}

fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
}

pub async fn connect(config: &Config) -> Result<PgPool> {
    info!("🔌 Connecting to Postgres...");
    let pool = pool_options(config).connect(&config.database_url).await?;
    info!("✅ Connected to Postgres");
    Ok(pool)
}

/// Pool that only opens connections on first use. Lets the router be built without a live database.
pub fn connect_lazy(config: &Config) -> Result<PgPool> {
    Ok(pool_options(config).connect_lazy(&config.database_url)?)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("📦 Applying database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("✅ Migrations applied");
    Ok(())
}

use match_engine::api::{self, AppState};
use match_engine::config::Config;
use match_engine::database;
use match_engine::reconcile::Reconciler;
use match_engine::scheduler::Scheduler;
use match_engine::sync::SyncService;
use match_engine::understat::UnderstatClient;
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("🚀 Starting Match Engine...");

    let config = Config::from_env();
    info!(
        "📋 Configuration loaded (league {}, current season {}, tracking {:?})",
        config.league,
        config.current_season(),
        config.seasons
    );

    let pool = database::connect(&config).await?;
    if config.run_migrations {
        database::run_migrations(&pool).await?;
    }

    let client = UnderstatClient::new(&config.understat_base_url, &config.league, config.http_timeout)?;
    let sync = Arc::new(SyncService::new(
        client,
        Reconciler::new(pool.clone()),
        config.seasons.clone(),
        config.team_stats_refresh,
    ));

    if config.scheduler_enabled {
        let _jobs = Scheduler::new(sync.clone(), config.results_interval, config.fixtures_interval).start();
    } else {
        info!("⏰ Scheduler disabled (SCHEDULER_ENABLED != true)");
    }

    let state = Arc::new(AppState::new(config.clone(), pool, sync));
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("🌐 API server starting on {}", addr);
    info!("✅ Match Engine is ready!");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

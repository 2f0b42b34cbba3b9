use crate::sync::SyncService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// At most one run of a job at a time. Cloning shares the flag.
#[derive(Clone, Default, Debug)]
pub struct SingleFlight {
    running: Arc<AtomicBool>,
}

/// Held for the duration of a run; releases the flag on drop, including on panic or early return.
#[derive(Debug)]
pub struct FlightGuard {
    running: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn try_acquire(&self) -> Option<FlightGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    sync: Arc<SyncService>,
    results_interval: Duration,
    fixtures_interval: Duration,
}

impl Scheduler {
    pub fn new(sync: Arc<SyncService>, results_interval: Duration, fixtures_interval: Duration) -> Self {
        Self {
            sync,
            results_interval,
            fixtures_interval,
        }
    }

    /// Spawns the startup pass and both timers. Nothing here ever returns an error to the caller.
    pub fn start(self) -> Vec<JoinHandle<()>> {
        info!(
            "⏰ Scheduler starting: results every {}s, fixtures every {}s",
            self.results_interval.as_secs(),
            self.fixtures_interval.as_secs()
        );

        vec![
            tokio::spawn(startup_pass(self.sync.clone())),
            tokio::spawn(results_loop(self.sync.clone(), self.results_interval)),
            tokio::spawn(fixtures_loop(self.sync, self.fixtures_interval)),
        ]
    }
}

async fn startup_pass(sync: Arc<SyncService>) {
    let (Some(_fixtures), Some(_results)) = (sync.fixtures_flight().try_acquire(), sync.results_flight().try_acquire()) else {
        warn!("⚠️ Initial data fetch skipped, another pass is already running");
        return;
    };

    info!("🚀 Running initial data fetch...");
    let reports = sync.sync_all().await;
    info!("✅ Initial data fetch finished ({} passes succeeded)", reports.len());
}

async fn results_loop(sync: Arc<SyncService>, period: Duration) {
    // The startup pass covers the first period
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let Some(guard) = sync.results_flight().try_acquire() else {
            warn!("⚠️ Results update still running, skipping this tick");
            continue;
        };

        let sync = sync.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let season = sync.current_season().to_string();
            info!("🔄 Running results update for {}...", season);
            if let Err(e) = sync.sync_results(&season).await {
                error!("Error updating results: {}", e);
            }
        });
    }
}

async fn fixtures_loop(sync: Arc<SyncService>, period: Duration) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let Some(guard) = sync.fixtures_flight().try_acquire() else {
            warn!("⚠️ Fixtures update still running, skipping this tick");
            continue;
        };

        let sync = sync.clone();
        tokio::spawn(async move {
            let _guard = guard;
            info!("🔄 Running fixtures update...");
            if let Err(e) = sync.sync_fixtures().await {
                error!("Error updating fixtures: {}", e);
            }
        });
    }
}

use crate::error::Result;
use crate::features::{rolling, team_stats};
use crate::reconcile::{Reconciler, UpsertOutcome};
use crate::scheduler::SingleFlight;
use crate::understat::UnderstatClient;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Fixtures,
    Results,
}

/// Counters for one fetch + reconcile pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub run_id: Uuid,
    pub kind: PassKind,
    pub season: String,
    pub fetched: usize,
    pub inserted: usize,
    pub finished: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

impl PassReport {
    fn new(kind: PassKind, season: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            kind,
            season: season.to_string(),
            fetched: 0,
            inserted: 0,
            finished: 0,
            unchanged: 0,
            skipped: 0,
        }
    }

    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Finished => self.finished += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Fetcher -> Reconciler -> feature maintenance, shared by the scheduler and the manual trigger.
///
/// A pass aborts on `SourceUnavailable` or a database error. Malformed records were already
/// dropped by the fetcher and only show up in `skipped`. Records committed before an abort stay.
pub struct SyncService {
    client: UnderstatClient,
    reconciler: Reconciler,
    seasons: Vec<String>,
    team_stats_refresh: bool,
    fixtures_flight: SingleFlight,
    results_flight: SingleFlight,
}

impl SyncService {
    pub fn new(client: UnderstatClient, reconciler: Reconciler, seasons: Vec<String>, team_stats_refresh: bool) -> Self {
        Self {
            client,
            reconciler,
            seasons,
            team_stats_refresh,
            fixtures_flight: SingleFlight::default(),
            results_flight: SingleFlight::default(),
        }
    }

    pub fn seasons(&self) -> &[String] {
        &self.seasons
    }

    pub fn current_season(&self) -> &str {
        self.seasons.first().map(String::as_str).unwrap_or(crate::config::DEFAULT_SEASON)
    }

    pub fn fixtures_flight(&self) -> &SingleFlight {
        &self.fixtures_flight
    }

    pub fn results_flight(&self) -> &SingleFlight {
        &self.results_flight
    }

    /// Upcoming fixtures of the current season. Understat only lists those on the current page.
    pub async fn sync_fixtures(&self) -> Result<PassReport> {
        let season = self.current_season().to_string();
        let mut report = PassReport::new(PassKind::Fixtures, &season);
        info!("📅 [{}] Fetching {} fixtures for {}...", report.run_id, self.client.league(), season);

        let batch = self.client.fetch_fixtures(&season).await?;
        report.fetched = batch.records.len();
        report.skipped = batch.skipped.len();

        for fixture in &batch.records {
            let outcome = self.reconciler.upsert_fixture(fixture).await?;
            report.record(outcome);
        }

        info!(
            "✅ [{}] Fixtures {}: {} new, {} already known, {} skipped",
            report.run_id, season, report.inserted, report.unchanged, report.skipped
        );
        Ok(report)
    }

    /// Results for one season, followed by the rolling-aggregate and team-stats refresh.
    pub async fn sync_results(&self, season: &str) -> Result<PassReport> {
        let mut report = PassReport::new(PassKind::Results, season);
        info!("🏁 [{}] Fetching {} results for {}...", report.run_id, self.client.league(), season);

        let batch = self.client.fetch_results(season).await?;
        report.fetched = batch.records.len();
        report.skipped = batch.skipped.len();

        for result in &batch.records {
            let outcome = self.reconciler.upsert_result(result, season).await?;
            report.record(outcome);
        }

        rolling::refresh_rolling_aggregates(self.reconciler.pool(), season).await?;
        if self.team_stats_refresh {
            team_stats::refresh_team_stats(self.reconciler.pool()).await?;
        }

        info!(
            "✅ [{}] Results {}: {} new, {} settled, {} already final, {} skipped",
            report.run_id, season, report.inserted, report.finished, report.unchanged, report.skipped
        );
        Ok(report)
    }

    /// Fixtures, then results for every tracked season. A failing season doesn't stop the others.
    pub async fn sync_all(&self) -> Vec<PassReport> {
        let mut reports = Vec::new();

        match self.sync_fixtures().await {
            Ok(report) => reports.push(report),
            Err(e) => error!("❌ Fixtures pass failed: {}", e),
        }

        for season in &self.seasons {
            match self.sync_results(season).await {
                Ok(report) => reports.push(report),
                Err(e) => error!("❌ Results pass for season {} failed: {}", season, e),
            }
        }

        reports
    }
}

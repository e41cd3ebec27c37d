//! Batch refresh runs over subjects and seasons.
//!
//! A batch never aborts on a single item: every input ends up in exactly one
//! of the report's `success` or `failed` lists. Fresh subjects count as a
//! success without a remote call. Each item commits on its own, so dropping a
//! running batch keeps completed items and discards the one in flight.

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clients::CatalogApi;
use crate::clients::bangumi::FetchError;
use crate::db::Store;
use crate::domain::season::{all_seasons, future_seasons, recent_seasons};
use crate::domain::{SeasonKey, SubjectId};
use crate::models::{BatchReport, Renamed, SeasonBatchReport};
use crate::services::refresh::RefreshService;
use crate::services::staleness::StalenessPolicy;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Season {0} has no index mapping")]
    UnknownSeason(SeasonKey),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for BatchError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for BatchError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

enum ItemOutcome {
    Fresh,
    Refreshed(Option<Renamed>),
    Failed(String),
}

pub struct BatchService {
    refresh: Arc<RefreshService>,
    catalog: Arc<dyn CatalogApi>,
    store: Store,
    staleness: StalenessPolicy,
    concurrency: usize,
    page_size: u32,
}

impl BatchService {
    #[must_use]
    pub fn new(
        refresh: Arc<RefreshService>,
        catalog: Arc<dyn CatalogApi>,
        store: Store,
        staleness: StalenessPolicy,
        concurrency: usize,
        page_size: u32,
    ) -> Self {
        Self {
            refresh,
            catalog,
            store,
            staleness,
            concurrency: concurrency.max(1),
            page_size,
        }
    }

    #[must_use]
    pub const fn staleness(&self) -> &StalenessPolicy {
        &self.staleness
    }

    /// Refreshes every stale subject in `ids`. `season` supplies the staleness
    /// window; without it each subject's season is looked up from the cached
    /// index memberships, and subjects in no known season are always refreshed.
    pub async fn run_batch(
        &self,
        ids: &[SubjectId],
        season: Option<SeasonKey>,
    ) -> BatchReport<SubjectId> {
        let start = Instant::now();
        let now = Utc::now();
        let cached = self.cached_timestamps(ids).await;

        info!(
            event = "batch_started",
            items = ids.len(),
            season = season.map(|s| s.value()),
            "Starting subject batch"
        );

        let outcomes: Vec<(SubjectId, ItemOutcome)> = stream::iter(ids.iter().copied())
            .map(|id| {
                let last = cached.get(&id).copied();
                async move { (id, self.process(id, season, last, now).await) }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = BatchReport::new();
        for (id, outcome) in outcomes {
            match outcome {
                ItemOutcome::Fresh => report.record_skip(id),
                ItemOutcome::Refreshed(renamed) => {
                    report.record_success(id);
                    report.renamed.extend(renamed);
                }
                ItemOutcome::Failed(error) => report.record_failure(id, error),
            }
        }

        info!(
            event = "batch_finished",
            succeeded = report.success.len(),
            skipped = report.skipped,
            failed = report.failed.len(),
            renamed = report.renamed.len(),
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Subject batch finished"
        );

        report
    }

    /// A failed pre-read treats every subject as never fetched.
    async fn cached_timestamps(&self, ids: &[SubjectId]) -> HashMap<SubjectId, DateTime<Utc>> {
        match self.store.list_subjects_by_ids(ids).await {
            Ok(subjects) => subjects.into_iter().map(|s| (s.id, s.updated_at)).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to read cached subjects, refreshing all");
                HashMap::new()
            }
        }
    }

    async fn process(
        &self,
        id: SubjectId,
        season: Option<SeasonKey>,
        last: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ItemOutcome {
        if last.is_some() && !self.is_due(id, season, last, now).await {
            debug!(subject = %id, "Subject is fresh, skipping");
            return ItemOutcome::Fresh;
        }

        match self.refresh.refresh(id).await {
            Ok(refreshed) => ItemOutcome::Refreshed(refreshed.renamed),
            Err(e) => {
                warn!(subject = %id, error = %e, "Subject refresh failed");
                ItemOutcome::Failed(e.to_string())
            }
        }
    }

    async fn is_due(
        &self,
        id: SubjectId,
        season: Option<SeasonKey>,
        last: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        let season = match season {
            Some(season) => Some(season),
            None => self.store.season_for_subject(id).await.unwrap_or_else(|e| {
                warn!(subject = %id, error = %e, "Season lookup failed");
                None
            }),
        };

        season.is_none_or(|season| self.staleness.is_stale(season, last, now))
    }

    /// Syncs a season's cached membership with its remote index and refreshes
    /// the members that are due.
    pub async fn update_season(
        &self,
        season: SeasonKey,
    ) -> Result<BatchReport<SubjectId>, BatchError> {
        let mapping = self
            .store
            .get_index(season)
            .await?
            .ok_or(BatchError::UnknownSeason(season))?;

        let members = self
            .catalog
            .index_members(mapping.index_id, self.page_size)
            .await?;
        self.store.set_index_members(season, &members).await?;

        info!(
            season = %season,
            index = %mapping.index_id,
            members = members.len(),
            "Updating season"
        );

        Ok(self.run_batch(&members, Some(season)).await)
    }

    /// Updates each season in turn; one season failing does not stop the rest.
    pub async fn run_season_batch(&self, seasons: &[SeasonKey]) -> SeasonBatchReport {
        let mut report = SeasonBatchReport::default();

        for season in seasons {
            match self.update_season(*season).await {
                Ok(subjects) => {
                    report.seasons.record_success(*season);
                    report.subjects.merge(subjects);
                }
                Err(e) => {
                    warn!(season = %season, error = %e, "Season update failed");
                    report.seasons.record_failure(*season, e.to_string());
                }
            }
        }

        report
    }

    /// Every tracked season that has an index mapping, newest first.
    pub async fn update_all_seasons(&self, today: NaiveDate) -> Result<SeasonBatchReport, BatchError> {
        let seasons = self.mapped_among(&all_seasons(today)).await?;
        Ok(self.run_season_batch(&seasons).await)
    }

    /// The upcoming season plus the four most recent ones, where mapped.
    pub async fn update_recent_seasons(
        &self,
        today: NaiveDate,
    ) -> Result<SeasonBatchReport, BatchError> {
        let mut wanted = future_seasons(today);
        wanted.extend(recent_seasons(today));
        let seasons = self.mapped_among(&wanted).await?;
        Ok(self.run_season_batch(&seasons).await)
    }

    async fn mapped_among(&self, wanted: &[SeasonKey]) -> Result<Vec<SeasonKey>, BatchError> {
        let wanted: HashSet<_> = wanted.iter().copied().collect();
        let mut seasons: Vec<SeasonKey> = self
            .store
            .list_indices()
            .await?
            .into_iter()
            .map(|index| index.season)
            .filter(|season| wanted.contains(season))
            .collect();
        seasons.sort_unstable_by(|a, b| b.cmp(a));
        Ok(seasons)
    }
}

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::CatalogApi;
use crate::clients::bangumi::BangumiClient;
use crate::config::Config;
use crate::db::Store;
use crate::domain::{IndexId, SeasonKey, SubjectId};
use crate::models::{BatchReport, NormalizedSubject, ReconcileReport};
use crate::services::{
    BatchService, KeyedLocks, ReconcileError, Reconciler, RefreshError, RefreshService, Refreshed,
    Scheduler, StalenessPolicy, TitleResolution, TitleResolver,
};

/// The wired service graph. Built once per process and torn down with
/// [`Engine::shutdown`].
#[derive(Clone)]
pub struct Engine {
    pub config: Arc<Config>,

    pub store: Store,

    pub catalog: Arc<dyn CatalogApi>,

    pub refresh: Arc<RefreshService>,

    pub batch: Arc<BatchService>,

    pub reconciler: Arc<Reconciler>,

    pub resolver: Arc<TitleResolver>,

    pub staleness: StalenessPolicy,
}

impl Engine {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let client = BangumiClient::new(&config.bangumi)
            .map_err(|e| anyhow::anyhow!("Failed to build Bangumi client: {e}"))?;

        Ok(Self::with_parts(config, store, Arc::new(client)))
    }

    /// Wires the services around an existing store and catalog.
    #[must_use]
    pub fn with_parts(config: Config, store: Store, catalog: Arc<dyn CatalogApi>) -> Self {
        let staleness = StalenessPolicy::new(&config.staleness);
        let subject_locks = Arc::new(KeyedLocks::new());

        let refresh = Arc::new(RefreshService::new(
            Arc::clone(&catalog),
            store.clone(),
            subject_locks,
            config.bangumi.episode_limit,
        ));

        let batch = Arc::new(BatchService::new(
            Arc::clone(&refresh),
            Arc::clone(&catalog),
            store.clone(),
            staleness,
            config.scheduler.concurrency(),
            config.bangumi.index_page_size,
        ));

        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&catalog),
            store.clone(),
            config.index.clone(),
            config.bangumi.index_page_size,
        ));

        let resolver = Arc::new(TitleResolver::new(Arc::clone(&catalog), store.clone()));

        Self {
            config: Arc::new(config),
            store,
            catalog,
            refresh,
            batch,
            reconciler,
            resolver,
            staleness,
        }
    }

    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(Arc::clone(&self.batch), self.config.scheduler.clone())
    }

    pub async fn refresh_entity(&self, id: SubjectId) -> Result<Refreshed, RefreshError> {
        self.refresh.refresh(id).await
    }

    pub async fn run_batch(&self, ids: &[SubjectId]) -> BatchReport<SubjectId> {
        self.batch.run_batch(ids, None).await
    }

    pub async fn reconcile_index(
        &self,
        season: SeasonKey,
        desired: &[SubjectId],
        asserted: Option<IndexId>,
    ) -> Result<ReconcileReport, ReconcileError> {
        self.reconciler.reconcile(season, desired, asserted).await
    }

    /// Resolves `titles` and reconciles the season against whatever resolved.
    /// Any failed lookup aborts before the remote index is read or changed.
    pub async fn reconcile_titles(
        &self,
        season: SeasonKey,
        titles: &[String],
        asserted: Option<IndexId>,
    ) -> Result<(ReconcileReport, TitleResolution), ReconcileError> {
        let resolution = self.resolver.resolve_titles(titles).await;
        if !resolution.failures.is_empty() {
            warn!(
                season = %season,
                failed = resolution.failures.len(),
                "Title lookups failed, skipping reconciliation"
            );
            return Err(ReconcileError::LookupFailed {
                titles: resolution.failures.into_iter().map(|f| f.id).collect(),
            });
        }

        let report = self
            .reconciler
            .reconcile(season, &resolution.subject_ids(), asserted)
            .await?;
        Ok((report, resolution))
    }

    #[must_use]
    pub fn is_stale(
        &self,
        season: SeasonKey,
        last_refreshed: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        self.staleness.is_stale(season, last_refreshed, now)
    }

    /// Staleness of a cached subject, judged by the season whose index lists it.
    /// Subjects in no known season are always due.
    pub async fn is_subject_stale(&self, id: SubjectId) -> anyhow::Result<bool> {
        let cached: Option<NormalizedSubject> = self.store.get_subject(id).await?;
        let Some(season) = self.store.season_for_subject(id).await? else {
            return Ok(true);
        };
        Ok(self.is_stale(season, cached.map(|s| s.updated_at), Utc::now()))
    }

    /// Closes the database pool. Other clones of this engine become unusable.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        info!("Shutting down engine");
        self.store.close().await
    }
}

//! Keeps a season's remote index in line with the desired member list.
//!
//! A season without a mapping gets a new remote index. A mapped season has its
//! live membership read first, then only the difference is applied. A mapping
//! never changes once recorded: asserting a different index for a mapped
//! season fails without touching anything.

use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::clients::CatalogApi;
use crate::clients::bangumi::{FetchError, IndexBasicInfo};
use crate::config::IndexConfig;
use crate::db::{MappingInsert, Store};
use crate::domain::{IndexId, SeasonKey, SubjectId};
use crate::models::{BatchReport, ReconcileAction, ReconcileReport};
use crate::services::locks::KeyedLocks;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Season {season} is mapped to index {existing}, not {requested}")]
    Conflict {
        season: SeasonKey,
        existing: IndexId,
        requested: IndexId,
    },

    #[error("Index {index} is already mapped to season {season}")]
    IndexInUse { index: IndexId, season: SeasonKey },

    #[error("{} title lookups failed, index left untouched", titles.len())]
    LookupFailed { titles: Vec<String> },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for ReconcileError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ReconcileError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Membership delta between the remote index and the desired list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDelta {
    pub to_add: Vec<SubjectId>,
    pub to_remove: Vec<SubjectId>,
    pub unchanged: Vec<SubjectId>,
}

impl MembershipDelta {
    /// `to_add` keeps desired order, `to_remove` and `unchanged` keep remote order.
    #[must_use]
    pub fn between(actual: &[SubjectId], desired: &[SubjectId]) -> Self {
        let actual_set: HashSet<_> = actual.iter().copied().collect();
        let desired_set: HashSet<_> = desired.iter().copied().collect();

        let mut seen = HashSet::new();
        let to_add = desired
            .iter()
            .copied()
            .filter(|id| !actual_set.contains(id) && seen.insert(*id))
            .collect();

        let mut seen = HashSet::new();
        let (unchanged, to_remove) = actual
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .partition(|id| desired_set.contains(id));

        Self {
            to_add,
            to_remove,
            unchanged,
        }
    }
}

/// Fills `{year}`, `{season}`, `{season_cn}`, `{key}` and `{label}`.
#[must_use]
pub fn render_template(template: &str, season: SeasonKey) -> String {
    template
        .replace("{year}", &season.year().to_string())
        .replace("{season_cn}", season.season_name_cn())
        .replace("{season}", season.season_name())
        .replace("{key}", &season.to_string())
        .replace("{label}", &season.label())
}

pub struct Reconciler {
    catalog: Arc<dyn CatalogApi>,
    store: Store,
    locks: KeyedLocks<SeasonKey>,
    templates: IndexConfig,
    page_size: u32,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogApi>,
        store: Store,
        templates: IndexConfig,
        page_size: u32,
    ) -> Self {
        Self {
            catalog,
            store,
            locks: KeyedLocks::new(),
            templates,
            page_size,
        }
    }

    #[must_use]
    pub fn index_info(&self, season: SeasonKey) -> IndexBasicInfo {
        IndexBasicInfo {
            title: Some(render_template(&self.templates.title_template, season)),
            description: Some(render_template(&self.templates.description_template, season)),
        }
    }

    /// Reconciles `season` against `desired`. `asserted` is the index the
    /// caller believes the season maps to, if any.
    pub async fn reconcile(
        &self,
        season: SeasonKey,
        desired: &[SubjectId],
        asserted: Option<IndexId>,
    ) -> Result<ReconcileReport, ReconcileError> {
        let _guard = self.locks.lock(&season).await;

        let mapping = self.store.get_index(season).await?;

        match (mapping, asserted) {
            (Some(existing), Some(requested)) if existing.index_id != requested => {
                warn!(
                    season = %season,
                    existing = %existing.index_id,
                    requested = %requested,
                    "Refusing to remap season index"
                );
                Err(ReconcileError::Conflict {
                    season,
                    existing: existing.index_id,
                    requested,
                })
            }
            (Some(existing), _) => self.update(season, existing.index_id, desired).await,
            (None, Some(requested)) => {
                self.record_mapping(season, requested).await?;
                info!(season = %season, index = %requested, "Adopted existing remote index");
                self.update(season, requested, desired).await
            }
            (None, None) => self.create(season, desired).await,
        }
    }

    async fn record_mapping(&self, season: SeasonKey, index: IndexId) -> Result<(), ReconcileError> {
        match self.store.insert_index_mapping(season, index).await? {
            MappingInsert::Inserted | MappingInsert::Existing => Ok(()),
            MappingInsert::Conflict { existing } => Err(ReconcileError::Conflict {
                season,
                existing,
                requested: index,
            }),
            MappingInsert::IndexInUse { season: owner } => Err(ReconcileError::IndexInUse {
                index,
                season: owner,
            }),
        }
    }

    async fn create(
        &self,
        season: SeasonKey,
        desired: &[SubjectId],
    ) -> Result<ReconcileReport, ReconcileError> {
        let index = IndexId::new(self.catalog.create_index().await?.id);
        self.record_mapping(season, index).await?;
        info!(season = %season, index = %index, "Created remote index");

        if let Err(e) = self.catalog.update_index(index, &self.index_info(season)).await {
            warn!(season = %season, index = %index, error = %e, "Failed to set index title");
        }

        let delta = MembershipDelta::between(&[], desired);
        let (added, removed, members) = self.apply(season, index, &delta).await;
        self.store.set_index_members(season, &members).await?;

        Ok(ReconcileReport {
            season,
            index_id: index,
            action: ReconcileAction::Created,
            added,
            removed,
            unchanged: 0,
        })
    }

    async fn update(
        &self,
        season: SeasonKey,
        index: IndexId,
        desired: &[SubjectId],
    ) -> Result<ReconcileReport, ReconcileError> {
        let actual = self.catalog.index_members(index, self.page_size).await?;
        let delta = MembershipDelta::between(&actual, desired);

        info!(
            season = %season,
            index = %index,
            add = delta.to_add.len(),
            remove = delta.to_remove.len(),
            unchanged = delta.unchanged.len(),
            "Reconciling index membership"
        );

        let (added, removed, members) = self.apply(season, index, &delta).await;
        self.store.set_index_members(season, &members).await?;

        Ok(ReconcileReport {
            season,
            index_id: index,
            action: ReconcileAction::Updated,
            added,
            removed,
            unchanged: delta.unchanged.len(),
        })
    }

    /// Issues every removal then every addition. Failures are recorded per
    /// member; the returned membership reflects what actually succeeded.
    async fn apply(
        &self,
        season: SeasonKey,
        index: IndexId,
        delta: &MembershipDelta,
    ) -> (BatchReport<SubjectId>, BatchReport<SubjectId>, Vec<SubjectId>) {
        let mut members = delta.unchanged.clone();

        let mut removed = BatchReport::new();
        for id in &delta.to_remove {
            match self.catalog.remove_index_member(index, *id).await {
                Ok(()) => removed.record_success(*id),
                Err(e) => {
                    warn!(season = %season, subject = %id, error = %e, "Failed to remove index member");
                    removed.record_failure(*id, e.to_string());
                    members.push(*id);
                }
            }
        }

        let mut added = BatchReport::new();
        for id in &delta.to_add {
            match self.catalog.add_index_member(index, *id).await {
                Ok(()) => {
                    added.record_success(*id);
                    members.push(*id);
                }
                Err(e) => {
                    warn!(season = %season, subject = %id, error = %e, "Failed to add index member");
                    added.record_failure(*id, e.to_string());
                }
            }
        }

        (added, removed, members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{FakeCatalog, temp_store};

    fn ids(raw: &[i32]) -> Vec<SubjectId> {
        raw.iter().copied().map(SubjectId::new).collect()
    }

    fn season() -> SeasonKey {
        SeasonKey::parse(202_601).unwrap()
    }

    fn reconciler(catalog: &Arc<FakeCatalog>, store: Store) -> Reconciler {
        Reconciler::new(
            Arc::clone(catalog) as Arc<dyn CatalogApi>,
            store,
            IndexConfig::default(),
            50,
        )
    }

    #[test]
    fn delta_is_set_difference() {
        let delta = MembershipDelta::between(&ids(&[1, 2, 3]), &ids(&[3, 4, 1, 4]));
        assert_eq!(delta.to_add, ids(&[4]));
        assert_eq!(delta.to_remove, ids(&[2]));
        assert_eq!(delta.unchanged, ids(&[1, 3]));
    }

    #[test]
    fn templates_render_season() {
        let key = season();
        let info = IndexConfig::default();
        assert_eq!(render_template(&info.title_template, key), "2026年冬季番");
        assert_eq!(
            render_template(&info.description_template, key),
            "https://anilist.co/search/anime?year=2026&season=WINTER&format=TV"
        );
    }

    #[tokio::test]
    async fn creates_index_for_unmapped_season() {
        let catalog = Arc::new(FakeCatalog::default());
        let store = temp_store().await;
        let reconciler = reconciler(&catalog, store.clone());

        let report = reconciler.reconcile(season(), &ids(&[5, 6]), None).await.unwrap();

        assert_eq!(report.action, ReconcileAction::Created);
        assert_eq!(report.added.success, ids(&[5, 6]));
        let mapping = store.get_index(season()).await.unwrap().unwrap();
        assert_eq!(mapping.index_id, report.index_id);
        assert_eq!(mapping.subject_ids, ids(&[5, 6]));

        let state = catalog.lock();
        let info = state.index_info.get(&report.index_id.value()).unwrap();
        assert_eq!(info.title.as_deref(), Some("2026年冬季番"));
    }

    #[tokio::test]
    async fn update_only_touches_the_difference() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.lock().indices.insert(42, vec![1, 2, 3]);
        let store = temp_store().await;
        store.insert_index_mapping(season(), IndexId::new(42)).await.unwrap();
        let reconciler = reconciler(&catalog, store.clone());

        let report = reconciler
            .reconcile(season(), &ids(&[2, 3, 4]), Some(IndexId::new(42)))
            .await
            .unwrap();

        assert_eq!(report.action, ReconcileAction::Updated);
        assert_eq!(report.added.success, ids(&[4]));
        assert_eq!(report.removed.success, ids(&[1]));
        assert_eq!(report.unchanged, 2);

        let mutations: Vec<String> = catalog
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("add") || c.starts_with("remove"))
            .collect();
        assert_eq!(mutations, vec!["remove 42 1", "add 42 4"]);

        let cached = store.get_index(season()).await.unwrap().unwrap();
        assert_eq!(cached.subject_ids, ids(&[2, 3, 4]));
    }

    #[tokio::test]
    async fn conflicting_index_is_rejected_without_mutation() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.lock().indices.insert(42, vec![1]);
        let store = temp_store().await;
        store.insert_index_mapping(season(), IndexId::new(42)).await.unwrap();
        let reconciler = reconciler(&catalog, store.clone());

        let err = reconciler
            .reconcile(season(), &ids(&[9]), Some(IndexId::new(43)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::Conflict { existing, requested, .. }
                if existing == IndexId::new(42) && requested == IndexId::new(43)
        ));
        assert!(catalog.calls().is_empty());
        assert_eq!(
            store.get_index(season()).await.unwrap().unwrap().index_id,
            IndexId::new(42)
        );
    }

    #[tokio::test]
    async fn member_failures_do_not_abort() {
        let catalog = Arc::new(FakeCatalog::default());
        {
            let mut state = catalog.lock();
            state.indices.insert(42, vec![1, 2]);
            state.failing_members.insert(1);
            state.failing_members.insert(3);
        }
        let store = temp_store().await;
        store.insert_index_mapping(season(), IndexId::new(42)).await.unwrap();
        let reconciler = reconciler(&catalog, store.clone());

        let report = reconciler
            .reconcile(season(), &ids(&[3, 4]), None)
            .await
            .unwrap();

        assert_eq!(report.removed.success, ids(&[2]));
        assert_eq!(report.removed.failed, ids(&[1]));
        assert_eq!(report.added.success, ids(&[4]));
        assert_eq!(report.added.failed, ids(&[3]));
        assert!(!report.is_clean());

        let cached = store.get_index(season()).await.unwrap().unwrap();
        assert_eq!(cached.subject_ids, ids(&[1, 4]));
    }

    #[tokio::test]
    async fn failed_membership_read_mutates_nothing() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.lock().failing_index_reads = true;
        let store = temp_store().await;
        store.insert_index_mapping(season(), IndexId::new(42)).await.unwrap();
        let reconciler = reconciler(&catalog, store);

        let err = reconciler.reconcile(season(), &ids(&[1]), None).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Fetch(_)));
        assert!(catalog.calls_matching("add").is_empty());
    }

    #[tokio::test]
    async fn asserted_index_is_adopted_when_unmapped() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.lock().indices.insert(77, vec![1]);
        let store = temp_store().await;
        let reconciler = reconciler(&catalog, store.clone());

        let report = reconciler
            .reconcile(season(), &ids(&[1, 2]), Some(IndexId::new(77)))
            .await
            .unwrap();

        assert_eq!(report.action, ReconcileAction::Updated);
        assert_eq!(report.added.success, ids(&[2]));
        assert!(catalog.calls_matching("create").is_empty());
        assert_eq!(
            store.get_index(season()).await.unwrap().unwrap().index_id,
            IndexId::new(77)
        );
    }

    #[tokio::test]
    async fn cancelled_creation_keeps_the_mapping() {
        let catalog = Arc::new(FakeCatalog::default());
        catalog.lock().stalled_updates = true;
        let store = temp_store().await;
        let reconciler = reconciler(&catalog, store.clone());

        let first = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            reconciler.reconcile(season(), &ids(&[5]), None),
        )
        .await;
        assert!(first.is_err());
        let mapping = store.get_index(season()).await.unwrap().unwrap();

        catalog.lock().stalled_updates = false;
        let report = reconciler.reconcile(season(), &ids(&[5]), None).await.unwrap();

        assert_eq!(report.action, ReconcileAction::Updated);
        assert_eq!(report.index_id, mapping.index_id);
        assert_eq!(report.added.success, ids(&[5]));
        assert_eq!(catalog.calls_matching("create").len(), 1);
    }
}

//! Maps free-form titles to subject IDs.
//!
//! The side-lookup table is consulted first; misses fall back to a keyword
//! search restricted to anime and accept only an exact `name` or `name_cn`
//! match. Every resolved pair is cached for the next run.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::CatalogApi;
use crate::db::Store;
use crate::domain::SubjectId;
use crate::models::ItemFailure;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TitleResolution {
    pub resolved: Vec<(String, SubjectId)>,
    /// Titles the search answered without an exact match.
    pub unresolved: Vec<String>,
    /// Titles whose lookup could not be completed.
    pub failures: Vec<ItemFailure<String>>,
}

impl TitleResolution {
    /// Resolved IDs in input order, without repeats.
    #[must_use]
    pub fn subject_ids(&self) -> Vec<SubjectId> {
        let mut ids: Vec<SubjectId> = Vec::with_capacity(self.resolved.len());
        for (_, id) in &self.resolved {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty() && self.failures.is_empty()
    }
}

pub struct TitleResolver {
    catalog: Arc<dyn CatalogApi>,
    store: Store,
}

impl TitleResolver {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogApi>, store: Store) -> Self {
        Self { catalog, store }
    }

    pub async fn resolve_titles(&self, titles: &[String]) -> TitleResolution {
        let mut resolution = TitleResolution::default();

        for raw in titles {
            let title = raw.trim();
            if title.is_empty() {
                continue;
            }

            match self.resolve(title).await {
                Ok(Some(id)) => resolution.resolved.push((title.to_string(), id)),
                Ok(None) => {
                    info!(title, "No exact match for title");
                    resolution.unresolved.push(title.to_string());
                }
                Err(e) => {
                    warn!(title, error = %e, "Title lookup failed");
                    resolution.failures.push(ItemFailure {
                        id: title.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        resolution
    }

    async fn resolve(&self, title: &str) -> anyhow::Result<Option<SubjectId>> {
        if let Some(id) = self.store.get_title_lookup(title).await? {
            debug!(title, subject = %id, "Title resolved from lookup table");
            return Ok(Some(id));
        }

        let candidates = self.catalog.search_anime(title).await?;
        let Some(found) = candidates
            .iter()
            .find(|s| s.name == title || s.name_cn == title)
        else {
            return Ok(None);
        };

        let id = SubjectId::new(found.id);
        self.store.put_title_lookup(title, id).await?;
        debug!(title, subject = %id, "Title resolved by search");
        Ok(Some(id))
    }
}

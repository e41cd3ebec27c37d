pub mod bangumi;
pub mod retry;

use async_trait::async_trait;

use crate::clients::bangumi::{Episode, FetchError, Index, IndexBasicInfo, Subject, SubjectLookup};
use crate::domain::{IndexId, SubjectId};

/// Logical catalog operations the engine depends on.
///
/// [`bangumi::BangumiClient`] is the production implementation; retries,
/// pacing and redirect resolution happen behind this boundary.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Subject detail by ID, resolving merge redirects.
    async fn subject(&self, id: SubjectId) -> Result<SubjectLookup, FetchError>;

    /// Main-story episodes of a subject, at most `limit`.
    async fn episodes(&self, subject: SubjectId, limit: u32) -> Result<Vec<Episode>, FetchError>;

    /// Every anime member of a remote index, across all pages.
    async fn index_members(
        &self,
        index: IndexId,
        page_size: u32,
    ) -> Result<Vec<SubjectId>, FetchError>;

    async fn search_anime(&self, keyword: &str) -> Result<Vec<Subject>, FetchError>;

    async fn create_index(&self) -> Result<Index, FetchError>;

    async fn update_index(&self, index: IndexId, info: &IndexBasicInfo) -> Result<(), FetchError>;

    async fn add_index_member(&self, index: IndexId, subject: SubjectId) -> Result<(), FetchError>;

    async fn remove_index_member(&self, index: IndexId, subject: SubjectId)
    -> Result<(), FetchError>;
}

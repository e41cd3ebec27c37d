use crate::domain::{IndexId, SeasonKey, SubjectId};
use crate::models::{NormalizedSubject, SeasonIndex};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::season_index::MappingInsert;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    /// Closes the connection pool. Clones of this store become unusable.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        info!("Database connection closed");
        Ok(())
    }

    fn subject_repo(&self) -> repositories::subject::SubjectRepository {
        repositories::subject::SubjectRepository::new(self.conn.clone())
    }

    fn season_index_repo(&self) -> repositories::season_index::SeasonIndexRepository {
        repositories::season_index::SeasonIndexRepository::new(self.conn.clone())
    }

    fn title_lookup_repo(&self) -> repositories::title_lookup::TitleLookupRepository {
        repositories::title_lookup::TitleLookupRepository::new(self.conn.clone())
    }

    pub async fn get_subject(&self, id: SubjectId) -> Result<Option<NormalizedSubject>> {
        self.subject_repo().get(id).await
    }

    pub async fn list_subjects_by_ids(&self, ids: &[SubjectId]) -> Result<Vec<NormalizedSubject>> {
        self.subject_repo().get_by_ids(ids).await
    }

    pub async fn upsert_subject(&self, subject: &NormalizedSubject) -> Result<()> {
        self.subject_repo().upsert(subject).await
    }

    pub async fn save_refreshed_subject(
        &self,
        subject: &NormalizedSubject,
        renamed_from: Option<SubjectId>,
    ) -> Result<()> {
        self.subject_repo().save_refreshed(subject, renamed_from).await
    }

    pub async fn rename_subject(&self, from: SubjectId, to: SubjectId) -> Result<()> {
        self.subject_repo().rename(from, to).await
    }

    pub async fn get_index(&self, season: SeasonKey) -> Result<Option<SeasonIndex>> {
        self.season_index_repo().get(season).await
    }

    pub async fn list_indices(&self) -> Result<Vec<SeasonIndex>> {
        self.season_index_repo().list().await
    }

    pub async fn insert_index_mapping(
        &self,
        season: SeasonKey,
        index: IndexId,
    ) -> Result<MappingInsert> {
        self.season_index_repo().insert_mapping(season, index).await
    }

    pub async fn set_index_members(&self, season: SeasonKey, members: &[SubjectId]) -> Result<bool> {
        self.season_index_repo().set_members(season, members).await
    }

    pub async fn season_for_subject(&self, subject: SubjectId) -> Result<Option<SeasonKey>> {
        self.season_index_repo().season_for_subject(subject).await
    }

    pub async fn get_title_lookup(&self, title: &str) -> Result<Option<SubjectId>> {
        self.title_lookup_repo().get(title).await
    }

    pub async fn put_title_lookup(&self, title: &str, subject: SubjectId) -> Result<()> {
        self.title_lookup_repo().put(title, subject).await
    }
}

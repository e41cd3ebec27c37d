use crate::domain::{IndexId, SeasonKey, SubjectId};
use crate::entities::{prelude::*, season_indices};
use crate::models::SeasonIndex;
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::{info, warn};

/// Result of recording a season → index mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingInsert {
    Inserted,
    /// The same pair was already recorded.
    Existing,
    /// The season is already mapped to a different index.
    Conflict { existing: IndexId },
    /// The index already belongs to another season.
    IndexInUse { season: SeasonKey },
}

pub struct SeasonIndexRepository {
    conn: DatabaseConnection,
}

impl SeasonIndexRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn parse_time(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).map_or(DateTime::<Utc>::UNIX_EPOCH, |t| t.with_timezone(&Utc))
    }

    fn map_model(model: season_indices::Model) -> Option<SeasonIndex> {
        let Ok(season) = SeasonKey::parse(model.season_key) else {
            warn!(season_key = model.season_key, "Ignoring index row with invalid season key");
            return None;
        };

        Some(SeasonIndex {
            season,
            index_id: IndexId::new(model.index_id),
            subject_ids: serde_json::from_str(&model.subject_ids).unwrap_or_default(),
            created_at: Self::parse_time(&model.created_at),
            updated_at: Self::parse_time(&model.updated_at),
        })
    }

    pub async fn get(&self, season: SeasonKey) -> anyhow::Result<Option<SeasonIndex>> {
        let row = SeasonIndices::find_by_id(season.value())
            .one(&self.conn)
            .await?;
        Ok(row.and_then(Self::map_model))
    }

    pub async fn find_by_index(&self, index: IndexId) -> anyhow::Result<Option<SeasonIndex>> {
        let row = SeasonIndices::find()
            .filter(season_indices::Column::IndexId.eq(index.value()))
            .one(&self.conn)
            .await?;
        Ok(row.and_then(Self::map_model))
    }

    /// All mappings, newest season first.
    pub async fn list(&self) -> anyhow::Result<Vec<SeasonIndex>> {
        let rows = SeasonIndices::find()
            .order_by_desc(season_indices::Column::SeasonKey)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().filter_map(Self::map_model).collect())
    }

    /// Records a mapping. Existing mappings are never overwritten.
    pub async fn insert_mapping(
        &self,
        season: SeasonKey,
        index: IndexId,
    ) -> anyhow::Result<MappingInsert> {
        if let Some(existing) = self.get(season).await? {
            return Ok(if existing.index_id == index {
                MappingInsert::Existing
            } else {
                MappingInsert::Conflict {
                    existing: existing.index_id,
                }
            });
        }

        if let Some(other) = self.find_by_index(index).await? {
            return Ok(MappingInsert::IndexInUse {
                season: other.season,
            });
        }

        let now = Utc::now().to_rfc3339();
        let active_model = season_indices::ActiveModel {
            season_key: Set(season.value()),
            index_id: Set(index.value()),
            subject_ids: Set("[]".to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };
        SeasonIndices::insert(active_model).exec(&self.conn).await?;

        info!(season = %season, index = %index, "Recorded season index mapping");
        Ok(MappingInsert::Inserted)
    }

    pub async fn set_members(
        &self,
        season: SeasonKey,
        members: &[SubjectId],
    ) -> anyhow::Result<bool> {
        let update = season_indices::ActiveModel {
            subject_ids: Set(serde_json::to_string(members)?),
            updated_at: Set(Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let result = SeasonIndices::update_many()
            .set(update)
            .filter(season_indices::Column::SeasonKey.eq(season.value()))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Newest season whose cached membership lists `subject`.
    pub async fn season_for_subject(&self, subject: SubjectId) -> anyhow::Result<Option<SeasonKey>> {
        let found = self
            .list()
            .await?
            .into_iter()
            .find(|index| index.subject_ids.contains(&subject))
            .map(|index| index.season);
        Ok(found)
    }
}

use crate::domain::SubjectId;
use crate::entities::{prelude::*, season_indices, subjects};
use crate::models::NormalizedSubject;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::{debug, info};

pub struct SubjectRepository {
    conn: DatabaseConnection,
}

impl SubjectRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(model: subjects::Model) -> NormalizedSubject {
        NormalizedSubject {
            id: SubjectId::new(model.id),
            name: model.name,
            name_cn: model.name_cn,
            images_grid: model.images_grid,
            images_large: model.images_large,
            rank: model.rank,
            score: model.score,
            collection_total: model.collection_total,
            average_comment: model.average_comment,
            drop_rate: model.drop_rate,
            air_weekday: model.air_weekday,
            meta_tags: serde_json::from_str(&model.meta_tags).unwrap_or_default(),
            // An unreadable timestamp makes the row look never refreshed.
            updated_at: DateTime::parse_from_rfc3339(&model.updated_at)
                .map_or(DateTime::<Utc>::UNIX_EPOCH, |t| t.with_timezone(&Utc)),
        }
    }

    pub async fn get(&self, id: SubjectId) -> anyhow::Result<Option<NormalizedSubject>> {
        let row = Subjects::find_by_id(id.value()).one(&self.conn).await?;
        Ok(row.map(Self::map_model))
    }

    pub async fn get_by_ids(&self, ids: &[SubjectId]) -> anyhow::Result<Vec<NormalizedSubject>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = Subjects::find()
            .filter(subjects::Column::Id.is_in(ids.iter().map(SubjectId::value)))
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn upsert(&self, subject: &NormalizedSubject) -> anyhow::Result<()> {
        Self::upsert_on(&self.conn, subject).await
    }

    /// Stores a refreshed subject and, when it arrived under a new ID, retires
    /// the old one in the same transaction.
    pub async fn save_refreshed(
        &self,
        subject: &NormalizedSubject,
        renamed_from: Option<SubjectId>,
    ) -> anyhow::Result<()> {
        let txn = self.conn.begin().await?;
        Self::upsert_on(&txn, subject).await?;
        if let Some(from) = renamed_from {
            Self::rename_on(&txn, from, subject.id).await?;
        }
        txn.commit().await?;
        Ok(())
    }

    async fn upsert_on<C: ConnectionTrait>(
        conn: &C,
        subject: &NormalizedSubject,
    ) -> anyhow::Result<()> {
        let active_model = subjects::ActiveModel {
            id: Set(subject.id.value()),
            name: Set(subject.name.clone()),
            name_cn: Set(subject.name_cn.clone()),
            images_grid: Set(subject.images_grid.clone()),
            images_large: Set(subject.images_large.clone()),
            rank: Set(subject.rank),
            score: Set(subject.score),
            collection_total: Set(subject.collection_total),
            average_comment: Set(subject.average_comment),
            drop_rate: Set(subject.drop_rate),
            air_weekday: Set(subject.air_weekday.clone()),
            meta_tags: Set(serde_json::to_string(&subject.meta_tags)?),
            updated_at: Set(subject.updated_at.to_rfc3339()),
        };

        Subjects::insert(active_model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(subjects::Column::Id)
                    .update_columns([
                        subjects::Column::Name,
                        subjects::Column::NameCn,
                        subjects::Column::ImagesGrid,
                        subjects::Column::ImagesLarge,
                        subjects::Column::Rank,
                        subjects::Column::Score,
                        subjects::Column::CollectionTotal,
                        subjects::Column::AverageComment,
                        subjects::Column::DropRate,
                        subjects::Column::AirWeekday,
                        subjects::Column::MetaTags,
                        subjects::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(conn)
            .await?;

        debug!(subject = %subject.id, "Upserted subject");
        Ok(())
    }

    /// Moves a superseded subject ID to its replacement: drops the old row and
    /// rewrites every cached index membership that still lists it.
    pub async fn rename(&self, from: SubjectId, to: SubjectId) -> anyhow::Result<()> {
        let txn = self.conn.begin().await?;
        Self::rename_on(&txn, from, to).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn rename_on<C: ConnectionTrait>(
        conn: &C,
        from: SubjectId,
        to: SubjectId,
    ) -> anyhow::Result<()> {
        if from == to {
            return Ok(());
        }

        Subjects::delete_by_id(from.value()).exec(conn).await?;

        let needle = from.value();
        let indices = SeasonIndices::find().all(conn).await?;
        for row in indices {
            let mut members: Vec<i32> = serde_json::from_str(&row.subject_ids).unwrap_or_default();
            if !members.contains(&needle) {
                continue;
            }

            let mut seen = std::collections::HashSet::new();
            members = members
                .into_iter()
                .map(|id| if id == needle { to.value() } else { id })
                .filter(|id| seen.insert(*id))
                .collect();

            let update = season_indices::ActiveModel {
                subject_ids: Set(serde_json::to_string(&members)?),
                updated_at: Set(Utc::now().to_rfc3339()),
                ..Default::default()
            };
            SeasonIndices::update_many()
                .set(update)
                .filter(season_indices::Column::SeasonKey.eq(row.season_key))
                .exec(conn)
                .await?;
        }

        info!(from = %from, to = %to, "Renamed subject");
        Ok(())
    }
}

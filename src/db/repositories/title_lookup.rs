use crate::domain::SubjectId;
use crate::entities::{prelude::*, title_lookup};
use sea_orm::{DatabaseConnection, EntityTrait, Set};

pub struct TitleLookupRepository {
    conn: DatabaseConnection,
}

impl TitleLookupRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, title: &str) -> anyhow::Result<Option<SubjectId>> {
        let row = TitleLookup::find_by_id(title.to_string())
            .one(&self.conn)
            .await?;
        Ok(row.map(|r| SubjectId::new(r.subject_id)))
    }

    pub async fn put(&self, title: &str, subject: SubjectId) -> anyhow::Result<()> {
        let active_model = title_lookup::ActiveModel {
            title: Set(title.to_string()),
            subject_id: Set(subject.value()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
        };

        TitleLookup::insert(active_model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(title_lookup::Column::Title)
                    .update_column(title_lookup::Column::SubjectId)
                    .to_owned(),
            )
            .exec(&self.conn)
            .await?;

        Ok(())
    }
}

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TitleLookup::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TitleLookup::Title)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TitleLookup::SubjectId).integer().not_null())
                    .col(ColumnDef::new(TitleLookup::CreatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_title_lookup_subject")
                    .table(TitleLookup::Table)
                    .col(TitleLookup::SubjectId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TitleLookup::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TitleLookup {
    Table,
    Title,
    SubjectId,
    CreatedAt,
}

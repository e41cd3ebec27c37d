use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "season_indices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub season_key: i32,
    #[sea_orm(unique)]
    pub index_id: i32,
    #[sea_orm(column_type = "Text")]
    pub subject_ids: String, // JSON array of subject IDs
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

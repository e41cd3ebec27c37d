use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "subjects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub name: String,
    pub name_cn: String,
    pub images_grid: Option<String>,
    pub images_large: Option<String>,
    /// Unranked subjects hold `UNRANKED_SENTINEL` so they sort last.
    pub rank: i32,
    pub score: Option<f64>,
    pub collection_total: Option<i64>,
    pub average_comment: f64,
    pub drop_rate: Option<f64>,
    pub air_weekday: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub meta_tags: String, // JSON array
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

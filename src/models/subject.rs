use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::UNRANKED_SENTINEL;
use crate::domain::SubjectId;

/// A subject as stored locally, with every derived field already computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSubject {
    pub id: SubjectId,
    pub name: String,
    pub name_cn: String,
    pub images_grid: Option<String>,
    pub images_large: Option<String>,
    pub rank: i32,
    pub score: Option<f64>,
    pub collection_total: Option<i64>,
    pub average_comment: f64,
    pub drop_rate: Option<f64>,
    pub air_weekday: Option<String>,
    pub meta_tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl NormalizedSubject {
    #[must_use]
    pub const fn is_ranked(&self) -> bool {
        self.rank != UNRANKED_SENTINEL
    }

    /// Compares everything except the refresh timestamp.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        Self {
            updated_at: other.updated_at,
            ..self.clone()
        } == *other
    }

    /// Display title, preferring the localized name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name_cn.is_empty() {
            &self.name
        } else {
            &self.name_cn
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{IndexId, SeasonKey, SubjectId};

/// Local mapping of a season to its remote index, plus the membership last
/// observed or reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonIndex {
    pub season: SeasonKey,
    pub index_id: IndexId,
    pub subject_ids: Vec<SubjectId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

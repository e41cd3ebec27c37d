pub mod report;
pub mod season_index;
pub mod subject;

pub use report::{
    BatchReport, ItemFailure, ReconcileAction, ReconcileReport, Renamed, SeasonBatchReport,
};
pub use season_index::SeasonIndex;
pub use subject::NormalizedSubject;

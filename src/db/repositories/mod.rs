pub mod season_index;
pub mod subject;
pub mod title_lookup;

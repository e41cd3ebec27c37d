pub mod prelude;

pub mod season_indices;
pub mod subjects;
pub mod title_lookup;

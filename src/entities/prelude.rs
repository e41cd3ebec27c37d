pub use super::season_indices::Entity as SeasonIndices;
pub use super::subjects::Entity as Subjects;
pub use super::title_lookup::Entity as TitleLookup;

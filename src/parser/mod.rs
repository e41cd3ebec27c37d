pub mod airdate;

pub use airdate::parse_airdate;

/// Stored rank for subjects without a usable upstream rank; sorts after every real rank.
pub const UNRANKED_SENTINEL: i32 = 999_999;

/// Infobox key holding the broadcast weekday.
pub const AIR_WEEKDAY_KEY: &str = "放送星期";

pub mod intervals {
    use std::time::Duration;

    /// How often a running scheduler checks its stop flag.
    pub const SCHEDULER_POLL: Duration = Duration::from_secs(1);

    pub const SCHEDULER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
}

pub mod limits {
    pub const MAX_SEARCH_RESULTS: u32 = 10;

    pub const MAX_CONCURRENT_FETCHES: usize = 8;
}

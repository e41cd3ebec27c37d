//! Decides whether a cached subject is due for a refresh.
//!
//! The tolerated age of a cached record grows with the age of its season:
//! a subject from a season `n` quarters old may be up to `n` windows stale.
//! Current and upcoming seasons therefore refresh on every run.

use chrono::{DateTime, Duration, Utc};

use crate::config::StalenessConfig;
use crate::domain::SeasonKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    quarter_length_days: i64,
    window_days_per_quarter: i64,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(&StalenessConfig::default())
    }
}

impl StalenessPolicy {
    #[must_use]
    pub fn new(config: &StalenessConfig) -> Self {
        Self {
            quarter_length_days: i64::from(config.quarter_length_days.max(1)),
            window_days_per_quarter: i64::from(config.window_days_per_quarter),
        }
    }

    /// Whole quarters elapsed since the season began; zero for seasons not yet started.
    #[must_use]
    pub fn age_quarters(&self, season: SeasonKey, now: DateTime<Utc>) -> i64 {
        let days = (now.date_naive() - season.first_day()).num_days();
        days.max(0) / self.quarter_length_days
    }

    /// How old a cached record of this season may be before it is stale.
    #[must_use]
    pub fn window(&self, season: SeasonKey, now: DateTime<Utc>) -> Duration {
        Duration::days(self.age_quarters(season, now) * self.window_days_per_quarter)
    }

    /// Never-fetched records are always stale.
    #[must_use]
    pub fn is_stale(
        &self,
        season: SeasonKey,
        last_refreshed: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        last_refreshed.is_none_or(|last| last < now - self.window(season, now))
    }
}

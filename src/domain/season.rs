//! Season keys and season-set arithmetic.
//!
//! A season key encodes a broadcast quarter as `YYYYMM`, where `MM` is the
//! first month of the quarter (`01`, `04`, `07` or `10`).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// First season that was ever mirrored; anything before it is not tracked.
const EARLIEST_SEASON: SeasonKey = SeasonKey(201_204);

const QUARTER_MONTHS: [u32; 4] = [1, 4, 7, 10];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid season key {0}: expected YYYYMM with MM in 01/04/07/10")]
pub struct InvalidSeasonKey(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct SeasonKey(i32);

impl SeasonKey {
    pub fn new(year: i32, month: u32) -> Result<Self, InvalidSeasonKey> {
        if !(1900..=9999).contains(&year) || !QUARTER_MONTHS.contains(&month) {
            return Err(InvalidSeasonKey(format!("{year}{month:02}")));
        }
        let month = i32::try_from(month).map_err(|_| InvalidSeasonKey(format!("{year}{month}")))?;
        Ok(Self(year * 100 + month))
    }

    /// Validates a raw `YYYYMM` integer.
    pub fn parse(raw: i32) -> Result<Self, InvalidSeasonKey> {
        let month = u32::try_from(raw.rem_euclid(100)).unwrap_or_default();
        Self::new(raw / 100, month).map_err(|_| InvalidSeasonKey(raw.to_string()))
    }

    /// The season that contains `today`.
    #[must_use]
    pub fn current(today: NaiveDate) -> Self {
        let month = match today.month() {
            1..=3 => 1,
            4..=6 => 4,
            7..=9 => 7,
            _ => 10,
        };
        Self(today.year() * 100 + month)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn year(&self) -> i32 {
        self.0 / 100
    }

    #[must_use]
    pub const fn month(&self) -> u32 {
        #[allow(clippy::cast_sign_loss)]
        let month = (self.0 % 100) as u32;
        month
    }

    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        // Year and month were validated on construction.
        NaiveDate::from_ymd_opt(self.year(), self.month(), 1).unwrap_or(NaiveDate::MIN)
    }

    #[must_use]
    pub const fn next(&self) -> Self {
        if self.month() == 10 {
            Self((self.year() + 1) * 100 + 1)
        } else {
            Self(self.0 + 3)
        }
    }

    #[must_use]
    pub const fn prev(&self) -> Self {
        if self.month() == 1 {
            Self((self.year() - 1) * 100 + 10)
        } else {
            Self(self.0 - 3)
        }
    }

    /// Upper-case season name as used by AniList search URLs.
    #[must_use]
    pub const fn season_name(&self) -> &'static str {
        match self.month() {
            1 => "WINTER",
            4 => "SPRING",
            7 => "SUMMER",
            _ => "FALL",
        }
    }

    #[must_use]
    pub const fn season_name_cn(&self) -> &'static str {
        match self.month() {
            1 => "冬",
            4 => "春",
            7 => "夏",
            _ => "秋",
        }
    }

    /// Human label, e.g. `2026年冬季番`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}年{}季番", self.year(), self.season_name_cn())
    }
}

impl fmt::Display for SeasonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i32> for SeasonKey {
    type Error = InvalidSeasonKey;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<SeasonKey> for i32 {
    fn from(key: SeasonKey) -> Self {
        key.0
    }
}

impl FromStr for SeasonKey {
    type Err = InvalidSeasonKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: i32 = s
            .trim()
            .parse()
            .map_err(|_| InvalidSeasonKey(s.to_string()))?;
        Self::parse(raw)
    }
}

/// The upcoming season (not yet airing).
#[must_use]
pub fn future_seasons(today: NaiveDate) -> Vec<SeasonKey> {
    vec![SeasonKey::current(today).next()]
}

/// The current season and the three before it, newest first.
#[must_use]
pub fn recent_seasons(today: NaiveDate) -> Vec<SeasonKey> {
    walk_back(SeasonKey::current(today), 4)
}

/// The twelve seasons preceding [`recent_seasons`], newest first.
#[must_use]
pub fn older_seasons(today: NaiveDate) -> Vec<SeasonKey> {
    let mut seasons = walk_back(SeasonKey::current(today), 16);
    seasons.drain(..4);
    seasons
}

/// Every tracked season older than [`older_seasons`], newest first.
#[must_use]
pub fn archive_seasons(today: NaiveDate) -> Vec<SeasonKey> {
    let mut season = SeasonKey::current(today);
    for _ in 0..16 {
        season = season.prev();
    }

    let mut seasons = Vec::new();
    while season >= EARLIEST_SEASON {
        seasons.push(season);
        season = season.prev();
    }
    seasons
}

/// All tracked seasons from the upcoming one down to the earliest, newest first.
#[must_use]
pub fn all_seasons(today: NaiveDate) -> Vec<SeasonKey> {
    let mut seasons = future_seasons(today);
    seasons.extend(recent_seasons(today));
    seasons.extend(older_seasons(today));
    seasons.extend(archive_seasons(today));
    seasons
}

fn walk_back(start: SeasonKey, count: usize) -> Vec<SeasonKey> {
    let mut seasons = Vec::with_capacity(count);
    let mut season = start;
    for _ in 0..count {
        seasons.push(season);
        season = season.prev();
    }
    seasons
}

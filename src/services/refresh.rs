//! Fetches one subject and turns it into a [`NormalizedSubject`].
//!
//! Derived fields:
//! - `score`: weighted mean of the rating histogram when it has votes,
//!   otherwise the upstream score.
//! - `collection_total`: sum of the five collection buckets.
//! - `drop_rate`: dropped / total, absent when the total is zero.
//! - `average_comment`: mean comment count over episodes that have aired.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clients::CatalogApi;
use crate::clients::bangumi::{Collection, Episode, FetchError, InfoboxItem, Rating, Subject};
use crate::constants::{AIR_WEEKDAY_KEY, UNRANKED_SENTINEL};
use crate::db::Store;
use crate::domain::SubjectId;
use crate::models::{NormalizedSubject, Renamed};
use crate::parser::parse_airdate;
use crate::services::locks::KeyedLocks;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for RefreshError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for RefreshError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// A freshly fetched subject and the rename it implies, if any.
#[derive(Debug, Clone)]
pub struct Refreshed {
    pub subject: NormalizedSubject,
    pub renamed: Option<Renamed>,
}

pub struct RefreshService {
    catalog: Arc<dyn CatalogApi>,
    store: Store,
    locks: Arc<KeyedLocks<SubjectId>>,
    episode_limit: u32,
}

impl RefreshService {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogApi>,
        store: Store,
        locks: Arc<KeyedLocks<SubjectId>>,
        episode_limit: u32,
    ) -> Self {
        Self {
            catalog,
            store,
            locks,
            episode_limit,
        }
    }

    /// Fetches and normalizes a subject without touching the store.
    ///
    /// Only the detail fetch can fail; an episode fetch failure degrades
    /// `average_comment` to zero.
    pub async fn fetch(&self, id: SubjectId, now: DateTime<Utc>) -> Result<Refreshed, FetchError> {
        let lookup = self.catalog.subject(id).await?;
        let resolved = lookup.resolved();

        let average_comment = match self.catalog.episodes(resolved, self.episode_limit).await {
            Ok(episodes) => average_comment(&episodes, now.date_naive()),
            Err(e) => {
                warn!(subject = %resolved, error = %e, "Episode fetch failed, engagement set to 0");
                0.0
            }
        };

        let renamed = lookup.was_redirected().then_some(Renamed {
            from: id,
            to: resolved,
        });

        Ok(Refreshed {
            subject: normalize(&lookup.subject, average_comment, now),
            renamed,
        })
    }

    /// Fetches a subject and writes it back. A redirected subject is stored
    /// under its new ID and the old ID is retired.
    pub async fn refresh(&self, id: SubjectId) -> Result<Refreshed, RefreshError> {
        let refreshed = self.fetch(id, Utc::now()).await?;
        let resolved = refreshed.subject.id;

        let _guards = self.locks.lock_all(&[id, resolved]).await;
        self.store
            .save_refreshed_subject(&refreshed.subject, refreshed.renamed.map(|r| r.from))
            .await?;

        if let Some(renamed) = refreshed.renamed {
            info!(from = %renamed.from, to = %renamed.to, "Stored redirected subject under new ID");
        } else {
            debug!(subject = %resolved, "Refreshed subject");
        }

        Ok(refreshed)
    }
}

/// Builds the stored record from an upstream subject.
#[must_use]
pub fn normalize(subject: &Subject, average_comment: f64, now: DateTime<Utc>) -> NormalizedSubject {
    let images = subject.images.as_ref();
    let collection_total = collection_total(subject.collection.as_ref());

    NormalizedSubject {
        id: SubjectId::new(subject.id),
        name: subject.name.clone(),
        name_cn: subject.name_cn.clone(),
        images_grid: images.and_then(|i| i.grid.clone()),
        images_large: images.and_then(|i| i.large.clone()),
        rank: normalize_rank(subject.rating.as_ref().and_then(|r| r.rank)),
        score: score(subject.rating.as_ref()),
        collection_total,
        average_comment,
        drop_rate: drop_rate(subject.collection.as_ref(), collection_total),
        air_weekday: air_weekday(subject.infobox.as_deref().unwrap_or_default()),
        meta_tags: dedup_tags(&subject.meta_tags),
        updated_at: now,
    }
}

/// Missing or zero ranks become [`UNRANKED_SENTINEL`].
#[must_use]
pub fn normalize_rank(rank: Option<i32>) -> i32 {
    rank.filter(|r| *r > 0).unwrap_or(UNRANKED_SENTINEL)
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score(rating: Option<&Rating>) -> Option<f64> {
    let rating = rating?;

    if let Some(total) = rating.total.filter(|t| *t > 0)
        && !rating.count.is_empty()
    {
        let weighted: i64 = rating
            .count
            .iter()
            .map(|(bucket, votes)| i64::from(*bucket) * votes)
            .sum();
        return Some(weighted as f64 / total as f64);
    }

    rating.score
}

#[must_use]
pub fn collection_total(collection: Option<&Collection>) -> Option<i64> {
    collection.map(|c| c.wish + c.collect + c.doing + c.on_hold + c.dropped)
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn drop_rate(collection: Option<&Collection>, total: Option<i64>) -> Option<f64> {
    let dropped = collection?.dropped;
    let total = total.filter(|t| *t > 0)?;
    Some(dropped as f64 / total as f64)
}

#[must_use]
pub fn air_weekday(infobox: &[InfoboxItem]) -> Option<String> {
    let item = infobox.iter().find(|item| item.key == AIR_WEEKDAY_KEY)?;

    let value = match &item.value {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Array(entries) => entries
            .iter()
            .find_map(|e| e.get("v").and_then(serde_json::Value::as_str))
            .map(|s| s.trim().to_string()),
        _ => None,
    };

    value.filter(|v| !v.is_empty())
}

/// Mean comment count over episodes aired on or before `today` that report
/// a comment count; zero when none qualify.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_comment(episodes: &[Episode], today: NaiveDate) -> f64 {
    let (sum, count) = episodes
        .iter()
        .filter(|ep| parse_airdate(&ep.airdate).is_some_and(|aired| aired <= today))
        .filter_map(|ep| ep.comment)
        .fold((0i64, 0i64), |(sum, count), comments| (sum + comments, count + 1));

    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// Drops repeated tags, keeping the first occurrence.
#[must_use]
pub fn dedup_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::bangumi::Images;
    use std::collections::BTreeMap;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn episode(airdate: &str, comment: Option<i64>) -> Episode {
        Episode {
            airdate: airdate.to_string(),
            comment,
            ..Episode::default()
        }
    }

    #[test]
    fn collection_fields() {
        let collection = Collection {
            wish: 10,
            collect: 50,
            doing: 5,
            on_hold: 3,
            dropped: 2,
        };
        let total = collection_total(Some(&collection));
        assert_eq!(total, Some(70));

        let rate = drop_rate(Some(&collection), total).unwrap();
        assert!((rate - 2.0 / 70.0).abs() < 1e-12);
    }

    #[test]
    fn drop_rate_never_divides_by_zero() {
        let empty = Collection::default();
        assert_eq!(drop_rate(Some(&empty), collection_total(Some(&empty))), None);
        assert_eq!(drop_rate(None, None), None);
        assert_eq!(collection_total(None), None);
    }

    #[test]
    fn score_from_histogram() {
        let rating = Rating {
            total: Some(15),
            count: BTreeMap::from([(8, 10), (9, 5)]),
            score: Some(1.0),
            ..Rating::default()
        };
        let score = score(Some(&rating)).unwrap();
        assert!((score - 125.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn score_falls_back_to_upstream() {
        let rating = Rating {
            total: Some(0),
            count: BTreeMap::from([(8, 0)]),
            score: Some(7.1),
            ..Rating::default()
        };
        assert_eq!(score(Some(&rating)), Some(7.1));
        assert_eq!(score(Some(&Rating::default())), None);
        assert_eq!(score(None), None);
    }

    #[test]
    fn rank_sentinel() {
        assert_eq!(normalize_rank(None), UNRANKED_SENTINEL);
        assert_eq!(normalize_rank(Some(0)), UNRANKED_SENTINEL);
        assert_eq!(normalize_rank(Some(12)), 12);
    }

    #[test]
    fn weekday_from_infobox() {
        let infobox = vec![
            InfoboxItem {
                key: "中文名".to_string(),
                value: serde_json::json!("葬送的芙莉莲"),
            },
            InfoboxItem {
                key: AIR_WEEKDAY_KEY.to_string(),
                value: serde_json::json!("星期五"),
            },
        ];
        assert_eq!(air_weekday(&infobox).as_deref(), Some("星期五"));
        assert_eq!(air_weekday(&infobox[..1]), None);

        let listed = vec![InfoboxItem {
            key: AIR_WEEKDAY_KEY.to_string(),
            value: serde_json::json!([{"v": "星期日"}]),
        }];
        assert_eq!(air_weekday(&listed).as_deref(), Some("星期日"));
    }

    #[test]
    fn average_comment_counts_aired_episodes_only() {
        let episodes = vec![
            episode("2026-10-03", Some(30)),
            episode("2026/10/10", Some(10)),
            episode("2026年10月16日", None),
            episode("2026-10-17", Some(1000)),
            episode("", Some(1000)),
            episode("2026-10-01(先行)", Some(20)),
        ];
        assert!((average_comment(&episodes, today()) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn average_comment_defaults_to_zero() {
        assert!(average_comment(&[], today()).abs() < f64::EPSILON);
        let unaired = vec![episode("2027-01-01", Some(5))];
        assert!(average_comment(&unaired, today()).abs() < f64::EPSILON);
    }

    #[test]
    fn tags_keep_first_occurrence() {
        let tags: Vec<String> = ["TV", "原创", "TV", "tv", "原创"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(dedup_tags(&tags), vec!["TV", "原创", "tv"]);
    }

    #[test]
    fn normalize_fills_every_field() {
        let subject = Subject {
            id: 400_602,
            name: "葬送のフリーレン".to_string(),
            name_cn: "葬送的芙莉莲".to_string(),
            images: Some(Images {
                grid: Some("g".to_string()),
                large: Some("l".to_string()),
                ..Images::default()
            }),
            rating: Some(Rating {
                rank: Some(0),
                score: Some(8.9),
                ..Rating::default()
            }),
            meta_tags: vec!["TV".to_string(), "TV".to_string()],
            ..Subject::default()
        };

        let now = Utc::now();
        let normalized = normalize(&subject, 4.5, now);
        assert_eq!(normalized.id, SubjectId::new(400_602));
        assert_eq!(normalized.rank, UNRANKED_SENTINEL);
        assert_eq!(normalized.score, Some(8.9));
        assert_eq!(normalized.images_grid.as_deref(), Some("g"));
        assert_eq!(normalized.collection_total, None);
        assert_eq!(normalized.drop_rate, None);
        assert_eq!(normalized.meta_tags, vec!["TV"]);
        assert_eq!(normalized.updated_at, now);
        assert!(!normalized.is_ranked());
    }
}

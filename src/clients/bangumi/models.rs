//! Wire types for the Bangumi (bgm.tv) v0 API.
//!
//! Fields the API is known to omit or null out are optional or defaulted so a
//! sparse response still decodes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `type` value for anime subjects.
pub const SUBJECT_TYPE_ANIME: i32 = 2;

/// `type` value for main-story episodes.
pub const EPISODE_TYPE_MAIN: i32 = 0;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Paged<T> {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Subject {
    pub id: i32,
    #[serde(rename = "type", default)]
    pub subject_type: Option<i32>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_cn: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub images: Option<Images>,
    #[serde(default)]
    pub infobox: Option<Vec<InfoboxItem>>,
    #[serde(default)]
    pub eps: Option<i64>,
    #[serde(default)]
    pub total_episodes: Option<i64>,
    #[serde(default)]
    pub rating: Option<Rating>,
    #[serde(default)]
    pub collection: Option<Collection>,
    #[serde(default)]
    pub meta_tags: Vec<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Images {
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub common: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub grid: Option<String>,
}

/// Free-form key/value pair from the subject's infobox.
///
/// `value` is either a string or a list of `{k, v}` objects.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InfoboxItem {
    pub key: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Rating {
    #[serde(default)]
    pub rank: Option<i32>,
    #[serde(default)]
    pub total: Option<i64>,
    /// Score bucket (1..=10) to vote count.
    #[serde(default)]
    pub count: BTreeMap<i32, i64>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Collection status counts; the five buckets are disjoint.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct Collection {
    #[serde(default)]
    pub wish: i64,
    #[serde(default)]
    pub collect: i64,
    #[serde(default)]
    pub doing: i64,
    #[serde(default)]
    pub on_hold: i64,
    #[serde(default)]
    pub dropped: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub count: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Episode {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub episode_type: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_cn: String,
    #[serde(default)]
    pub sort: f64,
    #[serde(default)]
    pub ep: Option<f64>,
    #[serde(default)]
    pub airdate: String,
    #[serde(default)]
    pub comment: Option<i64>,
    #[serde(default)]
    pub subject_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexSubject {
    pub id: i32,
    #[serde(rename = "type", default)]
    pub subject_type: Option<i32>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub added_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Index {
    pub id: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub nsfw: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexBasicInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddSubjectToIndexRequest {
    pub subject_id: i32,
    pub sort: i32,
    pub comment: String,
}

impl AddSubjectToIndexRequest {
    #[must_use]
    pub const fn new(subject_id: i32) -> Self {
        Self {
            subject_id,
            sort: 0,
            comment: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub keyword: String,
    pub sort: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<SearchFilter>,
}

impl SearchRequest {
    /// Keyword search restricted to anime, ordered by match quality.
    #[must_use]
    pub fn anime(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            sort: "match".to_string(),
            filter: Some(SearchFilter {
                subject_type: Some(vec![SUBJECT_TYPE_ANIME]),
                meta_tags: None,
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchFilter {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub subject_type: Option<Vec<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_tags: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_subject_with_rating_histogram() {
        let json = r#"{
            "id": 400602,
            "type": 2,
            "name": "葬送のフリーレン",
            "name_cn": "葬送的芙莉莲",
            "images": {"large": "https://lain.bgm.tv/l.jpg", "grid": "https://lain.bgm.tv/g.jpg"},
            "infobox": [
                {"key": "放送星期", "value": "星期五"},
                {"key": "别名", "value": [{"v": "Frieren"}]}
            ],
            "rating": {"rank": 1, "total": 15, "count": {"8": 10, "9": 5}, "score": 8.3},
            "collection": {"wish": 10, "collect": 50, "doing": 5, "on_hold": 3, "dropped": 2},
            "meta_tags": ["TV", "日本"]
        }"#;

        let subject: Subject = serde_json::from_str(json).unwrap();
        assert_eq!(subject.id, 400_602);
        let rating = subject.rating.unwrap();
        assert_eq!(rating.count.get(&8), Some(&10));
        assert_eq!(subject.collection.unwrap().collect, 50);
        assert_eq!(subject.infobox.unwrap().len(), 2);
    }

    #[test]
    fn decodes_sparse_subject() {
        let subject: Subject = serde_json::from_str(r#"{"id": 1, "rating": null}"#).unwrap();
        assert!(subject.rating.is_none());
        assert!(subject.collection.is_none());
        assert!(subject.meta_tags.is_empty());
    }

    #[test]
    fn search_request_filters_anime() {
        let body = serde_json::to_value(SearchRequest::anime("ぼっち")).unwrap();
        assert_eq!(body["filter"]["type"][0], 2);
        assert!(body["filter"].get("meta_tags").is_none());
    }
}

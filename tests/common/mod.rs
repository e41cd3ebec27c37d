//! Fake Bangumi API served on an ephemeral local port.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use seasonrank::config::Config;

#[derive(Default)]
pub struct FakeBangumi {
    pub subjects: HashMap<i32, Value>,
    pub redirects: HashMap<i32, i32>,
    /// Always answer 503.
    pub failing: HashSet<i32>,
    /// Answer 503 this many more times, then succeed.
    pub flaky: HashMap<i32, usize>,
    /// Answer 200 with a body that is not JSON.
    pub broken: HashSet<i32>,
    pub indices: HashMap<i32, Vec<i32>>,
    pub index_info: HashMap<i32, Value>,
    /// Leave `total` out of index pages.
    pub omit_index_total: bool,
    pub next_index: i32,
    pub hits: HashMap<String, usize>,
    pub mutations: Vec<String>,
    pub tokens: Vec<Option<String>>,
}

pub type Shared = Arc<Mutex<FakeBangumi>>;

impl FakeBangumi {
    pub fn add_subject(&mut self, id: i32, name: &str) {
        self.subjects.insert(
            id,
            json!({
                "id": id,
                "type": 2,
                "name": name,
                "name_cn": "",
                "images": {"large": format!("https://lain.bgm.tv/l/{id}.jpg"), "grid": null},
                "infobox": [{"key": "放送星期", "value": "星期五"}],
                "rating": {"rank": 100 + id, "total": 15, "count": {"8": 10, "9": 5}, "score": 8.3},
                "collection": {"wish": 10, "collect": 50, "doing": 5, "on_hold": 3, "dropped": 2},
                "meta_tags": ["TV", "TV", "原创"],
            }),
        );
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.get(path).copied().unwrap_or_default()
    }

    fn hit(&mut self, path: String, headers: &HeaderMap) {
        *self.hits.entry(path).or_default() += 1;
        self.tokens.push(
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string),
        );
    }
}

fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "upstream busy").into_response()
}

async fn subject(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.hit(format!("/v0/subjects/{id}"), &headers);

    if state.failing.contains(&id) {
        return unavailable();
    }
    if let Some(remaining) = state.flaky.get_mut(&id)
        && *remaining > 0
    {
        *remaining -= 1;
        return unavailable();
    }
    if state.broken.contains(&id) {
        return (StatusCode::OK, "<html>maintenance</html>").into_response();
    }
    if let Some(to) = state.redirects.get(&id) {
        return (
            StatusCode::FOUND,
            [(header::LOCATION, format!("/v0/subjects/{to}"))],
        )
            .into_response();
    }

    match state.subjects.get(&id) {
        Some(subject) => Json(subject.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

#[derive(Deserialize)]
struct EpisodeQuery {
    subject_id: i32,
}

async fn episodes(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<EpisodeQuery>,
) -> Response {
    state
        .lock()
        .unwrap()
        .hit("/v0/episodes".to_string(), &headers);

    Json(json!({
        "total": 2,
        "limit": 100,
        "offset": 0,
        "data": [
            {"id": query.subject_id * 10, "type": 0, "airdate": "2020-01-03", "comment": 30},
            {"id": query.subject_id * 10 + 1, "type": 0, "airdate": "2020-01-10", "comment": 10},
        ],
    }))
    .into_response()
}

#[derive(Deserialize)]
struct PageQuery {
    limit: usize,
    offset: usize,
}

async fn index_subjects(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(index): Path<i32>,
    Query(page): Query<PageQuery>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.hit(format!("/v0/indices/{index}/subjects"), &headers);

    let Some(members) = state.indices.get(&index) else {
        return (StatusCode::NOT_FOUND, "no such index").into_response();
    };

    let data: Vec<Value> = members
        .iter()
        .skip(page.offset)
        .take(page.limit)
        .map(|id| json!({"id": id, "type": 2, "name": format!("subject {id}")}))
        .collect();

    if state.omit_index_total {
        return Json(json!({"limit": page.limit, "offset": page.offset, "data": data}))
            .into_response();
    }

    Json(json!({
        "total": members.len(),
        "limit": page.limit,
        "offset": page.offset,
        "data": data,
    }))
    .into_response()
}

async fn create_index(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = state.lock().unwrap();
    state.hit("/v0/indices".to_string(), &headers);

    state.next_index += 1;
    let id = 9000 + state.next_index;
    state.indices.insert(id, Vec::new());
    state.mutations.push(format!("create {id}"));

    Json(json!({"id": id, "title": "", "desc": "", "total": 0, "nsfw": false})).into_response()
}

async fn update_index(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(index): Path<i32>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.hit(format!("/v0/indices/{index}"), &headers);
    state.index_info.insert(index, body);
    StatusCode::NO_CONTENT.into_response()
}

async fn add_member(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(index): Path<i32>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.hit(format!("/v0/indices/{index}/subjects"), &headers);

    let Some(subject) = body
        .get("subject_id")
        .and_then(Value::as_i64)
        .and_then(|id| i32::try_from(id).ok())
    else {
        return (StatusCode::BAD_REQUEST, "missing subject_id").into_response();
    };
    if state.failing.contains(&subject) {
        return unavailable();
    }

    state.mutations.push(format!("add {index} {subject}"));
    state.indices.entry(index).or_default().push(subject);
    StatusCode::NO_CONTENT.into_response()
}

async fn remove_member(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((index, subject)): Path<(i32, i32)>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.hit(format!("/v0/indices/{index}/subjects/{subject}"), &headers);

    state.mutations.push(format!("remove {index} {subject}"));
    if let Some(members) = state.indices.get_mut(&index) {
        members.retain(|m| *m != subject);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn search(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.hit("/v0/search/subjects".to_string(), &headers);

    let keyword = body
        .get("keyword")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let data: Vec<Value> = state
        .subjects
        .values()
        .filter(|s| {
            ["name", "name_cn"].iter().any(|field| {
                s.get(*field)
                    .and_then(Value::as_str)
                    .is_some_and(|v| !v.is_empty() && v.contains(&keyword))
            })
        })
        .cloned()
        .collect();

    Json(json!({"total": data.len(), "limit": 10, "offset": 0, "data": data})).into_response()
}

/// Starts the fake API and returns its shared state and base URL.
pub async fn spawn_fake_bangumi(fake: FakeBangumi) -> (Shared, String) {
    let state: Shared = Arc::new(Mutex::new(fake));

    let app = Router::new()
        .route("/v0/subjects/{id}", get(subject))
        .route("/v0/episodes", get(episodes))
        .route("/v0/search/subjects", post(search))
        .route("/v0/indices", post(create_index))
        .route("/v0/indices/{id}", axum::routing::put(update_index))
        .route("/v0/indices/{id}/subjects", get(index_subjects).post(add_member))
        .route("/v0/indices/{id}/subjects/{subject}", delete(remove_member))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (state, format!("http://{addr}"))
}

/// Config pointing at `base_url` with pacing and backoff disabled and a
/// fresh temporary database.
pub fn test_config(base_url: &str) -> Config {
    let db_path =
        std::env::temp_dir().join(format!("seasonrank-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.bangumi.base_url = base_url.to_string();
    config.bangumi.request_delay_ms = 0;
    config.bangumi.retry_base_delay_ms = 0;
    config.bangumi.request_timeout_seconds = 5;
    config.scheduler.enabled = false;
    config
}

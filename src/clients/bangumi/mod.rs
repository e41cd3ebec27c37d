//! Client for the Bangumi (bgm.tv) v0 API.
//!
//! Every request is paced by a fixed delay, retried with exponential backoff on
//! transient failures, and subject lookups follow merge redirects manually so
//! the caller learns the canonical ID.

pub mod error;
pub mod models;

pub use error::FetchError;
pub use models::*;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::clients::CatalogApi;
use crate::clients::retry::{RetryPolicy, retry_async};
use crate::config::BangumiConfig;
use crate::constants::limits;
use crate::domain::{IndexId, SubjectId};

/// A subject fetched by ID, together with the ID the caller asked for.
///
/// When the upstream merged the requested subject into another one,
/// [`Self::resolved`] differs from [`Self::requested`].
#[derive(Debug, Clone)]
pub struct SubjectLookup {
    pub requested: SubjectId,
    pub subject: Subject,
}

impl SubjectLookup {
    #[must_use]
    pub const fn resolved(&self) -> SubjectId {
        SubjectId::new(self.subject.id)
    }

    #[must_use]
    pub const fn was_redirected(&self) -> bool {
        self.requested.value() != self.subject.id
    }
}

enum SubjectResponse {
    Found(Subject),
    Moved(SubjectId),
}

#[derive(Clone)]
pub struct BangumiClient {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
    request_delay: Duration,
    retry: RetryPolicy,
    max_redirects: u32,
}

impl BangumiClient {
    pub fn new(config: &BangumiConfig) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| FetchError::Invalid(format!("base URL {}: {e}", config.base_url)))?;

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            base_url,
            access_token: config.access_token.clone(),
            request_delay: config.request_delay(),
            retry: config.retry_policy(),
            max_redirects: config.max_redirects,
        })
    }

    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .map_err(|e| FetchError::Invalid(format!("endpoint {path}: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends one attempt after the pacing delay. A 3xx response is returned
    /// as-is when `allow_redirect` is set and is a status error otherwise.
    async fn send(
        &self,
        request: RequestBuilder,
        path: &str,
        allow_redirect: bool,
    ) -> Result<Response, FetchError> {
        tokio::time::sleep(self.request_delay).await;
        debug!(endpoint = path, "Calling Bangumi API");

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() || (allow_redirect && status.is_redirection()) {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(FetchError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, FetchError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Parse {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Runs a full retried exchange. `build` is called once per attempt.
    async fn call<T, F>(&self, path: &str, build: F) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        F: Fn() -> Result<RequestBuilder, FetchError>,
    {
        let build = &build;
        let (result, stats) = retry_async(
            &self.retry,
            || async move {
                let response = self.send(build()?, path, false).await?;
                Self::decode::<T>(response, path).await
            },
            FetchError::is_retryable,
        )
        .await;

        Self::finish(result, stats.attempts)
    }

    /// Like [`Self::call`] but ignores the response body.
    async fn call_empty<F>(&self, path: &str, build: F) -> Result<(), FetchError>
    where
        F: Fn() -> Result<RequestBuilder, FetchError>,
    {
        let build = &build;
        let (result, stats) = retry_async(
            &self.retry,
            || async move {
                self.send(build()?, path, false).await?;
                Ok::<(), FetchError>(())
            },
            FetchError::is_retryable,
        )
        .await;

        Self::finish(result, stats.attempts)
    }

    fn finish<T>(result: Result<T, FetchError>, attempts: u32) -> Result<T, FetchError> {
        result.map_err(|e| {
            if e.is_retryable() {
                FetchError::RetriesExhausted {
                    attempts,
                    source: Box::new(e),
                }
            } else {
                e
            }
        })
    }

    /// Fetches a subject, following merge redirects up to the configured hop limit.
    pub async fn get_subject(&self, id: SubjectId) -> Result<SubjectLookup, FetchError> {
        let mut current = id;

        for _ in 0..=self.max_redirects {
            match self.fetch_subject_once(current).await? {
                SubjectResponse::Found(subject) => {
                    return Ok(SubjectLookup {
                        requested: id,
                        subject,
                    });
                }
                SubjectResponse::Moved(next) => {
                    info!(requested = %id, from = %current, to = %next, "Subject redirected");
                    current = next;
                }
            }
        }

        Err(FetchError::TooManyRedirects {
            requested: id,
            max: self.max_redirects,
        })
    }

    async fn fetch_subject_once(&self, id: SubjectId) -> Result<SubjectResponse, FetchError> {
        let path = format!("/v0/subjects/{id}");
        let path = path.as_str();

        let (result, stats) = retry_async(
            &self.retry,
            || async move {
                let url = self.endpoint(path)?;
                let response = self.send(self.request(Method::GET, url), path, true).await?;

                if response.status().is_redirection() {
                    return self.redirect_target(&response, path).map(SubjectResponse::Moved);
                }

                Self::decode(response, path).await.map(SubjectResponse::Found)
            },
            FetchError::is_retryable,
        )
        .await;

        Self::finish(result, stats.attempts)
    }

    fn redirect_target(&self, response: &Response, path: &str) -> Result<SubjectId, FetchError> {
        let invalid = |location: &str| FetchError::InvalidRedirect {
            endpoint: path.to_string(),
            location: location.to_string(),
        };

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| invalid("<missing>"))?;

        subject_id_from_location(&self.base_url, location).ok_or_else(|| invalid(location))
    }

    pub async fn get_episodes(
        &self,
        subject: SubjectId,
        episode_type: i32,
        limit: u32,
        offset: u32,
    ) -> Result<Paged<Episode>, FetchError> {
        let path = "/v0/episodes";
        self.call(path, || {
            Ok(self.request(Method::GET, self.endpoint(path)?).query(&[
                ("subject_id", subject.value().to_string()),
                ("type", episode_type.to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ]))
        })
        .await
    }

    pub async fn get_index_subjects(
        &self,
        index: IndexId,
        limit: u32,
        offset: u32,
    ) -> Result<Paged<IndexSubject>, FetchError> {
        let path = format!("/v0/indices/{index}/subjects");
        self.call(&path, || {
            Ok(self.request(Method::GET, self.endpoint(&path)?).query(&[
                ("type", SUBJECT_TYPE_ANIME.to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ]))
        })
        .await
    }

    /// Walks every page of an index's anime members.
    pub async fn get_all_index_subjects(
        &self,
        index: IndexId,
        page_size: u32,
    ) -> Result<Vec<IndexSubject>, FetchError> {
        let page_size = page_size.max(1);
        let mut members = Vec::new();
        let mut offset = 0u32;

        loop {
            let page = self.get_index_subjects(index, page_size, offset).await?;
            let fetched = u32::try_from(page.data.len()).unwrap_or(u32::MAX);
            members.extend(page.data);
            offset = offset.saturating_add(fetched);

            // Some responses omit `total`; fall back to a short page.
            let done = if page.total > 0 {
                i64::from(offset) >= page.total
            } else {
                fetched < page_size
            };
            if fetched == 0 || done {
                break;
            }
        }

        debug!(index = %index, count = members.len(), "Fetched index members");
        Ok(members)
    }

    pub async fn search_subjects(
        &self,
        request: &SearchRequest,
        limit: u32,
        offset: u32,
    ) -> Result<Paged<Subject>, FetchError> {
        let path = "/v0/search/subjects";
        self.call(path, || {
            Ok(self
                .request(Method::POST, self.endpoint(path)?)
                .query(&[("limit", limit.to_string()), ("offset", offset.to_string())])
                .json(request))
        })
        .await
    }

    pub async fn create_index(&self) -> Result<Index, FetchError> {
        let path = "/v0/indices";
        self.call(path, || {
            Ok(self
                .request(Method::POST, self.endpoint(path)?)
                .json(&serde_json::json!({})))
        })
        .await
    }

    pub async fn update_index(&self, index: IndexId, info: &IndexBasicInfo) -> Result<(), FetchError> {
        let path = format!("/v0/indices/{index}");
        self.call_empty(&path, || {
            Ok(self.request(Method::PUT, self.endpoint(&path)?).json(info))
        })
        .await
    }

    pub async fn add_subject_to_index(
        &self,
        index: IndexId,
        request: &AddSubjectToIndexRequest,
    ) -> Result<(), FetchError> {
        let path = format!("/v0/indices/{index}/subjects");
        self.call_empty(&path, || {
            Ok(self.request(Method::POST, self.endpoint(&path)?).json(request))
        })
        .await
    }

    pub async fn remove_subject_from_index(
        &self,
        index: IndexId,
        subject: SubjectId,
    ) -> Result<(), FetchError> {
        let path = format!("/v0/indices/{index}/subjects/{subject}");
        self.call_empty(&path, || {
            Ok(self.request(Method::DELETE, self.endpoint(&path)?))
        })
        .await
    }
}

#[async_trait]
impl CatalogApi for BangumiClient {
    async fn subject(&self, id: SubjectId) -> Result<SubjectLookup, FetchError> {
        self.get_subject(id).await
    }

    async fn episodes(&self, subject: SubjectId, limit: u32) -> Result<Vec<Episode>, FetchError> {
        self.get_episodes(subject, EPISODE_TYPE_MAIN, limit, 0)
            .await
            .map(|page| page.data)
    }

    async fn index_members(
        &self,
        index: IndexId,
        page_size: u32,
    ) -> Result<Vec<SubjectId>, FetchError> {
        let members = self.get_all_index_subjects(index, page_size).await?;
        Ok(members.into_iter().map(|m| SubjectId::new(m.id)).collect())
    }

    async fn search_anime(&self, keyword: &str) -> Result<Vec<Subject>, FetchError> {
        self.search_subjects(&SearchRequest::anime(keyword), limits::MAX_SEARCH_RESULTS, 0)
            .await
            .map(|page| page.data)
    }

    async fn create_index(&self) -> Result<Index, FetchError> {
        Self::create_index(self).await
    }

    async fn update_index(&self, index: IndexId, info: &IndexBasicInfo) -> Result<(), FetchError> {
        Self::update_index(self, index, info).await
    }

    async fn add_index_member(&self, index: IndexId, subject: SubjectId) -> Result<(), FetchError> {
        self.add_subject_to_index(index, &AddSubjectToIndexRequest::new(subject.value()))
            .await
    }

    async fn remove_index_member(
        &self,
        index: IndexId,
        subject: SubjectId,
    ) -> Result<(), FetchError> {
        self.remove_subject_from_index(index, subject).await
    }
}

/// Extracts the subject ID from a redirect target such as `/v0/subjects/123`
/// or an absolute URL to the same path.
fn subject_id_from_location(base: &Url, location: &str) -> Option<SubjectId> {
    let url = base.join(location.trim()).ok()?;
    let last = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let id: i32 = last.parse().ok()?;
    (id > 0).then_some(SubjectId::new(id))
}

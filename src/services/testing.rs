//! In-memory catalog used by service unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::clients::CatalogApi;
use crate::clients::bangumi::{
    Episode, FetchError, Index, IndexBasicInfo, Subject, SubjectLookup,
};
use crate::db::Store;
use crate::domain::{IndexId, SubjectId};

#[derive(Default)]
pub struct FakeState {
    pub subjects: HashMap<i32, Subject>,
    pub redirects: HashMap<i32, i32>,
    pub failing_subjects: HashSet<i32>,
    pub episodes: HashMap<i32, Vec<Episode>>,
    pub failing_episodes: bool,
    pub indices: HashMap<i32, Vec<i32>>,
    pub index_info: HashMap<i32, IndexBasicInfo>,
    pub failing_members: HashSet<i32>,
    pub failing_index_reads: bool,
    pub failing_search: bool,
    /// Subject fetches that never complete.
    pub stalled_subjects: HashSet<i32>,
    pub stalled_updates: bool,
    pub next_index: i32,
    pub calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeCatalog {
    pub state: Mutex<FakeState>,
}

fn exhausted() -> FetchError {
    FetchError::RetriesExhausted {
        attempts: 4,
        source: Box::new(FetchError::Status {
            status: 503,
            message: "unavailable".to_string(),
        }),
    }
}

impl FakeCatalog {
    pub fn with_subjects(ids: &[i32]) -> Self {
        let fake = Self::default();
        for id in ids {
            fake.add_subject(*id, &format!("subject {id}"));
        }
        fake
    }

    pub fn add_subject(&self, id: i32, name: &str) {
        self.lock().subjects.insert(
            id,
            Subject {
                id,
                name: name.to_string(),
                ..Subject::default()
            },
        );
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn subject(&self, id: SubjectId) -> Result<SubjectLookup, FetchError> {
        let stalled = {
            let mut state = self.lock();
            state.calls.push(format!("subject {id}"));
            state.stalled_subjects.contains(&id.value())
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        let state = self.lock();

        let mut current = id.value();
        while let Some(next) = state.redirects.get(&current) {
            current = *next;
        }

        if state.failing_subjects.contains(&current) {
            return Err(exhausted());
        }

        let subject = state.subjects.get(&current).cloned().ok_or(FetchError::Status {
            status: 404,
            message: "not found".to_string(),
        })?;

        Ok(SubjectLookup {
            requested: id,
            subject,
        })
    }

    async fn episodes(&self, subject: SubjectId, _limit: u32) -> Result<Vec<Episode>, FetchError> {
        let mut state = self.lock();
        state.calls.push(format!("episodes {subject}"));
        if state.failing_episodes {
            return Err(exhausted());
        }
        Ok(state.episodes.get(&subject.value()).cloned().unwrap_or_default())
    }

    async fn index_members(
        &self,
        index: IndexId,
        _page_size: u32,
    ) -> Result<Vec<SubjectId>, FetchError> {
        let mut state = self.lock();
        state.calls.push(format!("members {index}"));
        if state.failing_index_reads {
            return Err(exhausted());
        }
        Ok(state
            .indices
            .get(&index.value())
            .map(|m| m.iter().copied().map(SubjectId::new).collect())
            .unwrap_or_default())
    }

    async fn search_anime(&self, keyword: &str) -> Result<Vec<Subject>, FetchError> {
        let mut state = self.lock();
        state.calls.push(format!("search {keyword}"));
        if state.failing_search {
            return Err(exhausted());
        }
        Ok(state
            .subjects
            .values()
            .filter(|s| s.name.contains(keyword) || s.name_cn.contains(keyword))
            .cloned()
            .collect())
    }

    async fn create_index(&self) -> Result<Index, FetchError> {
        let mut state = self.lock();
        state.next_index += 1;
        let id = 1000 + state.next_index;
        state.indices.insert(id, Vec::new());
        state.calls.push(format!("create {id}"));
        Ok(Index {
            id,
            title: String::new(),
            desc: String::new(),
            total: 0,
            nsfw: false,
        })
    }

    async fn update_index(&self, index: IndexId, info: &IndexBasicInfo) -> Result<(), FetchError> {
        let stalled = {
            let mut state = self.lock();
            state.calls.push(format!("update {index}"));
            state.stalled_updates
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        self.lock().index_info.insert(index.value(), info.clone());
        Ok(())
    }

    async fn add_index_member(&self, index: IndexId, subject: SubjectId) -> Result<(), FetchError> {
        let mut state = self.lock();
        state.calls.push(format!("add {index} {subject}"));
        if state.failing_members.contains(&subject.value()) {
            return Err(exhausted());
        }
        state
            .indices
            .entry(index.value())
            .or_default()
            .push(subject.value());
        Ok(())
    }

    async fn remove_index_member(
        &self,
        index: IndexId,
        subject: SubjectId,
    ) -> Result<(), FetchError> {
        let mut state = self.lock();
        state.calls.push(format!("remove {index} {subject}"));
        if state.failing_members.contains(&subject.value()) {
            return Err(exhausted());
        }
        if let Some(members) = state.indices.get_mut(&index.value()) {
            members.retain(|m| *m != subject.value());
        }
        Ok(())
    }
}

pub async fn temp_store() -> Store {
    let path = std::env::temp_dir().join(format!("seasonrank_svc_{}.db", uuid::Uuid::new_v4()));
    Store::new(&format!("sqlite:{}", path.display())).await.unwrap()
}

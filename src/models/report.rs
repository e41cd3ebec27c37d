//! Aggregated outcomes of batch and reconciliation runs.
//!
//! Every input item lands in exactly one of `success` or `failed`.

use serde::Serialize;

use crate::domain::{IndexId, SeasonKey, SubjectId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure<K> {
    pub id: K,
    pub error: String,
}

/// A subject whose ID was superseded upstream during a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Renamed {
    pub from: SubjectId,
    pub to: SubjectId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport<K> {
    pub success: Vec<K>,
    pub failed: Vec<K>,
    pub failures: Vec<ItemFailure<K>>,
    /// Items counted as successful without a remote call because they were fresh.
    pub skipped: usize,
    pub renamed: Vec<Renamed>,
}

impl<K> Default for BatchReport<K> {
    fn default() -> Self {
        Self {
            success: Vec::new(),
            failed: Vec::new(),
            failures: Vec::new(),
            skipped: 0,
            renamed: Vec::new(),
        }
    }
}

impl<K: Clone + PartialEq> BatchReport<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, id: K) {
        self.success.push(id);
    }

    pub fn record_skip(&mut self, id: K) {
        self.skipped += 1;
        self.success.push(id);
    }

    pub fn record_failure(&mut self, id: K, error: impl Into<String>) {
        self.failures.push(ItemFailure {
            id: id.clone(),
            error: error.into(),
        });
        self.failed.push(id);
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.success.len() + self.failed.len()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// True when every input appears in exactly one outcome list.
    #[must_use]
    pub fn accounts_for(&self, inputs: &[K]) -> bool {
        self.total() == inputs.len()
            && inputs.iter().all(|id| {
                let ok = self.success.iter().filter(|s| *s == id).count();
                let bad = self.failed.iter().filter(|f| *f == id).count();
                ok + bad == inputs.iter().filter(|i| *i == id).count() && (ok == 0 || bad == 0)
            })
    }

    pub fn merge(&mut self, other: Self) {
        self.success.extend(other.success);
        self.failed.extend(other.failed);
        self.failures.extend(other.failures);
        self.skipped += other.skipped;
        self.renamed.extend(other.renamed);
    }

    #[must_use]
    pub fn failure_for(&self, id: &K) -> Option<&str> {
        self.failures
            .iter()
            .find(|f| &f.id == id)
            .map(|f| f.error.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub season: SeasonKey,
    pub index_id: IndexId,
    pub action: ReconcileAction,
    pub added: BatchReport<SubjectId>,
    pub removed: BatchReport<SubjectId>,
    pub unchanged: usize,
}

impl ReconcileReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.added.is_clean() && self.removed.is_clean()
    }
}

/// Outcome of updating several seasons: one entry per season plus the merged
/// per-subject report of every season that could be processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeasonBatchReport {
    pub seasons: BatchReport<SeasonKey>,
    pub subjects: BatchReport<SubjectId>,
}

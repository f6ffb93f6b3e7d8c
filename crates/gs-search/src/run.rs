//! Run tracking for a single `fit` call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique search run identifier.
pub type RunId = Uuid;

/// Lifecycle state for a search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Aggregate status of a search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRun {
    pub id: RunId,
    /// "GridSearchCV" or "RandomizedSearchCV".
    pub search: String,
    pub state: RunState,
    pub n_candidates: usize,
    pub n_splits: usize,
    pub fits_completed: usize,
    pub fits_failed: usize,
    pub best_index: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SearchRun {
    pub fn new(search: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            search: search.to_string(),
            state: RunState::Pending,
            n_candidates: 0,
            n_splits: 0,
            fits_completed: 0,
            fits_failed: 0,
            best_index: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self, n_candidates: usize, n_splits: usize) {
        self.state = RunState::Running;
        self.started_at = Some(Utc::now());
        self.n_candidates = n_candidates;
        self.n_splits = n_splits;
    }

    /// Record the per-fold outcome counts once the results are aggregated.
    pub fn record_fits(&mut self, completed: usize, failed: usize) {
        self.fits_completed = completed;
        self.fits_failed = failed;
    }

    pub fn mark_completed(&mut self, best_index: Option<usize>) {
        self.state = RunState::Completed;
        self.finished_at = Some(Utc::now());
        self.best_index = best_index;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = RunState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn total_fits(&self) -> usize {
        self.n_candidates * self.n_splits
    }

    /// Wall-clock duration, once finished.
    pub fn duration_seconds(&self) -> Option<f64> {
        let started = self.started_at?;
        let finished = self.finished_at?;
        Some((finished - started).num_milliseconds() as f64 / 1000.0)
    }
}

//! Execution backends and the wire form of evaluation units.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::evaluator::{EvaluationResult, UnitOutcome};
use crate::tasks::EvaluationUnit;

/// Limits for the workers the evaluation units are spread over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Maximum number of units evaluated concurrently.
    pub max_concurrent_tasks: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
        }
    }
}

/// One evaluation unit as shipped to a worker. The dataset itself is
/// broadcast once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Unique task id.
    pub task_id: Uuid,

    /// Search run this task belongs to.
    pub run_id: Uuid,

    /// Name of the scorer applied to the fitted model.
    pub scoring: String,

    /// Parameters, fold indices and the fold's sliced fit params.
    pub unit: EvaluationUnit,
}

impl TaskDescriptor {
    pub fn new(run_id: Uuid, scoring: &str, unit: EvaluationUnit) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            run_id,
            scoring: scoring.to_string(),
            unit,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Per-run dispatch plan handed to a backend alongside the units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerAllocation {
    pub run_id: Uuid,

    /// Scorer name recorded on shipped tasks.
    pub scoring: String,

    /// Number of workers to use.
    pub num_workers: usize,
}

impl WorkerAllocation {
    /// Size the worker set for `n_units` units, capped by the cluster limit.
    pub fn new(run_id: Uuid, scoring: &str, cluster: &ClusterConfig, n_units: usize) -> Self {
        Self {
            run_id,
            scoring: scoring.to_string(),
            num_workers: cluster.max_concurrent_tasks.min(n_units),
        }
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Work executed for one unit. Implementations must not let a failing unit
/// abort the others; the evaluator already turns errors and panics into
/// failed results.
pub type UnitTask<'a> = dyn Fn(&EvaluationUnit) -> EvaluationResult + Send + Sync + 'a;

/// A blocking "map over units, gather all results" primitive.
///
/// Results may come back in any order, but there must be exactly one per
/// unit, carrying that unit's `(candidate_index, fold_index)`.
pub trait ExecutionBackend: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    fn map_units(
        &self,
        allocation: &WorkerAllocation,
        units: &[EvaluationUnit],
        task: &UnitTask<'_>,
    ) -> Vec<EvaluationResult>;
}

/// Runs every unit in the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialBackend;

impl ExecutionBackend for SequentialBackend {
    fn name(&self) -> &str {
        "sequential"
    }

    fn map_units(
        &self,
        _allocation: &WorkerAllocation,
        units: &[EvaluationUnit],
        task: &UnitTask<'_>,
    ) -> Vec<EvaluationResult> {
        units.iter().map(task).collect()
    }
}

fn worker_pool(num_workers: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers.max(1))
        .thread_name(|i| format!("gridspark-worker-{i}"))
        .build()
        .map_err(|e| warn!(error = %e, "failed to build worker pool, evaluating sequentially"))
        .ok()
}

/// Spreads units over a dedicated rayon pool sized by the allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPoolBackend;

impl ExecutionBackend for ThreadPoolBackend {
    fn name(&self) -> &str {
        "thread-pool"
    }

    fn map_units(
        &self,
        allocation: &WorkerAllocation,
        units: &[EvaluationUnit],
        task: &UnitTask<'_>,
    ) -> Vec<EvaluationResult> {
        match worker_pool(allocation.num_workers) {
            Some(pool) => pool.install(|| units.par_iter().map(task).collect()),
            None => units.iter().map(task).collect(),
        }
    }
}

/// Ships every unit as a JSON [`TaskDescriptor`] and evaluates the decoded
/// copy on a local pool, the way a remote executor receives its work.
///
/// A unit that cannot be encoded or decoded comes back as a failed result
/// under its own key.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackBackend;

impl LoopbackBackend {
    fn ship(allocation: &WorkerAllocation, unit: &EvaluationUnit, task: &UnitTask<'_>) -> EvaluationResult {
        let descriptor = TaskDescriptor::new(allocation.run_id, &allocation.scoring, unit.clone());
        match descriptor.to_json().and_then(|wire| TaskDescriptor::from_json(&wire)) {
            Ok(received) => task(&received.unit),
            Err(e) => EvaluationResult {
                candidate_index: unit.candidate_index,
                fold_index: unit.fold_index,
                outcome: UnitOutcome::Failed {
                    error: format!("task {} could not be shipped: {e}", descriptor.task_id),
                    fit_time: 0.0,
                },
            },
        }
    }
}

impl ExecutionBackend for LoopbackBackend {
    fn name(&self) -> &str {
        "loopback"
    }

    fn map_units(
        &self,
        allocation: &WorkerAllocation,
        units: &[EvaluationUnit],
        task: &UnitTask<'_>,
    ) -> Vec<EvaluationResult> {
        let ship = |unit: &EvaluationUnit| Self::ship(allocation, unit, task);
        match worker_pool(allocation.num_workers) {
            Some(pool) => pool.install(|| units.par_iter().map(ship).collect()),
            None => units.iter().map(ship).collect(),
        }
    }
}

/// Backend selection in serialized configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Sequential,
    #[default]
    ThreadPool,
    Loopback,
}

impl BackendKind {
    pub fn build(self) -> Arc<dyn ExecutionBackend> {
        match self {
            Self::Sequential => Arc::new(SequentialBackend),
            Self::ThreadPool => Arc::new(ThreadPoolBackend),
            Self::Loopback => Arc::new(LoopbackBackend),
        }
    }
}

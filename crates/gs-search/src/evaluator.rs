//! Dispatch of evaluation units to an execution backend.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::debug;

use gs_types::{Dataset, Estimator, EstimatorError};

use crate::cluster::{ExecutionBackend, WorkerAllocation};
use crate::scoring::Scorer;
use crate::tasks::EvaluationUnit;

/// What happened to one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnitOutcome {
    Scored {
        test_score: f64,
        train_score: Option<f64>,
        /// Seconds spent in `fit`.
        fit_time: f64,
        /// Seconds spent scoring the test split.
        score_time: f64,
    },
    Failed {
        error: String,
        fit_time: f64,
    },
}

/// The result of one unit, keyed by `(candidate_index, fold_index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub candidate_index: usize,
    pub fold_index: usize,
    pub outcome: UnitOutcome,
}

impl EvaluationResult {
    pub fn key(&self) -> (usize, usize) {
        (self.candidate_index, self.fold_index)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Failed { .. })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Fits and scores units through an [`ExecutionBackend`].
pub struct DistributedEvaluator<'a, E: Estimator> {
    estimator: &'a E,
    data: &'a Dataset,
    scorer: &'a Scorer,
    return_train_score: bool,
}

impl<'a, E: Estimator> DistributedEvaluator<'a, E> {
    pub fn new(estimator: &'a E, data: &'a Dataset, scorer: &'a Scorer, return_train_score: bool) -> Self {
        Self {
            estimator,
            data,
            scorer,
            return_train_score,
        }
    }

    /// Evaluate every unit. Blocks until the backend has a result for each.
    pub fn evaluate(
        &self,
        backend: &dyn ExecutionBackend,
        allocation: &WorkerAllocation,
        units: &[EvaluationUnit],
    ) -> Vec<EvaluationResult> {
        debug!(
            backend = backend.name(),
            units = units.len(),
            workers = allocation.num_workers,
            "dispatching evaluation units"
        );
        let task = |unit: &EvaluationUnit| self.run_unit(unit);
        backend.map_units(allocation, units, &task)
    }

    /// Run one unit in the current thread. Estimator errors and panics become
    /// a failed outcome for this unit only.
    pub fn run_unit(&self, unit: &EvaluationUnit) -> EvaluationResult {
        let started = Instant::now();
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.fit_and_score(unit))) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => UnitOutcome::Failed {
                error: e.to_string(),
                fit_time: started.elapsed().as_secs_f64(),
            },
            Err(payload) => UnitOutcome::Failed {
                error: EstimatorError::Panicked {
                    message: panic_message(payload),
                }
                .to_string(),
                fit_time: started.elapsed().as_secs_f64(),
            },
        };
        EvaluationResult {
            candidate_index: unit.candidate_index,
            fold_index: unit.fold_index,
            outcome,
        }
    }

    fn fit_and_score(&self, unit: &EvaluationUnit) -> Result<UnitOutcome, EstimatorError> {
        let train = self.data.take(&unit.train_indices);
        let test = self.data.take(&unit.test_indices);

        let fit_start = Instant::now();
        let model = self.estimator.fit(&unit.parameters, &train, &unit.fit_params)?;
        let fit_time = fit_start.elapsed().as_secs_f64();

        let score_start = Instant::now();
        let test_score = self.scorer.score(&model, &test)?;
        let score_time = score_start.elapsed().as_secs_f64();

        let train_score = if self.return_train_score {
            Some(self.scorer.score(&model, &train)?)
        } else {
            None
        };

        Ok(UnitOutcome::Scored {
            test_score,
            train_score,
            fit_time,
            score_time,
        })
    }
}

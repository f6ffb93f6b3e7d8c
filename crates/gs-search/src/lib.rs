//! # gs-search
//!
//! Cross-validated hyperparameter search with the `GridSearchCV` /
//! `RandomizedSearchCV` contract, spread over an execution backend.
//!
//! A search expands its parameter space into candidates, crosses them with
//! the CV folds into independent evaluation units, runs the units on a
//! backend, aggregates the per-fold scores into the results table, picks the
//! best row and refits it on the full dataset.

mod cluster;
mod config;
mod cv;
mod distribution;
mod evaluator;
mod refit;
mod results;
mod run;
mod scoring;
mod search_cv;
mod selection;
mod space;
mod tasks;

pub use cluster::{
    BackendKind, ClusterConfig, ExecutionBackend, LoopbackBackend, SequentialBackend,
    TaskDescriptor, ThreadPoolBackend, UnitTask, WorkerAllocation,
};
pub use config::{SearchConfig, CONFIG_ENV_VAR};
pub use cv::{Cv, CvSplitter, KFold, Split};
pub use distribution::{BuiltinDistribution, BuiltinSampler, ParamDistribution};
pub use evaluator::{DistributedEvaluator, EvaluationResult, UnitOutcome};
pub use refit::{RefitCoordinator, RefitOutcome};
pub use results::{CandidateResult, CvColumn, CvResults, ErrorScore, ResultsAggregator, ResultsTable};
pub use run::{RunId, RunState, SearchRun};
pub use scoring::{Metric, ScoreFn, Scorer, Scoring};
pub use search_cv::SearchCv;
pub use selection::{BestIndexResolver, BestSelection, Refit, SelectFn};
pub use space::{ParamSource, ParamSpec, ParameterGrid, ParameterSampler};
pub use tasks::{EvaluationUnit, FoldTaskBuilder};

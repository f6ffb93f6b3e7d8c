//! The `GridSearchCV` / `RandomizedSearchCV` front object.

use std::sync::Arc;
use tracing::{info, warn};

use gs_types::{
    Dataset, Estimator, FitParams, FittedModel, GsResult, ParamCombination, ParamError, SearchError,
};

use crate::cluster::{BackendKind, ClusterConfig, ExecutionBackend, WorkerAllocation};
use crate::config::SearchConfig;
use crate::cv::Cv;
use crate::evaluator::DistributedEvaluator;
use crate::refit::RefitCoordinator;
use crate::results::{ErrorScore, ResultsAggregator, ResultsTable};
use crate::run::SearchRun;
use crate::scoring::Scoring;
use crate::selection::{BestIndexResolver, BestSelection, Refit};
use crate::space::{ParamSpec, ParameterGrid, ParameterSampler};
use crate::tasks::FoldTaskBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchMode {
    Grid,
    Randomized { n_iter: usize },
}

/// State produced by the last `fit`.
struct Fitted<M> {
    results: ResultsTable,
    n_splits: usize,
    best: Option<BestSelection>,
    model: Option<M>,
    refit_time: Option<f64>,
}

/// Cross-validated search over an estimator's parameters.
///
/// ```ignore
/// let mut search = SearchCv::grid(MyEstimator, json!({"C": [0.1, 1.0]}).into())
///     .with_cv(Cv::Folds(5));
/// search.fit(&data, &FitParams::new())?;
/// println!("{:?}", search.best_params());
/// ```
pub struct SearchCv<E: Estimator> {
    estimator: E,
    param_spec: ParamSpec,
    mode: SearchMode,
    scoring: Scoring,
    cv: Cv,
    refit: Refit,
    error_score: ErrorScore,
    return_train_score: bool,
    random_state: Option<u64>,
    iid: Option<bool>,
    backend: Arc<dyn ExecutionBackend>,
    cluster: ClusterConfig,
    fitted: Option<Fitted<E::Model>>,
    last_run: Option<SearchRun>,
}

impl<E: Estimator> SearchCv<E> {
    fn new(estimator: E, param_spec: ParamSpec, mode: SearchMode) -> Self {
        Self {
            estimator,
            param_spec,
            mode,
            scoring: Scoring::Default,
            cv: Cv::default(),
            refit: Refit::default(),
            error_score: ErrorScore::default(),
            return_train_score: false,
            random_state: None,
            iid: None,
            backend: BackendKind::default().build(),
            cluster: ClusterConfig::default(),
            fitted: None,
            last_run: None,
        }
    }

    /// Exhaustive search over `param_grid`. The spec is validated by `fit`.
    pub fn grid(estimator: E, param_grid: ParamSpec) -> Self {
        Self::new(estimator, param_grid, SearchMode::Grid)
    }

    /// Search over `n_iter` combinations drawn from `param_distributions`.
    pub fn randomized(estimator: E, param_distributions: ParamSpec, n_iter: usize) -> Self {
        Self::new(estimator, param_distributions, SearchMode::Randomized { n_iter })
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_cv(mut self, cv: Cv) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_refit(mut self, refit: impl Into<Refit>) -> Self {
        self.refit = refit.into();
        self
    }

    pub fn with_error_score(mut self, error_score: ErrorScore) -> Self {
        self.error_score = error_score;
        self
    }

    pub fn with_return_train_score(mut self, enabled: bool) -> Self {
        self.return_train_score = enabled;
        self
    }

    /// Seed for randomized search. Ignored by grid search.
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Deprecated; accepted for compatibility and otherwise ignored.
    pub fn with_iid(mut self, iid: bool) -> Self {
        self.iid = Some(iid);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn ExecutionBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_cluster(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = cluster;
        self
    }

    /// Apply every serializable option from `config`.
    pub fn with_config(mut self, config: &SearchConfig) -> Self {
        self.cv = Cv::Folds(config.cv_folds);
        if let SearchMode::Randomized { n_iter } = &mut self.mode {
            *n_iter = config.n_iter;
        }
        self.random_state = config.random_state;
        self.error_score = config.error_score;
        self.return_train_score = config.return_train_score;
        self.scoring = config.scoring.as_deref().map_or(Scoring::Default, Scoring::metric);
        self.refit = Refit::from(config.refit);
        self.iid = config.iid;
        self.backend = config.backend.build();
        self.cluster = config.cluster.clone();
        self
    }

    /// "GridSearchCV" or "RandomizedSearchCV", as used in error messages.
    pub fn name(&self) -> &'static str {
        match self.mode {
            SearchMode::Grid => "GridSearchCV",
            SearchMode::Randomized { .. } => "RandomizedSearchCV",
        }
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// Run the search. Blocks until every (candidate, fold) unit finished.
    ///
    /// Any previous fit is discarded first. If the results table was built
    /// before a later step failed (selection or refit), it stays available
    /// through [`cv_results`](Self::cv_results).
    pub fn fit(&mut self, data: &Dataset, fit_params: &FitParams) -> GsResult<()> {
        self.fitted = None;
        let mut run = SearchRun::new(self.name());

        let outcome = self.run_search(data, fit_params, &mut run);
        match &outcome {
            Ok(best_index) => {
                run.mark_completed(*best_index);
                info!(
                    run_id = %run.id,
                    search = self.name(),
                    best_index = ?best_index,
                    duration = ?run.duration_seconds(),
                    "search complete"
                );
            }
            Err(e) => {
                run.mark_failed(e.to_string());
                warn!(run_id = %run.id, search = self.name(), error = %e, "search failed");
            }
        }
        self.last_run = Some(run);
        outcome.map(|_| ())
    }

    fn candidates(&self) -> Result<Vec<ParamCombination>, ParamError> {
        match self.mode {
            SearchMode::Grid => Ok(ParameterGrid::new(&self.param_spec)?.combinations()),
            SearchMode::Randomized { n_iter } => {
                Ok(ParameterSampler::new(&self.param_spec, n_iter, self.random_state)?.samples())
            }
        }
    }

    fn run_search(
        &mut self,
        data: &Dataset,
        fit_params: &FitParams,
        run: &mut SearchRun,
    ) -> GsResult<Option<usize>> {
        if let Some(iid) = self.iid {
            warn!(
                iid,
                "The parameter 'iid' is deprecated and has no effect; it will be removed in a future release"
            );
        }

        // Everything that can be rejected up front is, before any dispatch.
        let candidates = self.candidates()?;
        let scorer = self.scoring.resolve()?;
        let splits = self.cv.splits(data)?;
        let n_candidates = candidates.len();
        let n_splits = splits.len();
        if n_candidates == 0 || n_splits == 0 {
            return Err(SearchError::NoFits.into());
        }

        run.mark_running(n_candidates, n_splits);
        info!(
            run_id = %run.id,
            search = self.name(),
            backend = self.backend.name(),
            "Fitting {n_splits} folds for each of {n_candidates} candidates, totalling {} fits",
            run.total_fits()
        );

        let units = FoldTaskBuilder::new(data.n_samples()).build(&candidates, &splits, fit_params);
        let allocation = WorkerAllocation::new(run.id, scorer.name(), &self.cluster, units.len());

        let evaluator = DistributedEvaluator::new(&self.estimator, data, &scorer, self.return_train_score);
        let results = evaluator.evaluate(self.backend.as_ref(), &allocation, &units);

        let table = ResultsAggregator::new(n_splits, self.error_score, self.return_train_score)
            .aggregate(&candidates, results)?;
        let failed = table.n_failed_fits();
        run.record_fits(run.total_fits() - failed, failed);

        let fitted = self.fitted.insert(Fitted {
            results: table,
            n_splits,
            best: None,
            model: None,
            refit_time: None,
        });

        let best = BestIndexResolver::resolve(&self.refit, &fitted.results)?;
        fitted.best = best.clone();

        if let (Some(best), true) = (&best, self.refit.is_enabled()) {
            let outcome = RefitCoordinator::new(&self.estimator).refit(&best.params, data, fit_params)?;
            fitted.model = Some(outcome.model);
            fitted.refit_time = Some(outcome.refit_time);
        }

        Ok(best.map(|b| b.index))
    }

    fn not_fitted(&self) -> SearchError {
        SearchError::NotFitted {
            search: self.name().to_string(),
        }
    }

    /// The `cv_results_` table of the last fit.
    pub fn cv_results(&self) -> Result<&ResultsTable, SearchError> {
        self.fitted
            .as_ref()
            .map(|f| &f.results)
            .ok_or_else(|| self.not_fitted())
    }

    pub fn best_index(&self) -> Option<usize> {
        self.best().map(|b| b.index)
    }

    pub fn best_params(&self) -> Option<&ParamCombination> {
        self.best().map(|b| &b.params)
    }

    /// Mean test score of the best row. Unset when a selector chose the row.
    pub fn best_score(&self) -> Option<f64> {
        self.best().and_then(|b| b.score)
    }

    fn best(&self) -> Option<&BestSelection> {
        self.fitted.as_ref().and_then(|f| f.best.as_ref())
    }

    pub fn n_splits(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.n_splits)
    }

    /// Seconds spent refitting the best candidate.
    pub fn refit_time(&self) -> Option<f64> {
        self.fitted.as_ref().and_then(|f| f.refit_time)
    }

    /// Status record of the last `fit`, successful or not.
    pub fn last_run(&self) -> Option<&SearchRun> {
        self.last_run.as_ref()
    }

    fn refitted(&self, method: &str) -> Result<&E::Model, SearchError> {
        if !self.refit.is_enabled() {
            return Err(SearchError::NoRefit {
                search: self.name().to_string(),
                method: method.to_string(),
            });
        }
        self.fitted
            .as_ref()
            .and_then(|f| f.model.as_ref())
            .ok_or_else(|| self.not_fitted())
    }

    /// The best candidate refitted on the whole dataset.
    pub fn best_estimator(&self) -> Result<&E::Model, SearchError> {
        self.refitted("best_estimator_")
    }

    pub fn predict(&self, features: &[Vec<f64>]) -> GsResult<Vec<f64>> {
        Ok(self.refitted("predict")?.predict(features)?)
    }

    /// Score `data` with the configured scorer and the refitted model.
    pub fn score(&self, data: &Dataset) -> GsResult<f64> {
        let model = self.refitted("score")?;
        let scorer = self.scoring.resolve()?;
        Ok(scorer.score(model as &dyn FittedModel, data)?)
    }
}

impl<E: Estimator> std::fmt::Debug for SearchCv<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(self.name())
            .field("estimator", &self.estimator.name())
            .field("scoring", &self.scoring)
            .field("cv", &self.cv)
            .field("refit", &self.refit)
            .field("error_score", &self.error_score)
            .field("backend", &self.backend.name())
            .field("fitted", &self.fitted.is_some())
            .finish()
    }
}

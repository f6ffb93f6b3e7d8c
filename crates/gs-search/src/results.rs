//! Reduction of per-unit results into the `cv_results_` table.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use gs_types::{ParamCombination, ParamValue, SearchError};

use crate::evaluator::{EvaluationResult, UnitOutcome};

/// What to do when fitting or scoring a unit fails.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ErrorScoreRepr", into = "ErrorScoreRepr")]
pub enum ErrorScore {
    /// Abort the search with the first failure.
    Raise,
    /// Record this score for the failed unit (NaN by default).
    Value(f64),
}

impl Default for ErrorScore {
    fn default() -> Self {
        Self::Value(f64::NAN)
    }
}

impl ErrorScore {
    fn sentinel(&self) -> f64 {
        match self {
            Self::Value(v) => *v,
            Self::Raise => f64::NAN,
        }
    }
}

impl std::fmt::Display for ErrorScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raise => write!(f, "raise"),
            Self::Value(v) => write!(f, "{}", ParamValue::Float(*v)),
        }
    }
}

/// JSON form: `"raise"`, `"nan"` or a number.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ErrorScoreRepr {
    Number(f64),
    Keyword(String),
}

impl TryFrom<ErrorScoreRepr> for ErrorScore {
    type Error = String;

    fn try_from(repr: ErrorScoreRepr) -> Result<Self, Self::Error> {
        match repr {
            ErrorScoreRepr::Number(v) => Ok(Self::Value(v)),
            ErrorScoreRepr::Keyword(s) if s == "raise" => Ok(Self::Raise),
            ErrorScoreRepr::Keyword(s) if s.eq_ignore_ascii_case("nan") => Ok(Self::Value(f64::NAN)),
            ErrorScoreRepr::Keyword(s) => Err(format!(
                "error_score must be the string 'raise' or a numeric value, got '{s}'"
            )),
        }
    }
}

impl From<ErrorScore> for ErrorScoreRepr {
    fn from(score: ErrorScore) -> Self {
        match score {
            ErrorScore::Raise => Self::Keyword("raise".to_string()),
            ErrorScore::Value(v) if v.is_nan() => Self::Keyword("nan".to_string()),
            ErrorScore::Value(v) => Self::Number(v),
        }
    }
}

/// One row of the results table: a candidate and its per-fold outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate_index: usize,
    pub params: ParamCombination,
    /// Test score per fold, ordered by fold index.
    pub test_scores: Vec<f64>,
    pub train_scores: Option<Vec<f64>>,
    pub fit_times: Vec<f64>,
    pub score_times: Vec<f64>,
    /// Failure description per fold, `None` where the fold succeeded.
    pub errors: Vec<Option<String>>,
    pub mean_test_score: f64,
    pub std_test_score: f64,
    pub mean_train_score: Option<f64>,
    pub std_train_score: Option<f64>,
    pub mean_fit_time: f64,
    pub std_fit_time: f64,
    pub mean_score_time: f64,
    pub std_score_time: f64,
    /// 1 = best.
    pub rank_test_score: usize,
}

impl CandidateResult {
    pub fn n_failed(&self) -> usize {
        self.errors.iter().filter(|e| e.is_some()).count()
    }
}

/// Mean and population standard deviation over the non-NaN entries.
fn mean_std(values: &[f64]) -> (f64, f64) {
    let defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if defined.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = defined.len() as f64;
    let mean = defined.iter().sum::<f64>() / n;
    let var = defined.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// The per-candidate results of a search (`cv_results_`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    rows: Vec<CandidateResult>,
    n_splits: usize,
}

impl ResultsTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn rows(&self) -> &[CandidateResult] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&CandidateResult> {
        self.rows.get(index)
    }

    pub fn params(&self, index: usize) -> Option<&ParamCombination> {
        self.rows.get(index).map(|r| &r.params)
    }

    pub fn mean_test_scores(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.mean_test_score).collect()
    }

    pub fn rank_test_scores(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.rank_test_score).collect()
    }

    pub fn n_failed_fits(&self) -> usize {
        self.rows.iter().map(CandidateResult::n_failed).sum()
    }

    /// Index of the rank-1 row, unless no row has a defined mean score.
    pub fn best_by_rank(&self) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.rank_test_score == 1)
            .filter(|&i| !self.rows[i].mean_test_score.is_nan())
    }

    /// All parameter names appearing in any candidate, sorted.
    pub fn param_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.rows.iter().flat_map(|r| r.params.keys()).collect();
        names.into_iter().cloned().collect()
    }

    fn floats(&self, f: impl Fn(&CandidateResult) -> f64) -> CvColumn {
        CvColumn::Floats(self.rows.iter().map(f).collect())
    }

    /// Externalize as the reference library's parallel columns.
    pub fn to_columns(&self) -> CvResults {
        let mut columns = BTreeMap::new();

        columns.insert("mean_fit_time".to_string(), self.floats(|r| r.mean_fit_time));
        columns.insert("std_fit_time".to_string(), self.floats(|r| r.std_fit_time));
        columns.insert("mean_score_time".to_string(), self.floats(|r| r.mean_score_time));
        columns.insert("std_score_time".to_string(), self.floats(|r| r.std_score_time));

        for name in self.param_names() {
            let values = self.rows.iter().map(|r| r.params.get(&name).cloned()).collect();
            columns.insert(format!("param_{name}"), CvColumn::Param(values));
        }
        columns.insert(
            "params".to_string(),
            CvColumn::Params(self.rows.iter().map(|r| r.params.clone()).collect()),
        );

        for fold in 0..self.n_splits {
            columns.insert(
                format!("split{fold}_test_score"),
                self.floats(|r| r.test_scores[fold]),
            );
        }
        columns.insert("mean_test_score".to_string(), self.floats(|r| r.mean_test_score));
        columns.insert("std_test_score".to_string(), self.floats(|r| r.std_test_score));
        columns.insert(
            "rank_test_score".to_string(),
            CvColumn::Ranks(self.rank_test_scores()),
        );

        if self.rows.iter().all(|r| r.train_scores.is_some()) && !self.rows.is_empty() {
            for fold in 0..self.n_splits {
                columns.insert(
                    format!("split{fold}_train_score"),
                    self.floats(|r| r.train_scores.as_ref().map_or(f64::NAN, |s| s[fold])),
                );
            }
            columns.insert(
                "mean_train_score".to_string(),
                self.floats(|r| r.mean_train_score.unwrap_or(f64::NAN)),
            );
            columns.insert(
                "std_train_score".to_string(),
                self.floats(|r| r.std_train_score.unwrap_or(f64::NAN)),
            );
        }

        CvResults { columns }
    }
}

/// One column of [`CvResults`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CvColumn {
    Floats(Vec<f64>),
    Ranks(Vec<usize>),
    /// A single parameter; `None` where the candidate does not set it.
    Param(Vec<Option<ParamValue>>),
    Params(Vec<ParamCombination>),
}

impl CvColumn {
    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Self::Floats(v) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Floats(v) => v.len(),
            Self::Ranks(v) => v.len(),
            Self::Param(v) => v.len(),
            Self::Params(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Column-oriented view of a [`ResultsTable`], keyed like `cv_results_`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvResults {
    pub columns: BTreeMap<String, CvColumn>,
}

impl CvResults {
    pub fn get(&self, name: &str) -> Option<&CvColumn> {
        self.columns.get(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Builds a [`ResultsTable`] from unordered unit results.
#[derive(Debug, Clone, Copy)]
pub struct ResultsAggregator {
    n_splits: usize,
    error_score: ErrorScore,
    return_train_score: bool,
}

impl ResultsAggregator {
    pub fn new(n_splits: usize, error_score: ErrorScore, return_train_score: bool) -> Self {
        Self {
            n_splits,
            error_score,
            return_train_score,
        }
    }

    pub fn aggregate(
        &self,
        candidates: &[ParamCombination],
        results: Vec<EvaluationResult>,
    ) -> Result<ResultsTable, SearchError> {
        let n_candidates = candidates.len();
        let n_splits = self.n_splits;
        let total = n_candidates * n_splits;

        // Re-key by (candidate, fold).
        let mut slots: Vec<Option<UnitOutcome>> = vec![None; total];
        for result in results {
            let (candidate, fold) = result.key();
            if candidate >= n_candidates || fold >= n_splits {
                return Err(SearchError::Internal {
                    message: format!("result for unknown unit (candidate {candidate}, split {fold})"),
                });
            }
            let slot = &mut slots[candidate * n_splits + fold];
            if slot.is_some() {
                return Err(SearchError::Internal {
                    message: format!("duplicate result for candidate {candidate}, split {fold}"),
                });
            }
            *slot = Some(result.outcome);
        }

        let mut n_failed = 0;
        for (i, slot) in slots.iter().enumerate() {
            let (candidate, fold) = (i / n_splits, i % n_splits);
            match slot {
                None => {
                    return Err(SearchError::Internal {
                        message: format!("missing result for candidate {candidate}, split {fold}"),
                    })
                }
                Some(UnitOutcome::Failed { error, .. }) => {
                    if self.error_score == ErrorScore::Raise {
                        return Err(SearchError::FitFailed {
                            candidate,
                            fold,
                            message: error.clone(),
                        });
                    }
                    n_failed += 1;
                }
                Some(UnitOutcome::Scored { .. }) => {}
            }
        }
        if n_failed > 0 {
            warn!(
                failed = n_failed,
                total,
                "{n_failed} fits failed out of a total of {total}. The score on these train-test \
                 partitions for these parameters will be set to {}.",
                self.error_score
            );
        }

        let sentinel = self.error_score.sentinel();
        let mut rows: Vec<CandidateResult> = candidates
            .iter()
            .enumerate()
            .map(|(candidate_index, params)| {
                let outcomes = slots[candidate_index * n_splits..(candidate_index + 1) * n_splits]
                    .iter()
                    .flatten();
                let mut test_scores = Vec::with_capacity(n_splits);
                let mut train_scores = Vec::with_capacity(n_splits);
                let mut fit_times = Vec::with_capacity(n_splits);
                let mut score_times = Vec::with_capacity(n_splits);
                let mut errors = Vec::with_capacity(n_splits);
                for outcome in outcomes {
                    match outcome {
                        UnitOutcome::Scored {
                            test_score,
                            train_score,
                            fit_time,
                            score_time,
                        } => {
                            test_scores.push(*test_score);
                            train_scores.push(train_score.unwrap_or(f64::NAN));
                            fit_times.push(*fit_time);
                            score_times.push(*score_time);
                            errors.push(None);
                        }
                        UnitOutcome::Failed { error, fit_time } => {
                            test_scores.push(sentinel);
                            train_scores.push(sentinel);
                            fit_times.push(*fit_time);
                            score_times.push(0.0);
                            errors.push(Some(error.clone()));
                        }
                    }
                }

                let (mean_test_score, std_test_score) = mean_std(&test_scores);
                let (mean_fit_time, std_fit_time) = mean_std(&fit_times);
                let (mean_score_time, std_score_time) = mean_std(&score_times);
                let (train_scores, mean_train_score, std_train_score) = if self.return_train_score {
                    let (mean, std) = mean_std(&train_scores);
                    (Some(train_scores), Some(mean), Some(std))
                } else {
                    (None, None, None)
                };

                CandidateResult {
                    candidate_index,
                    params: params.clone(),
                    test_scores,
                    train_scores,
                    fit_times,
                    score_times,
                    errors,
                    mean_test_score,
                    std_test_score,
                    mean_train_score,
                    std_train_score,
                    mean_fit_time,
                    std_fit_time,
                    mean_score_time,
                    std_score_time,
                    rank_test_score: 0,
                }
            })
            .collect();

        // Rank: defined means first, best first, then candidate order.
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by(|&a, &b| {
            let (ma, mb) = (rows[a].mean_test_score, rows[b].mean_test_score);
            ma.is_nan()
                .cmp(&mb.is_nan())
                .then_with(|| mb.partial_cmp(&ma).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.cmp(&b))
        });
        for (position, &row) in order.iter().enumerate() {
            rows[row].rank_test_score = position + 1;
        }

        if rows.iter().any(|r| !r.mean_test_score.is_finite()) {
            let scores: Vec<f64> = rows.iter().map(|r| r.mean_test_score).collect();
            warn!(?scores, "One or more of the test scores are non-finite");
        }

        Ok(ResultsTable { rows, n_splits })
    }
}

//! Choice of the winning candidate.

use std::sync::Arc;

use gs_types::{ParamCombination, SearchError};

use crate::results::ResultsTable;

/// A caller-supplied selector. Must return an index in `[0, table.len())`.
pub type SelectFn = Arc<dyn Fn(&ResultsTable) -> i64 + Send + Sync>;

/// The `refit` option.
#[derive(Clone, Default)]
pub enum Refit {
    /// Score only; no best attributes unless a row has a defined score.
    Disabled,
    /// Pick the best mean test score and refit on it.
    #[default]
    BestScore,
    /// Let a selector pick the row, then refit on it.
    Select(SelectFn),
}

impl Refit {
    pub fn select<F>(f: F) -> Self
    where
        F: Fn(&ResultsTable) -> i64 + Send + Sync + 'static,
    {
        Self::Select(Arc::new(f))
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

impl From<bool> for Refit {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::BestScore
        } else {
            Self::Disabled
        }
    }
}

impl std::fmt::Debug for Refit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "Disabled"),
            Self::BestScore => write!(f, "BestScore"),
            Self::Select(_) => write!(f, "Select(..)"),
        }
    }
}

/// The resolved winner.
#[derive(Debug, Clone, PartialEq)]
pub struct BestSelection {
    pub index: usize,
    pub params: ParamCombination,
    /// Only set for [`Refit::BestScore`] and [`Refit::Disabled`].
    pub score: Option<f64>,
}

pub struct BestIndexResolver;

impl BestIndexResolver {
    /// `Ok(None)` only when refit is disabled and no row has a defined score.
    pub fn resolve(refit: &Refit, table: &ResultsTable) -> Result<Option<BestSelection>, SearchError> {
        let n_candidates = table.len();
        let (index, score_known) = match refit {
            Refit::Select(select) => {
                let raw = select(table);
                let index = usize::try_from(raw)
                    .ok()
                    .filter(|&i| i < n_candidates)
                    .ok_or(SearchError::BestIndexOutOfRange {
                        index: raw,
                        n_candidates,
                    })?;
                (index, false)
            }
            Refit::BestScore | Refit::Disabled => match table.best_by_rank() {
                Some(index) => (index, true),
                None if refit.is_enabled() => {
                    return Err(SearchError::NoValidCandidate { n_candidates })
                }
                None => return Ok(None),
            },
        };

        let row = table.row(index).ok_or_else(|| SearchError::Internal {
            message: format!("row {index} missing from a table of {n_candidates}"),
        })?;
        Ok(Some(BestSelection {
            index,
            params: row.params.clone(),
            score: score_known.then_some(row.mean_test_score),
        }))
    }
}

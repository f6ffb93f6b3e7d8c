//! Expansion of (candidate × fold) into independent evaluation units.

use serde::{Deserialize, Serialize};

use gs_types::{FitParams, ParamCombination};

use crate::cv::Split;

/// Everything a worker needs to fit and score one candidate on one fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationUnit {
    pub candidate_index: usize,
    pub fold_index: usize,
    pub parameters: ParamCombination,
    /// Fit params already restricted to `train_indices`.
    pub fit_params: FitParams,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

impl EvaluationUnit {
    /// `(candidate_index, fold_index)`, the key results are re-attached by.
    pub fn key(&self) -> (usize, usize) {
        (self.candidate_index, self.fold_index)
    }
}

/// Builds the full candidate × fold cross product.
#[derive(Debug, Clone, Copy)]
pub struct FoldTaskBuilder {
    n_samples: usize,
}

impl FoldTaskBuilder {
    pub fn new(n_samples: usize) -> Self {
        Self { n_samples }
    }

    /// One unit per (candidate, split), candidate-major so that the folds of
    /// a candidate are contiguous. Identical candidates are kept apart.
    pub fn build(
        &self,
        candidates: &[ParamCombination],
        splits: &[Split],
        fit_params: &FitParams,
    ) -> Vec<EvaluationUnit> {
        let fold_params: Vec<FitParams> = splits
            .iter()
            .map(|split| fit_params.slice_for(&split.train, self.n_samples))
            .collect();

        let mut units = Vec::with_capacity(candidates.len() * splits.len());
        for (candidate_index, parameters) in candidates.iter().enumerate() {
            for (fold_index, split) in splits.iter().enumerate() {
                units.push(EvaluationUnit {
                    candidate_index,
                    fold_index,
                    parameters: parameters.clone(),
                    fit_params: fold_params[fold_index].clone(),
                    train_indices: split.train.clone(),
                    test_indices: split.test.clone(),
                });
            }
        }
        units
    }
}

//! Estimator collaborator traits.
//!
//! The search core never trains models itself. It hands parameter
//! combinations and data slices to an [`Estimator`] and scores the
//! resulting [`FittedModel`]s.

use crate::dataset::{Dataset, FitParams};
use crate::errors::EstimatorError;
use crate::params::ParamCombination;

/// A trained model produced by [`Estimator::fit`].
pub trait FittedModel: Send + Sync {
    /// Predict one target per feature row.
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError>;

    /// The estimator's own goodness-of-fit score (higher is better).
    ///
    /// Used when the search has no explicit scoring configured.
    fn score(&self, data: &Dataset) -> Result<f64, EstimatorError> {
        let _ = data;
        Err(EstimatorError::ScoreFailed {
            message: "model does not implement a default score; configure an explicit scoring"
                .to_string(),
        })
    }
}

/// An unfitted estimator that can be trained with a parameter combination.
///
/// Implementations must be shareable across worker threads: the same
/// estimator value is used concurrently for every fold.
pub trait Estimator: Send + Sync {
    type Model: FittedModel + 'static;

    /// Human-readable estimator name used in logs.
    fn name(&self) -> &str {
        "estimator"
    }

    /// Fit a fresh model on `train` using `params`.
    fn fit(
        &self,
        params: &ParamCombination,
        train: &Dataset,
        fit_params: &FitParams,
    ) -> Result<Self::Model, EstimatorError>;
}

//! Final fit of the winning candidate on the full dataset.

use std::time::Instant;
use tracing::info;

use gs_types::{Dataset, Estimator, EstimatorError, FitParams, ParamCombination};

/// A model fitted on all the data, and how long that took.
#[derive(Debug)]
pub struct RefitOutcome<M> {
    pub model: M,
    /// Seconds.
    pub refit_time: f64,
}

pub struct RefitCoordinator<'a, E: Estimator> {
    estimator: &'a E,
}

impl<'a, E: Estimator> RefitCoordinator<'a, E> {
    pub fn new(estimator: &'a E) -> Self {
        Self { estimator }
    }

    /// Failures propagate; the error-score policy does not apply here.
    pub fn refit(
        &self,
        params: &ParamCombination,
        data: &Dataset,
        fit_params: &FitParams,
    ) -> Result<RefitOutcome<E::Model>, EstimatorError> {
        info!(
            estimator = self.estimator.name(),
            n_samples = data.n_samples(),
            "refitting best candidate on the full dataset"
        );
        let started = Instant::now();
        let model = self.estimator.fit(params, data, fit_params)?;
        let refit_time = started.elapsed().as_secs_f64();
        info!(refit_time, "refit complete");
        Ok(RefitOutcome { model, refit_time })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_types::{FitParam, FittedModel, ParamValue};

    struct Mean;

    #[derive(Debug)]
    struct MeanModel(f64);

    impl FittedModel for MeanModel {
        fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError> {
            Ok(vec![self.0; features.len()])
        }
    }

    impl Estimator for Mean {
        type Model = MeanModel;

        fn fit(
            &self,
            params: &ParamCombination,
            train: &Dataset,
            fit_params: &FitParams,
        ) -> Result<MeanModel, EstimatorError> {
            if params.get("fail").and_then(ParamValue::as_bool) == Some(true) {
                return Err(EstimatorError::FitFailed {
                    message: "refit blew up".into(),
                });
            }
            let weights = fit_params
                .per_sample("sample_weight")
                .map(<[f64]>::to_vec)
                .unwrap_or_else(|| vec![1.0; train.n_samples()]);
            let total: f64 = weights.iter().sum();
            let weighted: f64 = train.targets.iter().zip(&weights).map(|(t, w)| t * w).sum();
            Ok(MeanModel(weighted / total))
        }
    }

    fn data() -> Dataset {
        Dataset::new(vec![vec![0.0], vec![1.0], vec![2.0]], vec![1.0, 2.0, 6.0]).unwrap()
    }

    #[test]
    fn refits_on_every_row_with_full_fit_params() {
        let fit_params = FitParams::new().with("sample_weight", FitParam::PerSample(vec![1.0, 1.0, 2.0]));
        let outcome = RefitCoordinator::new(&Mean)
            .refit(&ParamCombination::new(), &data(), &fit_params)
            .unwrap();
        assert_eq!(outcome.model.0, 15.0 / 4.0);
        assert!(outcome.refit_time >= 0.0);
    }

    #[test]
    fn refit_failure_propagates() {
        let mut params = ParamCombination::new();
        params.insert("fail".into(), ParamValue::from(true));
        let err = RefitCoordinator::new(&Mean)
            .refit(&params, &data(), &FitParams::new())
            .unwrap_err();
        assert!(err.to_string().contains("refit blew up"));
    }
}

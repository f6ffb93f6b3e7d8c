//! Scoring of fitted models on held-out data.

use std::str::FromStr;
use std::sync::Arc;

use gs_types::{Dataset, EstimatorError, FittedModel, SearchError};

/// Signature of a caller-supplied scorer. Higher is better.
pub type ScoreFn =
    Arc<dyn Fn(&dyn FittedModel, &Dataset) -> Result<f64, EstimatorError> + Send + Sync>;

/// Named metrics. Loss-type metrics are negated so that higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Accuracy,
    Precision,
    Recall,
    F1,
    R2,
    NegMeanSquaredError,
    NegMeanAbsoluteError,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Accuracy,
        Metric::F1,
        Metric::NegMeanAbsoluteError,
        Metric::NegMeanSquaredError,
        Metric::Precision,
        Metric::R2,
        Metric::Recall,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::F1 => "f1",
            Self::R2 => "r2",
            Self::NegMeanSquaredError => "neg_mean_squared_error",
            Self::NegMeanAbsoluteError => "neg_mean_absolute_error",
        }
    }

    /// Score `predicted` against `truth`. Binary metrics treat `1.0` as the
    /// positive label.
    pub fn compute(&self, truth: &[f64], predicted: &[f64]) -> Result<f64, EstimatorError> {
        if truth.len() != predicted.len() {
            return Err(EstimatorError::ScoreFailed {
                message: format!(
                    "Found input variables with inconsistent numbers of samples: [{}, {}]",
                    truth.len(),
                    predicted.len()
                ),
            });
        }
        if truth.is_empty() {
            return Err(EstimatorError::ScoreFailed {
                message: format!("{} is undefined on an empty sample", self.name()),
            });
        }

        let n = truth.len() as f64;
        let pairs = || truth.iter().zip(predicted.iter());
        let score = match self {
            Self::Accuracy => pairs().filter(|(t, p)| t == p).count() as f64 / n,
            Self::Precision | Self::Recall | Self::F1 => {
                let (mut tp, mut fp, mut fn_) = (0.0, 0.0, 0.0);
                for (t, p) in pairs() {
                    match (*t == 1.0, *p == 1.0) {
                        (true, true) => tp += 1.0,
                        (false, true) => fp += 1.0,
                        (true, false) => fn_ += 1.0,
                        (false, false) => {}
                    }
                }
                // Zero denominators score 0.0.
                let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };
                let precision = ratio(tp, tp + fp);
                let recall = ratio(tp, tp + fn_);
                match self {
                    Self::Precision => precision,
                    Self::Recall => recall,
                    _ => ratio(2.0 * precision * recall, precision + recall),
                }
            }
            Self::R2 => {
                let mean = truth.iter().sum::<f64>() / n;
                let ss_res: f64 = pairs().map(|(t, p)| (t - p).powi(2)).sum();
                let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
                if ss_tot == 0.0 {
                    if ss_res == 0.0 { 1.0 } else { 0.0 }
                } else {
                    1.0 - ss_res / ss_tot
                }
            }
            Self::NegMeanSquaredError => -pairs().map(|(t, p)| (t - p).powi(2)).sum::<f64>() / n,
            Self::NegMeanAbsoluteError => -pairs().map(|(t, p)| (t - p).abs()).sum::<f64>() / n,
        };
        Ok(score)
    }
}

impl FromStr for Metric {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| SearchError::UnknownScoring {
                name: s.to_string(),
                valid: Metric::ALL.iter().map(|m| m.name()).collect::<Vec<_>>().join(", "),
            })
    }
}

/// The `scoring` option as configured by the caller.
#[derive(Clone, Default)]
pub enum Scoring {
    /// Use the model's own `score`.
    #[default]
    Default,
    /// A metric by name, resolved at fit time.
    Metric(String),
    Callable(ScoreFn),
}

impl Scoring {
    pub fn metric(name: impl Into<String>) -> Self {
        Self::Metric(name.into())
    }

    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&dyn FittedModel, &Dataset) -> Result<f64, EstimatorError> + Send + Sync + 'static,
    {
        Self::Callable(Arc::new(f))
    }

    /// Resolve metric names; unknown names fail before anything is dispatched.
    pub fn resolve(&self) -> Result<Scorer, SearchError> {
        Ok(match self {
            Self::Default => Scorer::Default,
            Self::Metric(name) => Scorer::Metric(name.parse()?),
            Self::Callable(f) => Scorer::Callable(Arc::clone(f)),
        })
    }
}

impl std::fmt::Debug for Scoring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "Default"),
            Self::Metric(name) => f.debug_tuple("Metric").field(name).finish(),
            Self::Callable(_) => write!(f, "Callable(..)"),
        }
    }
}

/// A resolved scorer, ready to run on workers.
#[derive(Clone)]
pub enum Scorer {
    Default,
    Metric(Metric),
    Callable(ScoreFn),
}

impl Scorer {
    pub fn name(&self) -> &str {
        match self {
            Self::Default => "score",
            Self::Metric(metric) => metric.name(),
            Self::Callable(_) => "callable",
        }
    }

    pub fn score(&self, model: &dyn FittedModel, data: &Dataset) -> Result<f64, EstimatorError> {
        match self {
            Self::Default => model.score(data),
            Self::Metric(metric) => {
                let predicted = model.predict(&data.features)?;
                metric.compute(&data.targets, &predicted)
            }
            Self::Callable(f) => f(model, data),
        }
    }
}

impl std::fmt::Debug for Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Scorer({})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl FittedModel for Echo {
        fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError> {
            Ok(features.iter().map(|row| row[0]).collect())
        }
    }

    #[test]
    fn classification_metrics() {
        let truth = [1.0, 1.0, 0.0, 0.0, 1.0];
        let pred = [1.0, 0.0, 1.0, 0.0, 1.0];
        assert!((Metric::Accuracy.compute(&truth, &pred).unwrap() - 0.6).abs() < 1e-12);
        assert!((Metric::Precision.compute(&truth, &pred).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((Metric::Recall.compute(&truth, &pred).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((Metric::F1.compute(&truth, &pred).unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn precision_without_positive_predictions_is_zero() {
        let score = Metric::Precision.compute(&[1.0, 0.0], &[0.0, 0.0]).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn regression_metrics() {
        let truth = [1.0, 2.0, 3.0];
        let pred = [1.0, 2.0, 5.0];
        assert!((Metric::NegMeanSquaredError.compute(&truth, &pred).unwrap() + 4.0 / 3.0).abs() < 1e-12);
        assert!((Metric::NegMeanAbsoluteError.compute(&truth, &pred).unwrap() + 2.0 / 3.0).abs() < 1e-12);
        assert!((Metric::R2.compute(&truth, &pred).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(Metric::R2.compute(&[2.0, 2.0], &[2.0, 2.0]).unwrap(), 1.0);
    }

    #[test]
    fn unknown_metric_lists_valid_names() {
        let err = Scoring::metric("precison").resolve().unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("'precison' is not a valid scoring value"));
        assert!(message.contains("precision"));
    }

    #[test]
    fn metric_scorer_uses_predictions() {
        let data = Dataset::new(vec![vec![1.0], vec![0.0]], vec![1.0, 1.0]).unwrap();
        let scorer = Scoring::metric("accuracy").resolve().unwrap();
        assert_eq!(scorer.score(&Echo, &data).unwrap(), 0.5);
        assert_eq!(scorer.name(), "accuracy");
    }

    #[test]
    fn default_scorer_requires_model_score() {
        let data = Dataset::new(vec![vec![1.0]], vec![1.0]).unwrap();
        let err = Scorer::Default.score(&Echo, &data).unwrap_err();
        assert!(matches!(err, EstimatorError::ScoreFailed { .. }));
    }

    #[test]
    fn callable_scorer_is_invoked() {
        let data = Dataset::new(vec![vec![3.0]], vec![1.0]).unwrap();
        let scorer = Scoring::callable(|model, data| {
            let predicted = model.predict(&data.features)?;
            Ok(predicted[0] * 2.0)
        })
        .resolve()
        .unwrap();
        assert_eq!(scorer.score(&Echo, &data).unwrap(), 6.0);
    }
}

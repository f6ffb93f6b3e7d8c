//! In-memory datasets and fit-time parameters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::GsResult;
use crate::params::ParamValue;

/// A supervised dataset: one feature row and one target per sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl Dataset {
    pub fn new(features: Vec<Vec<f64>>, targets: Vec<f64>) -> GsResult<Self> {
        if features.len() != targets.len() {
            return Err(crate::validation_error!(
                "Found input variables with inconsistent numbers of samples: [{}, {}]",
                features.len(),
                targets.len()
            ));
        }
        Ok(Self { features, targets })
    }

    pub fn n_samples(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Rows selected by `indices`, in the given order.
    pub fn take(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }
}

/// A single fit-time parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FitParam {
    /// One entry per sample (e.g. sample weights); sliced per fold.
    PerSample(Vec<f64>),
    /// Passed through unchanged.
    Value(ParamValue),
}

/// Extra keyword arguments forwarded to `Estimator::fit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    params: BTreeMap<String, FitParam>,
}

impl FitParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, param: FitParam) -> Self {
        self.params.insert(name.into(), param);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FitParam> {
        self.params.get(name)
    }

    pub fn per_sample(&self, name: &str) -> Option<&[f64]> {
        match self.params.get(name) {
            Some(FitParam::PerSample(values)) => Some(values),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FitParam)> {
        self.params.iter()
    }

    /// Restrict per-sample parameters to the rows in `indices`.
    ///
    /// Only per-sample parameters whose length equals `n_samples` are sliced;
    /// everything else is forwarded as-is.
    pub fn slice_for(&self, indices: &[usize], n_samples: usize) -> FitParams {
        let params = self
            .params
            .iter()
            .map(|(name, param)| {
                let sliced = match param {
                    FitParam::PerSample(values) if values.len() == n_samples => {
                        FitParam::PerSample(indices.iter().map(|&i| values[i]).collect())
                    }
                    other => other.clone(),
                };
                (name.clone(), sliced)
            })
            .collect();
        FitParams { params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GsError;

    #[test]
    fn rejects_mismatched_lengths() {
        let err = Dataset::new(vec![vec![1.0], vec![2.0]], vec![0.0]).unwrap_err();
        assert!(matches!(err, GsError::Validation(_)));
        assert!(err.to_string().contains("inconsistent numbers of samples: [2, 1]"));
    }

    #[test]
    fn take_preserves_requested_order() {
        let data = Dataset::new(
            vec![vec![0.0], vec![1.0], vec![2.0]],
            vec![10.0, 11.0, 12.0],
        )
        .unwrap();
        let subset = data.take(&[2, 0]);
        assert_eq!(subset.targets, vec![12.0, 10.0]);
        assert_eq!(subset.features, vec![vec![2.0], vec![0.0]]);
    }

    #[test]
    fn slice_for_only_touches_sample_aligned_params() {
        let params = FitParams::new()
            .with("sample_weight", FitParam::PerSample(vec![1.0, 2.0, 3.0, 4.0]))
            .with("short", FitParam::PerSample(vec![9.0]))
            .with("max_iter", FitParam::Value(ParamValue::Int(10)));

        let sliced = params.slice_for(&[1, 3], 4);
        assert_eq!(sliced.per_sample("sample_weight"), Some(&[2.0, 4.0][..]));
        assert_eq!(sliced.per_sample("short"), Some(&[9.0][..]));
        assert_eq!(
            sliced.get("max_iter"),
            Some(&FitParam::Value(ParamValue::Int(10)))
        );
    }
}

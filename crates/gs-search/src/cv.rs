//! Cross-validation split sources.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use gs_types::{Dataset, SearchError};

/// One train/test partition of the sample indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    pub fn new(train: Vec<usize>, test: Vec<usize>) -> Self {
        Self { train, test }
    }
}

/// A caller-provided splitting strategy.
pub trait CvSplitter: Send + Sync + std::fmt::Debug {
    /// Number of splits `split` is expected to produce.
    fn n_splits(&self) -> usize;

    fn split(&self, data: &Dataset) -> Result<Vec<Split>, SearchError>;
}

/// Unshuffled K-fold: contiguous test folds, the first `n % k` one sample larger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Result<Self, SearchError> {
        if n_splits < 2 {
            return Err(SearchError::InvalidCv {
                message: format!(
                    "k-fold cross-validation requires at least one train/test split by setting \
                     n_splits=2 or more, got n_splits={n_splits}."
                ),
            });
        }
        Ok(Self { n_splits })
    }
}

impl CvSplitter for KFold {
    fn n_splits(&self) -> usize {
        self.n_splits
    }

    fn split(&self, data: &Dataset) -> Result<Vec<Split>, SearchError> {
        let n_samples = data.n_samples();
        if self.n_splits > n_samples {
            return Err(SearchError::InvalidCv {
                message: format!(
                    "Cannot have number of splits n_splits={} greater than the number of samples: \
                     n_samples={n_samples}.",
                    self.n_splits
                ),
            });
        }

        let base = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;
        let mut splits = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for fold in 0..self.n_splits {
            let size = base + usize::from(fold < remainder);
            let stop = start + size;
            let test: Vec<usize> = (start..stop).collect();
            let train: Vec<usize> = (0..start).chain(stop..n_samples).collect();
            splits.push(Split::new(train, test));
            start = stop;
        }
        Ok(splits)
    }
}

/// The `cv` option: a fold count, a splitter, or explicit splits.
#[derive(Debug, Clone)]
pub enum Cv {
    Folds(usize),
    Splitter(Arc<dyn CvSplitter>),
    Explicit(Vec<Split>),
}

impl Default for Cv {
    fn default() -> Self {
        Self::Folds(5)
    }
}

impl Cv {
    pub fn splitter(splitter: impl CvSplitter + 'static) -> Self {
        Self::Splitter(Arc::new(splitter))
    }

    /// Produce the splits for `data`, validating them before any work is
    /// dispatched.
    pub fn splits(&self, data: &Dataset) -> Result<Vec<Split>, SearchError> {
        let splits = match self {
            Self::Folds(k) => KFold::new(*k)?.split(data)?,
            Self::Splitter(splitter) => {
                let splits = splitter.split(data)?;
                let expected = splitter.n_splits();
                if splits.len() != expected {
                    return Err(SearchError::InconsistentSplits {
                        expected,
                        got: splits.len(),
                    });
                }
                splits
            }
            Self::Explicit(splits) => splits.clone(),
        };

        let n_samples = data.n_samples();
        for (fold, split) in splits.iter().enumerate() {
            if let Some(&bad) = split.train.iter().chain(&split.test).find(|&&i| i >= n_samples) {
                return Err(SearchError::InvalidCv {
                    message: format!(
                        "split {fold} references sample {bad} but the dataset has {n_samples} samples"
                    ),
                });
            }
        }
        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> Dataset {
        Dataset::new((0..n).map(|i| vec![i as f64]).collect(), vec![0.0; n]).unwrap()
    }

    #[test]
    fn kfold_distributes_remainder_to_first_folds() {
        let splits = KFold::new(3).unwrap().split(&dataset(10)).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_eq!(splits[1].test, vec![4, 5, 6]);
        assert_eq!(splits[1].train, vec![0, 1, 2, 3, 7, 8, 9]);
    }

    #[test]
    fn kfold_requires_two_splits() {
        let err = KFold::new(1).unwrap_err();
        assert!(err.to_string().contains("got n_splits=1."));
    }

    #[test]
    fn kfold_rejects_more_splits_than_samples() {
        let err = Cv::Folds(5).splits(&dataset(3)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot have number of splits n_splits=5 greater than the number of samples: n_samples=3."
        );
    }

    #[test]
    fn splitter_count_must_match() {
        #[derive(Debug)]
        struct Liar;
        impl CvSplitter for Liar {
            fn n_splits(&self) -> usize {
                3
            }
            fn split(&self, _data: &Dataset) -> Result<Vec<Split>, SearchError> {
                Ok(vec![Split::new(vec![0], vec![1])])
            }
        }

        let err = Cv::splitter(Liar).splits(&dataset(4)).unwrap_err();
        assert_eq!(err, SearchError::InconsistentSplits { expected: 3, got: 1 });
    }

    #[test]
    fn explicit_splits_are_bounds_checked() {
        let cv = Cv::Explicit(vec![Split::new(vec![0, 1], vec![9])]);
        let err = cv.splits(&dataset(4)).unwrap_err();
        assert!(err.to_string().contains("sample 9"));
    }
}

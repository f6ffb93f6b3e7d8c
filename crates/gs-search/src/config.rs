//! Serializable search options.

use serde::{Deserialize, Serialize};
use std::path::Path;

use gs_types::{config_error, GsResult};

use crate::cluster::{BackendKind, ClusterConfig};
use crate::results::ErrorScore;

/// Environment variable holding the path of a JSON [`SearchConfig`].
pub const CONFIG_ENV_VAR: &str = "GRIDSPARK_CONFIG";

/// Options shared by grid and randomized search.
///
/// Callables (custom scorers, refit selectors, CV splitters) cannot be
/// serialized and are set on [`SearchCv`](crate::SearchCv) directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of K-fold splits.
    pub cv_folds: usize,

    /// Combinations drawn by randomized search.
    pub n_iter: usize,

    /// Seed for randomized search; `None` draws one from OS entropy.
    pub random_state: Option<u64>,

    pub error_score: ErrorScore,

    pub return_train_score: bool,

    /// Metric name, or `None` for the estimator's own score.
    pub scoring: Option<String>,

    /// Refit the best candidate on the full dataset.
    pub refit: bool,

    /// Deprecated and ignored.
    pub iid: Option<bool>,

    pub backend: BackendKind,

    pub cluster: ClusterConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            n_iter: 10,
            random_state: None,
            error_score: ErrorScore::default(),
            return_train_score: false,
            scoring: None,
            refit: true,
            iid: None,
            backend: BackendKind::default(),
            cluster: ClusterConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn with_cv_folds(mut self, n: usize) -> Self {
        self.cv_folds = n;
        self
    }

    pub fn with_n_iter(mut self, n: usize) -> Self {
        self.n_iter = n;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
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

    pub fn with_scoring(mut self, metric: &str) -> Self {
        self.scoring = Some(metric.to_string());
        self
    }

    pub fn with_refit(mut self, enabled: bool) -> Self {
        self.refit = enabled;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_cluster(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = cluster;
        self
    }

    /// Parse and validate a JSON config; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> GsResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> GsResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Load from the file named by `GRIDSPARK_CONFIG`, or defaults if unset.
    pub fn from_env() -> GsResult<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::from_path(path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> GsResult<()> {
        if self.cv_folds < 2 {
            return Err(config_error!(
                "k-fold cross-validation requires at least one train/test split by setting n_splits=2 or more, got n_splits={}",
                self.cv_folds
            ));
        }
        if self.n_iter == 0 {
            return Err(config_error!("n_iter must be a positive integer, got 0"));
        }
        if self.cluster.max_concurrent_tasks == 0 {
            return Err(config_error!("cluster.max_concurrent_tasks must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_types::GsError;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.n_iter, 10);
        assert!(config.refit);
        assert!(matches!(config.error_score, ErrorScore::Value(v) if v.is_nan()));
        assert_eq!(config.backend, BackendKind::ThreadPool);
    }

    #[test]
    fn test_partial_json() {
        let config = SearchConfig::from_json_str(
            r#"{"cv_folds": 3, "error_score": "raise", "iid": false, "cluster": {"max_concurrent_tasks": 8}}"#,
        )
        .unwrap();
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.error_score, ErrorScore::Raise);
        assert_eq!(config.iid, Some(false));
        assert_eq!(config.cluster.max_concurrent_tasks, 8);
        assert_eq!(config.n_iter, 10);
    }

    #[test]
    fn test_invalid_config() {
        let err = SearchConfig::from_json_str(r#"{"cv_folds": 1}"#).unwrap_err();
        assert!(matches!(err, GsError::Config(_)));

        let err = SearchConfig::from_json_str(r#"{"cv_folds": "five"}"#).unwrap_err();
        assert!(matches!(err, GsError::Serialization(_)));
    }

    #[test]
    fn test_builders() {
        let config = SearchConfig::default()
            .with_cv_folds(3)
            .with_n_iter(20)
            .with_random_state(7)
            .with_scoring("f1")
            .with_refit(false)
            .with_backend(BackendKind::Sequential);
        assert_eq!(config.random_state, Some(7));
        assert_eq!(config.scoring.as_deref(), Some("f1"));
        assert!(!config.refit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_roundtrip_file() {
        let path = std::env::temp_dir().join(format!("gridspark-config-{}.json", std::process::id()));
        let config = SearchConfig::default().with_random_state(42);
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
        let loaded = SearchConfig::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded.random_state, Some(42));
        // NaN error_score survives as the "nan" keyword.
        assert!(matches!(loaded.error_score, ErrorScore::Value(v) if v.is_nan()));
    }
}

use thiserror::Error;

/// Main error type for the GridSpark system
#[derive(Error, Debug)]
pub enum GsError {
    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Estimator error: {0}")]
    Estimator(#[from] EstimatorError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl GsError {
    /// The parameter-space error behind this error, if any.
    pub fn as_param_error(&self) -> Option<&ParamError> {
        match self {
            Self::Param(e) => Some(e),
            _ => None,
        }
    }

    /// The search-protocol error behind this error, if any.
    pub fn as_search_error(&self) -> Option<&SearchError> {
        match self {
            Self::Search(e) => Some(e),
            _ => None,
        }
    }
}

/// Which kind of parameter specification an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    Grid,
    Distribution,
}

impl std::fmt::Display for SpecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grid => write!(f, "grid"),
            Self::Distribution => write!(f, "distribution"),
        }
    }
}

/// Malformed parameter specifications.
///
/// Messages follow the wording of the reference search library so callers
/// matching on message text keep working.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("Parameter {kind} is not a dict or a list ({value})")]
    NotDictOrList { kind: SpecKind, value: String },

    #[error("Parameter {kind} is not a dict ({value})")]
    NotDict { kind: SpecKind, value: String },

    #[error("Parameter grid value is not iterable (key='{key}', value={value})")]
    NotIterable { key: String, value: String },

    #[error("Parameter distribution value is not iterable or distribution (key='{key}', value={value})")]
    NotSamplable { key: String, value: String },

    #[error("Parameter grid for parameter '{key}' need to be a non-empty sequence, got: {value}")]
    EmptyValues { key: String, value: String },

    #[error("Invalid distribution for parameter '{key}': {message}")]
    InvalidDistribution { key: String, message: String },

    #[error("n_iter must be a positive integer, got {n_iter}")]
    InvalidIterations { n_iter: usize },
}

impl ParamError {
    /// True for shape/type problems, false for bad values inside a
    /// well-shaped specification.
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            Self::NotDictOrList { .. } | Self::NotDict { .. } | Self::NotIterable { .. } | Self::NotSamplable { .. }
        )
    }
}

/// Errors raised by the search protocol itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("best_index_ index out of range: refit callable returned {index}, valid range is [0, {n_candidates})")]
    BestIndexOutOfRange { index: i64, n_candidates: usize },

    #[error("No candidate has a defined mean test score ({n_candidates} candidates); cannot select best_index_")]
    NoValidCandidate { n_candidates: usize },

    #[error("Fit failed for candidate {candidate} on split {fold}: {message}")]
    FitFailed {
        candidate: usize,
        fold: usize,
        message: String,
    },

    #[error("This {search} instance is not fitted yet. Call 'fit' with appropriate arguments before using this estimator.")]
    NotFitted { search: String },

    #[error("This {search} instance was initialized with refit=False. {method} is available only after refitting on the best parameters. You can refit an estimator manually using the best_params_ attribute")]
    NoRefit { search: String, method: String },

    #[error("{message}")]
    InvalidCv { message: String },

    #[error("cv.split and cv.get_n_splits returned inconsistent results. Expected {expected} splits, got {got}")]
    InconsistentSplits { expected: usize, got: usize },

    #[error("No fits were performed. Was the CV iterator empty? Were there no candidates?")]
    NoFits,

    #[error("'{name}' is not a valid scoring value. Valid options are {valid}")]
    UnknownScoring { name: String, valid: String },

    #[error("Search internal error: {message}")]
    Internal { message: String },
}

/// Failures reported by the estimator collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    #[error("fit failed: {message}")]
    FitFailed { message: String },

    #[error("predict failed: {message}")]
    PredictFailed { message: String },

    #[error("score failed: {message}")]
    ScoreFailed { message: String },

    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    #[error("worker panicked: {message}")]
    Panicked { message: String },
}

/// Result type alias for GridSpark operations
pub type GsResult<T> = Result<T, GsError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::GsError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::GsError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_error_display() {
        let error = ParamError::NotDictOrList {
            kind: SpecKind::Grid,
            value: "0".to_string(),
        };
        assert_eq!(error.to_string(), "Parameter grid is not a dict or a list (0)");

        let error = ParamError::NotIterable {
            key: "foo".to_string(),
            value: "0".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Parameter grid value is not iterable (key='foo', value=0)"
        );
        assert!(error.is_type_error());
    }

    #[test]
    fn test_empty_values_is_value_category() {
        let error = ParamError::EmptyValues {
            key: "foo".to_string(),
            value: "[]".to_string(),
        };
        assert!(!error.is_type_error());
    }

    #[test]
    fn test_index_error_names_value_and_bound() {
        let error = SearchError::BestIndexOutOfRange {
            index: 2,
            n_candidates: 2,
        };
        let message = error.to_string();
        assert!(message.starts_with("best_index_ index out of range"));
        assert!(message.contains("returned 2"));
        assert!(message.contains("[0, 2)"));
    }

    #[test]
    fn test_error_conversion() {
        let search_error = SearchError::NoFits;
        let gs_error: GsError = search_error.into();

        match gs_error {
            GsError::Search(SearchError::NoFits) => (),
            _ => panic!("Expected Search error"),
        }
        assert!(gs_error.as_param_error().is_none());
    }

    #[test]
    fn test_macros() {
        let err = validation_error!("Invalid value: {}", 42);
        assert_eq!(err.to_string(), "Validation error: Invalid value: 42");
        let err = config_error!("Missing required field: {}", "cv");
        assert!(matches!(err, GsError::Config(ref m) if m == "Missing required field: cv"));
    }
}

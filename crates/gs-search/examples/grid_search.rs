use anyhow::Context;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use gs_search::{Cv, Metric, SearchConfig, SearchCv, Scoring};
use gs_types::{Dataset, Estimator, EstimatorError, FitParams, FittedModel, ParamCombination, ParamValue};

/// Single-feature ridge regression.
struct Ridge;

struct RidgeModel {
    slope: f64,
    intercept: f64,
}

impl FittedModel for RidgeModel {
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError> {
        Ok(features.iter().map(|row| self.slope * row[0] + self.intercept).collect())
    }

    fn score(&self, data: &Dataset) -> Result<f64, EstimatorError> {
        let predicted = self.predict(&data.features)?;
        Metric::R2.compute(&data.targets, &predicted)
    }
}

impl Estimator for Ridge {
    type Model = RidgeModel;

    fn name(&self) -> &str {
        "ridge"
    }

    fn fit(
        &self,
        params: &ParamCombination,
        train: &Dataset,
        _fit_params: &FitParams,
    ) -> Result<RidgeModel, EstimatorError> {
        let alpha = params.get("alpha").and_then(ParamValue::as_f64).unwrap_or(1.0);
        if alpha < 0.0 {
            return Err(EstimatorError::InvalidParameter {
                name: "alpha".into(),
                message: format!("must be non-negative, got {alpha}"),
            });
        }
        let n = train.n_samples() as f64;
        let mean_x = train.features.iter().map(|r| r[0]).sum::<f64>() / n;
        let mean_y = train.targets.iter().sum::<f64>() / n;
        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (row, y) in train.features.iter().zip(&train.targets) {
            sxy += (row[0] - mean_x) * (y - mean_y);
            sxx += (row[0] - mean_x).powi(2);
        }
        let slope = sxy / (sxx + alpha);
        Ok(RidgeModel {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // y = 3x + 1 with a deterministic wobble.
    let features: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64 / 4.0]).collect();
    let targets = features
        .iter()
        .enumerate()
        .map(|(i, row)| 3.0 * row[0] + 1.0 + ((i * 7) % 5) as f64 * 0.1)
        .collect();
    let data = Dataset::new(features, targets).context("building dataset")?;

    let config = SearchConfig::from_env().context("loading GRIDSPARK_CONFIG")?;

    let mut grid = SearchCv::grid(Ridge, json!({"alpha": [0.0, 1.0, 10.0, 100.0]}).into())
        .with_config(&config)
        .with_cv(Cv::Folds(4));
    grid.fit(&data, &FitParams::new())?;

    let table = grid.cv_results()?;
    for row in table.rows() {
        println!(
            "alpha={:<6} mean_test_score={:.4} std={:.4} rank={}",
            row.params["alpha"].repr(),
            row.mean_test_score,
            row.std_test_score,
            row.rank_test_score
        );
    }
    println!("best params: {:?}", grid.best_params());
    println!("prediction at x=20: {:?}", grid.predict(&[vec![20.0]])?);

    let mut randomized = SearchCv::randomized(
        Ridge,
        json!({"alpha": {"distribution": "loguniform", "low": 1e-3, "high": 1e3}}).into(),
        8,
    )
    .with_config(&config)
    .with_scoring(Scoring::metric("neg_mean_squared_error"))
    .with_random_state(7);
    randomized.fit(&data, &FitParams::new())?;
    println!(
        "randomized best: {:?} (score {:?})",
        randomized.best_params(),
        randomized.best_score()
    );
    println!(
        "cv_results: {}",
        serde_json::to_string_pretty(&randomized.cv_results()?.to_columns())?
    );

    Ok(())
}

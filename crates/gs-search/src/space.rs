//! Parameter space validation and enumeration.
//!
//! [`ParameterGrid`] enumerates every combination of a grid (or union of
//! grids); [`ParameterSampler`] draws a fixed number of combinations from
//! value lists and distributions. Both validate the raw specification up
//! front and report malformed input with the reference library's messages.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use gs_types::{repr_json, ParamCombination, ParamError, ParamValue, SpecKind};

use crate::distribution::{BuiltinDistribution, ParamDistribution};

/// Where the values of one parameter come from.
#[derive(Debug, Clone)]
pub enum ParamSource {
    /// A finite list of candidates, tried in order (grid) or picked uniformly (random).
    Values(Vec<ParamValue>),
    /// A distribution sampled once per draw.
    Distribution(Arc<dyn ParamDistribution>),
}

impl ParamSource {
    pub fn values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        Self::Values(values.into_iter().map(Into::into).collect())
    }

    pub fn distribution(dist: impl ParamDistribution + 'static) -> Self {
        Self::Distribution(Arc::new(dist))
    }
}

/// A raw parameter specification as supplied by the caller.
#[derive(Debug, Clone)]
pub enum ParamSpec {
    /// `{"C": [1, 10]}` or `[{"C": [1]}, {"gamma": [0.1]}]`. In randomized mode
    /// values may also be inline distribution descriptors.
    Json(Value),
    /// Programmatic form: a union of sub-spaces.
    Sources(Vec<BTreeMap<String, ParamSource>>),
}

impl From<Value> for ParamSpec {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<BTreeMap<String, ParamSource>> for ParamSpec {
    fn from(space: BTreeMap<String, ParamSource>) -> Self {
        Self::Sources(vec![space])
    }
}

/// Split a JSON spec into its sub-mappings, checking the top-level shape.
fn split_json_spec(value: &Value, kind: SpecKind) -> Result<Vec<&Map<String, Value>>, ParamError> {
    match value {
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(ParamError::NotDict {
                    kind,
                    value: repr_json(other),
                }),
            })
            .collect(),
        other => Err(ParamError::NotDictOrList {
            kind,
            value: repr_json(other),
        }),
    }
}

fn json_values(key: &str, items: &[Value]) -> Result<Vec<ParamValue>, ParamError> {
    if items.is_empty() {
        return Err(ParamError::EmptyValues {
            key: key.to_string(),
            value: "[]".to_string(),
        });
    }
    Ok(items.iter().map(ParamValue::from_json).collect())
}

fn check_values(key: &str, values: &[ParamValue]) -> Result<(), ParamError> {
    if values.is_empty() {
        return Err(ParamError::EmptyValues {
            key: key.to_string(),
            value: "[]".to_string(),
        });
    }
    Ok(())
}

type Axis = (String, Vec<ParamValue>);

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Exhaustive enumeration of one or more parameter grids.
///
/// Within a sub-grid keys are sorted and the last key varies fastest.
/// Sub-grids are concatenated in the order given; duplicates are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGrid {
    grids: Vec<Vec<Axis>>,
}

impl ParameterGrid {
    pub fn new(spec: &ParamSpec) -> Result<Self, ParamError> {
        match spec {
            ParamSpec::Json(value) => Self::from_json(value),
            ParamSpec::Sources(spaces) => {
                let mut grids = Vec::with_capacity(spaces.len());
                for space in spaces {
                    let mut axes = Vec::with_capacity(space.len());
                    for (key, source) in space {
                        match source {
                            ParamSource::Values(values) => {
                                check_values(key, values)?;
                                axes.push((key.clone(), values.clone()));
                            }
                            ParamSource::Distribution(dist) => {
                                return Err(ParamError::NotIterable {
                                    key: key.clone(),
                                    value: format!("{dist:?}"),
                                });
                            }
                        }
                    }
                    grids.push(axes);
                }
                Ok(Self { grids })
            }
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, ParamError> {
        let maps = split_json_spec(value, SpecKind::Grid)?;
        let mut grids = Vec::with_capacity(maps.len());
        for map in maps {
            let mut axes = Vec::with_capacity(map.len());
            for (key, candidates) in map {
                match candidates {
                    Value::Array(items) => axes.push((key.clone(), json_values(key, items)?)),
                    other => {
                        return Err(ParamError::NotIterable {
                            key: key.clone(),
                            value: repr_json(other),
                        })
                    }
                }
            }
            axes.sort_by(|a, b| a.0.cmp(&b.0));
            grids.push(axes);
        }
        Ok(Self { grids })
    }

    fn grid_len(axes: &[Axis]) -> usize {
        axes.iter()
            .try_fold(1usize, |acc, (_, values)| acc.checked_mul(values.len()))
            .unwrap_or(usize::MAX)
    }

    /// Total number of combinations across all sub-grids.
    pub fn len(&self) -> usize {
        self.grids
            .iter()
            .fold(0usize, |acc, axes| acc.saturating_add(Self::grid_len(axes)))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The combination at `index` in enumeration order, computed without
    /// materializing the product.
    pub fn get(&self, index: usize) -> Option<ParamCombination> {
        let mut index = index;
        for axes in &self.grids {
            let total = Self::grid_len(axes);
            if index >= total {
                index -= total;
                continue;
            }
            let mut combo = ParamCombination::new();
            for (name, values) in axes.iter().rev() {
                let offset = index % values.len();
                index /= values.len();
                combo.insert(name.clone(), values[offset].clone());
            }
            return Some(combo);
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = ParamCombination> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Every combination, in enumeration order.
    pub fn combinations(&self) -> Vec<ParamCombination> {
        let mut out = Vec::with_capacity(self.len());
        for axes in &self.grids {
            // Cartesian product
            let mut result: Vec<ParamCombination> = vec![ParamCombination::new()];
            for (name, values) in axes {
                let mut next = Vec::with_capacity(result.len() * values.len());
                for existing in &result {
                    for value in values {
                        let mut combo = existing.clone();
                        combo.insert(name.clone(), value.clone());
                        next.push(combo);
                    }
                }
                result = next;
            }
            out.extend(result);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Random sampling
// ---------------------------------------------------------------------------

type Dimension = (String, ParamSource);

/// Draws parameter combinations from lists and distributions.
///
/// The sampler owns its seed: enumerating the same sampler twice yields the
/// same sequence, and two samplers never share random state.
#[derive(Debug, Clone)]
pub struct ParameterSampler {
    spaces: Vec<Vec<Dimension>>,
    n_iter: usize,
    seed: u64,
}

impl ParameterSampler {
    /// Validate `spec` and prepare to draw `n_iter` combinations.
    ///
    /// With `random_state == None` a seed is taken from OS entropy once, here.
    pub fn new(spec: &ParamSpec, n_iter: usize, random_state: Option<u64>) -> Result<Self, ParamError> {
        if n_iter == 0 {
            return Err(ParamError::InvalidIterations { n_iter });
        }
        let spaces = match spec {
            ParamSpec::Json(value) => Self::parse_json(value)?,
            ParamSpec::Sources(spaces) => {
                let mut parsed = Vec::with_capacity(spaces.len());
                for space in spaces {
                    for (key, source) in space {
                        if let ParamSource::Values(values) = source {
                            check_values(key, values)?;
                        }
                    }
                    parsed.push(space.iter().map(|(k, s)| (k.clone(), s.clone())).collect());
                }
                parsed
            }
        };
        let seed = random_state.unwrap_or_else(|| StdRng::from_os_rng().random());
        Ok(Self { spaces, n_iter, seed })
    }

    fn parse_json(value: &Value) -> Result<Vec<Vec<Dimension>>, ParamError> {
        let maps = split_json_spec(value, SpecKind::Distribution)?;
        let mut spaces = Vec::with_capacity(maps.len());
        for map in maps {
            let mut dims: Vec<Dimension> = Vec::with_capacity(map.len());
            for (key, candidates) in map {
                let source = match candidates {
                    Value::Array(items) => ParamSource::Values(json_values(key, items)?),
                    Value::Object(obj) if obj.contains_key("distribution") => {
                        let dist: BuiltinDistribution = serde_json::from_value(candidates.clone())
                            .map_err(|e| ParamError::InvalidDistribution {
                                key: key.clone(),
                                message: e.to_string(),
                            })?;
                        let sampler = dist.build().map_err(|message| ParamError::InvalidDistribution {
                            key: key.clone(),
                            message,
                        })?;
                        ParamSource::Distribution(Arc::new(sampler))
                    }
                    other => {
                        return Err(ParamError::NotSamplable {
                            key: key.clone(),
                            value: repr_json(other),
                        })
                    }
                };
                dims.push((key.clone(), source));
            }
            dims.sort_by(|a, b| a.0.cmp(&b.0));
            spaces.push(dims);
        }
        Ok(spaces)
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The grid equivalent of this space when every parameter is a value list.
    fn as_grid(&self) -> Option<ParameterGrid> {
        let mut grids = Vec::with_capacity(self.spaces.len());
        for dims in &self.spaces {
            let mut axes = Vec::with_capacity(dims.len());
            for (name, source) in dims {
                match source {
                    ParamSource::Values(values) => axes.push((name.clone(), values.clone())),
                    ParamSource::Distribution(_) => return None,
                }
            }
            grids.push(axes);
        }
        Some(ParameterGrid { grids })
    }

    /// Number of combinations [`samples`](Self::samples) will return.
    pub fn len(&self) -> usize {
        match self.as_grid() {
            Some(grid) => grid.len().min(self.n_iter),
            None => self.n_iter,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Draw the combinations.
    ///
    /// If every parameter is a finite list, combinations are drawn from the
    /// equivalent grid without replacement (capped at the grid size).
    /// Otherwise each draw picks a sub-space uniformly and samples every
    /// parameter in key order.
    pub fn samples(&self) -> Vec<ParamCombination> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        if let Some(grid) = self.as_grid() {
            let grid_size = grid.len();
            let mut n_iter = self.n_iter;
            if grid_size < n_iter {
                warn!(
                    "The total space of parameters {grid_size} is smaller than n_iter={n_iter}. \
                     Running {grid_size} iterations. For exhaustive searches, use GridSearchCV."
                );
                n_iter = grid_size;
            }
            return rand::seq::index::sample(&mut rng, grid_size, n_iter)
                .into_iter()
                .filter_map(|i| grid.get(i))
                .collect();
        }

        (0..self.n_iter)
            .map(|_| {
                let dims = &self.spaces[rng.random_range(0..self.spaces.len())];
                let mut combo = ParamCombination::new();
                for (name, source) in dims {
                    let value = match source {
                        ParamSource::Distribution(dist) => dist.sample(&mut rng),
                        ParamSource::Values(values) => values[rng.random_range(0..values.len())].clone(),
                    };
                    combo.insert(name.clone(), value);
                }
                combo
            })
            .collect()
    }
}

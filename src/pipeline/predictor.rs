use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::features::FeatureTable;

/// Deepest oblivious tree accepted from an artifact (2^16 leaves).
const MAX_TREE_DEPTH: usize = 16;

/// Maps a feature table to one prediction per row, in row order.
///
/// Implementations are shared read-only across concurrent requests.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>, ModelError>;
}

/// Errors raised while loading a model artifact or predicting with it.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON model file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("Feature table columns {found:?} do not match model features {expected:?}")]
    MismatchedColumns {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// One split of an oblivious tree: `feature > border` sets the split's bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub feature_index: usize,
    pub border: f64,
}

/// A symmetric decision tree. Every level shares one split, so the leaf is
/// addressed by the bit pattern of the split outcomes (split `j` → bit `j`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObliviousTree {
    pub splits: Vec<Split>,
    pub leaf_values: Vec<f64>,
}

impl ObliviousTree {
    fn leaf_index(&self, row: ArrayView1<'_, f64>) -> usize {
        // NaN compares false, so missing values always take the low branch.
        self.splits
            .iter()
            .enumerate()
            .fold(0, |index, (depth, split)| {
                if row[split.feature_index] > split.border {
                    index | (1 << depth)
                } else {
                    index
                }
            })
    }

    fn evaluate(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.leaf_values[self.leaf_index(row)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Estimator {
    /// Gradient-boosted ensemble; the raw score is the sum of tree outputs.
    ObliviousTrees { trees: Vec<ObliviousTree> },
    Linear {
        coefficients: Vec<f64>,
        #[serde(default)]
        intercept: f64,
    },
}

fn default_scale() -> f64 {
    1.0
}

/// The persisted, self-contained trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Canonical feature order. Tables passed to `predict` must match it exactly.
    pub feature_names: Vec<String>,
    pub estimator: Estimator,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub bias: f64,
}

impl TrainedModel {
    /// Loads and validates a model from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let json = fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&json)?;
        model.validate()?;
        Ok(model)
    }

    /// Saves the model as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(json.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Checks structural consistency so prediction can index without bounds failures.
    pub fn validate(&self) -> Result<(), ModelError> {
        let n_features = self.feature_names.len();
        if n_features == 0 {
            return Err(ModelError::InvalidArtifact("model declares no features".into()));
        }
        if !self.scale.is_finite() || !self.bias.is_finite() {
            return Err(ModelError::InvalidArtifact(
                "scale and bias must be finite".into(),
            ));
        }

        match &self.estimator {
            Estimator::ObliviousTrees { trees } => {
                for (t, tree) in trees.iter().enumerate() {
                    if tree.splits.len() > MAX_TREE_DEPTH {
                        return Err(ModelError::InvalidArtifact(format!(
                            "tree {t} has depth {} (max {MAX_TREE_DEPTH})",
                            tree.splits.len()
                        )));
                    }
                    let expected_leaves = 1usize << tree.splits.len();
                    if tree.leaf_values.len() != expected_leaves {
                        return Err(ModelError::InvalidArtifact(format!(
                            "tree {t} has {} leaves, expected {expected_leaves}",
                            tree.leaf_values.len()
                        )));
                    }
                    if let Some(split) = tree
                        .splits
                        .iter()
                        .find(|s| s.feature_index >= n_features)
                    {
                        return Err(ModelError::InvalidArtifact(format!(
                            "tree {t} splits on feature {} but the model has {n_features}",
                            split.feature_index
                        )));
                    }
                }
            }
            Estimator::Linear { coefficients, .. } => {
                if coefficients.len() != n_features {
                    return Err(ModelError::InvalidArtifact(format!(
                        "{} coefficients for {n_features} features",
                        coefficients.len()
                    )));
                }
            }
        }
        Ok(())
    }

    fn raw_score(&self, row: ArrayView1<'_, f64>) -> f64 {
        match &self.estimator {
            Estimator::ObliviousTrees { trees } => trees.iter().map(|t| t.evaluate(row)).sum(),
            Estimator::Linear {
                coefficients,
                intercept,
            } => {
                intercept
                    + row
                        .iter()
                        .zip(coefficients)
                        .map(|(x, c)| x * c)
                        .sum::<f64>()
            }
        }
    }
}

impl Predictor for TrainedModel {
    fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>, ModelError> {
        if features.columns() != self.feature_names.as_slice() {
            return Err(ModelError::MismatchedColumns {
                expected: self.feature_names.clone(),
                found: features.columns().to_vec(),
            });
        }

        Ok(features
            .values()
            .rows()
            .into_iter()
            .map(|row| self.scale * self.raw_score(row) + self.bias)
            .collect())
    }
}

//! Bagged ensemble of smartcore decision trees.
//!
//! Each tree is fitted on a bootstrap resample of the training rows; the
//! positive-class probability of a record is the share of trees voting 1.

use crate::records::{FeatureVector, FEATURE_COUNT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters,
};
use thiserror::Error;

/// Ensemble size. Fixed so two runs over the same corpus build the same model.
pub const N_TREES: usize = 100;
pub const FOREST_SEED: u64 = 42;

type Tree = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

#[derive(Error, Debug)]
pub enum ForestError {
    #[error("feature matrix has {rows} rows but {labels} labels were given")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("cannot fit a forest on zero rows")]
    Empty,
    #[error("training labels contain a single class; both 0 and 1 are required")]
    SingleClass,
    #[error("decision tree {index} failed: {message}")]
    Tree { index: usize, message: String },
    #[error("the forest holds no trees")]
    NoTrees,
    #[error("prediction failed: {0}")]
    Predict(String),
}

#[derive(Serialize, Deserialize)]
pub struct BaggedForest {
    trees: Vec<Tree>,
}

impl std::fmt::Debug for BaggedForest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaggedForest")
            .field("n_trees", &self.trees.len())
            .finish()
    }
}

fn to_matrix(rows: &[FeatureVector]) -> DenseMatrix<f64> {
    let values: Vec<f64> = rows.iter().flat_map(|r| r.as_slice().iter().copied()).collect();
    DenseMatrix::new(rows.len(), FEATURE_COUNT, values, false)
}

impl BaggedForest {
    pub fn fit(x: &[FeatureVector], y: &[i32]) -> Result<Self, ForestError> {
        Self::fit_with(x, y, N_TREES, FOREST_SEED)
    }

    pub(crate) fn fit_with(
        x: &[FeatureVector],
        y: &[i32],
        n_trees: usize,
        seed: u64,
    ) -> Result<Self, ForestError> {
        if x.len() != y.len() {
            return Err(ForestError::LengthMismatch {
                rows: x.len(),
                labels: y.len(),
            });
        }
        if x.is_empty() {
            return Err(ForestError::Empty);
        }
        if y.iter().all(|&l| l == y[0]) {
            return Err(ForestError::SingleClass);
        }

        let n = x.len();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(n_trees);
        for index in 0..n_trees {
            let sample = bootstrap(&mut rng, y);
            let xs: Vec<FeatureVector> = sample.iter().map(|&i| x[i]).collect();
            let ys: Vec<i32> = sample.iter().map(|&i| y[i]).collect();

            let params = DecisionTreeClassifierParameters {
                seed: Some(rng.gen()),
                ..Default::default()
            };
            let tree = Tree::fit(&to_matrix(&xs), &ys, params).map_err(|e| ForestError::Tree {
                index,
                message: e.to_string(),
            })?;
            trees.push(tree);
        }
        log::debug!("fitted {} trees on {} rows", trees.len(), n);
        Ok(Self { trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Share of trees voting for the positive class, per row.
    pub fn predict_proba_batch(&self, rows: &[FeatureVector]) -> Result<Vec<f64>, ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::NoTrees);
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let matrix = to_matrix(rows);
        let mut votes = vec![0usize; rows.len()];
        for tree in &self.trees {
            let predicted = tree
                .predict(&matrix)
                .map_err(|e| ForestError::Predict(e.to_string()))?;
            for (v, p) in votes.iter_mut().zip(predicted) {
                if p == 1 {
                    *v += 1;
                }
            }
        }
        let n = self.trees.len() as f64;
        Ok(votes.into_iter().map(|v| v as f64 / n).collect())
    }

    pub fn predict_batch(&self, rows: &[FeatureVector]) -> Result<Vec<i32>, ForestError> {
        Ok(self
            .predict_proba_batch(rows)?
            .into_iter()
            .map(label_for)
            .collect())
    }

    pub fn predict_proba(&self, row: &FeatureVector) -> Result<f64, ForestError> {
        Ok(self
            .predict_proba_batch(std::slice::from_ref(row))?
            .first()
            .copied()
            .unwrap_or(0.0))
    }

    pub fn predict(&self, row: &FeatureVector) -> Result<i32, ForestError> {
        self.predict_proba(row).map(label_for)
    }
}

/// Draws `y.len()` row indices with replacement. A tree needs both classes to
/// fit, so draws holding a single class are discarded and redrawn.
fn bootstrap(rng: &mut StdRng, y: &[i32]) -> Vec<usize> {
    let n = y.len();
    loop {
        let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
        let first = y[sample[0]];
        if sample.iter().any(|&i| y[i] != first) {
            return sample;
        }
    }
}

/// Strict majority of trees decides the positive class.
pub fn label_for(probability: f64) -> i32 {
    i32::from(probability > 0.5)
}

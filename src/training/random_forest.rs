//! Random forest classifier

use super::decision_tree::{Criterion, DecisionTree};
use crate::error::{Result, TransitError};
use ndarray::{Array1, Array2};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Bootstrap-aggregated classification forest.
///
/// Trees are built in parallel, each from its own ChaCha8 stream seeded by
/// `seed + tree index`, so the fitted forest is identical at any thread
/// count. With `balanced_weights` every class contributes equally to the
/// loss regardless of its raw frequency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub criterion: Criterion,
    pub seed: u64,
    pub balanced_weights: bool,
    n_classes: usize,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl RandomForest {
    pub fn new(n_estimators: usize, n_classes: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: Criterion::Gini,
            seed: 42,
            balanced_weights: true,
            n_classes,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth per tree
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set the base seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Toggle inverse-frequency class weighting
    pub fn with_balanced_weights(mut self, balanced: bool) -> Self {
        self.balanced_weights = balanced;
        self
    }

    /// Per-sample weights: `n / (k * n_c)` for balanced fitting, 1 otherwise
    fn sample_weights(&self, y: &Array1<f64>) -> Result<Vec<f64>> {
        if !self.balanced_weights {
            return Ok(vec![1.0; y.len()]);
        }

        let mut class_counts = vec![0usize; self.n_classes];
        for &label in y.iter() {
            let class = label as usize;
            if class >= self.n_classes {
                return Err(TransitError::ComputationError(format!(
                    "label {label} out of range for {} classes",
                    self.n_classes
                )));
            }
            class_counts[class] += 1;
        }

        let n = y.len() as f64;
        let k = class_counts.iter().filter(|&&c| c > 0).count() as f64;
        let class_weights: Vec<f64> = class_counts
            .iter()
            .map(|&c| if c > 0 { n / (k * c as f64) } else { 0.0 })
            .collect();

        Ok(y.iter().map(|&label| class_weights[label as usize]).collect())
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(TransitError::ShapeError {
                expected: format!("y length = {n_samples}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(TransitError::EmptyDataset);
        }

        self.n_features = x.ncols();
        let weights = self.sample_weights(y)?;
        let base_seed = self.seed;

        let trees: Vec<Result<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let sample_indices: Vec<usize> = (0..n_samples)
                    .map(|_| (rng.next_u64() as usize) % n_samples)
                    .collect();

                let x_boot = x.select(ndarray::Axis(0), &sample_indices);
                let y_boot: Array1<f64> =
                    Array1::from_vec(sample_indices.iter().map(|&i| y[i]).collect());
                let w_boot: Vec<f64> = sample_indices.iter().map(|&i| weights[i]).collect();

                let mut tree = DecisionTree::new(self.n_classes)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion);
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit(&x_boot, &y_boot, &w_boot)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees.into_iter().collect::<Result<Vec<_>>>()?;
        self.compute_feature_importances();

        Ok(self)
    }

    /// Average of per-tree normalized importances, renormalized to sum to 1
    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (i, &val) in imp.iter().enumerate() {
                    total[i] += val;
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        for imp in &mut total {
            *imp /= n_trees;
        }
        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            for imp in &mut total {
                *imp /= sum;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total));
    }

    /// Per-class vote shares, rows summing to 1
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(TransitError::ModelNotLoaded);
        }

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let n_samples = x.nrows();
        let mut proba = Array2::zeros((n_samples, self.n_classes));

        for preds in &all_predictions {
            for i in 0..n_samples {
                let class = preds[i] as usize;
                if class < self.n_classes {
                    proba[[i, class]] += 1.0;
                }
            }
        }

        let n_trees = all_predictions.len() as f64;
        proba.mapv_inplace(|v| v / n_trees);

        Ok(proba)
    }

    /// Majority-vote class indices; ties resolve to the lowest class index
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        let predictions: Vec<f64> = proba
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0usize;
                for (class, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = class;
                    }
                }
                best as f64
            })
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    /// Importance scores, one per trained feature, non-negative and summing
    /// to 1
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_cluster_data() -> (Array2<f64>, Array1<f64>) {
        (
            array![
                [0.0, 0.0],
                [0.1, 0.1],
                [0.2, 0.2],
                [0.3, 0.1],
                [1.0, 1.0],
                [1.1, 1.1],
                [1.2, 1.2],
                [1.3, 1.1],
            ],
            array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
        )
    }

    #[test]
    fn test_classifier_learns_clusters() {
        let (x, y) = two_cluster_data();
        let mut rf = RandomForest::new(10, 2).with_seed(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_proba_rows_sum_to_one() {
        let (x, y) = two_cluster_data();
        let mut rf = RandomForest::new(10, 2).with_seed(42);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = two_cluster_data();

        let mut a = RandomForest::new(20, 2).with_seed(7);
        a.fit(&x, &y).unwrap();
        let mut b = RandomForest::new(20, 2).with_seed(7);
        b.fit(&x, &y).unwrap();

        assert_eq!(
            a.feature_importances().unwrap(),
            b.feature_importances().unwrap()
        );
        assert_eq!(
            a.predict_proba(&x).unwrap(),
            b.predict_proba(&x).unwrap()
        );
    }

    #[test]
    fn test_balanced_weights_lift_minority_class() {
        // 10:2 imbalance; the minority cluster must still win its region
        let x = array![
            [0.0], [0.1], [0.2], [0.3], [0.4], [0.5], [0.6], [0.7], [0.8], [0.9],
            [5.0], [5.1],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0];

        let mut rf = RandomForest::new(30, 2).with_seed(42).with_max_depth(4);
        rf.fit(&x, &y).unwrap();

        let probe = array![[5.05]];
        assert_eq!(rf.predict(&probe).unwrap()[0], 1.0);
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = two_cluster_data();
        let mut rf = RandomForest::new(10, 2).with_seed(42);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!((importances.sum() - 1.0).abs() < 1e-9);
        assert!(importances.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let rf = RandomForest::new(10, 2);
        let x = array![[0.0, 0.0]];
        assert!(rf.predict(&x).is_err());
    }
}

//! Weighted classification tree

use crate::error::{Result, TransitError};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with the majority class index
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    Gini,
    Entropy,
}

/// CART classification tree with per-sample weights.
///
/// Class labels are indices `0..n_classes` encoded as f64. Sample weights
/// flow through impurity, leaf majorities, and importance accumulation;
/// sample-count stopping rules stay unweighted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub criterion: Criterion,
    n_features: usize,
    n_classes: usize,
    feature_importances: Option<Array1<f64>>,
}

impl DecisionTree {
    pub fn new(n_classes: usize) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: Criterion::Gini,
            n_features: 0,
            n_classes,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, weights: &[f64]) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() || n_samples != weights.len() {
            return Err(TransitError::ShapeError {
                expected: format!("y and weights of length {n_samples}"),
                actual: format!("y length {}, weights length {}", y.len(), weights.len()),
            });
        }
        if n_samples < self.min_samples_split {
            return Err(TransitError::DataError(format!(
                "need at least {} samples, got {}",
                self.min_samples_split, n_samples
            )));
        }

        self.n_features = n_features;

        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, weights, &indices, 0, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: &[f64],
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();

        let should_stop = n_samples < self.min_samples_split
            || n_samples <= self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
            || self.is_pure(y, indices);

        if should_stop {
            return TreeNode::Leaf {
                value: self.leaf_value(y, weights, indices),
                n_samples,
            };
        }

        if let Some((best_feature, best_threshold, best_gain)) =
            self.find_best_split(x, y, weights, indices)
        {
            let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[[i, best_feature]] <= best_threshold);

            if left_indices.len() < self.min_samples_leaf
                || right_indices.len() < self.min_samples_leaf
            {
                return TreeNode::Leaf {
                    value: self.leaf_value(y, weights, indices),
                    n_samples,
                };
            }

            let node_weight: f64 = indices.iter().map(|&i| weights[i]).sum();
            importances[best_feature] += node_weight * best_gain;

            let left = Box::new(self.build_tree(x, y, weights, &left_indices, depth + 1, importances));
            let right =
                Box::new(self.build_tree(x, y, weights, &right_indices, depth + 1, importances));

            TreeNode::Split {
                feature_idx: best_feature,
                threshold: best_threshold,
                left,
                right,
                n_samples,
                impurity: self.node_impurity(y, weights, indices),
            }
        } else {
            TreeNode::Leaf {
                value: self.leaf_value(y, weights, indices),
                n_samples,
            }
        }
    }

    /// Best (feature, threshold, impurity gain) over all features, or `None`
    /// when no split improves on the parent.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: &[f64],
        indices: &[usize],
    ) -> Option<(usize, f64, f64)> {
        let parent_impurity = self.node_impurity(y, weights, indices);

        // Each feature independently finds its best threshold
        let feature_results: Vec<Option<(usize, f64, f64)>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature_idx| {
                let mut values: Vec<f64> =
                    indices.iter().map(|&i| x[[i, feature_idx]]).collect();
                values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                values.dedup();

                let mut best_gain = 0.0f64;
                let mut best_threshold = 0.0f64;

                for window in values.windows(2) {
                    let threshold = (window[0] + window[1]) / 2.0;

                    let mut left_count = 0usize;
                    let mut right_count = 0usize;
                    let mut left_class_w = vec![0.0f64; self.n_classes];
                    let mut right_class_w = vec![0.0f64; self.n_classes];

                    for &idx in indices {
                        let class = y[idx] as usize;
                        if x[[idx, feature_idx]] <= threshold {
                            left_count += 1;
                            left_class_w[class] += weights[idx];
                        } else {
                            right_count += 1;
                            right_class_w[class] += weights[idx];
                        }
                    }

                    if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                        continue;
                    }

                    let left_w: f64 = left_class_w.iter().sum();
                    let right_w: f64 = right_class_w.iter().sum();
                    let total_w = left_w + right_w;
                    if total_w <= 0.0 {
                        continue;
                    }

                    let weighted_impurity = (left_w
                        * self.impurity_from_sums(&left_class_w, left_w)
                        + right_w * self.impurity_from_sums(&right_class_w, right_w))
                        / total_w;

                    let gain = parent_impurity - weighted_impurity;
                    if gain > best_gain {
                        best_gain = gain;
                        best_threshold = threshold;
                    }
                }

                if best_gain > 0.0 {
                    Some((feature_idx, best_threshold, best_gain))
                } else {
                    None
                }
            })
            .collect();

        feature_results
            .into_iter()
            .flatten()
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
    }

    fn impurity_from_sums(&self, class_w: &[f64], total_w: f64) -> f64 {
        if total_w <= 0.0 {
            return 0.0;
        }
        match self.criterion {
            Criterion::Gini => {
                let mut gini = 1.0;
                for &w in class_w {
                    let p = w / total_w;
                    gini -= p * p;
                }
                gini
            }
            Criterion::Entropy => {
                let mut entropy = 0.0;
                for &w in class_w {
                    if w > 0.0 {
                        let p = w / total_w;
                        entropy -= p * p.ln();
                    }
                }
                entropy
            }
        }
    }

    fn node_impurity(&self, y: &Array1<f64>, weights: &[f64], indices: &[usize]) -> f64 {
        let (class_w, total_w) = self.class_weight_sums(y, weights, indices);
        self.impurity_from_sums(&class_w, total_w)
    }

    fn class_weight_sums(
        &self,
        y: &Array1<f64>,
        weights: &[f64],
        indices: &[usize],
    ) -> (Vec<f64>, f64) {
        let mut class_w = vec![0.0f64; self.n_classes];
        for &idx in indices {
            class_w[y[idx] as usize] += weights[idx];
        }
        let total = class_w.iter().sum();
        (class_w, total)
    }

    fn is_pure(&self, y: &Array1<f64>, indices: &[usize]) -> bool {
        match indices.first() {
            None => true,
            Some(&first) => indices.iter().all(|&i| y[i] == y[first]),
        }
    }

    /// Majority class by weight sum; ties resolve to the lowest class index
    fn leaf_value(&self, y: &Array1<f64>, weights: &[f64], indices: &[usize]) -> f64 {
        let (class_w, _) = self.class_weight_sums(y, weights, indices);
        let mut best = 0usize;
        for (class, &w) in class_w.iter().enumerate() {
            if w > class_w[best] {
                best = class;
            }
        }
        best as f64
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(TransitError::ModelNotLoaded)?;

        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let sample = x.row(i).to_vec();
                Self::predict_sample(root, &sample)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    fn predict_sample(node: &TreeNode, sample: &[f64]) -> f64 {
        match node {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if sample[*feature_idx] <= *threshold {
                    Self::predict_sample(left, sample)
                } else {
                    Self::predict_sample(right, sample)
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map(node_depth).unwrap_or(0)
    }
}

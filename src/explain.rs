//! Global feature-importance explanations
//!
//! The reported ranking is exactly what the model computed: `focus_rank`
//! filters and re-orders but never rescales or renormalizes, so a number in
//! the focus table can be traced verbatim to the full ranking.

use crate::error::{Result, TransitError};
use crate::training::RandomForest;
use serde::{Deserialize, Serialize};

/// One (feature, importance) entry of a ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Derives global rankings from a trained model
pub struct Explainer;

impl Explainer {
    /// Full ranking: the model's intrinsic per-feature importance scores
    /// (non-negative, summing to 1 across all trained features), paired with
    /// the trained feature names and sorted descending. Ties keep training
    /// feature order.
    pub fn rank(model: &RandomForest, feature_names: &[String]) -> Result<Vec<FeatureImportance>> {
        let importances = model
            .feature_importances()
            .ok_or(TransitError::ModelNotLoaded)?;

        if importances.len() != feature_names.len() {
            return Err(TransitError::ShapeError {
                expected: format!("{} feature names", importances.len()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }

        let mut ranking: Vec<FeatureImportance> = feature_names
            .iter()
            .zip(importances.iter())
            .map(|(feature, &importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();

        ranking.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(ranking)
    }

    /// Project a full ranking onto the focus-feature set.
    ///
    /// Importance values are carried over verbatim; entries are re-sorted
    /// descending with ties broken by the focus declaration order. A focus
    /// feature absent from the full ranking (dropped during preprocessing)
    /// is a defect, never silently omitted.
    pub fn focus_rank(
        full_ranking: &[FeatureImportance],
        focus_features: &[String],
    ) -> Result<Vec<FeatureImportance>> {
        let mut focused = Vec::with_capacity(focus_features.len());
        for feature in focus_features {
            let entry = full_ranking
                .iter()
                .find(|fi| &fi.feature == feature)
                .ok_or_else(|| TransitError::MissingFocusFeature(feature.clone()))?;
            focused.push(entry.clone());
        }

        // Stable sort: equal importances keep declaration order
        focused.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(focused)
    }

    /// Human-readable ranking table (feature, importance, descending), the
    /// second artifact a training run writes
    pub fn ranking_table(ranking: &[FeatureImportance]) -> String {
        let mut out = String::from("feature,importance\n");
        for entry in ranking {
            out.push_str(&format!("{},{:.6}\n", entry.feature, entry.importance));
        }
        out
    }
}

//! Held-out evaluation

use crate::error::{Result, TransitError};
use crate::schema::Disposition;
use crate::training::RandomForest;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Accuracy and confusion matrix over a held-out split.
///
/// Confusion rows are the true label, columns the predicted label, both in
/// the schema's fixed label enumeration order so reports diff cleanly
/// across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub confusion_matrix: Vec<Vec<u64>>,
    pub labels: Vec<String>,
    pub n_test_rows: usize,
}

impl EvaluationReport {
    /// True-label row count for one class
    pub fn class_total(&self, class: Disposition) -> u64 {
        self.confusion_matrix[class.index()].iter().sum()
    }
}

/// Stateless evaluator
pub struct Evaluator;

impl Evaluator {
    /// Score a fitted model on a held-out matrix. Pure: no side effects, no
    /// mutation of the model.
    pub fn evaluate(
        model: &RandomForest,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<EvaluationReport> {
        if y_test.is_empty() {
            return Err(TransitError::EmptyDataset);
        }
        if x_test.nrows() != y_test.len() {
            return Err(TransitError::ShapeError {
                expected: format!("{} labels", x_test.nrows()),
                actual: format!("{} labels", y_test.len()),
            });
        }

        let predictions = model.predict(x_test)?;

        let n_labels = Disposition::ALL.len();
        let mut confusion = vec![vec![0u64; n_labels]; n_labels];
        let mut correct = 0usize;

        for (truth, pred) in y_test.iter().zip(predictions.iter()) {
            let t = *truth as usize;
            let p = *pred as usize;
            if t >= n_labels || p >= n_labels {
                return Err(TransitError::ComputationError(format!(
                    "label index out of range: true {t}, predicted {p}"
                )));
            }
            confusion[t][p] += 1;
            if t == p {
                correct += 1;
            }
        }

        Ok(EvaluationReport {
            accuracy: correct as f64 / y_test.len() as f64,
            confusion_matrix: confusion,
            labels: Disposition::ALL.iter().map(|d| d.as_str().to_string()).collect(),
            n_test_rows: y_test.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn fitted_model() -> (RandomForest, Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0], [0.1], [0.2], [0.3],
            [5.0], [5.1], [5.2], [5.3],
            [9.0], [9.1], [9.2], [9.3],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0];
        let mut rf = RandomForest::new(15, 3).with_seed(42).with_max_depth(5);
        rf.fit(&x, &y).unwrap();
        (rf, x, y)
    }

    #[test]
    fn test_row_sums_match_class_counts() {
        let (model, x, y) = fitted_model();
        let report = Evaluator::evaluate(&model, &x, &y).unwrap();

        assert_eq!(report.class_total(Disposition::Confirmed), 4);
        assert_eq!(report.class_total(Disposition::Candidate), 4);
        assert_eq!(report.class_total(Disposition::FalsePositive), 4);
    }

    #[test]
    fn test_perfect_separation_scores_one() {
        let (model, x, y) = fitted_model();
        let report = Evaluator::evaluate(&model, &x, &y).unwrap();

        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.n_test_rows, 12);
        for (i, row) in report.confusion_matrix.iter().enumerate() {
            for (j, &count) in row.iter().enumerate() {
                assert_eq!(count, if i == j { 4 } else { 0 });
            }
        }
    }

    #[test]
    fn test_label_order_is_fixed() {
        let (model, x, y) = fitted_model();
        let report = Evaluator::evaluate(&model, &x, &y).unwrap();
        assert_eq!(report.labels, vec!["confirmed", "candidate", "false_positive"]);
    }

    #[test]
    fn test_empty_test_set_is_an_error() {
        let (model, _, _) = fitted_model();
        let x = Array2::<f64>::zeros((0, 1));
        let y = Array1::<f64>::zeros(0);
        assert!(Evaluator::evaluate(&model, &x, &y).is_err());
    }
}

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::task::TaskKind;

/// Maps labels to the score matrices estimators produce, and back.
///
/// Single-label classification scores have one column per class.
/// Multilabel scores have one column per label and regression scores
/// one column per output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEncoding {
    pub task: TaskKind,
    pub classes: Vec<f64>,
    pub label_columns: usize,
}

impl TargetEncoding {
    pub fn new(task: TaskKind, classes: Vec<f64>, label_columns: usize) -> Self {
        Self {
            task,
            classes,
            label_columns,
        }
    }

    /// The number of score columns.
    pub fn width(&self) -> usize {
        if self.task.is_single_label_classification() {
            self.classes.len().max(1)
        } else {
            self.label_columns
        }
    }

    /// Encodes labels as target scores.
    /// Class values outside the known classes encode as all-zero rows.
    pub fn encode(&self, labels: ArrayView2<f64>) -> Array2<f64> {
        if !self.task.is_single_label_classification() {
            return labels.to_owned();
        }
        let mut out = Array2::zeros((labels.nrows(), self.width()));
        for (i, value) in labels.column(0).iter().enumerate() {
            if let Some(k) = self.class_index(*value) {
                out[[i, k]] = 1.0;
            }
        }
        out
    }

    /// Decodes score matrices into labels in the original layout.
    pub fn decode(&self, scores: ArrayView2<f64>) -> Array2<f64> {
        match self.task {
            TaskKind::BinaryClassification | TaskKind::MulticlassClassification => {
                let fallback = self.classes.first().copied().unwrap_or(0.0);
                Array2::from_shape_fn((scores.nrows(), 1), |(i, _)| {
                    let row = scores.row(i);
                    let mut best = 0;
                    for (k, &v) in row.iter().enumerate() {
                        if v > row[best] {
                            best = k;
                        }
                    }
                    self.classes.get(best).copied().unwrap_or(fallback)
                })
            }
            TaskKind::MultilabelClassification => scores.mapv(|v| if v >= 0.5 { 1.0 } else { 0.0 }),
            TaskKind::Regression => scores.to_owned(),
        }
    }

    pub fn class_index(&self, value: f64) -> Option<usize> {
        self.classes.iter().position(|&c| c == value)
    }
}

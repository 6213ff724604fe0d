use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::error::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    BinaryClassification,
    MulticlassClassification,
    MultilabelClassification,
    Regression,
}

impl TaskKind {
    pub fn is_classification(&self) -> bool {
        !matches!(self, TaskKind::Regression)
    }

    /// Whether the labels form a single column of class values.
    pub fn is_single_label_classification(&self) -> bool {
        matches!(
            self,
            TaskKind::BinaryClassification | TaskKind::MulticlassClassification
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::BinaryClassification => "binary.classification",
            TaskKind::MulticlassClassification => "multiclass.classification",
            TaskKind::MultilabelClassification => "multilabel.classification",
            TaskKind::Regression => "regression",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], ".").as_str() {
            "binary.classification" | "binary" => Ok(TaskKind::BinaryClassification),
            "multiclass.classification" | "multiclass" => Ok(TaskKind::MulticlassClassification),
            "multilabel.classification" | "multilabel" => Ok(TaskKind::MultilabelClassification),
            "regression" => Ok(TaskKind::Regression),
            other => Err(DataError::invalid(format!("unknown task: {other}"))),
        }
    }
}

/// A key that identifies a label value. `-0.0` and `0.0` share a key.
pub(crate) fn label_key(value: f64) -> u64 {
    (value + 0.0).to_bits()
}

/// The facts about a label matrix that task inference depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSummary {
    pub rows: usize,
    pub columns: usize,
    /// The number of distinct values across all label columns.
    pub distinct_values: usize,
    /// Whether any label value is non-integral.
    pub continuous: bool,
    /// Whether every label value is 0 or 1.
    pub indicator: bool,
}

impl LabelSummary {
    pub fn from_labels(labels: ArrayView2<f64>) -> Self {
        let mut distinct = BTreeSet::new();
        let mut continuous = false;
        let mut indicator = true;
        for &value in labels.iter() {
            if value.fract() != 0.0 {
                continuous = true;
            }
            if value != 0.0 && value != 1.0 {
                indicator = false;
            }
            distinct.insert(label_key(value));
        }
        Self {
            rows: labels.nrows(),
            columns: labels.ncols(),
            distinct_values: distinct.len(),
            continuous,
            indicator,
        }
    }
}

/// Infers the task from a label summary.
///
/// A multi-column 0/1 layout is multilabel even when it is also two-valued;
/// any other multi-column layout is multi-output regression.
/// A single column is regression when any value is non-integral,
/// multiclass when there are more than two distinct values, and binary otherwise.
pub fn infer_task_kind(summary: &LabelSummary) -> TaskKind {
    if summary.columns > 1 {
        if summary.indicator {
            TaskKind::MultilabelClassification
        } else {
            TaskKind::Regression
        }
    } else if summary.continuous {
        TaskKind::Regression
    } else if summary.distinct_values > 2 {
        TaskKind::MulticlassClassification
    } else {
        TaskKind::BinaryClassification
    }
}

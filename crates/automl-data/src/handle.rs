use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};
use crate::split::{SplitOptions, Splits};
use crate::target::TargetEncoding;
use crate::task::{infer_task_kind, LabelSummary, TaskKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    Numerical,
    Categorical,
    Binary,
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureType::Numerical => write!(f, "Numerical"),
            FeatureType::Categorical => write!(f, "Categorical"),
            FeatureType::Binary => write!(f, "Binary"),
        }
    }
}

impl FromStr for FeatureType {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numerical" => Ok(FeatureType::Numerical),
            "categorical" => Ok(FeatureType::Categorical),
            "binary" => Ok(FeatureType::Binary),
            other => Err(DataError::format(format!("unknown feature type: {other}"))),
        }
    }
}

/// The raw arrays of a dataset before validation.
#[derive(Debug, Clone, Default)]
pub struct DatasetParts {
    pub dataset_id: String,
    pub x_train: Array2<f64>,
    pub y_train: Array2<f64>,
    pub x_valid: Option<Array2<f64>>,
    pub x_test: Option<Array2<f64>>,
    pub y_test: Option<Array2<f64>>,
    pub feature_types: Option<Vec<FeatureType>>,
    pub task: Option<TaskKind>,
    pub metric: Option<String>,
}

/// A validated dataset with its task and holdout split.
///
/// Label matrices always have one row per sample. Single-label classification
/// labels have exactly one column holding the class value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetHandle {
    pub dataset_id: String,
    pub task: TaskKind,
    pub x_train: Array2<f64>,
    pub y_train: Array2<f64>,
    pub x_valid: Option<Array2<f64>>,
    pub x_test: Option<Array2<f64>>,
    pub y_test: Option<Array2<f64>>,
    pub feature_types: Vec<FeatureType>,
    /// The sorted distinct class values for single-label classification.
    pub classes: Vec<f64>,
    pub splits: Splits,
    pub metric: Option<String>,
}

impl DatasetHandle {
    pub fn try_new(parts: DatasetParts, options: &SplitOptions) -> DataResult<Self> {
        let DatasetParts {
            dataset_id,
            x_train,
            y_train,
            x_valid,
            x_test,
            y_test,
            feature_types,
            task,
            metric,
        } = parts;

        if x_train.nrows() == 0 {
            return Err(DataError::empty(format!("no training rows in {dataset_id}")));
        }
        if x_train.ncols() == 0 {
            return Err(DataError::format(format!("no feature columns in {dataset_id}")));
        }
        if y_train.nrows() != x_train.nrows() {
            return Err(DataError::format(format!(
                "{} feature rows but {} label rows in {dataset_id}",
                x_train.nrows(),
                y_train.nrows()
            )));
        }
        if y_train.ncols() == 0 {
            return Err(DataError::format(format!("no label columns in {dataset_id}")));
        }
        check_finite(x_train.view(), "training features")?;
        check_finite(y_train.view(), "training labels")?;
        let columns = x_train.ncols();
        for (name, x) in [("validation", &x_valid), ("test", &x_test)] {
            if let Some(x) = x {
                if x.nrows() > 0 && x.ncols() != columns {
                    return Err(DataError::format(format!(
                        "{name} features have {} columns, expected {columns}",
                        x.ncols()
                    )));
                }
                check_finite(x.view(), name)?;
            }
        }
        if let (Some(x), Some(y)) = (&x_test, &y_test) {
            if x.nrows() != y.nrows() {
                return Err(DataError::format(format!(
                    "{} test feature rows but {} test label rows",
                    x.nrows(),
                    y.nrows()
                )));
            }
        }

        let feature_types = match feature_types {
            Some(types) if types.len() != columns => {
                return Err(DataError::format(format!(
                    "{} feature types for {columns} feature columns",
                    types.len()
                )));
            }
            Some(types) => types,
            None => vec![FeatureType::Numerical; columns],
        };

        let task = match task {
            Some(task) => task,
            None => infer_task_kind(&LabelSummary::from_labels(y_train.view())),
        };
        let y_train = normalize_labels(y_train, task)?;
        let y_test = y_test.map(|y| normalize_labels(y, task)).transpose()?;
        let classes = if task.is_single_label_classification() {
            distinct_values(y_train.view())
        } else {
            vec![]
        };
        let splits = Splits::holdout(y_train.view(), task, options);

        Ok(Self {
            dataset_id,
            task,
            x_train,
            y_train,
            x_valid,
            x_test,
            y_test,
            feature_types,
            classes,
            splits,
            metric,
        })
    }

    pub fn n_features(&self) -> usize {
        self.x_train.ncols()
    }

    pub fn n_rows(&self) -> usize {
        self.x_train.nrows()
    }

    pub fn target_encoding(&self) -> TargetEncoding {
        TargetEncoding::new(self.task, self.classes.clone(), self.y_train.ncols())
    }

    pub fn train_rows(&self) -> (Array2<f64>, Array2<f64>) {
        self.select_rows(&self.splits.train)
    }

    pub fn evaluation_rows(&self) -> (Array2<f64>, Array2<f64>) {
        self.select_rows(self.splits.evaluation_rows())
    }

    /// Brings caller-supplied labels into the layout of the training labels.
    pub fn normalize_labels(&self, labels: Array2<f64>) -> DataResult<Array2<f64>> {
        normalize_labels(labels, self.task)
    }

    pub fn select_rows(&self, rows: &[usize]) -> (Array2<f64>, Array2<f64>) {
        (
            self.x_train.select(Axis(0), rows),
            self.y_train.select(Axis(0), rows),
        )
    }
}

fn check_finite(values: ArrayView2<f64>, name: &str) -> DataResult<()> {
    match values.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((row, column), value)) => Err(DataError::format(format!(
            "non-finite value {value} in {name} at row {row}, column {column}"
        ))),
        None => Ok(()),
    }
}

/// Brings labels into the layout the task expects.
/// One-hot single-label rows become a class index column.
fn normalize_labels(labels: Array2<f64>, task: TaskKind) -> DataResult<Array2<f64>> {
    match task {
        TaskKind::BinaryClassification | TaskKind::MulticlassClassification => {
            let labels = if labels.ncols() > 1 {
                let values = labels
                    .rows()
                    .into_iter()
                    .map(|row| {
                        row.iter()
                            .enumerate()
                            .fold((0, f64::NEG_INFINITY), |(best, max), (i, &v)| {
                                if v > max {
                                    (i, v)
                                } else {
                                    (best, max)
                                }
                            })
                            .0 as f64
                    })
                    .collect::<Vec<_>>();
                Array2::from_shape_vec((values.len(), 1), values)
                    .map_err(|e| DataError::internal(e.to_string()))?
            } else {
                labels
            };
            if labels.iter().any(|v| v.fract() != 0.0) {
                return Err(DataError::format(format!(
                    "non-integral class labels for {task}"
                )));
            }
            Ok(labels)
        }
        TaskKind::MultilabelClassification => {
            if labels.iter().any(|&v| v != 0.0 && v != 1.0) {
                return Err(DataError::format(
                    "multilabel labels must be 0 or 1".to_string(),
                ));
            }
            Ok(labels)
        }
        TaskKind::Regression => Ok(labels),
    }
}

fn distinct_values(labels: ArrayView2<f64>) -> Vec<f64> {
    let set: BTreeSet<i64> = labels.iter().map(|v| *v as i64).collect();
    set.into_iter().map(|v| v as f64).collect()
}

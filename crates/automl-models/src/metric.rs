use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use automl_data::target::TargetEncoding;
use automl_data::task::TaskKind;
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// A score where greater is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// The fraction of matching label cells. For multilabel tasks this is the Hamming accuracy.
    Accuracy,
    /// The mean per-class recall, averaged over label columns.
    BalancedAccuracy,
    /// The coefficient of determination, averaged over outputs.
    R2,
}

impl Metric {
    pub fn default_for(task: TaskKind) -> Self {
        if task.is_classification() {
            Metric::Accuracy
        } else {
            Metric::R2
        }
    }

    pub fn supports(&self, task: TaskKind) -> bool {
        match self {
            Metric::Accuracy | Metric::BalancedAccuracy => task.is_classification(),
            Metric::R2 => !task.is_classification(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::BalancedAccuracy => "balanced_accuracy",
            Metric::R2 => "r2",
        }
    }

    /// Scores predicted score matrices against labels.
    pub fn score(
        &self,
        encoding: &TargetEncoding,
        labels: ArrayView2<f64>,
        scores: ArrayView2<f64>,
    ) -> ModelResult<f64> {
        let predicted = encoding.decode(scores);
        self.score_labels(labels, predicted.view())
    }

    pub fn score_labels(
        &self,
        expected: ArrayView2<f64>,
        predicted: ArrayView2<f64>,
    ) -> ModelResult<f64> {
        if expected.dim() != predicted.dim() {
            return Err(ModelError::invalid(format!(
                "label shape {:?} does not match prediction shape {:?}",
                expected.dim(),
                predicted.dim()
            )));
        }
        if expected.is_empty() {
            return Err(ModelError::invalid("cannot score empty labels"));
        }
        let score = match self {
            Metric::Accuracy => {
                let hits = expected
                    .iter()
                    .zip(predicted.iter())
                    .filter(|(a, b)| a == b)
                    .count();
                hits as f64 / expected.len() as f64
            }
            Metric::BalancedAccuracy => {
                let columns = expected.ncols();
                (0..columns)
                    .map(|j| balanced_accuracy(expected.column(j), predicted.column(j)))
                    .sum::<f64>()
                    / columns as f64
            }
            Metric::R2 => {
                let columns = expected.ncols();
                (0..columns)
                    .map(|j| r2(expected.column(j), predicted.column(j)))
                    .sum::<f64>()
                    / columns as f64
            }
        };
        Ok(score)
    }
}

fn balanced_accuracy(
    expected: ArrayView1<f64>,
    predicted: ArrayView1<f64>,
) -> f64 {
    let classes: BTreeSet<u64> = expected.iter().map(|v| v.to_bits()).collect();
    let recalls = classes.iter().map(|&class| {
        let (hits, total) = expected
            .iter()
            .zip(predicted.iter())
            .filter(|(e, _)| e.to_bits() == class)
            .fold((0usize, 0usize), |(hits, total), (e, p)| {
                (hits + usize::from(e == p), total + 1)
            });
        hits as f64 / total as f64
    });
    recalls.sum::<f64>() / classes.len() as f64
}

fn r2(expected: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    let mean = expected.sum() / expected.len() as f64;
    let residual: f64 = expected
        .iter()
        .zip(predicted.iter())
        .map(|(e, p)| (e - p) * (e - p))
        .sum();
    let total: f64 = expected.iter().map(|e| (e - mean) * (e - mean)).sum();
    if total == 0.0 {
        if residual == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - residual / total
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Metric {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.strip_suffix("_metric").unwrap_or(&name) {
            "acc" | "accuracy" => Ok(Metric::Accuracy),
            "bac" | "balanced_accuracy" => Ok(Metric::BalancedAccuracy),
            "r2" => Ok(Metric::R2),
            other => Err(ModelError::invalid(format!("unknown metric: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_accuracy() {
        let expected = array![[0.0], [1.0], [1.0], [2.0]];
        let predicted = array![[0.0], [1.0], [0.0], [2.0]];
        let score = Metric::Accuracy
            .score_labels(expected.view(), predicted.view())
            .unwrap();
        assert_eq!(score, 0.75);

        let expected = array![[0.0, 1.0], [1.0, 1.0]];
        let predicted = array![[0.0, 0.0], [1.0, 1.0]];
        let score = Metric::Accuracy
            .score_labels(expected.view(), predicted.view())
            .unwrap();
        assert_eq!(score, 0.75);
    }

    #[test]
    fn test_balanced_accuracy() {
        let expected = array![[0.0], [0.0], [0.0], [1.0]];
        let predicted = array![[0.0], [0.0], [0.0], [0.0]];
        let score = Metric::BalancedAccuracy
            .score_labels(expected.view(), predicted.view())
            .unwrap();
        assert_eq!(score, 0.5);
    }

    #[test]
    fn test_r2() {
        let expected = array![[1.0], [2.0], [3.0]];
        let score = Metric::R2
            .score_labels(expected.view(), expected.view())
            .unwrap();
        assert_eq!(score, 1.0);
        let predicted = array![[2.0], [2.0], [2.0]];
        let score = Metric::R2
            .score_labels(expected.view(), predicted.view())
            .unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_score_decodes_predictions() {
        let encoding = TargetEncoding::new(TaskKind::BinaryClassification, vec![3.0, 7.0], 1);
        let labels = array![[3.0], [7.0]];
        let scores = array![[0.9, 0.1], [0.4, 0.6]];
        let score = Metric::Accuracy
            .score(&encoding, labels.view(), scores.view())
            .unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_metric_parse_and_support() {
        assert_eq!("bac_metric".parse::<Metric>().unwrap(), Metric::BalancedAccuracy);
        assert_eq!("Accuracy".parse::<Metric>().unwrap(), Metric::Accuracy);
        assert_eq!("r2_metric".parse::<Metric>().unwrap(), Metric::R2);
        assert!("auc_metric".parse::<Metric>().is_err());
        assert!(Metric::R2.supports(TaskKind::Regression));
        assert!(!Metric::R2.supports(TaskKind::BinaryClassification));
        assert_eq!(Metric::default_for(TaskKind::Regression), Metric::R2);
        assert_eq!(
            Metric::default_for(TaskKind::MultilabelClassification),
            Metric::Accuracy
        );
    }

    #[test]
    fn test_score_shape_mismatch() {
        let expected = array![[0.0], [1.0]];
        let predicted = array![[0.0]];
        assert!(Metric::Accuracy
            .score_labels(expected.view(), predicted.view())
            .is_err());
    }
}

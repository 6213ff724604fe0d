use std::collections::BTreeMap;

use ndarray::ArrayView2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::task::{label_key, TaskKind};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitOptions {
    pub holdout_fraction: f64,
    pub split_seed: u64,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            holdout_fraction: 0.33,
            split_seed: 1,
        }
    }
}

/// Row indices of the training data used for fitting candidates
/// and for scoring them on held-out rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Splits {
    pub train: Vec<usize>,
    pub holdout: Vec<usize>,
}

impl Splits {
    /// Computes a seeded holdout split.
    /// Single-label classification is stratified by class and every class
    /// keeps at least one training row.
    pub fn holdout(labels: ArrayView2<f64>, task: TaskKind, options: &SplitOptions) -> Self {
        let rows = labels.nrows();
        let groups: Vec<Vec<usize>> = if task.is_single_label_classification() && labels.ncols() == 1 {
            let mut groups: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
            for (i, value) in labels.column(0).iter().enumerate() {
                groups.entry(label_key(*value)).or_default().push(i);
            }
            groups.into_values().collect()
        } else {
            vec![(0..rows).collect()]
        };

        let mut rng = ChaCha8Rng::seed_from_u64(options.split_seed);
        let mut train = Vec::with_capacity(rows);
        let mut holdout = Vec::new();
        for mut group in groups {
            group.shuffle(&mut rng);
            let count = (group.len() as f64 * options.holdout_fraction).round() as usize;
            let count = count.min(group.len().saturating_sub(1));
            holdout.extend_from_slice(&group[..count]);
            train.extend_from_slice(&group[count..]);
        }
        train.sort_unstable();
        holdout.sort_unstable();
        Self { train, holdout }
    }

    /// The rows a candidate is scored on.
    /// Tiny datasets without holdout rows are scored on the training rows.
    pub fn evaluation_rows(&self) -> &[usize] {
        if self.holdout.is_empty() {
            &self.train
        } else {
            &self.holdout
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    #[test]
    fn test_holdout_split_is_stratified_and_deterministic() {
        let labels = Array2::from_shape_fn((90, 1), |(i, _)| (i % 3) as f64);
        let options = SplitOptions::default();
        let splits = Splits::holdout(labels.view(), TaskKind::MulticlassClassification, &options);
        assert_eq!(splits.train.len() + splits.holdout.len(), 90);
        assert_eq!(splits.holdout.len(), 30);
        for class in 0..3 {
            let count = splits
                .holdout
                .iter()
                .filter(|&&i| labels[[i, 0]] as usize == class)
                .count();
            assert_eq!(count, 10);
        }
        let again = Splits::holdout(labels.view(), TaskKind::MulticlassClassification, &options);
        assert_eq!(splits, again);
    }

    #[test]
    fn test_holdout_split_groups_negative_zero_with_zero() {
        let labels = Array2::from_shape_fn((40, 1), |(i, _)| (i % 2) as f64);
        let signed = Array2::from_shape_fn((40, 1), |(i, _)| match i % 4 {
            0 => -0.0,
            2 => 0.0,
            _ => 1.0,
        });
        let options = SplitOptions::default();
        assert_eq!(
            Splits::holdout(signed.view(), TaskKind::BinaryClassification, &options),
            Splits::holdout(labels.view(), TaskKind::BinaryClassification, &options)
        );
    }

    #[test]
    fn test_holdout_split_keeps_training_rows() {
        let labels = Array2::from_shape_vec((3, 1), vec![0.0, 1.0, 1.0]).unwrap();
        let options = SplitOptions {
            holdout_fraction: 0.9,
            split_seed: 7,
        };
        let splits = Splits::holdout(labels.view(), TaskKind::BinaryClassification, &options);
        assert!(splits.train.contains(&0));
        assert!(splits.train.iter().any(|&i| i > 0));
    }

    #[test]
    fn test_evaluation_rows_fall_back_to_train() {
        let labels = Array2::from_shape_vec((1, 1), vec![3.5]).unwrap();
        let splits = Splits::holdout(labels.view(), TaskKind::Regression, &SplitOptions::default());
        assert!(splits.holdout.is_empty());
        assert_eq!(splits.evaluation_rows(), &[0]);
    }
}

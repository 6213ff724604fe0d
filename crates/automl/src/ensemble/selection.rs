use automl_data::target::TargetEncoding;
use automl_execution::id::ConfigurationId;
use automl_models::metric::Metric;
use ndarray::{Array2, ArrayView2};

use crate::error::{AutoMlError, AutoMlResult};

/// The holdout predictions of one successful candidate.
pub struct SelectionCandidate<'a> {
    pub configuration_id: ConfigurationId,
    pub predictions: ArrayView2<'a, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// The selected candidates with their weights, in candidate order.
    pub weights: Vec<(ConfigurationId, f64)>,
    /// The holdout score of the weighted average of the selected predictions.
    pub score: f64,
}

/// Greedy forward selection with replacement.
///
/// Each round adds the candidate that maximizes the score of the averaged
/// predictions. Ties go to the earlier candidate. The weight of a candidate
/// is the number of rounds it was selected in divided by the number of rounds.
pub fn select_greedy(
    candidates: &[SelectionCandidate<'_>],
    encoding: &TargetEncoding,
    labels: ArrayView2<f64>,
    metric: Metric,
    rounds: usize,
) -> AutoMlResult<Selection> {
    let Some(first) = candidates.first() else {
        return Err(AutoMlError::invalid("no candidates for ensemble selection"));
    };
    if rounds == 0 {
        return Err(AutoMlError::invalid("ensemble size must be positive"));
    }
    let shape = first.predictions.dim();
    if let Some(c) = candidates.iter().find(|c| c.predictions.dim() != shape) {
        return Err(AutoMlError::invalid(format!(
            "predictions of {} have shape {:?}, expected {shape:?}",
            c.configuration_id,
            c.predictions.dim()
        )));
    }

    let mut sum = Array2::<f64>::zeros(shape);
    let mut counts = vec![0usize; candidates.len()];
    let mut score = f64::NEG_INFINITY;
    for round in 1..=rounds {
        let mut best: Option<(usize, f64)> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            let trial = (&sum + &candidate.predictions) / round as f64;
            let s = metric.score(encoding, labels, trial.view())?;
            if best.map_or(true, |(_, b)| s > b) {
                best = Some((i, s));
            }
        }
        if let Some((i, s)) = best {
            sum += &candidates[i].predictions;
            counts[i] += 1;
            score = s;
        }
    }
    let weights = candidates
        .iter()
        .zip(counts)
        .filter(|(_, n)| *n > 0)
        .map(|(c, n)| (c.configuration_id, n as f64 / rounds as f64))
        .collect();
    Ok(Selection { weights, score })
}

#[cfg(test)]
mod tests {
    use automl_data::task::TaskKind;
    use ndarray::array;

    use super::*;

    fn encoding() -> TargetEncoding {
        TargetEncoding::new(TaskKind::BinaryClassification, vec![0.0, 1.0], 1)
    }

    #[test]
    fn test_select_best_single_candidate() {
        let labels = array![[0.0], [1.0], [1.0], [0.0]];
        let constant = array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [1.0, 0.0]];
        let perfect = array![[0.9, 0.1], [0.2, 0.8], [0.3, 0.7], [0.6, 0.4]];
        let candidates = [
            SelectionCandidate {
                configuration_id: ConfigurationId::DUMMY,
                predictions: constant.view(),
            },
            SelectionCandidate {
                configuration_id: ConfigurationId::from(2),
                predictions: perfect.view(),
            },
        ];
        let selection =
            select_greedy(&candidates, &encoding(), labels.view(), Metric::Accuracy, 10).unwrap();
        assert_eq!(selection.score, 1.0);
        assert_eq!(selection.weights, vec![(ConfigurationId::from(2), 1.0)]);
    }

    #[test]
    fn test_select_combines_complementary_candidates() {
        // Each candidate alone misses one row that the other gets right.
        let labels = array![[0.0], [1.0], [1.0]];
        let a = array![[1.0, 0.0], [0.0, 1.0], [0.6, 0.4]];
        let b = array![[0.4, 0.6], [0.0, 1.0], [0.0, 1.0]];
        let candidates = [
            SelectionCandidate {
                configuration_id: ConfigurationId::from(2),
                predictions: a.view(),
            },
            SelectionCandidate {
                configuration_id: ConfigurationId::from(3),
                predictions: b.view(),
            },
        ];
        let selection =
            select_greedy(&candidates, &encoding(), labels.view(), Metric::Accuracy, 2).unwrap();
        assert_eq!(selection.score, 1.0);
        assert_eq!(
            selection.weights,
            vec![(ConfigurationId::from(2), 0.5), (ConfigurationId::from(3), 0.5)]
        );
    }

    #[test]
    fn test_select_rejects_bad_input() {
        let labels = array![[0.0]];
        let a = array![[1.0, 0.0]];
        let b = array![[1.0, 0.0, 0.0]];
        assert!(select_greedy(&[], &encoding(), labels.view(), Metric::Accuracy, 1).is_err());
        let candidates = [
            SelectionCandidate {
                configuration_id: ConfigurationId::from(2),
                predictions: a.view(),
            },
            SelectionCandidate {
                configuration_id: ConfigurationId::from(3),
                predictions: b.view(),
            },
        ];
        assert!(
            select_greedy(&candidates, &encoding(), labels.view(), Metric::Accuracy, 1).is_err()
        );
        assert!(
            select_greedy(&candidates[..1], &encoding(), labels.view(), Metric::Accuracy, 0)
                .is_err()
        );
    }
}

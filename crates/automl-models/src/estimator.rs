use automl_data::target::TargetEncoding;
use automl_data::task::TaskKind;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::configuration::{Algorithm, Configuration};
use crate::error::{ModelError, ModelResult};
use crate::linalg::solve;
use crate::preprocessing::Standardizer;

const MIN_VARIANCE: f64 = 1e-9;

/// How linear scores are mapped to predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    Identity,
    /// Clips indicator regression scores to `[0, 1]`.
    Clip,
    Softmax,
    Sigmoid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum FittedEstimator {
    Constant {
        scores: Array1<f64>,
    },
    KNearestNeighbors {
        neighbors: usize,
        distance_weighted: bool,
        x: Array2<f64>,
        targets: Array2<f64>,
    },
    NearestCentroid {
        centroids: Array2<f64>,
        present: Vec<bool>,
    },
    GaussianNaiveBayes {
        means: Array2<f64>,
        variances: Array2<f64>,
        log_priors: Vec<Option<f64>>,
    },
    Linear {
        weights: Array2<f64>,
        intercept: Array1<f64>,
        link: Link,
    },
}

/// A fitted candidate pipeline that produces score matrices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub configuration: Configuration,
    pub encoding: TargetEncoding,
    features: usize,
    standardizer: Option<Standardizer>,
    estimator: FittedEstimator,
}

impl FittedModel {
    pub fn fit(
        configuration: &Configuration,
        encoding: &TargetEncoding,
        x: ArrayView2<f64>,
        labels: ArrayView2<f64>,
    ) -> ModelResult<Self> {
        let task = encoding.task;
        if !configuration.supports(task) {
            return Err(ModelError::invalid(format!(
                "{configuration} does not support {task}"
            )));
        }
        if x.nrows() == 0 {
            return Err(ModelError::invalid("cannot fit on zero rows"));
        }
        if x.nrows() != labels.nrows() {
            return Err(ModelError::invalid(format!(
                "{} feature rows but {} label rows",
                x.nrows(),
                labels.nrows()
            )));
        }
        let standardizer = configuration
            .standardize
            .then(|| Standardizer::fit(x));
        let x = match &standardizer {
            Some(s) => s.transform(x),
            None => x.to_owned(),
        };
        let features = x.ncols();
        let targets = encoding.encode(labels);
        let estimator = match &configuration.algorithm {
            Algorithm::Dummy => fit_constant(targets.view()),
            Algorithm::KNearestNeighbors {
                neighbors,
                distance_weighted,
            } => {
                if *neighbors == 0 {
                    return Err(ModelError::invalid("neighbors must be positive"));
                }
                FittedEstimator::KNearestNeighbors {
                    neighbors: *neighbors,
                    distance_weighted: *distance_weighted,
                    x,
                    targets,
                }
            }
            Algorithm::NearestCentroid => fit_nearest_centroid(x.view(), targets.view()),
            Algorithm::GaussianNaiveBayes { var_smoothing } => {
                fit_gaussian_naive_bayes(x.view(), targets.view(), *var_smoothing)
            }
            Algorithm::Ridge { alpha } => {
                let link = if task.is_classification() {
                    Link::Clip
                } else {
                    Link::Identity
                };
                fit_ridge(x.view(), targets.view(), *alpha, link)?
            }
            Algorithm::LogisticRegression {
                learning_rate,
                epochs,
                l2,
            } => {
                let link = if task == TaskKind::MultilabelClassification {
                    Link::Sigmoid
                } else {
                    Link::Softmax
                };
                fit_logistic(x.view(), targets.view(), *learning_rate, *epochs, *l2, link)?
            }
        };
        Ok(Self {
            configuration: configuration.clone(),
            encoding: encoding.clone(),
            features,
            standardizer,
            estimator,
        })
    }

    pub fn n_features(&self) -> usize {
        self.features
    }

    /// Predicts score matrices with one column per class, label, or output.
    pub fn predict_scores(&self, x: ArrayView2<f64>) -> ModelResult<Array2<f64>> {
        if x.ncols() != self.features {
            return Err(ModelError::invalid(format!(
                "expected {} features, found {}",
                self.features,
                x.ncols()
            )));
        }
        let x = match &self.standardizer {
            Some(s) => s.transform(x),
            None => x.to_owned(),
        };
        Ok(self.estimator.predict(x.view()))
    }

    /// Predicts labels in the layout of the training labels.
    pub fn predict(&self, x: ArrayView2<f64>) -> ModelResult<Array2<f64>> {
        let scores = self.predict_scores(x)?;
        Ok(self.encoding.decode(scores.view()))
    }
}

impl FittedEstimator {
    fn predict(&self, x: ArrayView2<f64>) -> Array2<f64> {
        match self {
            FittedEstimator::Constant { scores } => {
                Array2::from_shape_fn((x.nrows(), scores.len()), |(_, k)| scores[k])
            }
            FittedEstimator::KNearestNeighbors {
                neighbors,
                distance_weighted,
                x: train,
                targets,
            } => predict_knn(x, train.view(), targets.view(), *neighbors, *distance_weighted),
            FittedEstimator::NearestCentroid { centroids, present } => {
                let mut out = Array2::zeros((x.nrows(), centroids.nrows()));
                for (i, row) in x.rows().into_iter().enumerate() {
                    let nearest = centroids
                        .rows()
                        .into_iter()
                        .enumerate()
                        .filter(|(k, _)| present[*k])
                        .map(|(k, c)| (k, squared_distance(row, c)))
                        .min_by(|a, b| a.1.total_cmp(&b.1));
                    if let Some((k, _)) = nearest {
                        out[[i, k]] = 1.0;
                    }
                }
                out
            }
            FittedEstimator::GaussianNaiveBayes {
                means,
                variances,
                log_priors,
            } => {
                let mut out = Array2::zeros((x.nrows(), means.nrows()));
                for (i, row) in x.rows().into_iter().enumerate() {
                    let mut joint = vec![f64::NEG_INFINITY; means.nrows()];
                    for (k, prior) in log_priors.iter().enumerate() {
                        if let Some(prior) = prior {
                            let mut log_likelihood = *prior;
                            for (j, &value) in row.iter().enumerate() {
                                let var = variances[[k, j]];
                                let diff = value - means[[k, j]];
                                log_likelihood -= 0.5
                                    * ((2.0 * std::f64::consts::PI * var).ln() + diff * diff / var);
                            }
                            joint[k] = log_likelihood;
                        }
                    }
                    softmax_in_place(&mut joint);
                    for (k, p) in joint.into_iter().enumerate() {
                        out[[i, k]] = p;
                    }
                }
                out
            }
            FittedEstimator::Linear {
                weights,
                intercept,
                link,
            } => apply_link(x.dot(weights) + intercept, *link),
        }
    }
}

fn fit_constant(targets: ArrayView2<f64>) -> FittedEstimator {
    let scores = targets
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(targets.ncols()));
    FittedEstimator::Constant { scores }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn predict_knn(
    x: ArrayView2<f64>,
    train: ArrayView2<f64>,
    targets: ArrayView2<f64>,
    neighbors: usize,
    distance_weighted: bool,
) -> Array2<f64> {
    let k = neighbors.min(train.nrows());
    let mut out = Array2::zeros((x.nrows(), targets.ncols()));
    let mut distances: Vec<(usize, f64)> = Vec::with_capacity(train.nrows());
    for (i, row) in x.rows().into_iter().enumerate() {
        distances.clear();
        distances.extend(
            train
                .rows()
                .into_iter()
                .enumerate()
                .map(|(n, t)| (n, squared_distance(row, t).sqrt())),
        );
        distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        let mut total = 0.0;
        for &(n, d) in distances.iter().take(k) {
            let w = if distance_weighted {
                1.0 / (d + 1e-12)
            } else {
                1.0
            };
            total += w;
            out.row_mut(i).scaled_add(w, &targets.row(n));
        }
        if total > 0.0 {
            out.row_mut(i).mapv_inplace(|v| v / total);
        }
    }
    out
}

fn class_statistics(
    x: ArrayView2<f64>,
    targets: ArrayView2<f64>,
) -> (Array2<f64>, Array2<f64>, Vec<usize>) {
    let classes = targets.ncols();
    let features = x.ncols();
    let mut means = Array2::zeros((classes, features));
    let mut variances = Array2::zeros((classes, features));
    let mut counts = vec![0; classes];
    for k in 0..classes {
        let rows: Vec<usize> = (0..x.nrows()).filter(|&i| targets[[i, k]] > 0.5).collect();
        counts[k] = rows.len();
        if rows.is_empty() {
            continue;
        }
        let subset = x.select(Axis(0), &rows);
        if let Some(mean) = subset.mean_axis(Axis(0)) {
            means.row_mut(k).assign(&mean);
        }
        variances.row_mut(k).assign(&subset.var_axis(Axis(0), 0.0));
    }
    (means, variances, counts)
}

fn fit_nearest_centroid(x: ArrayView2<f64>, targets: ArrayView2<f64>) -> FittedEstimator {
    let (centroids, _, counts) = class_statistics(x, targets);
    FittedEstimator::NearestCentroid {
        centroids,
        present: counts.iter().map(|&c| c > 0).collect(),
    }
}

fn fit_gaussian_naive_bayes(
    x: ArrayView2<f64>,
    targets: ArrayView2<f64>,
    var_smoothing: f64,
) -> FittedEstimator {
    let (means, variances, counts) = class_statistics(x, targets);
    let max_variance = x
        .var_axis(Axis(0), 0.0)
        .iter()
        .copied()
        .fold(0.0, f64::max);
    let epsilon = (var_smoothing * max_variance).max(MIN_VARIANCE);
    let variances = variances.mapv(|v| v + epsilon);
    let total = x.nrows() as f64;
    let log_priors = counts
        .iter()
        .map(|&c| (c > 0).then(|| (c as f64 / total).ln()))
        .collect();
    FittedEstimator::GaussianNaiveBayes {
        means,
        variances,
        log_priors,
    }
}

fn fit_ridge(
    x: ArrayView2<f64>,
    targets: ArrayView2<f64>,
    alpha: f64,
    link: Link,
) -> ModelResult<FittedEstimator> {
    if !(alpha >= 0.0) {
        return Err(ModelError::invalid(format!("invalid ridge alpha: {alpha}")));
    }
    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| ModelError::invalid("cannot fit on zero rows"))?;
    let t_mean = targets
        .mean_axis(Axis(0))
        .ok_or_else(|| ModelError::invalid("cannot fit on zero rows"))?;
    let xc = &x - &x_mean;
    let tc = &targets - &t_mean;
    let mut gram = xc.t().dot(&xc);
    for j in 0..gram.nrows() {
        gram[[j, j]] += alpha;
    }
    let weights = solve(gram.view(), xc.t().dot(&tc).view())?;
    let intercept = &t_mean - &x_mean.dot(&weights);
    Ok(FittedEstimator::Linear {
        weights,
        intercept,
        link,
    })
}

fn fit_logistic(
    x: ArrayView2<f64>,
    targets: ArrayView2<f64>,
    learning_rate: f64,
    epochs: usize,
    l2: f64,
    link: Link,
) -> ModelResult<FittedEstimator> {
    if !(learning_rate > 0.0) || !(l2 >= 0.0) {
        return Err(ModelError::invalid(format!(
            "invalid logistic parameters: learning rate {learning_rate}, l2 {l2}"
        )));
    }
    let n = x.nrows() as f64;
    let mut weights = Array2::<f64>::zeros((x.ncols(), targets.ncols()));
    let mut intercept = Array1::<f64>::zeros(targets.ncols());
    for _ in 0..epochs {
        let probabilities = apply_link(x.dot(&weights) + &intercept, link);
        let gradient = (probabilities - &targets) / n;
        let weights_gradient = x.t().dot(&gradient) + &weights * l2;
        let intercept_gradient = gradient.sum_axis(Axis(0));
        weights.scaled_add(-learning_rate, &weights_gradient);
        intercept.scaled_add(-learning_rate, &intercept_gradient);
    }
    if weights.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::fit("logistic regression diverged"));
    }
    Ok(FittedEstimator::Linear {
        weights,
        intercept,
        link,
    })
}

fn softmax_in_place(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        values.fill(0.0);
        return;
    }
    let mut total = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        total += *v;
    }
    for v in values.iter_mut() {
        *v /= total;
    }
}

fn apply_link(mut scores: Array2<f64>, link: Link) -> Array2<f64> {
    match link {
        Link::Identity => {}
        Link::Clip => scores.mapv_inplace(|v| v.clamp(0.0, 1.0)),
        Link::Sigmoid => scores.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp())),
        Link::Softmax => {
            for mut row in scores.rows_mut() {
                if let Some(values) = row.as_slice_mut() {
                    softmax_in_place(values);
                } else {
                    let mut values = row.to_vec();
                    softmax_in_place(&mut values);
                    row.assign(&Array1::from(values));
                }
            }
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn blobs() -> (Array2<f64>, Array2<f64>) {
        let centers = [[0.0, 0.0], [5.0, 5.0], [0.0, 5.0]];
        let x = Array2::from_shape_fn((30, 2), |(i, j)| {
            centers[i % 3][j] + ((i * 7 + j * 3) % 5) as f64 * 0.1
        });
        let y = Array2::from_shape_fn((30, 1), |(i, _)| (i % 3) as f64);
        (x, y)
    }

    fn multiclass_encoding() -> TargetEncoding {
        TargetEncoding::new(
            TaskKind::MulticlassClassification,
            vec![0.0, 1.0, 2.0],
            1,
        )
    }

    fn accuracy(predicted: &Array2<f64>, expected: &Array2<f64>) -> f64 {
        let hits = predicted
            .iter()
            .zip(expected.iter())
            .filter(|(a, b)| a == b)
            .count();
        hits as f64 / expected.len() as f64
    }

    #[test]
    fn test_classifiers_separate_blobs() {
        let (x, y) = blobs();
        let encoding = multiclass_encoding();
        let algorithms = [
            Algorithm::KNearestNeighbors {
                neighbors: 3,
                distance_weighted: false,
            },
            Algorithm::KNearestNeighbors {
                neighbors: 5,
                distance_weighted: true,
            },
            Algorithm::NearestCentroid,
            Algorithm::GaussianNaiveBayes {
                var_smoothing: 1e-9,
            },
            Algorithm::Ridge { alpha: 0.1 },
            Algorithm::LogisticRegression {
                learning_rate: 0.5,
                epochs: 300,
                l2: 1e-4,
            },
        ];
        for algorithm in algorithms {
            let configuration = Configuration::new(algorithm, true);
            let model = FittedModel::fit(&configuration, &encoding, x.view(), y.view()).unwrap();
            let scores = model.predict_scores(x.view()).unwrap();
            assert_eq!(scores.dim(), (30, 3));
            let predicted = model.predict(x.view()).unwrap();
            assert!(
                accuracy(&predicted, &y) >= 0.9,
                "{configuration} accuracy too low"
            );
        }
    }

    #[test]
    fn test_dummy_predicts_majority_and_mean() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![[1.0], [1.0], [0.0], [1.0]];
        let encoding = TargetEncoding::new(TaskKind::BinaryClassification, vec![0.0, 1.0], 1);
        let model = FittedModel::fit(&Configuration::dummy(), &encoding, x.view(), y.view()).unwrap();
        assert_eq!(
            model.predict_scores(array![[10.0]].view()).unwrap(),
            array![[0.25, 0.75]]
        );
        assert_eq!(model.predict(x.view()).unwrap(), array![[1.0], [1.0], [1.0], [1.0]]);

        let y = array![[1.0], [2.0], [3.0], [6.0]];
        let encoding = TargetEncoding::new(TaskKind::Regression, vec![], 1);
        let model = FittedModel::fit(&Configuration::dummy(), &encoding, x.view(), y.view()).unwrap();
        assert_eq!(model.predict(x.view()).unwrap(), array![[3.0], [3.0], [3.0], [3.0]]);
    }

    #[test]
    fn test_ridge_regression_fits_line() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = x.mapv(|v| 2.0 * v + 1.0);
        let encoding = TargetEncoding::new(TaskKind::Regression, vec![], 1);
        let configuration = Configuration::new(Algorithm::Ridge { alpha: 1e-6 }, false);
        let model = FittedModel::fit(&configuration, &encoding, x.view(), y.view()).unwrap();
        let predicted = model.predict(array![[30.0]].view()).unwrap();
        assert!((predicted[[0, 0]] - 61.0).abs() < 1e-3);
    }

    #[test]
    fn test_fit_rejects_unsupported_and_mismatched() {
        let x = array![[1.0], [2.0]];
        let y = array![[0.5], [1.5]];
        let encoding = TargetEncoding::new(TaskKind::Regression, vec![], 1);
        let configuration = Configuration::new(Algorithm::NearestCentroid, false);
        assert!(matches!(
            FittedModel::fit(&configuration, &encoding, x.view(), y.view()),
            Err(ModelError::InvalidArgument(_))
        ));
        let model = FittedModel::fit(&Configuration::dummy(), &encoding, x.view(), y.view()).unwrap();
        assert!(model.predict(array![[1.0, 2.0]].view()).is_err());
    }

    #[test]
    fn test_fitted_model_json() {
        let (x, y) = blobs();
        let configuration = Configuration::new(
            Algorithm::GaussianNaiveBayes {
                var_smoothing: 1e-9,
            },
            true,
        );
        let model =
            FittedModel::fit(&configuration, &multiclass_encoding(), x.view(), y.view()).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let decoded: FittedModel = serde_json::from_str(&json).unwrap();
        assert_eq!(
            decoded.predict(x.view()).unwrap(),
            model.predict(x.view()).unwrap()
        );
    }
}

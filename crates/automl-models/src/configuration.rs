use std::fmt;

use automl_data::task::TaskKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Algorithm {
    /// Predicts the training class frequencies or the training mean.
    Dummy,
    KNearestNeighbors {
        neighbors: usize,
        distance_weighted: bool,
    },
    NearestCentroid,
    GaussianNaiveBayes {
        var_smoothing: f64,
    },
    Ridge {
        alpha: f64,
    },
    LogisticRegression {
        learning_rate: f64,
        epochs: usize,
        l2: f64,
    },
}

impl Algorithm {
    pub fn supports(&self, task: TaskKind) -> bool {
        match self {
            Algorithm::Dummy | Algorithm::KNearestNeighbors { .. } | Algorithm::Ridge { .. } => {
                true
            }
            Algorithm::NearestCentroid | Algorithm::GaussianNaiveBayes { .. } => {
                task.is_single_label_classification()
            }
            Algorithm::LogisticRegression { .. } => task.is_classification(),
        }
    }
}

/// A candidate pipeline: optional feature standardization followed by an estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub algorithm: Algorithm,
    pub standardize: bool,
}

impl Configuration {
    pub fn new(algorithm: Algorithm, standardize: bool) -> Self {
        Self {
            algorithm,
            standardize,
        }
    }

    pub fn dummy() -> Self {
        Self::new(Algorithm::Dummy, false)
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self.algorithm, Algorithm::Dummy)
    }

    pub fn supports(&self, task: TaskKind) -> bool {
        self.algorithm.supports(task)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.standardize {
            write!(f, "standardize+")?;
        }
        match &self.algorithm {
            Algorithm::Dummy => write!(f, "dummy"),
            Algorithm::KNearestNeighbors {
                neighbors,
                distance_weighted,
            } => write!(f, "knn(k={neighbors}, weighted={distance_weighted})"),
            Algorithm::NearestCentroid => write!(f, "nearest_centroid"),
            Algorithm::GaussianNaiveBayes { var_smoothing } => {
                write!(f, "gaussian_nb(var_smoothing={var_smoothing:e})")
            }
            Algorithm::Ridge { alpha } => write!(f, "ridge(alpha={alpha})"),
            Algorithm::LogisticRegression {
                learning_rate,
                epochs,
                l2,
            } => write!(f, "logistic(lr={learning_rate}, epochs={epochs}, l2={l2:e})"),
        }
    }
}

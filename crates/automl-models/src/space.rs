use automl_data::task::TaskKind;
use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::configuration::{Algorithm, Configuration};

const SAMPLE_ATTEMPTS_PER_CONFIGURATION: usize = 10;

/// The candidate configurations available for a task.
#[derive(Debug, Clone)]
pub struct ConfigurationSpace {
    task: TaskKind,
}

impl ConfigurationSpace {
    pub fn new(task: TaskKind) -> Self {
        Self { task }
    }

    /// A fixed, ordered list of configurations that tend to work well.
    /// Proposals start from this list before sampling at random.
    pub fn portfolio(&self) -> Vec<Configuration> {
        let entries = [
            (
                Algorithm::LogisticRegression {
                    learning_rate: 0.5,
                    epochs: 300,
                    l2: 1e-4,
                },
                true,
            ),
            (
                Algorithm::KNearestNeighbors {
                    neighbors: 5,
                    distance_weighted: false,
                },
                true,
            ),
            (
                Algorithm::GaussianNaiveBayes {
                    var_smoothing: 1e-9,
                },
                false,
            ),
            (Algorithm::Ridge { alpha: 1.0 }, true),
            (
                Algorithm::KNearestNeighbors {
                    neighbors: 15,
                    distance_weighted: true,
                },
                true,
            ),
            (Algorithm::NearestCentroid, true),
            (Algorithm::Ridge { alpha: 0.01 }, false),
            (
                Algorithm::LogisticRegression {
                    learning_rate: 0.1,
                    epochs: 500,
                    l2: 1e-3,
                },
                true,
            ),
            (
                Algorithm::KNearestNeighbors {
                    neighbors: 1,
                    distance_weighted: false,
                },
                true,
            ),
            (
                Algorithm::GaussianNaiveBayes {
                    var_smoothing: 1e-6,
                },
                true,
            ),
            (Algorithm::Ridge { alpha: 10.0 }, true),
            (
                Algorithm::KNearestNeighbors {
                    neighbors: 9,
                    distance_weighted: true,
                },
                false,
            ),
        ];
        entries
            .into_iter()
            .map(|(algorithm, standardize)| Configuration::new(algorithm, standardize))
            .filter(|c| c.supports(self.task))
            .collect()
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> Configuration {
        loop {
            let algorithm = match rng.random_range(0..5) {
                0 => Algorithm::KNearestNeighbors {
                    neighbors: rng.random_range(1..=30),
                    distance_weighted: rng.random_bool(0.5),
                },
                1 => Algorithm::NearestCentroid,
                2 => Algorithm::GaussianNaiveBayes {
                    var_smoothing: log_uniform(rng, -11.0, -3.0),
                },
                3 => Algorithm::Ridge {
                    alpha: log_uniform(rng, -4.0, 3.0),
                },
                _ => Algorithm::LogisticRegression {
                    learning_rate: log_uniform(rng, -2.0, 0.0),
                    epochs: rng.random_range(100..=600),
                    l2: log_uniform(rng, -6.0, -1.0),
                },
            };
            if algorithm.supports(self.task) {
                return Configuration::new(algorithm, rng.random_bool(0.5));
            }
        }
    }

    /// Proposes `total` distinct configurations.
    /// The first `initial` come from the portfolio and the rest are sampled with the seed.
    pub fn propose(&self, initial: usize, total: usize, seed: u64) -> Vec<Configuration> {
        let mut out: Vec<Configuration> = self
            .portfolio()
            .into_iter()
            .take(initial.min(total))
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut attempts = total * SAMPLE_ATTEMPTS_PER_CONFIGURATION;
        while out.len() < total && attempts > 0 {
            attempts -= 1;
            let configuration = self.sample(&mut rng);
            if !out.contains(&configuration) {
                out.push(configuration);
            }
        }
        debug!(
            "proposed {} configurations for {} ({} from the portfolio)",
            out.len(),
            self.task,
            initial.min(out.len())
        );
        out
    }
}

fn log_uniform<R: Rng>(rng: &mut R, low: f64, high: f64) -> f64 {
    10f64.powf(rng.random_range(low..high))
}

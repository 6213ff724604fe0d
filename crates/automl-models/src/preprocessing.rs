use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

const MIN_SCALE: f64 = 1e-12;

/// Centers features and scales them to unit variance.
/// Constant features are only centered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    pub fn fit(x: ArrayView2<f64>) -> Self {
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s < MIN_SCALE { 1.0 } else { s });
        Self { mean, scale }
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_standardizer() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let standardizer = Standardizer::fit(x.view());
        let z = standardizer.transform(x.view());
        assert_eq!(z, array![[-1.0, 0.0], [1.0, 0.0]]);
    }
}

use ndarray::{s, Array2, ArrayView2};

use crate::error::{ModelError, ModelResult};

const PIVOT_EPSILON: f64 = 1e-12;

/// Solves `a * x = b` by Gaussian elimination with partial pivoting.
pub(crate) fn solve(a: ArrayView2<f64>, b: ArrayView2<f64>) -> ModelResult<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.nrows() != n {
        return Err(ModelError::internal(format!(
            "cannot solve a {}x{} system with {} right-hand rows",
            a.nrows(),
            a.ncols(),
            b.nrows()
        )));
    }
    let mut a = a.to_owned();
    let mut b = b.to_owned();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < PIVOT_EPSILON {
            return Err(ModelError::fit("singular system"));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            for k in 0..b.ncols() {
                b.swap([pivot, k], [col, k]);
            }
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            for k in 0..b.ncols() {
                b[[row, k]] -= factor * b[[col, k]];
            }
        }
    }
    let mut x = Array2::zeros(b.raw_dim());
    for row in (0..n).rev() {
        for k in 0..b.ncols() {
            let tail = a.slice(s![row, row + 1..]).dot(&x.slice(s![row + 1.., k]));
            x[[row, k]] = (b[[row, k]] - tail) / a[[row, row]];
        }
    }
    Ok(x)
}

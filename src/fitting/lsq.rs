//! SVD-based linear least squares.

use nalgebra::{DMatrix, DVector};

/// Relative singular-value cutoff: values below `cutoff * sigma_max` are
/// treated as zero, which turns a rank-deficient system into a
/// minimum-norm solution instead of a failure.
const SINGULAR_VALUE_CUTOFF: f64 = 1.0e-12;

/// Solves `a * x = b` in the least-squares sense.
///
/// Rank-deficient and underdetermined systems yield the minimum-norm
/// solution; the caller is expected to judge fit quality from residuals.
pub fn solve_least_squares(a: DMatrix<f64>, b: &DVector<f64>) -> DVector<f64> {
    let ncols = a.ncols();
    let svd = a.svd(true, true);
    let eps = svd.singular_values.max() * SINGULAR_VALUE_CUTOFF;
    match svd.solve(b, eps) {
        Ok(x) => x,
        // Unreachable: u and v_t were requested above.
        Err(_) => DVector::zeros(ncols),
    }
}

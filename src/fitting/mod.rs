//! Least-squares surface fitting: polynomial sums and rational functions.

pub mod fxy;
pub mod lsq;
pub mod rational;

pub use fxy::{select_best, FxySum, PolynomialModel};
pub use rational::{RationalFunctionFitter, RationalFunctionSurface};

/// Fills `out` with the monomial terms `x^i * y^j` for `i + j <= degree`,
/// ordered by total degree, then by descending power of `x`:
/// `1, x, y, x^2, x*y, y^2, ...`
pub(crate) fn fill_power_terms(degree: usize, x: f64, y: f64, out: &mut [f64]) {
    let mut idx = 0;
    for s in 0..=degree {
        for i in (0..=s).rev() {
            out[idx] = x.powi(i as i32) * y.powi((s - i) as i32);
            idx += 1;
        }
    }
    debug_assert_eq!(idx, out.len());
}

/// Number of monomial terms with total degree up to `degree`.
pub(crate) fn power_term_count(degree: usize) -> usize {
    (degree + 1) * (degree + 2) / 2
}

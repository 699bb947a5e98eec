//! Rational function fitting for GCP-based geocoding.
//!
//! Fits `g(x, y) = P(x, y) / Q(x, y)` to scattered samples, where P and Q
//! are low-degree polynomials and Q has an implicit leading coefficient of
//! one. The linearized system
//!
//! ```text
//! P(x, y) - g * (Q(x, y) - 1) = g
//! ```
//!
//! is solved via SVD least squares; optional refinement iterations
//! relinearize around the current ratio by weighting each row with
//! `1 / Q(x, y)`, reducing the bias the linearization introduces.

use nalgebra::{DMatrix, DVector};

use super::{fill_power_terms, lsq, power_term_count};
use crate::error::GeocodingError;

/// A fitted rational surface with residual diagnostics.
/// Immutable after fitting.
#[derive(Clone, Debug)]
pub struct RationalFunctionSurface {
    degree_p: usize,
    degree_q: usize,
    /// Numerator coefficients.
    c: Vec<f64>,
    /// Denominator coefficients, excluding the implicit leading 1.
    d: Vec<f64>,
    rmse: f64,
    max_error: f64,
}

impl RationalFunctionSurface {
    pub fn degree_p(&self) -> usize {
        self.degree_p
    }

    pub fn degree_q(&self) -> usize {
        self.degree_q
    }

    pub fn rmse(&self) -> f64 {
        self.rmse
    }

    pub fn max_error(&self) -> f64 {
        self.max_error
    }

    /// Evaluates `P(x, y) / Q(x, y)`.
    pub fn value(&self, x: f64, y: f64) -> f64 {
        let tp = power_term_count(self.degree_p);
        let tq = power_term_count(self.degree_q);
        let mut terms = vec![0.0; tp.max(tq)];

        fill_power_terms(self.degree_p, x, y, &mut terms[..tp]);
        let p: f64 = self.c.iter().zip(&terms).map(|(c, t)| c * t).sum();

        fill_power_terms(self.degree_q, x, y, &mut terms[..tq]);
        let q: f64 = 1.0 + self.d.iter().zip(&terms[1..]).map(|(d, t)| d * t).sum::<f64>();

        p / q
    }
}

/// Least-squares fitter for [`RationalFunctionSurface`].
#[derive(Clone, Copy, Debug)]
pub struct RationalFunctionFitter {
    degree_p: usize,
    degree_q: usize,
    iterations: usize,
}

impl RationalFunctionFitter {
    /// Creates a fitter for numerator degree `degree_p` and denominator
    /// degree `degree_q` (both at most 4), with `iterations` refinement
    /// passes after the initial solve.
    pub fn new(degree_p: usize, degree_q: usize, iterations: usize) -> Self {
        Self {
            degree_p: degree_p.min(4),
            degree_q: degree_q.min(4),
            iterations,
        }
    }

    /// Number of unknown coefficients.
    pub fn coefficient_count(&self) -> usize {
        power_term_count(self.degree_p) + power_term_count(self.degree_q) - 1
    }

    /// Fits the surface to samples `(x_k, y_k) -> g_k`.
    ///
    /// A rank-deficient or underdetermined system does not fail: the SVD
    /// yields minimum-norm coefficients, and callers judge the result from
    /// [`RationalFunctionSurface::rmse`].
    pub fn fit(
        &self,
        x: &[f64],
        y: &[f64],
        g: &[f64],
    ) -> Result<RationalFunctionSurface, GeocodingError> {
        let n = x.len();
        if n == 0 {
            return Err(GeocodingError::NotEnoughPoints { needed: 1, got: 0 });
        }
        if y.len() != n || g.len() != n {
            return Err(GeocodingError::Shape(format!(
                "sample slice lengths differ: {} / {} / {}",
                n,
                y.len(),
                g.len()
            )));
        }

        let tp = power_term_count(self.degree_p);
        let tq = power_term_count(self.degree_q);
        let unknowns = tp + tq - 1;

        let mut surface = self.solve(x, y, g, None, tp, tq, unknowns);
        for _ in 0..self.iterations {
            // Relinearize around the current ratio: rows are weighted by
            // the reciprocal of the current denominator.
            let weights: Vec<f64> = x
                .iter()
                .zip(y)
                .map(|(&xk, &yk)| {
                    let mut terms = vec![0.0; tq];
                    fill_power_terms(self.degree_q, xk, yk, &mut terms);
                    let q = 1.0
                        + surface
                            .d
                            .iter()
                            .zip(&terms[1..])
                            .map(|(d, t)| d * t)
                            .sum::<f64>();
                    if q.abs() > 1e-10 {
                        1.0 / q
                    } else {
                        1.0
                    }
                })
                .collect();
            surface = self.solve(x, y, g, Some(&weights), tp, tq, unknowns);
        }

        let mut sum_sq = 0.0;
        let mut max_error = 0.0f64;
        for k in 0..n {
            let e = (surface.value(x[k], y[k]) - g[k]).abs();
            sum_sq += e * e;
            max_error = max_error.max(e);
        }
        surface.rmse = (sum_sq / n as f64).sqrt();
        surface.max_error = max_error;
        Ok(surface)
    }

    fn solve(
        &self,
        x: &[f64],
        y: &[f64],
        g: &[f64],
        weights: Option<&[f64]>,
        tp: usize,
        tq: usize,
        unknowns: usize,
    ) -> RationalFunctionSurface {
        let n = x.len();
        let mut design = DMatrix::zeros(n, unknowns);
        let mut rhs = DVector::zeros(n);
        let mut p_terms = vec![0.0; tp];
        let mut q_terms = vec![0.0; tq];
        for k in 0..n {
            let w = weights.map_or(1.0, |w| w[k]);
            fill_power_terms(self.degree_p, x[k], y[k], &mut p_terms);
            fill_power_terms(self.degree_q, x[k], y[k], &mut q_terms);
            for (c, &t) in p_terms.iter().enumerate() {
                design[(k, c)] = w * t;
            }
            for (c, &t) in q_terms[1..].iter().enumerate() {
                design[(k, tp + c)] = -w * g[k] * t;
            }
            rhs[k] = w * g[k];
        }
        let solution = lsq::solve_least_squares(design, &rhs);
        RationalFunctionSurface {
            degree_p: self.degree_p,
            degree_q: self.degree_q,
            c: solution.as_slice()[..tp].to_vec(),
            d: solution.as_slice()[tp..].to_vec(),
            rmse: f64::NAN,
            max_error: f64::NAN,
        }
    }
}

//! Polynomial surface fitting with residual-driven model selection.
//!
//! The tie-point geocoder approximates the (lat, lon) -> pixel mapping of
//! each tile with the best of eight candidate polynomial surfaces, from
//! linear up to bi-quartic. The candidates are a data-driven table rather
//! than a type per polynomial: each entry is a total degree plus a flag
//! selecting the full cross-term grid (`x^i * y^j` with i, j <= degree)
//! instead of the triangular term set (i + j <= degree).

use nalgebra::{DMatrix, DVector};

use super::{fill_power_terms, lsq, power_term_count};

/// One candidate polynomial surface shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PolynomialModel {
    pub name: &'static str,
    pub degree: usize,
    /// Include all cross terms up to `x^degree * y^degree`.
    pub cross_terms: bool,
}

/// Candidate surfaces in selection order, lowest term count first.
pub const CANDIDATE_MODELS: [PolynomialModel; 8] = [
    PolynomialModel {
        name: "linear",
        degree: 1,
        cross_terms: false,
    },
    PolynomialModel {
        name: "bilinear",
        degree: 1,
        cross_terms: true,
    },
    PolynomialModel {
        name: "quadric",
        degree: 2,
        cross_terms: false,
    },
    PolynomialModel {
        name: "biquadric",
        degree: 2,
        cross_terms: true,
    },
    PolynomialModel {
        name: "cubic",
        degree: 3,
        cross_terms: false,
    },
    PolynomialModel {
        name: "bicubic",
        degree: 3,
        cross_terms: true,
    },
    PolynomialModel {
        name: "quartic",
        degree: 4,
        cross_terms: false,
    },
    PolynomialModel {
        name: "biquartic",
        degree: 4,
        cross_terms: true,
    },
];

impl PolynomialModel {
    pub fn term_count(&self) -> usize {
        if self.cross_terms {
            (self.degree + 1) * (self.degree + 1)
        } else {
            power_term_count(self.degree)
        }
    }

    /// Effective order of the surface: cross-term grids behave like a
    /// polynomial of twice the nominal degree.
    pub fn order(&self) -> usize {
        if self.cross_terms {
            2 * self.degree
        } else {
            self.degree
        }
    }

    /// Minimum number of fitting points for a stable solution.
    pub fn min_points(&self) -> usize {
        (self.order() + 2) * (self.order() + 1) / 2
    }

    fn fill_terms(&self, x: f64, y: f64, out: &mut [f64]) {
        if self.cross_terms {
            let mut idx = 0;
            for i in 0..=self.degree {
                for j in 0..=self.degree {
                    out[idx] = x.powi(i as i32) * y.powi(j as i32);
                    idx += 1;
                }
            }
        } else {
            fill_power_terms(self.degree, x, y, out);
        }
    }
}

/// A fitted polynomial surface `z = sum(c_i * term_i(x, y))` with residual
/// diagnostics. Immutable after fitting.
#[derive(Clone, Debug)]
pub struct FxySum {
    model: PolynomialModel,
    coeffs: Vec<f64>,
    rmse: f64,
    max_error: f64,
}

impl FxySum {
    /// Least-squares fit of the given model to scattered samples.
    ///
    /// Returns `None` when fewer than `model.min_points()` samples are
    /// given. A degenerate sample distribution does not fail; the SVD
    /// yields minimum-norm coefficients and the residual diagnostics
    /// reflect the (possibly poor) fit.
    pub fn fit(model: PolynomialModel, x: &[f64], y: &[f64], z: &[f64]) -> Option<FxySum> {
        let n = x.len();
        if n < model.min_points() || y.len() != n || z.len() != n {
            return None;
        }
        let terms = model.term_count();
        let mut design = DMatrix::zeros(n, terms);
        let mut row = vec![0.0; terms];
        for k in 0..n {
            model.fill_terms(x[k], y[k], &mut row);
            for (c, &v) in row.iter().enumerate() {
                design[(k, c)] = v;
            }
        }
        let rhs = DVector::from_column_slice(z);
        let coeffs = lsq::solve_least_squares(design, &rhs);

        let mut sum_sq = 0.0;
        let mut max_error = 0.0f64;
        let mut fitted = FxySum {
            model,
            coeffs: coeffs.iter().copied().collect(),
            rmse: 0.0,
            max_error: 0.0,
        };
        for k in 0..n {
            let e = (fitted.eval(x[k], y[k]) - z[k]).abs();
            sum_sq += e * e;
            max_error = max_error.max(e);
        }
        fitted.rmse = (sum_sq / n as f64).sqrt();
        fitted.max_error = max_error;
        Some(fitted)
    }

    pub fn eval(&self, x: f64, y: f64) -> f64 {
        let mut terms = vec![0.0; self.model.term_count()];
        self.model.fill_terms(x, y, &mut terms);
        terms
            .iter()
            .zip(self.coeffs.iter())
            .map(|(t, c)| t * c)
            .sum()
    }

    pub fn model(&self) -> PolynomialModel {
        self.model
    }

    pub fn rmse(&self) -> f64 {
        self.rmse
    }

    pub fn max_error(&self) -> f64 {
        self.max_error
    }
}

/// Fits all candidate surfaces and keeps the one with the smallest RMSE,
/// stopping early at the first candidate whose maximum error is below
/// `abs_error_limit`.
///
/// Returns `None` when no candidate has enough fitting points.
pub fn select_best(x: &[f64], y: &[f64], z: &[f64], abs_error_limit: f64) -> Option<FxySum> {
    let mut best: Option<FxySum> = None;
    for model in CANDIDATE_MODELS {
        let Some(candidate) = FxySum::fit(model, x, y, z) else {
            continue;
        };
        log::trace!(
            "candidate {}: rmse = {:.6}, max error = {:.6}",
            model.name,
            candidate.rmse(),
            candidate.max_error()
        );
        let sufficient = candidate.max_error() < abs_error_limit;
        if best.as_ref().is_none_or(|b| candidate.rmse() < b.rmse()) || sufficient {
            best = Some(candidate);
        }
        if sufficient {
            break;
        }
    }
    best
}

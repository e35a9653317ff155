//! # Monotone cubic interpolation
//!
//! [`MonotoneSpline`] is a piecewise-cubic Hermite interpolant whose knot derivatives are
//! chosen with the Fritsch–Carlson rule (the "PCHIP" scheme). Between knots it never
//! overshoots the data, so a positive histogram density stays positive inside the sampled
//! range.
//!
//! ## Extrapolation
//! -----------------
//! Outside `[x_first, x_last]` the first/last cubic piece is simply continued. No clamping
//! is applied, so evaluating far from the knots can produce negative or large values.
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::catalog_errors::CatalogError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonotoneSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    slopes: Vec<f64>,
}

impl MonotoneSpline {
    /// Build the interpolant through `(x, y)`.
    ///
    /// Arguments
    /// -----------------
    /// * `x`: knot abscissae, strictly increasing.
    /// * `y`: knot values, same length as `x`.
    ///
    /// Return
    /// ----------
    /// * The spline, or [`CatalogError::InvalidSpline`] if the knots are empty, mismatched,
    ///   non-finite or not strictly increasing.
    ///
    /// A single knot yields a constant, two knots yield a straight line.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, CatalogError> {
        if x.is_empty() {
            return Err(CatalogError::InvalidSpline("no knots given".into()));
        }
        if x.len() != y.len() {
            return Err(CatalogError::InvalidSpline(format!(
                "{} abscissae for {} values",
                x.len(),
                y.len()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(CatalogError::InvalidSpline("non-finite knot".into()));
        }
        if x.iter().tuple_windows().any(|(a, b)| b <= a) {
            return Err(CatalogError::InvalidSpline(
                "abscissae must be strictly increasing".into(),
            ));
        }

        let slopes = pchip_slopes(&x, &y);
        Ok(MonotoneSpline { x, y, slopes })
    }

    pub fn knots(&self) -> (&[f64], &[f64]) {
        (&self.x, &self.y)
    }

    /// Evaluate at a single abscissa.
    pub fn eval(&self, at: f64) -> f64 {
        let n = self.x.len();
        if n == 1 {
            return self.y[0];
        }

        // interval index, clamped so the end pieces extend outward
        let i = self
            .x
            .partition_point(|&xi| xi <= at)
            .saturating_sub(1)
            .min(n - 2);

        let h = self.x[i + 1] - self.x[i];
        let delta = (self.y[i + 1] - self.y[i]) / h;
        let (d0, d1) = (self.slopes[i], self.slopes[i + 1]);
        let t = at - self.x[i];

        let c2 = (3.0 * delta - 2.0 * d0 - d1) / h;
        let c3 = (d0 + d1 - 2.0 * delta) / (h * h);
        self.y[i] + t * (d0 + t * (c2 + t * c3))
    }

    pub fn eval_many(&self, at: &[f64]) -> Vec<f64> {
        at.iter().map(|&v| self.eval(v)).collect()
    }
}

fn pchip_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 1 {
        return vec![0.0];
    }

    let h: Vec<f64> = x.iter().tuple_windows().map(|(a, b)| b - a).collect();
    let delta: Vec<f64> = y
        .iter()
        .tuple_windows()
        .zip(h.iter())
        .map(|((a, b), hk)| (b - a) / hk)
        .collect();

    if n == 2 {
        return vec![delta[0], delta[0]];
    }

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        let (dl, dr) = (delta[k - 1], delta[k]);
        if dl * dr > 0.0 {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            d[k] = (w1 + w2) / (w1 / dl + w2 / dr);
        }
    }
    d[0] = end_slope(h[0], h[1], delta[0], delta[1]);
    d[n - 1] = end_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    d
}

/// One-sided three-point slope, shape-preserving variant.
fn end_slope(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if d.signum() != m0.signum() || m0 == 0.0 {
        0.0
    } else if m0.signum() != m1.signum() && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}

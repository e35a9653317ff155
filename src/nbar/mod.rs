//! # Number density n̄(z)
//!
//! This module turns a redshift sample into a smooth, continuously evaluable
//! **number density vs. redshift** curve, [`NbarCurve`], or loads one from a two-column
//! `(z, nbar)` file.
//!
//! ## Estimation
//! -----------------
//! [`estimate_nbar`] follows the usual survey recipe:
//!
//! 1. Bin width from **Scott's rule**, `dz = 3.5 σ n^(-1/3)`, with `σ` the (population)
//!    standard deviation of the sample; `Nbins = max(1, ceil((z_max − z_min) / dz))`
//!    uniform bins starting at `z_min` ([`scotts_bins`]).
//! 2. Histogram with a boundary-inclusive digitize: a sample `z` lands in bin `k` when
//!    `edge[k] ≤ z < edge[k+1]`; samples at or beyond the last edge fall in the discarded
//!    tail bucket ([`histogram`]).
//! 3. Shell volume per bin, `(4/3) π (R_hi³ − R_lo³) fsky`, with `R = D_C(edge)`.
//! 4. `n̄ = alpha · N / V` at each bin center, then a [`MonotoneSpline`] through the
//!    `(center, n̄)` pairs.
//!
//! ## Extrapolation
//! -----------------
//! The returned curve is **not clamped**: outside the sampled redshift range it continues
//! the end cubic pieces of the spline.
//!
//! ## See also
//! ------------
//! * [`MonotoneSpline`] – The interpolant behind every [`NbarCurve`].
//! * [`Cosmology`] – Provides the comoving distances of the bin edges.
mod nbar_file;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::{
    catalog_errors::CatalogError,
    constants::{Density, Redshift},
    cosmology::Cosmology,
    interpolation::MonotoneSpline,
};

/// Bin width used when every redshift in the sample is identical
const DEGENERATE_BIN_WIDTH: f64 = 1e-3;

/// Smooth `z → n̄(z)` curve, built once and then shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NbarCurve {
    spline: MonotoneSpline,
}

impl NbarCurve {
    pub fn from_knots(z: Vec<Redshift>, nbar: Vec<Density>) -> Result<Self, CatalogError> {
        Ok(NbarCurve {
            spline: MonotoneSpline::new(z, nbar)?,
        })
    }

    /// Load a curve from a whitespace separated `(z, nbar)` file.
    ///
    /// Lines are sorted by redshift before fitting; `#` starts a comment.
    ///
    /// Return
    /// ----------
    /// * [`CatalogError::NbarFileNotFound`] if the path does not exist,
    ///   [`CatalogError::NbarParsingError`] for malformed content.
    pub fn from_file(path: &Utf8Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NbarFileNotFound(path.to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut rows = nbar_file::parse_nbar_table(&content)?;
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (z, nbar): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        Self::from_knots(z, nbar)
    }

    #[inline]
    pub fn eval(&self, z: Redshift) -> Density {
        self.spline.eval(z)
    }

    pub fn evaluate(&self, z: &[Redshift]) -> Vec<Density> {
        self.spline.eval_many(z)
    }

    pub fn knots(&self) -> (&[f64], &[f64]) {
        self.spline.knots()
    }
}

/// Uniform redshift bins from Scott's rule.
///
/// Only [`scotts_bins`] builds these, so `edges` always holds at least two sorted values.
#[derive(Debug, Clone, PartialEq)]
pub struct RedshiftBins {
    width: f64,
    edges: Vec<Redshift>,
}

impl RedshiftBins {
    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn edges(&self) -> &[Redshift] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn centers(&self) -> Vec<Redshift> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }
}

/// Optimal histogram bins for `sample` following Scott's rule.
///
/// Arguments
/// -----------------
/// * `sample`: redshift values, not necessarily sorted.
///
/// Return
/// ----------
/// * The bin width and `Nbins + 1` edges starting at `min(sample)`.
///   A sample with zero spread gets a single bin of width `1e-3`.
pub fn scotts_bins(sample: &[Redshift]) -> Result<RedshiftBins, CatalogError> {
    if sample.is_empty() {
        return Err(CatalogError::EmptySample);
    }
    let n = sample.len() as f64;
    let (min, max) = sample
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &z| {
            (lo.min(z), hi.max(z))
        });

    let mean = sample.iter().sum::<f64>() / n;
    let sigma = (sample.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / n).sqrt();
    let dx = 3.5 * sigma / n.cbrt();

    if !(dx > 0.0 && dx.is_finite()) {
        return Ok(RedshiftBins {
            width: DEGENERATE_BIN_WIDTH,
            edges: vec![min, min + DEGENERATE_BIN_WIDTH],
        });
    }

    let nbins = ((max - min) / dx).ceil().max(1.0) as usize;
    let edges = (0..=nbins).map(|i| min + dx * i as f64).collect();
    Ok(RedshiftBins { width: dx, edges })
}

/// Count samples per bin, `edge[k] ≤ z < edge[k+1]`.
///
/// Values below the first edge or at/above the last one are dropped.
pub fn histogram(sample: &[Redshift], bins: &RedshiftBins) -> Vec<u64> {
    let nbins = bins.len();
    let mut counts = vec![0u64; nbins];
    for &z in sample {
        let dig = bins.edges.partition_point(|&e| e <= z);
        if (1..=nbins).contains(&dig) {
            counts[dig - 1] += 1;
        }
    }
    counts
}

/// Estimate `n̄(z)` from a global redshift sample.
///
/// Arguments
/// -----------------
/// * `redshift`: the concatenated sample from every worker.
/// * `fsky`: sky fraction covered by the survey, scales the shell volumes.
/// * `alpha`: normalization applied to every bin count (1 for the data catalog).
/// * `cosmo`: comoving-distance model for the bin edges.
///
/// Return
/// ----------
/// * The fitted curve, or the first error from binning, the cosmology or the spline.
///
/// See also
/// ------------
/// * [`scotts_bins`] – Bin layout.
/// * [`histogram`] – Bin counts.
pub fn estimate_nbar<C: Cosmology + ?Sized>(
    redshift: &[Redshift],
    fsky: f64,
    alpha: f64,
    cosmo: &C,
) -> Result<NbarCurve, CatalogError> {
    let bins = scotts_bins(redshift)?;
    let counts = histogram(redshift, &bins);

    let radius = cosmo.comoving_distance(&bins.edges)?;
    let density: Vec<Density> = radius
        .windows(2)
        .zip(counts.iter())
        .map(|(r, &count)| {
            let volume =
                (4.0 / 3.0) * std::f64::consts::PI * (r[1].powi(3) - r[0].powi(3)) * fsky;
            alpha * count as f64 / volume
        })
        .collect();

    NbarCurve::from_knots(bins.centers(), density)
}

#[cfg(test)]
mod nbar_test {
    use super::*;
    use crate::cosmology::FlatLambdaCdm;
    use approx::assert_relative_eq;

    fn linear_sample(n: usize, lo: f64, hi: f64) -> Vec<f64> {
        (0..n)
            .map(|i| lo + (hi - lo) * (i as f64 + 0.5) / n as f64)
            .collect()
    }

    #[test]
    fn test_scotts_bins_layout() {
        let sample = linear_sample(1000, 0.4, 0.7);
        let bins = scotts_bins(&sample).unwrap();

        let mean = sample.iter().sum::<f64>() / 1000.0;
        let sigma =
            (sample.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / 1000.0).sqrt();
        assert_relative_eq!(bins.width(), 3.5 * sigma / 10.0, max_relative = 1e-12);
        assert_relative_eq!(bins.edges()[0], sample[0]);
        assert!(*bins.edges().last().unwrap() >= sample[999]);
        assert_eq!(bins.len(), bins.edges().len() - 1);
    }

    #[test]
    fn test_degenerate_sample_single_bin() {
        let bins = scotts_bins(&[0.5; 10]).unwrap();
        assert_eq!(bins.len(), 1);
        assert_eq!(histogram(&[0.5; 10], &bins), vec![10]);
        assert_eq!(scotts_bins(&[]), Err(CatalogError::EmptySample));
    }

    #[test]
    fn test_bins_without_edges_are_empty() {
        let bins = RedshiftBins {
            width: 0.1,
            edges: Vec::new(),
        };
        assert_eq!(bins.len(), 0);
        assert!(bins.is_empty());
        assert!(bins.centers().is_empty());
        assert!(histogram(&[0.1, 0.2], &bins).is_empty());
    }

    #[test]
    fn test_histogram_tail_buckets_dropped() {
        let bins = RedshiftBins {
            width: 0.1,
            edges: vec![0.0, 0.1, 0.2],
        };
        let counts = histogram(&[-0.5, 0.0, 0.05, 0.1, 0.15, 0.19, 0.2, 0.9], &bins);
        assert_eq!(counts, vec![2, 3]);
    }

    #[test]
    fn test_shell_volume_round_trip() {
        let cosmo = FlatLambdaCdm::new(0.31);
        let sample = linear_sample(5000, 0.2, 0.6);
        let fsky = 0.25;
        let curve = estimate_nbar(&sample, fsky, 1.0, &cosmo).unwrap();

        // Σ n̄(center) · V_shell recovers every counted object
        let bins = scotts_bins(&sample).unwrap();
        let r = cosmo.comoving_distance(bins.edges()).unwrap();
        let total: f64 = bins
            .centers()
            .iter()
            .zip(r.windows(2))
            .map(|(zc, r)| {
                curve.eval(*zc)
                    * (4.0 / 3.0)
                    * std::f64::consts::PI
                    * (r[1].powi(3) - r[0].powi(3))
                    * fsky
            })
            .sum();
        let counted = histogram(&sample, &bins).iter().sum::<u64>() as f64;
        assert_relative_eq!(total, counted, max_relative = 1e-9);
        assert!(counted >= 4999.0);
    }

    #[test]
    fn test_alpha_scales_density() {
        let cosmo = FlatLambdaCdm::new(0.31);
        let sample = linear_sample(800, 0.3, 0.5);
        let a = estimate_nbar(&sample, 0.5, 1.0, &cosmo).unwrap();
        let b = estimate_nbar(&sample, 0.5, 0.1, &cosmo).unwrap();
        assert_relative_eq!(b.eval(0.4), 0.1 * a.eval(0.4), max_relative = 1e-12);
    }

    #[test]
    fn test_estimation_is_deterministic() {
        let cosmo = FlatLambdaCdm::new(0.31);
        let sample = linear_sample(300, 0.1, 0.9);
        let a = estimate_nbar(&sample, 0.1, 1.0, &cosmo).unwrap();
        let b = estimate_nbar(&sample, 0.1, 1.0, &cosmo).unwrap();
        let grid = linear_sample(20, 0.0, 1.0);
        let (va, vb) = (a.evaluate(&grid), b.evaluate(&grid));
        assert!(va.iter().zip(vb.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
    }
}

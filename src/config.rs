//! # Tracer catalog configuration
//!
//! [`TracerCatalogConfig`] lists every parameter of the catalog. It can be filled in code
//! or deserialized by an external loader. [`TracerCatalogConfig::validate`] checks it before
//! any distributed work starts. Every worker holds the same configuration, so every worker
//! reaches the same verdict.
//!
//! | field | meaning |
//! |---|---|
//! | `box_size` | Cartesian box size; inferred from the data when absent |
//! | `box_pad` | fractional padding of the inferred box (default `0.02`) |
//! | `compute_fkp_weights` | replace weights with `1 / (1 + n̄ P0)` |
//! | `p0_fkp` | the fiducial power `P0` of the FKP weights |
//! | `nbar_file` | two-column `(z, nbar)` file used instead of estimating n̄(z) |
//! | `fsky` | sky fraction, needed to estimate n̄(z) from the data |
//! | `ap_scaling` | optional Alcock–Paczynski factors |
use camino::Utf8PathBuf;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{ap_scaling::ApScaling, catalog_errors::CatalogError, constants::DEFAULT_BOX_PAD};

/// A box size, either the same on every axis or per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoxSizeSpec {
    Isotropic(f64),
    Anisotropic([f64; 3]),
}

impl BoxSizeSpec {
    pub fn to_vector(self) -> Vector3<f64> {
        match self {
            BoxSizeSpec::Isotropic(l) => Vector3::repeat(l),
            BoxSizeSpec::Anisotropic(l) => Vector3::from(l),
        }
    }
}

impl From<f64> for BoxSizeSpec {
    fn from(l: f64) -> Self {
        BoxSizeSpec::Isotropic(l)
    }
}

impl From<[f64; 3]> for BoxSizeSpec {
    fn from(l: [f64; 3]) -> Self {
        BoxSizeSpec::Anisotropic(l)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerCatalogConfig {
    pub box_size: Option<BoxSizeSpec>,
    pub box_pad: f64,
    pub compute_fkp_weights: bool,
    pub p0_fkp: Option<f64>,
    pub nbar_file: Option<Utf8PathBuf>,
    pub fsky: Option<f64>,
    pub ap_scaling: Option<ApScaling>,
}

impl Default for TracerCatalogConfig {
    fn default() -> Self {
        TracerCatalogConfig {
            box_size: None,
            box_pad: DEFAULT_BOX_PAD,
            compute_fkp_weights: false,
            p0_fkp: None,
            nbar_file: None,
            fsky: None,
            ap_scaling: None,
        }
    }
}

impl TracerCatalogConfig {
    pub fn with_box_size(mut self, box_size: impl Into<BoxSizeSpec>) -> Self {
        self.box_size = Some(box_size.into());
        self
    }

    pub fn with_box_pad(mut self, box_pad: f64) -> Self {
        self.box_pad = box_pad;
        self
    }

    pub fn with_fkp_weights(mut self, p0_fkp: Option<f64>) -> Self {
        self.compute_fkp_weights = true;
        self.p0_fkp = p0_fkp;
        self
    }

    pub fn with_nbar_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.nbar_file = Some(path.into());
        self
    }

    pub fn with_fsky(mut self, fsky: f64) -> Self {
        self.fsky = Some(fsky);
        self
    }

    pub fn with_ap_scaling(mut self, ap: ApScaling) -> Self {
        self.ap_scaling = Some(ap);
        self
    }

    /// The box size as a vector, if one was supplied.
    pub fn box_size_vector(&self) -> Option<Vector3<f64>> {
        self.box_size.map(BoxSizeSpec::to_vector)
    }

    /// Check that the parameters are consistent.
    ///
    /// Arguments
    /// -----------------
    /// * `precomputed_nbar`: whether an n̄(z) curve was handed to the catalog directly.
    ///
    /// Return
    /// ----------
    /// * [`CatalogError::MissingFsky`] if n̄(z) must be estimated and `fsky` is absent,
    ///   [`CatalogError::MissingP0Fkp`] if FKP weights are requested without `P0`,
    ///   [`CatalogError::InvalidConfig`] for out-of-range values.
    pub fn validate(&self, precomputed_nbar: bool) -> Result<(), CatalogError> {
        let nbar_given = precomputed_nbar || self.nbar_file.is_some();
        if !nbar_given && self.fsky.is_none() {
            return Err(CatalogError::MissingFsky);
        }
        if self.compute_fkp_weights && self.p0_fkp.is_none() {
            return Err(CatalogError::MissingP0Fkp);
        }
        if let Some(fsky) = self.fsky {
            if !(fsky > 0.0 && fsky <= 1.0) {
                return Err(CatalogError::InvalidConfig(format!(
                    "`fsky` must lie in (0, 1], got {fsky}"
                )));
            }
        }
        if !(self.box_pad >= 0.0 && self.box_pad.is_finite()) {
            return Err(CatalogError::InvalidConfig(format!(
                "`BoxPad` must be a non-negative number, got {}",
                self.box_pad
            )));
        }
        if let Some(size) = self.box_size_vector() {
            if size.iter().any(|l| !(*l > 0.0 && l.is_finite())) {
                return Err(CatalogError::InvalidConfig(format!(
                    "`BoxSize` must be positive on every axis, got {size:?}"
                )));
            }
        }
        if let Some(p0) = self.p0_fkp {
            if !p0.is_finite() {
                return Err(CatalogError::InvalidConfig(format!(
                    "`P0_fkp` must be finite, got {p0}"
                )));
            }
        }
        if let Some(ap) = &self.ap_scaling {
            ap.validate()?;
        }
        Ok(())
    }
}

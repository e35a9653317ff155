//! # Cosmology capability
//!
//! The tracer catalog only needs one thing from a cosmological model: the **comoving
//! distance** as a function of redshift, evaluated over whole arrays at a time. This module
//! defines that capability as the [`Cosmology`] trait and ships a reference implementation,
//! [`FlatLambdaCdm`], good enough for survey-geometry bookkeeping and tests.
//!
//! ## Sampling hint
//! -----------------
//! Before the distributed reduction starts, the catalog calls [`Cosmology::sample`] once
//! with a logarithmic redshift grid. Implementations may precompute a lookup table there;
//! the default implementation ignores the hint.
//!
//! ## See also
//! ------------
//! * [`sky_to_cartesian`](crate::conversion::sky_to_cartesian) – Main consumer of the
//!   distance function.
//! * [`estimate_nbar`](crate::nbar::estimate_nbar) – Converts redshift bin edges into shell
//!   volumes.
pub mod flat_lcdm;

pub use flat_lcdm::FlatLambdaCdm;

use crate::{
    catalog_errors::CatalogError,
    constants::{MpcH, Redshift},
};

/// Vectorized comoving-distance model.
///
/// Implementations must be monotonic in redshift and deterministic: every worker evaluates
/// the same function and must get bit-identical answers for identical input.
pub trait Cosmology {
    /// Comoving distance (Mpc/h) for each input redshift, in input order.
    fn comoving_distance(&self, redshift: &[Redshift]) -> Result<Vec<MpcH>, CatalogError>;

    /// One-time precomputation hint over `redshift_grid`.
    fn sample(&mut self, _redshift_grid: &[Redshift]) {}
}

impl<C: Cosmology + ?Sized> Cosmology for Box<C> {
    fn comoving_distance(&self, redshift: &[Redshift]) -> Result<Vec<MpcH>, CatalogError> {
        (**self).comoving_distance(redshift)
    }

    fn sample(&mut self, redshift_grid: &[Redshift]) {
        (**self).sample(redshift_grid)
    }
}

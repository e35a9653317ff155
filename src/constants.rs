//! # Constants and type definitions for tracer_catalog
//!
//! This module centralizes the **physical constants**, **defaults**, and **common type
//! aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Physical constants (speed of light, Hubble distance)
//! - Default survey-geometry parameters (box padding, coordinator rank)
//! - Core type aliases used across the crate
//! - The set of column names the tracer catalog can produce

// -------------------------------------------------------------------------------------------------
// Physical constants
// -------------------------------------------------------------------------------------------------

/// Speed of light in km/s
pub const VLIGHT: f64 = 2.99792458e5;

/// Hubble distance c/H0 in Mpc/h (H0 = 100 h km/s/Mpc)
pub const HUBBLE_DISTANCE: f64 = VLIGHT / 100.0;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

// -------------------------------------------------------------------------------------------------
// Defaults
// -------------------------------------------------------------------------------------------------

/// Fractional padding applied to the observed extent when the box size is inferred
pub const DEFAULT_BOX_PAD: f64 = 0.02;

/// Rank of the process that computes global parameters
pub const COORDINATOR_RANK: usize = 0;

/// Number of rows per seed block for rank-independent random catalogs
pub const ROWS_PER_SEED: usize = 100_000;

/// Redshift grid handed to [`Cosmology::sample`](crate::cosmology::Cosmology::sample):
/// `logspace(SAMPLE_LOG10_ZMIN, SAMPLE_LOG10_ZMAX, SAMPLE_POINTS)`
pub const SAMPLE_LOG10_ZMIN: f64 = -5.0;
pub const SAMPLE_LOG10_ZMAX: f64 = 1.0;
pub const SAMPLE_POINTS: usize = 1024;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in radians
pub type Radian = f64;
/// Angle in degrees
pub type Degree = f64;
/// Cosmological redshift (dimensionless)
pub type Redshift = f64;
/// Comoving distance in Mpc/h
pub type MpcH = f64;
/// Comoving number density in (h/Mpc)^3
pub type Density = f64;

// -------------------------------------------------------------------------------------------------
// Column names
// -------------------------------------------------------------------------------------------------

pub const POSITION: &str = "Position";
pub const WEIGHT: &str = "Weight";
pub const NBAR: &str = "Nbar";

/// Columns a [`TracerCatalog`](crate::tracer_catalog::TracerCatalog) can be asked for
pub const VALID_COLUMNS: [&str; 3] = [POSITION, WEIGHT, NBAR];

//! # Tracer catalog
//!
//! [`TracerCatalog`] combines a `data` and a `randoms` source of `(ra, dec, z)` rows into
//! a catalog of Cartesian positions inside a periodic box, with per-object weights and
//! number densities.
//!
//! ## Overview
//!
//! Construction ([`TracerCatalogBuilder::build`]) runs once per worker and:
//!
//! 1. validates the configuration (nothing collective happens before this succeeds);
//! 2. hands the comoving-distance model its sampling grid;
//! 3. runs the distributed reduction: every worker scans its share of `data`, the
//!    coordinator derives the box size, the centering offset and the n̄(z) curve, and
//!    broadcasts them back. Every worker then holds a bit-identical [`GlobalGeometry`].
//!
//! Reading ([`TracerCatalog::read`]) requires an active source, chosen with
//! [`TracerCatalog::set_active_source`]. The returned [`TracerChunks`] iterator yields the
//! requested columns, in request order, among:
//!
//! | column | layout | content |
//! |---|---|---|
//! | `Position` | `(3,)` | Cartesian position, centered on the survey |
//! | `Weight` | `()` | upstream weight, or FKP weight `1 / (1 + n̄ P0)` |
//! | `Nbar` | `()` | n̄(z) at the row's redshift |
//!
//! Only the coordinator yields rows. Other workers yield zero-row chunks with the same
//! column layouts, one per coordinator chunk.
//!
//! ## Example
//!
//! ```rust, no_run
//! use tracer_catalog::{
//!     comm::SelfComm,
//!     config::TracerCatalogConfig,
//!     cosmology::FlatLambdaCdm,
//!     source::{ArraySource, RowLayout},
//!     tracer_catalog::TracerCatalogBuilder,
//! };
//! # use nalgebra::Vector3;
//! # fn rows() -> Vec<Vector3<f64>> { vec![] }
//!
//! let data = ArraySource::new(rows(), None, &SelfComm, RowLayout::Sharded)?;
//! let randoms = ArraySource::new(rows(), None, &SelfComm, RowLayout::Sharded)?;
//!
//! let mut catalog = TracerCatalogBuilder::new()
//!     .data(data)
//!     .randoms(randoms)
//!     .cosmology(FlatLambdaCdm::new(0.31))
//!     .config(TracerCatalogConfig::default().with_fsky(0.5))
//!     .build(SelfComm)?;
//!
//! catalog.set_active_source("data")?;
//! for chunk in catalog.read(&["Position", "Weight"], false)? {
//!     let chunk = chunk?;
//!     println!("{} rows", chunk.len());
//! }
//! # Ok::<(), tracer_catalog::catalog_errors::CatalogError>(())
//! ```
//!
//! ## See also
//! ------------
//! * [`Communicator`] – The collective operations the catalog relies on.
//! * [`CatalogSource`] – Contract of the `data` and `randoms` inputs.
//! * [`TracerCatalogConfig`] – Every tunable parameter.
mod read_pipeline;
mod reduction;

pub use read_pipeline::TracerChunks;

use std::{fmt, str::FromStr};

use nalgebra::Vector3;
use tracing::{debug, info_span, Span};

use crate::{
    catalog_errors::CatalogError,
    comm::{Communicator, Role},
    config::TracerCatalogConfig,
    constants::{
        NBAR, POSITION, SAMPLE_LOG10_ZMAX, SAMPLE_LOG10_ZMIN, SAMPLE_POINTS, VALID_COLUMNS,
        WEIGHT,
    },
    conversion::logspace,
    cosmology::Cosmology,
    geometry::GlobalGeometry,
    nbar::NbarCurve,
    source::CatalogSource,
};

use read_pipeline::{Projection, Weighting};
use reduction::compute_global_geometry;

/// A column the tracer catalog can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TracerColumn {
    Position,
    Weight,
    Nbar,
}

impl TracerColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            TracerColumn::Position => POSITION,
            TracerColumn::Weight => WEIGHT,
            TracerColumn::Nbar => NBAR,
        }
    }

    /// Parse a whole request, failing on the first unknown name.
    ///
    /// Return
    /// ----------
    /// * The columns in request order, or [`CatalogError::InvalidColumns`] naming the valid
    ///   columns.
    pub fn parse_all<S: AsRef<str>>(requested: &[S]) -> Result<Vec<TracerColumn>, CatalogError> {
        requested
            .iter()
            .map(|name| {
                name.as_ref()
                    .parse::<TracerColumn>()
                    .map_err(|_| CatalogError::invalid_columns(requested, &VALID_COLUMNS))
            })
            .collect()
    }
}

impl FromStr for TracerColumn {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            POSITION => Ok(TracerColumn::Position),
            WEIGHT => Ok(TracerColumn::Weight),
            NBAR => Ok(TracerColumn::Nbar),
            other => Err(CatalogError::invalid_columns(&[other], &VALID_COLUMNS)),
        }
    }
}

impl fmt::Display for TracerColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two inputs a catalog can read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Data,
    Randoms,
}

impl FromStr for SourceKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" => Ok(SourceKind::Data),
            "randoms" => Ok(SourceKind::Randoms),
            other => Err(CatalogError::InvalidSource(other.to_string())),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Data => f.write_str("data"),
            SourceKind::Randoms => f.write_str("randoms"),
        }
    }
}

/// Read state of a catalog. Reads are rejected until a source has been selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveSource {
    #[default]
    Unset,
    ReadingData,
    ReadingRandoms,
}

impl ActiveSource {
    pub fn kind(self) -> Option<SourceKind> {
        match self {
            ActiveSource::Unset => None,
            ActiveSource::ReadingData => Some(SourceKind::Data),
            ActiveSource::ReadingRandoms => Some(SourceKind::Randoms),
        }
    }
}

impl From<SourceKind> for ActiveSource {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Data => ActiveSource::ReadingData,
            SourceKind::Randoms => ActiveSource::ReadingRandoms,
        }
    }
}

/// Survey catalog placed in a Cartesian box, shared by a group of workers.
pub struct TracerCatalog<M: Communicator> {
    comm: M,
    data: Box<dyn CatalogSource>,
    randoms: Box<dyn CatalogSource>,
    cosmo: Box<dyn Cosmology>,
    config: TracerCatalogConfig,
    geometry: GlobalGeometry,
    active: ActiveSource,
    span: Span,
}

/// Collects the inputs of a [`TracerCatalog`].
#[derive(Default)]
pub struct TracerCatalogBuilder {
    data: Option<Box<dyn CatalogSource>>,
    randoms: Option<Box<dyn CatalogSource>>,
    cosmology: Option<Box<dyn Cosmology>>,
    nbar: Option<NbarCurve>,
    config: TracerCatalogConfig,
}

impl TracerCatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, source: impl CatalogSource + 'static) -> Self {
        self.data = Some(Box::new(source));
        self
    }

    pub fn randoms(mut self, source: impl CatalogSource + 'static) -> Self {
        self.randoms = Some(Box::new(source));
        self
    }

    pub fn cosmology(mut self, cosmo: impl Cosmology + 'static) -> Self {
        self.cosmology = Some(Box::new(cosmo));
        self
    }

    /// Use a precomputed n̄(z) curve; no histogram is built at construction.
    pub fn nbar(mut self, nbar: NbarCurve) -> Self {
        self.nbar = Some(nbar);
        self
    }

    pub fn config(mut self, config: TracerCatalogConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the inputs and run the construction-time reduction.
    ///
    /// Every worker of `comm` must call `build` with equivalent inputs. Configuration
    /// errors are raised before any collective call, identically on every worker.
    ///
    /// Arguments
    /// -----------------
    /// * `comm`: the worker group (a reference to a communicator works too).
    ///
    /// Return
    /// ----------
    /// * The catalog, holding the broadcast [`GlobalGeometry`].
    /// * [`CatalogError::MissingCosmology`], [`CatalogError::MissingFsky`],
    ///   [`CatalogError::MissingP0Fkp`] or [`CatalogError::InvalidConfig`] for incomplete
    ///   inputs.
    /// * [`CatalogError::NbarFileNotFound`] or [`CatalogError::NbarParsingError`] for a bad
    ///   `nbar` file, raised before `data` is read.
    /// * Any upstream error raised while scanning `data` or building n̄(z).
    pub fn build<M: Communicator>(self, comm: M) -> Result<TracerCatalog<M>, CatalogError> {
        let mut cosmo = self.cosmology.ok_or(CatalogError::MissingCosmology)?;
        let data = self
            .data
            .ok_or_else(|| CatalogError::InvalidConfig("a `data` source is required".into()))?;
        let randoms = self
            .randoms
            .ok_or_else(|| CatalogError::InvalidConfig("a `randoms` source is required".into()))?;
        self.config.validate(self.nbar.is_some())?;

        // every worker loads the file itself, before any collective
        let nbar = match (self.nbar, &self.config.nbar_file) {
            (Some(curve), _) => Some(curve),
            (None, Some(path)) => Some(NbarCurve::from_file(path)?),
            (None, None) => None,
        };

        cosmo.sample(&logspace(SAMPLE_LOG10_ZMIN, SAMPLE_LOG10_ZMAX, SAMPLE_POINTS));

        let span = info_span!("tracer_catalog", rank = comm.rank(), size = comm.size());
        let geometry = {
            let _enter = span.enter();
            compute_global_geometry(&comm, &*data, &*cosmo, &self.config, nbar)?
        };

        Ok(TracerCatalog {
            comm,
            data,
            randoms,
            cosmo,
            config: self.config,
            geometry,
            active: ActiveSource::Unset,
            span,
        })
    }
}

impl<M: Communicator> TracerCatalog<M> {
    /// Select the source of subsequent reads, by name (`"data"` or `"randoms"`).
    ///
    /// Any other name fails with [`CatalogError::InvalidSource`] and leaves the current
    /// selection untouched.
    pub fn set_active_source(&mut self, which: &str) -> Result<(), CatalogError> {
        let kind = which.parse()?;
        self.set_active(kind);
        Ok(())
    }

    pub fn set_active(&mut self, kind: SourceKind) {
        self.active = kind.into();
    }

    pub fn active_source(&self) -> Option<SourceKind> {
        self.active.kind()
    }

    /// Stream the requested columns of the active source.
    ///
    /// Arguments
    /// -----------------
    /// * `columns`: any of `Position`, `Weight`, `Nbar`, in the order they should appear in
    ///   each chunk.
    /// * `full`: forwarded to the active source; `true` asks for its rows in a single chunk.
    ///
    /// Return
    /// ----------
    /// * A [`TracerChunks`] iterator. Every worker must drive it to the end: each step is
    ///   a collective.
    /// * [`CatalogError::SourceNotSet`] if no source was selected, or
    ///   [`CatalogError::InvalidColumns`] for an unknown column. Both are raised before any
    ///   collective call.
    ///
    /// See also
    /// ------------
    /// * [`TracerCatalog::set_active_source`] – Must be called first.
    pub fn read<S: AsRef<str>>(
        &self,
        columns: &[S],
        full: bool,
    ) -> Result<TracerChunks<'_, M>, CatalogError> {
        let kind = self.active.kind().ok_or(CatalogError::SourceNotSet)?;
        let columns = TracerColumn::parse_all(columns)?;

        let source = match kind {
            SourceKind::Data => &self.data,
            SourceKind::Randoms => &self.randoms,
        };
        {
            let _enter = self.span.enter();
            debug!(source = %kind, ?columns, full, "starting tracer catalog read");
        }

        let weighting = if self.config.compute_fkp_weights {
            Weighting::Fkp {
                p0: self.config.p0_fkp,
            }
        } else {
            Weighting::Upstream
        };
        let projection = Projection {
            geometry: &self.geometry,
            cosmo: &*self.cosmo,
            weighting,
            ap_scaling: self.config.ap_scaling,
        };

        Ok(TracerChunks::new(
            &self.comm,
            source.read(&[POSITION, WEIGHT], full),
            columns,
            projection,
            self.span.clone(),
        ))
    }

    pub fn box_size(&self) -> Vector3<f64> {
        self.geometry.box_size
    }

    pub fn offset(&self) -> Vector3<f64> {
        self.geometry.offset
    }

    pub fn nbar(&self) -> &NbarCurve {
        &self.geometry.nbar
    }

    pub fn geometry(&self) -> &GlobalGeometry {
        &self.geometry
    }

    pub fn config(&self) -> &TracerCatalogConfig {
        &self.config
    }

    pub fn role(&self) -> Role {
        self.comm.role()
    }

    pub fn comm(&self) -> &M {
        &self.comm
    }
}

impl<M: Communicator> fmt::Debug for TracerCatalog<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracerCatalog")
            .field("rank", &self.comm.rank())
            .field("size", &self.comm.size())
            .field("active", &self.active)
            .field("geometry", &self.geometry)
            .finish_non_exhaustive()
    }
}

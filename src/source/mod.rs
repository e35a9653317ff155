//! # Upstream catalog sources
//!
//! A catalog source streams **chunks** of rows: each [`Chunk`] holds one [`ColumnData`]
//! per requested column, in request order, all of the same length. Chunk boundaries carry
//! no meaning; consumers must give the same answer whatever the chunk size.
//!
//! ## Contract
//! -----------------
//! [`CatalogSource::read`] receives the column names and a `full` flag:
//!
//! * `full = false` – the source may deliver bounded-memory increments.
//! * `full = true` – the source should deliver its local rows as a single chunk.
//!
//! Sources running in a worker group should yield the same number of chunks on every
//! worker (empty chunks are fine), so that collective consumers stay in step.
//!
//! ## Provided sources
//! -----------------
//! * [`ArraySource`] – in-memory `(ra, dec, z)` rows, sharded by rank or resident on the
//!   coordinator.
//! * [`RandomSky`] – uniform random sky positions, independent of the number of workers.
//!
//! ## Per-row layout
//! -----------------
//! [`ColumnLayout`] is the shape/type metadata of a column without its rows. It is what the
//! coordinator broadcasts in the read pipeline, and [`ColumnLayout::empty`] rebuilds a
//! zero-row placeholder of the right kind from it.
mod array_source;
mod random_sky;

pub use array_source::{ArraySource, RowLayout};
pub use random_sky::RandomSky;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::catalog_errors::CatalogError;

/// Lazy sequence of chunks returned by a source.
pub type ChunkIter<'a> = Box<dyn Iterator<Item = Result<Chunk, CatalogError>> + 'a>;

/// Capability consumed by the tracer catalog for its `data` and `randoms` inputs.
pub trait CatalogSource {
    fn read(&self, columns: &[&str], full: bool) -> Result<ChunkIter<'_>, CatalogError>;
}

impl<S: CatalogSource + ?Sized> CatalogSource for Box<S> {
    fn read(&self, columns: &[&str], full: bool) -> Result<ChunkIter<'_>, CatalogError> {
        (**self).read(columns, full)
    }
}

/// Element kind and per-row shape of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnLayout {
    /// one `f64` per row, shape `()`
    Scalar,
    /// three `f64` per row, shape `(3,)`
    Vector3,
}

impl ColumnLayout {
    pub fn row_shape(&self) -> &'static [usize] {
        match self {
            ColumnLayout::Scalar => &[],
            ColumnLayout::Vector3 => &[3],
        }
    }

    pub fn dtype(&self) -> &'static str {
        "f64"
    }

    /// A zero-row column of this layout.
    pub fn empty(&self) -> ColumnData {
        match self {
            ColumnLayout::Scalar => ColumnData::Scalar(Vec::new()),
            ColumnLayout::Vector3 => ColumnData::Vector(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Scalar(Vec<f64>),
    Vector(Vec<Vector3<f64>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Scalar(v) => v.len(),
            ColumnData::Vector(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn layout(&self) -> ColumnLayout {
        match self {
            ColumnData::Scalar(_) => ColumnLayout::Scalar,
            ColumnData::Vector(_) => ColumnLayout::Vector3,
        }
    }

    pub fn as_scalars(&self) -> Option<&[f64]> {
        match self {
            ColumnData::Scalar(v) => Some(v),
            ColumnData::Vector(_) => None,
        }
    }

    pub fn as_vectors(&self) -> Option<&[Vector3<f64>]> {
        match self {
            ColumnData::Vector(v) => Some(v),
            ColumnData::Scalar(_) => None,
        }
    }

    pub fn into_scalars(self) -> Option<Vec<f64>> {
        match self {
            ColumnData::Scalar(v) => Some(v),
            ColumnData::Vector(_) => None,
        }
    }

    pub fn into_vectors(self) -> Option<Vec<Vector3<f64>>> {
        match self {
            ColumnData::Vector(v) => Some(v),
            ColumnData::Scalar(_) => None,
        }
    }
}

/// Row-aligned block of columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    columns: Vec<ColumnData>,
}

impl Chunk {
    /// Build a chunk, rejecting columns of unequal length.
    pub fn new(columns: Vec<ColumnData>) -> Result<Self, CatalogError> {
        if let Some(first) = columns.first() {
            let n = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != n) {
                return Err(CatalogError::Source(format!(
                    "chunk columns are not row-aligned ({n} vs {} rows)",
                    bad.len()
                )));
            }
        }
        Ok(Chunk { columns })
    }

    /// Zero-row chunk with the given column layouts.
    pub fn empty(layouts: &[ColumnLayout]) -> Self {
        Chunk {
            columns: layouts.iter().map(ColumnLayout::empty).collect(),
        }
    }

    /// Number of rows (0 for a chunk without columns).
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, ColumnData::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &[ColumnData] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnData> {
        self.columns.get(index)
    }

    pub fn into_columns(self) -> Vec<ColumnData> {
        self.columns
    }

    pub fn layouts(&self) -> Vec<ColumnLayout> {
        self.columns.iter().map(ColumnData::layout).collect()
    }
}

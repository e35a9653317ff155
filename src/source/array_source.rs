use std::ops::Range;

use nalgebra::Vector3;

use crate::{
    catalog_errors::CatalogError,
    comm::Communicator,
    constants::{POSITION, WEIGHT},
};

use super::{CatalogSource, Chunk, ChunkIter, ColumnData};

/// Default number of rows per chunk when `full = false`
const DEFAULT_CHUNK_SIZE: usize = 8192;

/// How the global rows of an [`ArraySource`] are spread over the worker group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowLayout {
    /// rank `r` of `s` holds rows `[N·r/s, N·(r+1)/s)`
    #[default]
    Sharded,
    /// the coordinator holds every row, other workers hold none
    CoordinatorResident,
}

/// In-memory catalog of `(ra, dec, z)` positions with optional per-row weights.
///
/// The source is built from the **global** arrays and keeps only the rows assigned to
/// the local rank. The number of chunks per pass is derived from the largest local share,
/// so every worker yields the same number of chunks for the same request.
#[derive(Debug, Clone)]
pub struct ArraySource {
    positions: Vec<Vector3<f64>>,
    weights: Vec<f64>,
    chunk_size: usize,
    max_local_rows: usize,
}

impl ArraySource {
    /// Arguments
    /// -----------------
    /// * `positions`: global `(ra, dec, z)` rows, angles in radians.
    /// * `weights`: optional global weights; defaults to `1.0` for every row.
    /// * `comm`: the worker group, used for the local rank and group size only.
    /// * `layout`: how rows are spread over the group.
    ///
    /// Return
    /// ----------
    /// * The local view of the catalog, or [`CatalogError::Source`] if `weights` and
    ///   `positions` differ in length.
    pub fn new<M: Communicator>(
        positions: Vec<Vector3<f64>>,
        weights: Option<Vec<f64>>,
        comm: &M,
        layout: RowLayout,
    ) -> Result<Self, CatalogError> {
        let total = positions.len();
        let weights = match weights {
            Some(w) if w.len() != total => {
                return Err(CatalogError::Source(format!(
                    "{} weights given for {total} positions",
                    w.len()
                )))
            }
            Some(w) => w,
            None => vec![1.0; total],
        };

        let (local, max_local_rows) = match layout {
            RowLayout::Sharded => (
                shard_range(total, comm.rank(), comm.size()),
                total.div_ceil(comm.size().max(1)),
            ),
            RowLayout::CoordinatorResident if comm.role().is_coordinator() => (0..total, total),
            RowLayout::CoordinatorResident => (0..0, total),
        };

        Ok(ArraySource {
            positions: positions[local.clone()].to_vec(),
            weights: weights[local].to_vec(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_local_rows,
        })
    }

    /// Wrap rows that already belong to this worker.
    ///
    /// `max_local_rows` is the largest share held by any worker of the group.
    pub(crate) fn from_local_rows(positions: Vec<Vector3<f64>>, max_local_rows: usize) -> Self {
        let weights = vec![1.0; positions.len()];
        ArraySource {
            positions,
            weights,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_local_rows,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Number of rows held by this worker.
    pub fn local_len(&self) -> usize {
        self.positions.len()
    }

    fn chunks_per_pass(&self) -> usize {
        self.max_local_rows.div_ceil(self.chunk_size).max(1)
    }

    fn column(&self, name: &str, rows: Range<usize>) -> Result<ColumnData, CatalogError> {
        match name {
            POSITION => Ok(ColumnData::Vector(self.positions[rows].to_vec())),
            WEIGHT => Ok(ColumnData::Scalar(self.weights[rows].to_vec())),
            other => Err(CatalogError::Source(format!(
                "column `{other}` is not provided by this source (available: {POSITION}, {WEIGHT})"
            ))),
        }
    }
}

/// Rows `[N·rank/size, N·(rank+1)/size)` of a global array of `total` rows.
pub(crate) fn shard_range(total: usize, rank: usize, size: usize) -> Range<usize> {
    let size = size.max(1);
    (total * rank / size)..(total * (rank + 1) / size)
}

impl CatalogSource for ArraySource {
    fn read(&self, columns: &[&str], full: bool) -> Result<ChunkIter<'_>, CatalogError> {
        // fail on unknown columns before yielding anything
        for name in columns {
            self.column(name, 0..0)?;
        }
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();

        let n = self.local_len();
        let (n_chunks, step) = if full {
            (1, n.max(1))
        } else {
            (self.chunks_per_pass(), self.chunk_size)
        };

        Ok(Box::new((0..n_chunks).map(move |k| {
            let rows = (k * step).min(n)..((k + 1) * step).min(n);
            let data = columns
                .iter()
                .map(|name| self.column(name, rows.clone()))
                .collect::<Result<Vec<_>, _>>()?;
            Chunk::new(data)
        })))
    }
}

//! Steady-state read path of the tracer catalog.
//!
//! Every step of [`TracerChunks`] is one collective round:
//!
//! 1. each worker pulls the next chunk of `(Position, Weight)` from its active source;
//! 2. workers report local upstream failures to the coordinator (`gather`);
//! 3. the coordinator projects and weights its chunk, then broadcasts an
//!    [`Announcement`]: the per-column layouts, the end of the stream, or a failure;
//! 4. the coordinator yields its real rows, other workers yield zero-row chunks built
//!    from the announced layouts.
//!
//! The coordinator alone decides when the stream ends, so all workers perform the same
//! number of rounds even if their sources yield different numbers of chunks.
//!
//! Rows read by non-coordinating workers are not projected and never reach the caller. Once
//! the coordinator ends the stream, chunks still left in their sources are not read at all.
use tracing::{debug, warn, Span};

use crate::{
    ap_scaling::ApScaling,
    catalog_errors::CatalogError,
    comm::{Communicator, Role},
    conversion::{redshift_column, sky_to_cartesian},
    cosmology::Cosmology,
    geometry::GlobalGeometry,
    source::{Chunk, ChunkIter, ColumnData, ColumnLayout},
};

use super::TracerColumn;

/// How the output `Weight` column is produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Weighting {
    /// keep the upstream weights
    Upstream,
    /// `1 / (1 + n̄ P0)`
    Fkp { p0: Option<f64> },
}

/// Coordinator message for one round of the read pipeline.
#[derive(Debug, Clone, PartialEq)]
enum Announcement {
    Chunk(Vec<ColumnLayout>),
    End,
    Failed(String),
}

/// Everything the coordinator needs to turn sky rows into output rows.
pub(crate) struct Projection<'a> {
    pub geometry: &'a GlobalGeometry,
    pub cosmo: &'a dyn Cosmology,
    pub weighting: Weighting,
    pub ap_scaling: Option<ApScaling>,
}

impl Projection<'_> {
    /// Build the requested output columns from one upstream `(Position, Weight)` chunk.
    pub(crate) fn apply(
        &self,
        chunk: Chunk,
        columns: &[TracerColumn],
    ) -> Result<Chunk, CatalogError> {
        let mut upstream = chunk.into_columns().into_iter();
        let coords = upstream
            .next()
            .and_then(ColumnData::into_vectors)
            .ok_or_else(|| {
                CatalogError::Source("`Position` must hold (ra, dec, z) rows".to_string())
            })?;
        let weight = upstream
            .next()
            .and_then(ColumnData::into_scalars)
            .ok_or_else(|| {
                CatalogError::Source("`Weight` must hold one value per row".to_string())
            })?;

        // cartesian coordinates, removing the mean offset in each dimension
        let mut position = sky_to_cartesian(&coords, &(-self.geometry.offset), self.cosmo)?;
        if let Some(ap) = &self.ap_scaling {
            ap.apply_all(&mut position);
        }

        let nbar = self.geometry.nbar.evaluate(&redshift_column(&coords));

        let weight = match self.weighting {
            Weighting::Upstream => weight,
            Weighting::Fkp { p0 } => {
                let p0 = p0.ok_or(CatalogError::MissingP0Fkp)?;
                nbar.iter().map(|n| 1.0 / (1.0 + n * p0)).collect()
            }
        };

        let output = columns
            .iter()
            .map(|column| match column {
                TracerColumn::Position => ColumnData::Vector(position.clone()),
                TracerColumn::Weight => ColumnData::Scalar(weight.clone()),
                TracerColumn::Nbar => ColumnData::Scalar(nbar.clone()),
            })
            .collect();
        Chunk::new(output)
    }
}

/// Lazy sequence of output chunks returned by
/// [`TracerCatalog::read`](super::TracerCatalog::read).
///
/// Every worker of the group must drive its iterator until it returns `None` (or an
/// error): each call to `next` is a collective.
pub struct TracerChunks<'a, M: Communicator> {
    comm: &'a M,
    role: Role,
    upstream: Option<ChunkIter<'a>>,
    pending_error: Option<CatalogError>,
    columns: Vec<TracerColumn>,
    projection: Projection<'a>,
    span: Span,
    finished: bool,
    rounds: usize,
    discarded_rows: usize,
}

impl<'a, M: Communicator> TracerChunks<'a, M> {
    pub(crate) fn new(
        comm: &'a M,
        upstream: Result<ChunkIter<'a>, CatalogError>,
        columns: Vec<TracerColumn>,
        projection: Projection<'a>,
        span: Span,
    ) -> Self {
        let (upstream, pending_error) = match upstream {
            Ok(iter) => (Some(iter), None),
            Err(e) => (None, Some(e)),
        };
        TracerChunks {
            comm,
            role: comm.role(),
            upstream,
            pending_error,
            columns,
            projection,
            span,
            finished: false,
            rounds: 0,
            discarded_rows: 0,
        }
    }

    /// Rows this worker read from its source but did not return.
    ///
    /// A lower bound on what the worker holds: chunks left in the source after the
    /// coordinator ended the stream are never read.
    pub fn discarded_rows(&self) -> usize {
        self.discarded_rows
    }

    fn next_upstream(&mut self) -> Option<Result<Chunk, CatalogError>> {
        if let Some(e) = self.pending_error.take() {
            self.upstream = None;
            return Some(Err(e));
        }
        let next = self.upstream.as_mut()?.next();
        if next.is_none() {
            self.upstream = None;
        }
        next
    }

    fn coordinator_round(
        &mut self,
        local: Option<Result<Chunk, CatalogError>>,
        worker_failures: Vec<Option<String>>,
    ) -> (Announcement, Option<Result<Chunk, CatalogError>>) {
        let worker_failure = worker_failures
            .into_iter()
            .enumerate()
            .find_map(|(rank, f)| f.map(|msg| format!("rank {rank}: {msg}")));

        match (local, worker_failure) {
            (Some(Err(e)), _) => (Announcement::Failed(e.to_string()), Some(Err(e))),
            (_, Some(msg)) => (
                Announcement::Failed(msg.clone()),
                Some(Err(CatalogError::Communication(msg))),
            ),
            (None, None) => (Announcement::End, None),
            (Some(Ok(chunk)), None) => match self.projection.apply(chunk, &self.columns) {
                Ok(out) => (Announcement::Chunk(out.layouts()), Some(Ok(out))),
                Err(e) => (Announcement::Failed(e.to_string()), Some(Err(e))),
            },
        }
    }
}

impl<M: Communicator> Iterator for TracerChunks<'_, M> {
    type Item = Result<Chunk, CatalogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let span = self.span.clone();
        let _enter = span.enter();
        self.rounds += 1;

        let local = self.next_upstream();
        let local_failure = match &local {
            Some(Err(e)) => Some(e.to_string()),
            _ => None,
        };

        let gathered = match self.comm.gather(local_failure) {
            Ok(g) => g,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        // the coordinator consumes its local chunk, other workers keep theirs for error reporting
        let (announcement, coordinator_result, local) = match gathered {
            Some(worker_failures) => {
                let (announcement, result) = self.coordinator_round(local, worker_failures);
                (Some(announcement), Some(result), None)
            }
            None => {
                if let Some(Ok(chunk)) = &local {
                    self.discarded_rows += chunk.len();
                }
                (None, None, local)
            }
        };

        let announcement = match self.comm.broadcast(announcement) {
            Ok(a) => a,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        match announcement {
            Announcement::End => {
                self.finished = true;
                debug!(rounds = self.rounds, "tracer catalog read finished");
                if self.discarded_rows > 0 {
                    warn!(
                        rank = self.comm.rank(),
                        rows_at_least = self.discarded_rows,
                        "rows held by a non-coordinating worker were not returned; \
                         chunks the coordinator never asked for are not counted"
                    );
                }
                None
            }
            Announcement::Failed(message) => {
                self.finished = true;
                match (coordinator_result, local) {
                    (Some(result), _) => result,
                    (None, Some(Err(e))) => Some(Err(e)),
                    (None, _) => Some(Err(CatalogError::Communication(message))),
                }
            }
            Announcement::Chunk(layouts) => match coordinator_result {
                Some(result) => result,
                None => {
                    debug_assert!(!self.role.is_coordinator());
                    Some(Ok(Chunk::empty(&layouts)))
                }
            },
        }
    }
}

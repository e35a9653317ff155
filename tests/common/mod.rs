#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use nalgebra::Vector3;
use rand::{rngs::StdRng, Rng, SeedableRng};

use tracer_catalog::{
    catalog_errors::CatalogError,
    comm::Communicator,
    config::TracerCatalogConfig,
    conversion::radec_deg_to_rad,
    cosmology::FlatLambdaCdm,
    source::{ArraySource, CatalogSource, ChunkIter, RowLayout},
    tracer_catalog::{TracerCatalog, TracerCatalogBuilder},
};

pub const OMEGA_M: f64 = 0.31;

/// `n` rows uniform in `ra ∈ [150, 190]°`, `dec ∈ [0, 30]°`, `z ∈ [0.4, 0.6]`.
pub fn synthetic_rows(n: usize, seed: u64) -> Vec<Vector3<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            radec_deg_to_rad(
                rng.random_range(150.0..190.0),
                rng.random_range(0.0..30.0),
                rng.random_range(0.4..0.6),
            )
        })
        .collect()
}

/// A catalog with 100 `data` rows and 20 `randoms` rows.
pub fn synthetic_catalog<M: Communicator>(
    comm: M,
    layout: RowLayout,
    config: TracerCatalogConfig,
) -> Result<TracerCatalog<M>, CatalogError> {
    let data = ArraySource::new(synthetic_rows(100, 1), None, &comm, layout)?.with_chunk_size(16);
    let randoms = ArraySource::new(synthetic_rows(20, 2), None, &comm, layout)?.with_chunk_size(16);
    TracerCatalogBuilder::new()
        .data(data)
        .randoms(randoms)
        .cosmology(FlatLambdaCdm::new(OMEGA_M))
        .config(config)
        .build(comm)
}

/// Wraps a source and fails the `n`-th chunk of every multi-column read on one rank.
pub struct FailingSource {
    pub inner: ArraySource,
    pub fail_here: bool,
    pub fail_at: usize,
}

impl CatalogSource for FailingSource {
    fn read(&self, columns: &[&str], full: bool) -> Result<ChunkIter<'_>, CatalogError> {
        let inner = self.inner.read(columns, full)?;
        if !self.fail_here || columns.len() < 2 {
            return Ok(inner);
        }
        let fail_at = self.fail_at;
        Ok(Box::new(inner.enumerate().map(move |(k, chunk)| {
            if k == fail_at {
                Err(CatalogError::Source("disk went away".into()))
            } else {
                chunk
            }
        })))
    }
}

/// Wraps a source and counts every row it hands out.
pub struct CountingSource {
    pub inner: ArraySource,
    pub rows: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new(inner: ArraySource) -> (Self, Arc<AtomicUsize>) {
        let rows = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            inner,
            rows: Arc::clone(&rows),
        };
        (source, rows)
    }
}

impl CatalogSource for CountingSource {
    fn read(&self, columns: &[&str], full: bool) -> Result<ChunkIter<'_>, CatalogError> {
        let rows = Arc::clone(&self.rows);
        Ok(Box::new(self.inner.read(columns, full)?.inspect(move |chunk| {
            if let Ok(chunk) = chunk {
                rows.fetch_add(chunk.len(), Ordering::SeqCst);
            }
        })))
    }
}

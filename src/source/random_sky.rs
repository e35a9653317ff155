use std::ops::Range;

use nalgebra::Vector3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    catalog_errors::CatalogError,
    comm::Communicator,
    constants::{Radian, Redshift, ROWS_PER_SEED},
};

use super::array_source::{shard_range, ArraySource};

/// Uniform random sky catalog, typically used to build a `randoms` input.
///
/// Rows are uniform in right ascension, in `sin(dec)` (uniform per unit solid angle) and in
/// redshift. The global sequence is cut into blocks of [`ROWS_PER_SEED`] rows, each drawn
/// from its own generator seeded from `seed`, so the rows a worker receives do not depend
/// on how many workers share the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSky {
    pub total: usize,
    pub seed: u64,
    pub ra: Range<Radian>,
    pub dec: Range<Radian>,
    pub redshift: Range<Redshift>,
}

impl RandomSky {
    pub fn validate(&self) -> Result<(), CatalogError> {
        let finite = |r: &Range<f64>| r.start.is_finite() && r.end.is_finite() && r.start <= r.end;
        if !(finite(&self.ra) && finite(&self.dec) && finite(&self.redshift)) {
            return Err(CatalogError::InvalidConfig(
                "random sky ranges must be finite and ordered".into(),
            ));
        }
        let half_pi = std::f64::consts::FRAC_PI_2;
        if self.dec.start < -half_pi || self.dec.end > half_pi {
            return Err(CatalogError::InvalidConfig(
                "declination range must lie within [-pi/2, pi/2]".into(),
            ));
        }
        if self.redshift.start < 0.0 {
            return Err(CatalogError::InvalidConfig(
                "redshift range must be non-negative".into(),
            ));
        }
        Ok(())
    }

    fn draw(&self, rng: &mut StdRng) -> Vector3<f64> {
        let (sin_lo, sin_hi) = (self.dec.start.sin(), self.dec.end.sin());
        let ra = self.ra.start + (self.ra.end - self.ra.start) * rng.random::<f64>();
        let dec = (sin_lo + (sin_hi - sin_lo) * rng.random::<f64>()).asin();
        let z = self.redshift.start
            + (self.redshift.end - self.redshift.start) * rng.random::<f64>();
        Vector3::new(ra, dec, z)
    }

    /// The `(ra, dec, z)` rows owned by `rank` in a group of `size` workers.
    pub fn generate(&self, rank: usize, size: usize) -> Vec<Vector3<f64>> {
        let local = shard_range(self.total, rank, size);
        if local.is_empty() {
            return Vec::new();
        }

        let n_blocks = self.total.div_ceil(ROWS_PER_SEED);
        let mut master = StdRng::seed_from_u64(self.seed);
        let seeds: Vec<u64> = (0..n_blocks).map(|_| master.random()).collect();

        let mut rows = Vec::with_capacity(local.len());
        let first_block = local.start / ROWS_PER_SEED;
        let last_block = (local.end - 1) / ROWS_PER_SEED;
        for (block, block_seed) in seeds
            .iter()
            .enumerate()
            .take(last_block + 1)
            .skip(first_block)
        {
            let mut rng = StdRng::seed_from_u64(*block_seed);
            let block_start = block * ROWS_PER_SEED;
            let block_end = (block_start + ROWS_PER_SEED).min(self.total);
            for i in block_start..block_end.min(local.end) {
                let row = self.draw(&mut rng);
                if i >= local.start {
                    rows.push(row);
                }
            }
        }
        rows
    }

    /// Generate the local rows for `comm` and wrap them as a sharded [`ArraySource`].
    pub fn into_source<M: Communicator>(self, comm: &M) -> Result<ArraySource, CatalogError> {
        self.validate()?;
        let rows = self.generate(comm.rank(), comm.size());
        Ok(ArraySource::from_local_rows(
            rows,
            self.total.div_ceil(comm.size().max(1)),
        ))
    }
}

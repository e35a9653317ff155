use serde::{Deserialize, Serialize};

use crate::{
    catalog_errors::CatalogError,
    constants::{MpcH, Redshift, HUBBLE_DISTANCE},
};

use super::Cosmology;

/// Minimum number of Simpson intervals per unit redshift
const SIMPSON_STEPS_PER_UNIT_Z: f64 = 512.0;

/// Flat ΛCDM model (radiation neglected), distances in Mpc/h.
///
/// `E(z) = sqrt(Ωm (1+z)³ + 1 − Ωm)` and `D_C(z) = (c/H0) ∫₀ᶻ dz'/E(z')`.
///
/// Without a call to [`Cosmology::sample`] every distance is integrated directly. After
/// sampling, redshifts inside the grid are linearly interpolated on the cumulative table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatLambdaCdm {
    pub omega_m: f64,
    #[serde(skip)]
    table: Option<DistanceTable>,
}

#[derive(Debug, Clone, PartialEq)]
struct DistanceTable {
    z: Vec<Redshift>,
    distance: Vec<MpcH>,
}

impl FlatLambdaCdm {
    pub fn new(omega_m: f64) -> Self {
        FlatLambdaCdm {
            omega_m,
            table: None,
        }
    }

    #[inline]
    fn efunc(&self, z: Redshift) -> f64 {
        let a = 1.0 + z;
        (self.omega_m * a * a * a + 1.0 - self.omega_m).sqrt()
    }

    /// Composite Simpson integral of 1/E(z) on `[z_lo, z_hi]`.
    fn integrate(&self, z_lo: Redshift, z_hi: Redshift) -> f64 {
        let width = z_hi - z_lo;
        if width <= 0.0 {
            return 0.0;
        }
        let mut n = (width * SIMPSON_STEPS_PER_UNIT_Z).ceil().max(2.0) as usize;
        if n % 2 == 1 {
            n += 1;
        }
        let h = width / n as f64;

        let mut sum = 1.0 / self.efunc(z_lo) + 1.0 / self.efunc(z_hi);
        for i in 1..n {
            let coef = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += coef / self.efunc(z_lo + i as f64 * h);
        }
        sum * h / 3.0
    }

    fn distance_direct(&self, z: Redshift) -> MpcH {
        HUBBLE_DISTANCE * self.integrate(0.0, z)
    }

    fn distance_from_table(&self, table: &DistanceTable, z: Redshift) -> Option<MpcH> {
        let last = *table.z.last()?;
        if z > last {
            return None;
        }
        let idx = table.z.partition_point(|&zi| zi < z);
        if idx == 0 {
            return Some(table.distance[0]);
        }
        let (z0, z1) = (table.z[idx - 1], table.z[idx]);
        let (d0, d1) = (table.distance[idx - 1], table.distance[idx]);
        Some(d0 + (d1 - d0) * (z - z0) / (z1 - z0))
    }
}

impl Cosmology for FlatLambdaCdm {
    fn comoving_distance(&self, redshift: &[Redshift]) -> Result<Vec<MpcH>, CatalogError> {
        redshift
            .iter()
            .map(|&z| {
                if !z.is_finite() || z < 0.0 {
                    return Err(CatalogError::Cosmology(format!(
                        "comoving distance undefined for redshift {z}"
                    )));
                }
                let from_table = self
                    .table
                    .as_ref()
                    .and_then(|table| self.distance_from_table(table, z));
                Ok(from_table.unwrap_or_else(|| self.distance_direct(z)))
            })
            .collect()
    }

    fn sample(&mut self, redshift_grid: &[Redshift]) {
        let mut z = Vec::with_capacity(redshift_grid.len() + 1);
        z.push(0.0);
        z.extend(redshift_grid.iter().copied().filter(|zi| *zi > 0.0));
        z.sort_by(f64::total_cmp);
        z.dedup();

        let mut distance = Vec::with_capacity(z.len());
        let mut acc = 0.0;
        distance.push(0.0);
        for w in z.windows(2) {
            acc += self.integrate(w[0], w[1]);
            distance.push(HUBBLE_DISTANCE * acc);
        }
        self.table = Some(DistanceTable { z, distance });
    }
}

#[cfg(test)]
mod flat_lcdm_test {
    use super::*;
    use crate::conversion::logspace;
    use approx::assert_relative_eq;

    #[test]
    fn test_einstein_de_sitter_closed_form() {
        // Ωm = 1: D_C = 2 (c/H0) (1 − 1/sqrt(1+z))
        let cosmo = FlatLambdaCdm::new(1.0);
        let z = [0.1, 0.5, 1.0, 3.0];
        let d = cosmo.comoving_distance(&z).unwrap();
        for (zi, di) in z.iter().zip(d) {
            let expected = 2.0 * HUBBLE_DISTANCE * (1.0 - 1.0 / (1.0 + zi).sqrt());
            assert_relative_eq!(di, expected, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_sampled_matches_direct() {
        let direct = FlatLambdaCdm::new(0.31);
        let mut sampled = direct.clone();
        sampled.sample(&logspace(-5.0, 1.0, 1024));

        let z = [0.0, 1e-4, 0.35, 0.57, 2.2, 15.0];
        let a = direct.comoving_distance(&z).unwrap();
        let b = sampled.comoving_distance(&z).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(*x, *y, max_relative = 1e-4, epsilon = 1e-9);
        }
        assert_relative_eq!(a[3], 1473.428, max_relative = 1e-5);
    }

    #[test]
    fn test_negative_redshift_fails() {
        let cosmo = FlatLambdaCdm::new(0.3);
        assert!(matches!(
            cosmo.comoving_distance(&[0.5, -0.1]),
            Err(CatalogError::Cosmology(_))
        ));
    }
}

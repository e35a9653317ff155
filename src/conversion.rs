use nalgebra::Vector3;

use crate::{
    catalog_errors::CatalogError,
    constants::{Degree, Radian, RADEG},
    cosmology::Cosmology,
};

/// Convert sky coordinates `(ra, dec, z)` into Cartesian positions.
///
/// For each row, `r = D_C(z)` is evaluated through `cosmo` in a single vectorized call,
/// then
///
/// ```text
/// x = r cos(ra) cos(dec)
/// y = r sin(ra) cos(dec)
/// z = r sin(dec)
/// ```
///
/// and `translate` is added to every output vector.
///
/// Arguments
/// -----------------
/// * `coords`: rows of `(ra, dec, redshift)`, angles in **radians**.
/// * `translate`: vector added after projection (pass the negated centering offset to re-center).
/// * `cosmo`: the comoving-distance model.
///
/// Return
/// ----------
/// * One Cartesian position (Mpc/h) per input row, or the cosmology error unchanged.
///
/// See also
/// ------------
/// * [`Cosmology::comoving_distance`] – The injected radial distance.
pub fn sky_to_cartesian<C: Cosmology + ?Sized>(
    coords: &[Vector3<f64>],
    translate: &Vector3<f64>,
    cosmo: &C,
) -> Result<Vec<Vector3<f64>>, CatalogError> {
    let redshift = redshift_column(coords);
    let distance = cosmo.comoving_distance(&redshift)?;

    Ok(coords
        .iter()
        .zip(distance)
        .map(|(c, r)| {
            let (ra, dec) = (c.x, c.y);
            let (sin_ra, cos_ra) = ra.sin_cos();
            let (sin_dec, cos_dec) = dec.sin_cos();
            Vector3::new(r * cos_ra * cos_dec, r * sin_ra * cos_dec, r * sin_dec) + translate
        })
        .collect())
}

/// The third slot (redshift) of each `(ra, dec, z)` row.
#[inline]
pub fn redshift_column(coords: &[Vector3<f64>]) -> Vec<f64> {
    coords.iter().map(|c| c.z).collect()
}

/// `n` points evenly spaced in log10 between `10^start` and `10^stop`, both included.
pub fn logspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![10f64.powf(start)],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| 10f64.powf(start + step * i as f64))
                .collect()
        }
    }
}

/// Convert an `(ra, dec, z)` row given in degrees into the radian convention used here.
#[inline]
pub fn radec_deg_to_rad(ra: Degree, dec: Degree, redshift: f64) -> Vector3<f64> {
    Vector3::new(ra * RADEG, dec * RADEG, redshift)
}

#[inline]
pub fn deg_to_rad(angle: Degree) -> Radian {
    angle * RADEG
}

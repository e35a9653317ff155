//! Construction-time reduction: every worker scans its share of the `data` source, the
//! coordinator turns the gathered partial results into a [`GlobalGeometry`], and the
//! result is broadcast back verbatim.
//!
//! The collective sequence is always exactly one `gather` followed by one `broadcast`,
//! whatever happens locally. Local failures travel inside the gathered values and the
//! broadcast outcome instead of short-circuiting, so no worker is left waiting on a
//! collective that another worker skipped.
use itertools::Itertools;
use nalgebra::Vector3;
use tracing::{debug, info};

use crate::{
    catalog_errors::CatalogError,
    comm::Communicator,
    config::TracerCatalogConfig,
    constants::POSITION,
    conversion::{redshift_column, sky_to_cartesian},
    cosmology::Cosmology,
    geometry::{resolve_box, CartesianExtent, GlobalGeometry},
    nbar::{estimate_nbar, NbarCurve},
    source::CatalogSource,
};

/// What one worker contributes to the reduction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocalPartial {
    pub extent: CartesianExtent,
    pub redshift: Vec<f64>,
}

/// Stream the local `Position` rows of `data`, tracking the Cartesian extent and keeping
/// the raw redshifts. Empty chunks contribute nothing.
pub(crate) fn scan_local<C: Cosmology + ?Sized>(
    data: &dyn CatalogSource,
    cosmo: &C,
) -> Result<LocalPartial, CatalogError> {
    let mut extent = CartesianExtent::default();
    let mut redshift = Vec::new();

    for chunk in data.read(&[POSITION], false)? {
        let chunk = chunk?;
        let coords = chunk
            .column(0)
            .and_then(|c| c.as_vectors())
            .ok_or_else(|| {
                CatalogError::Source("`Position` must hold (ra, dec, z) rows".to_string())
            })?;
        if coords.is_empty() {
            continue;
        }
        let cartesian = sky_to_cartesian(coords, &Vector3::zeros(), cosmo)?;
        extent.update(&cartesian);
        redshift.extend(redshift_column(coords));
    }
    Ok(LocalPartial { extent, redshift })
}

/// Coordinator-only step: merge the partial results and derive the global parameters.
///
/// The n̄(z) curve is the one handed in (precomputed or loaded from the `nbar` file), or
/// else an estimate from the concatenated redshifts.
pub(crate) fn coordinator_geometry<C: Cosmology + ?Sized>(
    partials: Vec<LocalPartial>,
    cosmo: &C,
    config: &TracerCatalogConfig,
    nbar: Option<NbarCurve>,
) -> Result<(GlobalGeometry, CartesianExtent), CatalogError> {
    let extent = partials
        .iter()
        .fold(CartesianExtent::default(), |acc, p| acc.merge(p.extent));

    let (mut box_size, offset) = resolve_box(&extent, config.box_size_vector(), config.box_pad);
    if let Some(ap) = &config.ap_scaling {
        box_size = ap.apply(&box_size);
    }

    let nbar = match nbar {
        Some(curve) => curve,
        None => {
            let fsky = config.fsky.ok_or(CatalogError::MissingFsky)?;
            let redshift: Vec<f64> = partials.into_iter().flat_map(|p| p.redshift).collect();
            debug!(samples = redshift.len(), "estimating nbar(z) from the data");
            estimate_nbar(&redshift, fsky, 1.0, cosmo)?
        }
    };

    Ok((
        GlobalGeometry {
            box_size,
            offset,
            nbar,
        },
        extent,
    ))
}

/// Run the two-phase reduction and return the geometry shared by every worker.
///
/// Arguments
/// -----------------
/// * `comm`: the worker group.
/// * `data`: the local view of the `data` source.
/// * `cosmo`: comoving-distance model, identical on every worker.
/// * `config`: validated catalog configuration.
/// * `nbar`: optional n̄(z) curve, precomputed or loaded from file (skips the estimation).
///
/// Return
/// ----------
/// * The broadcast [`GlobalGeometry`], bit-identical on every worker.
/// * On failure, the worker where the error happened returns it unchanged and every other
///   worker returns [`CatalogError::Communication`] carrying its message.
pub(crate) fn compute_global_geometry<M, C>(
    comm: &M,
    data: &dyn CatalogSource,
    cosmo: &C,
    config: &TracerCatalogConfig,
    nbar: Option<NbarCurve>,
) -> Result<GlobalGeometry, CatalogError>
where
    M: Communicator,
    C: Cosmology + ?Sized,
{
    let (partial, mut own_error) = match scan_local(data, cosmo) {
        Ok(p) => (Ok(p), None),
        Err(e) => (Err(format!("rank {}: {e}", comm.rank())), Some(e)),
    };

    let gathered = comm.gather(partial)?;

    let mut extent = None;
    let outcome: Option<Result<GlobalGeometry, String>> = gathered.map(|partials| {
        let partials = partials.into_iter().collect::<Result<Vec<_>, String>>()?;
        match coordinator_geometry(partials, cosmo, config, nbar) {
            Ok((geometry, global_extent)) => {
                extent = Some(global_extent);
                Ok(geometry)
            }
            Err(e) => {
                let message = e.to_string();
                own_error.get_or_insert(e);
                Err(message)
            }
        }
    });

    match comm.broadcast(outcome)? {
        Ok(geometry) => {
            if let Some(extent) = extent {
                info!("BoxSize = {}", fmt_vector(&geometry.box_size));
                info!(
                    "cartesian coordinate range: {} : {}",
                    fmt_vector(&extent.min),
                    fmt_vector(&extent.max)
                );
                info!("mean coordinate offset = {}", fmt_vector(&geometry.offset));
            }
            Ok(geometry)
        }
        Err(message) => Err(own_error.unwrap_or_else(|| {
            CatalogError::Communication(format!(
                "the survey geometry could not be built: {message}"
            ))
        })),
    }
}

fn fmt_vector(v: &Vector3<f64>) -> String {
    format!("[{}]", v.iter().map(|x| format!("{x:.4}")).join(", "))
}

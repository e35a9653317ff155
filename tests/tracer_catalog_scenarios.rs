mod common;

use approx::assert_relative_eq;
use nalgebra::Vector3;

use std::sync::atomic::Ordering;

use common::{synthetic_catalog, synthetic_rows, CountingSource, OMEGA_M};
use tracer_catalog::{
    ap_scaling::ApScaling,
    catalog_errors::CatalogError,
    comm::SelfComm,
    config::TracerCatalogConfig,
    constants::{SAMPLE_LOG10_ZMAX, SAMPLE_LOG10_ZMIN, SAMPLE_POINTS, VALID_COLUMNS},
    conversion::{logspace, sky_to_cartesian},
    cosmology::{Cosmology, FlatLambdaCdm},
    geometry::CartesianExtent,
    nbar::NbarCurve,
    source::{ArraySource, Chunk, RowLayout},
    tracer_catalog::{SourceKind, TracerCatalogBuilder},
};

fn sampled_cosmology() -> FlatLambdaCdm {
    let mut cosmo = FlatLambdaCdm::new(OMEGA_M);
    cosmo.sample(&logspace(SAMPLE_LOG10_ZMIN, SAMPLE_LOG10_ZMAX, SAMPLE_POINTS));
    cosmo
}

fn collect_rows(chunks: &[Chunk]) -> usize {
    chunks.iter().map(Chunk::len).sum()
}

#[test]
fn test_auto_box_and_full_data_read() {
    let mut catalog = synthetic_catalog(
        SelfComm,
        RowLayout::Sharded,
        TracerCatalogConfig::default().with_fsky(0.5),
    )
    .unwrap();

    let cosmo = sampled_cosmology();
    let mut extent = CartesianExtent::default();
    extent.update(&sky_to_cartesian(&synthetic_rows(100, 1), &Vector3::zeros(), &cosmo).unwrap());

    assert_eq!(catalog.offset(), extent.center());
    let delta = extent.delta();
    for i in 0..3 {
        assert_eq!(catalog.box_size()[i], (delta[i] * 1.02).trunc());
        assert!(catalog.box_size()[i] >= delta[i]);
        assert_relative_eq!(catalog.box_size()[i], delta[i] * 1.02, max_relative = 1.0 / delta[i]);
    }

    catalog.set_active_source("data").unwrap();
    let chunks: Vec<Chunk> = catalog
        .read(&["Position", "Weight"], false)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(collect_rows(&chunks), 100);
    for chunk in &chunks {
        assert_eq!(chunk.columns().len(), 2);
        assert!(chunk.columns().iter().all(|c| c.len() == chunk.len()));
        assert!(chunk.column(1).unwrap().as_scalars().unwrap().iter().all(|w| *w == 1.0));
    }

    catalog.set_active_source("randoms").unwrap();
    let n_randoms: usize = catalog
        .read(&["Nbar"], true)
        .unwrap()
        .map(|c| c.unwrap().len())
        .sum();
    assert_eq!(n_randoms, 20);
}

#[test]
fn test_fkp_without_fsky_fails_before_reading() {
    let config = TracerCatalogConfig::default().with_fkp_weights(Some(1000.0));
    let result = synthetic_catalog(SelfComm, RowLayout::Sharded, config);
    assert_eq!(result.unwrap_err(), CatalogError::MissingFsky);
}

#[test]
fn test_missing_inputs() {
    let data =
        ArraySource::new(synthetic_rows(10, 3), None, &SelfComm, RowLayout::Sharded).unwrap();

    let no_cosmology = TracerCatalogBuilder::new()
        .data(data.clone())
        .randoms(data.clone())
        .config(TracerCatalogConfig::default().with_fsky(0.5))
        .build(SelfComm);
    assert_eq!(no_cosmology.unwrap_err(), CatalogError::MissingCosmology);

    let no_randoms = TracerCatalogBuilder::new()
        .data(data)
        .cosmology(FlatLambdaCdm::new(OMEGA_M))
        .config(TracerCatalogConfig::default().with_fsky(0.5))
        .build(SelfComm);
    assert!(matches!(no_randoms, Err(CatalogError::InvalidConfig(_))));
}

#[test]
fn test_unknown_column_lists_valid_names() {
    let mut catalog = synthetic_catalog(
        SelfComm,
        RowLayout::Sharded,
        TracerCatalogConfig::default().with_fsky(0.5),
    )
    .unwrap();
    catalog.set_active(SourceKind::Data);

    match catalog.read(&["Velocity"], false) {
        Err(CatalogError::InvalidColumns { requested, valid }) => {
            assert_eq!(requested, vec!["Velocity".to_string()]);
            assert_eq!(valid, VALID_COLUMNS.map(String::from).to_vec());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("`Velocity` should be rejected"),
    }
    let message = CatalogError::invalid_columns(&["Velocity"], &VALID_COLUMNS).to_string();
    for name in VALID_COLUMNS {
        assert!(message.contains(name));
    }
}

#[test]
fn test_construction_is_idempotent() {
    let build = || {
        synthetic_catalog(
            SelfComm,
            RowLayout::Sharded,
            TracerCatalogConfig::default().with_fsky(0.5),
        )
        .unwrap()
    };
    let (a, b) = (build(), build());

    assert_eq!(a.geometry(), b.geometry());
    let grid = logspace(-1.0, 0.0, 50);
    let (na, nb) = (a.nbar().evaluate(&grid), b.nbar().evaluate(&grid));
    assert!(na.iter().zip(&nb).all(|(x, y)| x.to_bits() == y.to_bits()));
}

#[test]
fn test_estimated_nbar_matches_sample_density() {
    let catalog = synthetic_catalog(
        SelfComm,
        RowLayout::Sharded,
        TracerCatalogConfig::default().with_fsky(0.5),
    )
    .unwrap();

    // 100 objects spread over the shell 0.4 < z < 0.6 on half the sky
    let cosmo = sampled_cosmology();
    let r = cosmo.comoving_distance(&[0.4, 0.6]).unwrap();
    let shell = (4.0 / 3.0) * std::f64::consts::PI * (r[1].powi(3) - r[0].powi(3)) * 0.5;
    let mean = 100.0 / shell;
    assert_relative_eq!(catalog.nbar().eval(0.5), mean, max_relative = 0.6);
    assert!(catalog.nbar().eval(0.5) > 0.0);
}

#[test]
fn test_nbar_file_replaces_estimation() {
    let config = TracerCatalogConfig::default().with_nbar_file("tests/data/nbar.txt");
    let mut catalog = synthetic_catalog(SelfComm, RowLayout::Sharded, config).unwrap();

    let (z, nbar) = catalog.nbar().knots();
    assert_eq!(z, &[0.4, 0.45, 0.5, 0.55, 0.6, 0.65]);
    assert_eq!(nbar[4], 2.8e-4);
    assert_relative_eq!(catalog.nbar().eval(0.55), 3.3e-4, epsilon = 1e-15);

    catalog.set_active(SourceKind::Data);
    for chunk in catalog.read(&["Nbar"], false).unwrap() {
        let chunk = chunk.unwrap();
        let values = chunk.column(0).unwrap().as_scalars().unwrap();
        assert!(values.iter().all(|n| (2.1e-4..=3.7e-4).contains(n)));
    }

    let missing = TracerCatalogConfig::default().with_nbar_file("tests/data/missing.txt");
    assert_eq!(
        synthetic_catalog(SelfComm, RowLayout::Sharded, missing).unwrap_err(),
        CatalogError::NbarFileNotFound("tests/data/missing.txt".into())
    );
}

#[test]
fn test_precomputed_nbar_skips_fsky() {
    let nbar = NbarCurve::from_knots(vec![0.3, 0.7], vec![1e-4, 1e-4]).unwrap();
    let data =
        ArraySource::new(synthetic_rows(30, 4), None, &SelfComm, RowLayout::Sharded).unwrap();
    let catalog = TracerCatalogBuilder::new()
        .data(data.clone())
        .randoms(data)
        .cosmology(FlatLambdaCdm::new(OMEGA_M))
        .nbar(nbar.clone())
        .config(TracerCatalogConfig::default().with_fkp_weights(Some(1e4)))
        .build(SelfComm)
        .unwrap();
    assert_eq!(catalog.nbar(), &nbar);

    let mut catalog = catalog;
    catalog.set_active(SourceKind::Randoms);
    for chunk in catalog.read(&["Weight"], true).unwrap() {
        let chunk = chunk.unwrap();
        for w in chunk.column(0).unwrap().as_scalars().unwrap() {
            assert_relative_eq!(*w, 0.5, max_relative = 1e-12);
        }
    }
}

#[test]
fn test_supplied_box_size_is_kept() {
    let config = TracerCatalogConfig::default()
        .with_fsky(0.5)
        .with_box_size(10.0);
    let catalog = synthetic_catalog(SelfComm, RowLayout::Sharded, config).unwrap();
    assert_eq!(catalog.box_size(), Vector3::repeat(10.0));
}

#[test]
fn test_ap_scaling_rescales_box_and_positions() {
    let ap = ApScaling::new(0.9, 1.1);
    let plain = {
        let mut c = synthetic_catalog(
            SelfComm,
            RowLayout::Sharded,
            TracerCatalogConfig::default().with_fsky(0.5),
        )
        .unwrap();
        c.set_active(SourceKind::Data);
        c
    };
    let scaled = {
        let mut c = synthetic_catalog(
            SelfComm,
            RowLayout::Sharded,
            TracerCatalogConfig::default().with_fsky(0.5).with_ap_scaling(ap),
        )
        .unwrap();
        c.set_active(SourceKind::Data);
        c
    };

    assert_eq!(scaled.box_size(), ap.apply(&plain.box_size()));
    assert_eq!(scaled.offset(), plain.offset());

    let positions = |c: &tracer_catalog::TracerCatalog<SelfComm>| -> Vec<Vector3<f64>> {
        c.read(&["Position"], true)
            .unwrap()
            .flat_map(|chunk| chunk.unwrap().into_columns())
            .flat_map(|col| col.into_vectors().unwrap())
            .collect()
    };
    for (p, s) in positions(&plain).iter().zip(positions(&scaled)) {
        assert_relative_eq!(s, ap.apply(p), max_relative = 1e-14);
    }
}

#[test]
fn test_bad_nbar_file_fails_before_scanning_data() {
    let data = ArraySource::new(synthetic_rows(100, 1), None, &SelfComm, RowLayout::Sharded)
        .unwrap()
        .with_chunk_size(16);
    let (data, scanned) = CountingSource::new(data);
    let randoms =
        ArraySource::new(synthetic_rows(20, 2), None, &SelfComm, RowLayout::Sharded).unwrap();

    let result = TracerCatalogBuilder::new()
        .data(data)
        .randoms(randoms)
        .cosmology(FlatLambdaCdm::new(OMEGA_M))
        .config(TracerCatalogConfig::default().with_nbar_file("no/such/file.txt"))
        .build(SelfComm);

    assert_eq!(
        result.unwrap_err(),
        CatalogError::NbarFileNotFound("no/such/file.txt".into())
    );
    assert_eq!(scanned.load(Ordering::SeqCst), 0);
}

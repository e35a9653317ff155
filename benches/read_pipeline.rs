use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tracer_catalog::{
    comm::SelfComm,
    config::TracerCatalogConfig,
    constants::{SAMPLE_LOG10_ZMAX, SAMPLE_LOG10_ZMIN, SAMPLE_POINTS},
    conversion::{logspace, radec_deg_to_rad, sky_to_cartesian},
    cosmology::{Cosmology, FlatLambdaCdm},
    nbar::estimate_nbar,
    source::{ArraySource, RowLayout},
    tracer_catalog::{SourceKind, TracerCatalogBuilder},
};

/// Uniform rows in a 40° x 30° patch, 0.2 < z < 0.8
fn make_rows(n: usize, seed: u64) -> Vec<Vector3<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            radec_deg_to_rad(
                rng.random_range(150.0..190.0),
                rng.random_range(0.0..30.0),
                rng.random_range(0.2..0.8),
            )
        })
        .collect()
}

fn sampled_cosmology() -> FlatLambdaCdm {
    let mut cosmo = FlatLambdaCdm::new(0.31);
    cosmo.sample(&logspace(SAMPLE_LOG10_ZMIN, SAMPLE_LOG10_ZMAX, SAMPLE_POINTS));
    cosmo
}

fn bench_projection(c: &mut Criterion) {
    let cosmo = sampled_cosmology();
    let rows = make_rows(100_000, 0xC0FFEE);
    let translate = Vector3::new(-100.0, 250.0, -900.0);

    c.bench_function("sky_to_cartesian/100k", |b| {
        b.iter(|| sky_to_cartesian(black_box(&rows), &translate, &cosmo).unwrap())
    });
}

fn bench_nbar_estimate(c: &mut Criterion) {
    let cosmo = sampled_cosmology();
    let redshift: Vec<f64> = make_rows(100_000, 7).iter().map(|r| r.z).collect();

    c.bench_function("estimate_nbar/100k", |b| {
        b.iter(|| estimate_nbar(black_box(&redshift), 0.5, 1.0, &cosmo).unwrap())
    });
}

fn bench_catalog_read(c: &mut Criterion) {
    let rows = make_rows(50_000, 42);

    c.bench_function("tracer_catalog/build_and_read_50k", |b| {
        b.iter_batched(
            || {
                (
                    ArraySource::new(rows.clone(), None, &SelfComm, RowLayout::Sharded).unwrap(),
                    ArraySource::new(Vec::new(), None, &SelfComm, RowLayout::Sharded).unwrap(),
                )
            },
            |(data, randoms)| {
                let mut catalog = TracerCatalogBuilder::new()
                    .data(data)
                    .randoms(randoms)
                    .cosmology(FlatLambdaCdm::new(0.31))
                    .config(
                        TracerCatalogConfig::default()
                            .with_fsky(0.5)
                            .with_fkp_weights(Some(1e4)),
                    )
                    .build(SelfComm)
                    .unwrap();
                catalog.set_active(SourceKind::Data);
                let rows: usize = catalog
                    .read(&["Position", "Weight", "Nbar"], false)
                    .unwrap()
                    .map(|chunk| chunk.unwrap().len())
                    .sum();
                black_box(rows)
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_projection,
    bench_nbar_estimate,
    bench_catalog_read
);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;

use swathgeo::geocoding::{
    GcpGeocoding, Geocoding, GroundControlPoint, Method, PixelSearchConfig, PixelSearchGeocoding,
    TiePointGeocoding,
};
use swathgeo::position::{GeoPosition, PixelPosition};
use swathgeo::raster::{SceneGeometry, TiePointGrid};
use swathgeo::rotation::SphericalRotator;

fn make_tie_point_geocoding(grid_size: usize, scene_size: usize) -> TiePointGeocoding {
    let mut lat = Vec::with_capacity(grid_size * grid_size);
    let mut lon = Vec::with_capacity(grid_size * grid_size);
    for j in 0..grid_size {
        for i in 0..grid_size {
            // Gently curved swath covering ~20 degrees.
            let u = i as f64 / (grid_size - 1) as f64;
            let v = j as f64 / (grid_size - 1) as f64;
            lat.push(40.0 + 20.0 * v + 0.5 * u * v);
            lon.push(5.0 + 20.0 * u - 0.3 * v * v);
        }
    }
    let step = (scene_size - 1) as f64 / (grid_size - 1) as f64;
    let lat_grid = TiePointGrid::new(grid_size, grid_size, 0.5, 0.5, step, step, lat).unwrap();
    let lon_grid = TiePointGrid::new(grid_size, grid_size, 0.5, 0.5, step, step, lon).unwrap();
    TiePointGeocoding::new(
        lat_grid,
        lon_grid,
        SceneGeometry::new(scene_size, scene_size),
    )
    .unwrap()
}

fn make_gcp_geocoding(n_per_axis: usize) -> GcpGeocoding {
    let mut gcps = Vec::new();
    for j in 0..n_per_axis {
        for i in 0..n_per_axis {
            let x = i as f64 * 100.0;
            let y = j as f64 * 100.0;
            gcps.push(GroundControlPoint::new(
                PixelPosition::new(x, y),
                GeoPosition::new(48.0 - 0.001 * y + 1e-5 * x, 11.0 + 0.001 * x),
            ));
        }
    }
    let size = (n_per_axis - 1) * 100 + 1;
    GcpGeocoding::new(gcps, Method::Polynomial2, SceneGeometry::new(size, size)).unwrap()
}

fn make_pixel_search_geocoding(size: usize, fractional: bool) -> PixelSearchGeocoding {
    let lat = Array2::from_shape_fn((size, size), |(y, x)| {
        30.0 + 0.01 * y as f64 + 0.002 * x as f64
    });
    let lon = Array2::from_shape_fn((size, size), |(y, x)| {
        10.0 + 0.01 * x as f64 - 0.002 * y as f64
    });
    let config = PixelSearchConfig {
        fraction_accuracy: fractional,
        ..PixelSearchConfig::default()
    };
    PixelSearchGeocoding::new(&lat, &lon, None, config, None).unwrap()
}

fn bench_tie_point_geo_to_pixel(c: &mut Criterion) {
    for &grid_size in &[16, 64, 128] {
        let gc = make_tie_point_geocoding(grid_size, 2048);
        // Force the lazy tile build outside the measurement.
        gc.geo_to_pixel(GeoPosition::new(50.0, 15.0));

        c.bench_function(&format!("tie_point_geo_to_pixel_{grid_size}grid"), |b| {
            let mut i = 0usize;
            b.iter(|| {
                i = (i + 1) % 100;
                let lat = 41.0 + 0.18 * i as f64;
                let lon = 6.0 + 0.18 * i as f64;
                black_box(gc.geo_to_pixel(GeoPosition::new(lat, lon)))
            });
        });
    }
}

fn bench_tie_point_pixel_to_geo(c: &mut Criterion) {
    let gc = make_tie_point_geocoding(64, 2048);

    c.bench_function("tie_point_pixel_to_geo", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 7) % 2048;
            black_box(gc.pixel_to_geo(PixelPosition::new(i as f64, (2047 - i) as f64)))
        });
    });
}

fn bench_tie_point_tile_build(c: &mut Criterion) {
    // Tile fits log their diagnostics; honor RUST_LOG when set.
    let _ = env_logger::try_init();
    for &grid_size in &[16, 64] {
        c.bench_function(&format!("tie_point_tile_build_{grid_size}grid"), |b| {
            b.iter(|| {
                let gc = make_tie_point_geocoding(grid_size, 2048);
                black_box(gc.geo_to_pixel(GeoPosition::new(50.0, 15.0)))
            });
        });
    }
}

fn bench_gcp_round_trip(c: &mut Criterion) {
    let gc = make_gcp_geocoding(5);

    c.bench_function("gcp_geo_to_pixel", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % 100;
            let lat = 47.7 + 0.003 * i as f64;
            let lon = 11.1 + 0.003 * i as f64;
            black_box(gc.geo_to_pixel(GeoPosition::new(lat, lon)))
        });
    });

    c.bench_function("gcp_pixel_to_geo", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 3) % 400;
            black_box(gc.pixel_to_geo(PixelPosition::new(i as f64, (400 - i) as f64)))
        });
    });
}

fn bench_gcp_fit(c: &mut Criterion) {
    let _ = env_logger::try_init();
    for &n in &[5usize, 10] {
        c.bench_function(&format!("gcp_fit_{}points", n * n), |b| {
            b.iter(|| black_box(make_gcp_geocoding(n)));
        });
    }
}

fn bench_pixel_search(c: &mut Criterion) {
    for &fractional in &[false, true] {
        let gc = make_pixel_search_geocoding(512, fractional);
        let label = if fractional { "fractional" } else { "whole" };

        c.bench_function(&format!("pixel_search_geo_to_pixel_{label}"), |b| {
            let mut i = 0usize;
            b.iter(|| {
                i = (i + 1) % 100;
                let lat = 31.0 + 0.03 * i as f64;
                let lon = 11.0 + 0.03 * i as f64;
                black_box(gc.geo_to_pixel(GeoPosition::new(lat, lon)))
            });
        });

        c.bench_function(&format!("pixel_search_pixel_to_geo_{label}"), |b| {
            let mut i = 0usize;
            b.iter(|| {
                i = (i + 7) % 512;
                black_box(gc.pixel_to_geo(PixelPosition::new(i as f64 + 0.3, i as f64 + 0.7)))
            });
        });
    }
}

fn bench_rotator_batch(c: &mut Criterion) {
    let rotator = SphericalRotator::new(120.0, -45.0, 30.0);
    let n = 100_000;
    let mut lons: Vec<f64> = (0..n).map(|i| -180.0 + 360.0 * i as f64 / n as f64).collect();
    let mut lats: Vec<f64> = (0..n).map(|i| -85.0 + 170.0 * i as f64 / n as f64).collect();

    c.bench_function("rotator_batch_100k", |b| {
        b.iter(|| {
            rotator.transform_slices(&mut lons, &mut lats);
            rotator.transform_slices_inversely(&mut lons, &mut lats);
        });
    });
}

criterion_group!(
    benches,
    bench_tie_point_geo_to_pixel,
    bench_tie_point_pixel_to_geo,
    bench_tie_point_tile_build,
    bench_gcp_round_trip,
    bench_gcp_fit,
    bench_pixel_search,
    bench_rotator_batch
);
criterion_main!(benches);

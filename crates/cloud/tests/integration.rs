//! Live tests against the Earth Engine REST service.
//!
//! Tests marked `#[ignore]` need network access plus credentials:
//! `EARTHENGINE_TOKEN` (e.g. from `gcloud auth print-access-token`) and
//! `SATEMBED_EARTH_ENGINE__PROJECT`.
//! Run with: `cargo test -p satembed-cloud -- --ignored`

use satembed_cloud::blocking::SessionBlocking;
use satembed_cloud::{ConfigLoader, FetchOptions};
use satembed_core::create_region;

fn live_session() -> SessionBlocking {
    let config = ConfigLoader::new().load().expect("failed to load config");
    SessionBlocking::connect(None, config).expect("failed to connect")
}

/// Resolve one year of embeddings over a small area in Iowa.
#[test]
#[ignore]
fn test_live_resolve_embeddings() {
    let session = live_session();
    let region = create_region(-93.70, 41.98, -93.66, 42.01).unwrap();
    let image = session
        .get_satellite_embeddings(&region, 2023, 2024)
        .expect("failed to resolve embeddings");

    assert!(!image.images().is_empty());
    assert_eq!(image.band_count(), 64);
    println!("{:?}", image);
}

/// Materialize a coarse cube and check pixels are unit-length vectors.
#[test]
#[ignore]
fn test_live_fetch_small_cube() {
    let session = live_session();
    let region = create_region(-93.70, 41.98, -93.66, 42.01).unwrap();
    let image = session.get_satellite_embeddings(&region, 2023, 2024).unwrap();

    let options = FetchOptions {
        scale: 100.0,
        max_pixels: 10_000,
    };
    let cube = session.fetch_cube(&image, &options).expect("failed to fetch cube");
    println!("cube {}x{}x{}, scale {:?}", cube.rows(), cube.cols(), cube.band_count(), cube.scale());
    assert!(cube.valid_count() > 0);

    let (rows, cols) = cube.shape();
    let (r, c) = (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .find(|&(r, c)| cube.is_valid(r, c))
        .unwrap();
    let norm: f32 = cube.pixel(r, c).unwrap().iter().map(|v| v * v).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 0.05, "embedding norm was {norm}");
}

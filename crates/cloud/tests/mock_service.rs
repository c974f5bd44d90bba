//! End-to-end fetch tests against a fake Earth Engine endpoint.

use mockito::{Matcher, Server, ServerGuard};
use satembed_cloud::blocking::SessionBlocking;
use satembed_cloud::{CloudError, FetchOptions, SatembedConfig};
use satembed_core::create_region;
use serde_json::json;
use tiff::encoder::{colortype::RGB32Float, TiffEncoder};

const PROJECT: &str = "test-project";
const TOKEN: &str = "test-token";
const COLLECTION_PATH: &str = "/v1/projects/earthengine-public/assets/GOOGLE/SATELLITE_EMBEDDING/V1/ANNUAL";

fn config(server: &ServerGuard) -> SatembedConfig {
    let mut config = SatembedConfig::default();
    config.earth_engine.endpoint = format!("{}/v1", server.url());
    config.earth_engine.project = Some(PROJECT.into());
    config.earth_engine.token = Some(TOKEN.into());
    config.fetch.max_retries = 0;
    config.fetch.max_request_pixels = 100;
    config
}

/// 3-band float GeoTIFF as returned by getPixels.
fn pixels(width: usize, height: usize, value: impl Fn(usize, usize) -> f32) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        for col in 0..width {
            let v = value(row, col);
            data.extend_from_slice(&[v, v, v]);
        }
    }
    let mut buf = std::io::Cursor::new(Vec::new());
    TiffEncoder::new(&mut buf)
        .unwrap()
        .write_image::<RGB32Float>(width as u32, height as u32, &data)
        .unwrap();
    buf.into_inner()
}

fn mock_verify(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("GET", format!("/v1/projects/{PROJECT}:listAssets").as_str())
        .match_query(Matcher::UrlEncoded("pageSize".into(), "1".into()))
        .match_header("authorization", format!("Bearer {TOKEN}").as_str())
        .match_header("x-goog-user-project", PROJECT)
        .with_header("content-type", "application/json")
        .with_body(r#"{"assets": []}"#)
        .create()
}

fn image_json(id: &str, start: &str) -> serde_json::Value {
    json!({
        "name": format!("projects/earthengine-public/assets/GOOGLE/SATELLITE_EMBEDDING/V1/ANNUAL/{id}"),
        "id": format!("GOOGLE/SATELLITE_EMBEDDING/V1/ANNUAL/{id}"),
        "startTime": start,
        "bands": [{"id": "A00"}, {"id": "A01"}, {"id": "A02"}]
    })
}

#[test]
fn setup_sends_bearer_token_and_project() {
    let mut server = Server::new();
    let verify = mock_verify(&mut server);

    let session = SessionBlocking::connect(None, config(&server)).unwrap();
    assert_eq!(session.session().project(), PROJECT);
    verify.assert();
}

#[test]
fn rejected_token_is_auth_error() {
    let mut server = Server::new();
    let _m = server
        .mock("GET", format!("/v1/projects/{PROJECT}:listAssets").as_str())
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"error": {"code": 401, "message": "Request had invalid authentication credentials."}}"#)
        .create();

    let err = SessionBlocking::connect(None, config(&server)).unwrap_err();
    assert!(matches!(err, CloudError::Auth(_)), "got {err:?}");
}

#[test]
fn missing_project_is_auth_error() {
    let server = Server::new();
    let mut config = config(&server);
    config.earth_engine.project = None;

    let err = SessionBlocking::connect(None, config).unwrap_err();
    assert!(matches!(err, CloudError::Auth(_)));
}

#[test]
fn later_years_paint_over_earlier_ones() {
    let mut server = Server::new();
    let _verify = mock_verify(&mut server);

    // Listed out of order; the fetcher sorts by start time.
    let list = server
        .mock("GET", format!("{COLLECTION_PATH}:listImages").as_str())
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("startTime".into(), "2022-01-01T00:00:00Z".into()),
            Matcher::UrlEncoded("endTime".into(), "2024-01-01T00:00:00Z".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(
            json!({"images": [image_json("2023", "2023-01-01T00:00:00Z"), image_json("2022", "2022-01-01T00:00:00Z")]})
                .to_string(),
        )
        .create();

    // 10x10 grid on a single request tile
    let older = server
        .mock("POST", format!("{COLLECTION_PATH}/2022:getPixels").as_str())
        .match_body(Matcher::PartialJson(json!({
            "fileFormat": "GEO_TIFF",
            "bandIds": ["A00", "A01", "A02"],
            "grid": {"dimensions": {"width": 10, "height": 10}, "crsCode": "EPSG:4326"}
        })))
        .with_body(pixels(10, 10, |_, _| 1.0))
        .create();
    // Left half masked (zero vectors) in the newer year
    let newer = server
        .mock("POST", format!("{COLLECTION_PATH}/2023:getPixels").as_str())
        .with_body(pixels(10, 10, |_, col| if col < 5 { 0.0 } else { 2.0 }))
        .create();

    let session = SessionBlocking::connect(None, config(&server)).unwrap();
    let region = create_region(0.0, 0.0, 0.01, 0.01).unwrap();
    let image = session.get_satellite_embeddings(&region, 2022, 2024).unwrap();
    assert_eq!(image.band_names(), &["A00", "A01", "A02"]);
    assert!(image.images()[0].name.ends_with("/2022"));

    let cube = session
        .fetch_cube(&image, &FetchOptions { scale: 111.32, max_pixels: 1_000 })
        .unwrap();

    list.assert();
    older.assert();
    newer.assert();
    assert_eq!(cube.shape(), (10, 10));
    assert_eq!(cube.band_count(), 3);
    assert_eq!(cube.valid_count(), 100);
    assert_eq!(cube.pixel(3, 2).unwrap()[0], 1.0);
    assert_eq!(cube.pixel(3, 7).unwrap()[1], 2.0);
    assert_eq!(cube.crs().map(|c| c.epsg()), Some(4326));
    assert!((cube.scale().unwrap() - 111.32).abs() < 1e-9);
}

#[test]
fn large_grids_split_into_request_tiles() {
    let mut server = Server::new();
    let _verify = mock_verify(&mut server);
    let _list = server
        .mock("GET", format!("{COLLECTION_PATH}:listImages").as_str())
        .match_query(Matcher::Any)
        .with_body(json!({"images": [image_json("2024", "2024-01-01T00:00:00Z")]}).to_string())
        .create();
    // 20x20 grid with 100-pixel requests: four 10x10 tiles
    let tiles = server
        .mock("POST", format!("{COLLECTION_PATH}/2024:getPixels").as_str())
        .with_body(pixels(10, 10, |row, col| (row * 10 + col) as f32 + 1.0))
        .expect(4)
        .create();

    let session = SessionBlocking::connect(None, config(&server)).unwrap();
    let region = create_region(0.0, 0.0, 0.02, 0.02).unwrap();
    let image = session.get_satellite_embeddings(&region, 2024, 2025).unwrap();
    let cube = session
        .fetch_cube(&image, &FetchOptions { scale: 111.32, max_pixels: 1_000 })
        .unwrap();

    tiles.assert();
    assert_eq!(cube.shape(), (20, 20));
    assert_eq!(cube.valid_count(), 400);
    // Each tile carries its own local pattern
    assert_eq!(cube.pixel(10, 10).unwrap()[0], 1.0);
    assert_eq!(cube.pixel(19, 19).unwrap()[0], 100.0);
}

#[test]
fn empty_listing_is_data_unavailable() {
    let mut server = Server::new();
    let _verify = mock_verify(&mut server);
    let _list = server
        .mock("GET", format!("{COLLECTION_PATH}:listImages").as_str())
        .match_query(Matcher::Any)
        .with_body("{}")
        .create();

    let session = SessionBlocking::connect(None, config(&server)).unwrap();
    let region = create_region(0.0, 0.0, 0.01, 0.01).unwrap();
    let err = session.get_satellite_embeddings(&region, 2017, 2018).unwrap_err();
    assert!(matches!(err, CloudError::DataUnavailable(_)), "got {err:?}");
}

#[test]
fn reversed_years_fail_without_a_request() {
    let mut server = Server::new();
    let _verify = mock_verify(&mut server);
    let list = server
        .mock("GET", format!("{COLLECTION_PATH}:listImages").as_str())
        .match_query(Matcher::Any)
        .expect(0)
        .create();

    let session = SessionBlocking::connect(None, config(&server)).unwrap();
    let region = create_region(0.0, 0.0, 0.01, 0.01).unwrap();
    let err = session.get_satellite_embeddings(&region, 2024, 2023).unwrap_err();
    assert!(err.is_validation());
    list.assert();
}

#[test]
fn wrong_band_count_is_invalid_tiff() {
    let mut server = Server::new();
    let _verify = mock_verify(&mut server);
    let _list = server
        .mock("GET", format!("{COLLECTION_PATH}:listImages").as_str())
        .match_query(Matcher::Any)
        .with_body(
            json!({"images": [{
                "name": "projects/earthengine-public/assets/GOOGLE/SATELLITE_EMBEDDING/V1/ANNUAL/2024",
                "bands": [{"id": "A00"}, {"id": "A01"}]
            }]})
            .to_string(),
        )
        .create();
    let _pixels = server
        .mock("POST", format!("{COLLECTION_PATH}/2024:getPixels").as_str())
        .with_body(pixels(10, 10, |_, _| 1.0))
        .create();

    let session = SessionBlocking::connect(None, config(&server)).unwrap();
    let region = create_region(0.0, 0.0, 0.01, 0.01).unwrap();
    let image = session.get_satellite_embeddings(&region, 2024, 2025).unwrap();
    let err = session
        .fetch_cube(&image, &FetchOptions { scale: 111.32, max_pixels: 1_000 })
        .unwrap_err();
    assert!(matches!(err, CloudError::InvalidTiff { .. }), "got {err:?}");
}

#[test]
fn zero_scale_fails_without_fetching_pixels() {
    let mut server = Server::new();
    let _verify = mock_verify(&mut server);
    let _list = server
        .mock("GET", format!("{COLLECTION_PATH}:listImages").as_str())
        .match_query(Matcher::Any)
        .with_body(json!({"images": [image_json("2024", "2024-01-01T00:00:00Z")]}).to_string())
        .create();
    let get_pixels = server
        .mock("POST", format!("{COLLECTION_PATH}/2024:getPixels").as_str())
        .expect(0)
        .create();

    let session = SessionBlocking::connect(None, config(&server)).unwrap();
    let region = create_region(0.0, 0.0, 0.01, 0.01).unwrap();
    let image = session.get_satellite_embeddings(&region, 2024, 2025).unwrap();
    let err = session
        .fetch_cube(&image, &FetchOptions { scale: 0.0, max_pixels: 1_000 })
        .unwrap_err();
    assert!(matches!(err, CloudError::InvalidRequest(_)), "got {err:?}");
    get_pixels.assert();
}

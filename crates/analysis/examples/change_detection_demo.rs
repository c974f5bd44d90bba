//! Compare the 2018 and 2024 embeddings of an area near Santiago and write
//! both change maps as GeoTIFF and PNG.
//!
//! ```text
//! EARTHENGINE_TOKEN=$(gcloud auth print-access-token) \
//!     cargo run -p satembed-analysis --example change_detection_demo -- my-project
//! ```

use std::path::PathBuf;

use anyhow::Context;
use satembed_analysis::prelude::*;
use satembed_cloud::blocking;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn main() -> anyhow::Result<()> {
    setup_logging(std::env::var_os("SATEMBED_VERBOSE").is_some());

    let project = std::env::args().nth(1);
    let out_dir = PathBuf::from("output/change");

    let session = blocking::setup_ee(project.as_deref()).context("connecting to Earth Engine")?;
    let region = create_region(-70.70, -33.50, -70.60, -33.40)?;

    let t1 = blocking::get_satellite_embeddings(&session, &region, 2018, 2019)?;
    let t2 = blocking::get_satellite_embeddings(&session, &region, 2024, 2025)?;
    let analysis = ChangeDetectionAnalysis::new(&t1, &t2, region)?;

    let mad = analysis.compute_mean_absolute_difference()?;
    let cosine = analysis.compute_cosine_similarity()?;

    let mad_tif = analysis.export_change_map(&mad, out_dir.join("mad.tif"), None)?;
    let cos_tif = analysis.export_change_map(&cosine, out_dir.join("cosine.tif"), None)?;

    ChangeDetectionAnalysis::visualize_change_map(&mad_tif, out_dir.join("mad.png"), &VisualizeOptions::default())?;
    let cos_options = VisualizeOptions {
        scheme: ColorScheme::BlueWhiteRed,
        vmin: Some(-1.0),
        vmax: Some(1.0),
        ..Default::default()
    };
    ChangeDetectionAnalysis::visualize_change_map(&cos_tif, out_dir.join("cosine.png"), &cos_options)?;

    info!(dir = %out_dir.display(), "done");
    Ok(())
}

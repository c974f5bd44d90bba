//! Cluster the 2024 embeddings of an area near Santiago for several k and
//! write the GeoTIFFs, an interactive map and a comparison panel.
//!
//! Needs `EARTHENGINE_TOKEN` and a Cloud project:
//!
//! ```text
//! EARTHENGINE_TOKEN=$(gcloud auth print-access-token) \
//!     cargo run -p satembed-analysis --example clustering_demo -- my-project
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
    let verbose = std::env::var_os("SATEMBED_VERBOSE").is_some();
    setup_logging(verbose);

    let project = std::env::args().nth(1);
    let out_dir = PathBuf::from("output/clustering");

    let session = blocking::setup_ee(project.as_deref()).context("connecting to Earth Engine")?;
    let region = create_region(-70.70, -33.50, -70.60, -33.40)?;

    let image = session.get_satellite_embeddings(&region, 2024, 2025)?;
    let cube = session.sample_cube(&image, 4000)?;
    info!(rows = cube.rows(), cols = cube.cols(), "fetched embedding cube");

    let analysis = ClusteringAnalysis::new(cube, region, ClusteringParams::default())?;

    let ks = [3, 5, 8];
    for stats in analysis.sweep(&ks)? {
        println!("{}", serde_json::to_string(&stats)?);
    }

    let mut paths = Vec::with_capacity(ks.len());
    for &k in &ks {
        paths.push(analysis.export_clusters(k, out_dir.join(format!("clusters_k{k}.tif")), None)?);
    }
    let map = analysis.create_interactive_map(5, out_dir.join("clusters_k5.html"), 13)?;
    let panel =
        ClusteringAnalysis::create_cluster_panel(&paths, &ks, out_dir.join("cluster_panel.png"), &PanelOptions::default())?;

    info!(map = %map.display(), panel = %panel.display(), "done");
    Ok(())
}

//! # satembed cloud
//!
//! Earth Engine REST client for annual satellite embedding images.
//!
//! A [`Session`] authenticates with an OAuth bearer token and a Cloud
//! project. [`get_satellite_embeddings`] resolves the images intersecting a
//! region and year range into an [`EmbeddingImage`] handle, which is
//! materialized into an [`EmbeddingCube`](satembed_core::EmbeddingCube) on a
//! grid bounded by a pixel cap, fetching request tiles concurrently.
//!
//! ## Features
//!
//! - `native` (default): blocking API via tokio `block_on`

pub mod auth;
pub mod config;
pub mod earth_engine;
pub mod ee_models;
pub mod embeddings;
pub mod error;
pub mod grid;
pub mod http;
pub mod session;

pub mod sync_api;

pub use auth::{BearerToken, CloudAuth, NoAuth};
pub use config::{ConfigLoader, EarthEngineConfig, FetchConfig, SatembedConfig};
pub use earth_engine::{EarthEngineClient, EarthEngineClientOptions};
pub use embeddings::{get_satellite_embeddings, EmbeddingImage, FetchOptions};
pub use error::{CloudError, Result};
pub use grid::{FetchGrid, TileRequest};
pub use session::{setup_ee, Session};

/// Blocking API re-exported as `blocking` module (native only).
#[cfg(feature = "native")]
pub mod blocking {
    pub use crate::sync_api::*;
}

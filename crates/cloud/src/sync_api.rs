//! Blocking (synchronous) API for native platforms.
//!
//! Wraps the async [`Session`] with a Tokio runtime so callers don't need
//! to manage their own async runtime.

#[cfg(feature = "native")]
mod inner {
    use satembed_core::{EmbeddingCube, Region};

    use crate::config::{ConfigLoader, SatembedConfig};
    use crate::embeddings::{EmbeddingImage, FetchOptions};
    use crate::error::{CloudError, Result};
    use crate::session::Session;

    fn runtime() -> Result<tokio::runtime::Runtime> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CloudError::Network(e.to_string()))
    }

    /// Blocking wrapper around [`Session`].
    ///
    /// Uses an internal single-threaded Tokio runtime.
    #[derive(Debug)]
    pub struct SessionBlocking {
        rt: tokio::runtime::Runtime,
        inner: Session,
    }

    impl SessionBlocking {
        /// Connect with an explicit configuration (blocking).
        pub fn connect(project: Option<&str>, config: SatembedConfig) -> Result<Self> {
            let rt = runtime()?;
            let inner = rt.block_on(Session::connect_with_project(project, config))?;
            Ok(Self { rt, inner })
        }

        /// Wrap an already-built session.
        pub fn from_session(inner: Session) -> Result<Self> {
            Ok(Self { rt: runtime()?, inner })
        }

        /// Resolve the embedding images for a region and `[year_start, year_end)` (blocking).
        pub fn get_satellite_embeddings(
            &self,
            region: &Region,
            year_start: i32,
            year_end: i32,
        ) -> Result<EmbeddingImage> {
            self.rt
                .block_on(self.inner.get_satellite_embeddings(region, year_start, year_end))
        }

        /// Materialize an embedding image (blocking).
        pub fn fetch_cube(&self, image: &EmbeddingImage, options: &FetchOptions) -> Result<EmbeddingCube> {
            self.rt.block_on(image.fetch_cube(options))
        }

        /// Materialize a coarse cube sized for `n_samples` draws (blocking).
        pub fn sample_cube(&self, image: &EmbeddingImage, n_samples: usize) -> Result<EmbeddingCube> {
            self.rt.block_on(image.sample_cube(n_samples))
        }

        pub fn session(&self) -> &Session {
            &self.inner
        }
    }

    /// Load configuration from the default sources and connect (blocking).
    pub fn setup_ee(project: Option<&str>) -> Result<SessionBlocking> {
        let config = ConfigLoader::new().load()?;
        SessionBlocking::connect(project, config)
    }

    /// One-shot: resolve and materialize the embeddings of a region with the
    /// session's configured fetch settings (blocking).
    pub fn get_satellite_embeddings(
        session: &SessionBlocking,
        region: &Region,
        year_start: i32,
        year_end: i32,
    ) -> Result<EmbeddingCube> {
        let image = session.get_satellite_embeddings(region, year_start, year_end)?;
        let options = FetchOptions::from(&session.session().config().fetch);
        session.fetch_cube(&image, &options)
    }
}

#[cfg(feature = "native")]
pub use inner::*;

//! Authenticated Earth Engine session.

use std::sync::Arc;

use tracing::info;

use crate::auth::{BearerToken, CloudAuth};
use crate::config::{ConfigLoader, SatembedConfig};
use crate::earth_engine::{EarthEngineClient, EarthEngineClientOptions};
use crate::error::{CloudError, Result};

/// A verified connection to the service, shared by every fetch made from it.
pub struct Session {
    config: SatembedConfig,
    project: String,
    client: Arc<EarthEngineClient>,
}

impl Session {
    /// Connect with the project and token from `config`.
    pub async fn connect(config: SatembedConfig) -> Result<Self> {
        Self::connect_with_project(None, config).await
    }

    /// Connect, preferring `project` over the configured project id.
    ///
    /// The bearer token comes from `earth_engine.token`, then
    /// `EARTHENGINE_TOKEN`. Credentials are checked with a one-item asset
    /// listing; rejection surfaces as [`CloudError::Auth`].
    pub async fn connect_with_project(project: Option<&str>, config: SatembedConfig) -> Result<Self> {
        let project = resolve_project(project, &config)?;
        let auth = BearerToken::resolve(config.earth_engine.token.as_deref(), &project)?;
        let session = Self::with_auth(config, &project, Arc::new(auth))?;
        session.verify().await?;
        info!(project = %session.project, endpoint = session.client.endpoint(), "Earth Engine session ready");
        Ok(session)
    }

    /// Build a session around custom authentication without contacting the
    /// service.
    pub fn with_auth(config: SatembedConfig, project: &str, auth: Arc<dyn CloudAuth>) -> Result<Self> {
        config.validate()?;
        let options = EarthEngineClientOptions {
            request_timeout: config.fetch.request_timeout(),
            max_retries: config.fetch.max_retries,
            max_images: config.fetch.max_images,
        };
        let client = EarthEngineClient::new(&config.earth_engine.endpoint, auth, options)?;
        Ok(Self {
            config,
            project: project.to_string(),
            client: Arc::new(client),
        })
    }

    /// Re-check credentials against the project.
    pub async fn verify(&self) -> Result<()> {
        self.client.verify_project(&self.project).await
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn config(&self) -> &SatembedConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<EarthEngineClient> {
        &self.client
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("project", &self.project)
            .field("endpoint", &self.client.endpoint())
            .finish()
    }
}

/// Load configuration from the default sources and connect.
pub async fn setup_ee(project: Option<&str>) -> Result<Session> {
    let config = ConfigLoader::new().load()?;
    Session::connect_with_project(project, config).await
}

fn resolve_project(project: Option<&str>, config: &SatembedConfig) -> Result<String> {
    project
        .or(config.earth_engine.project.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .ok_or_else(|| {
            CloudError::Auth("no project id: pass one or set earth_engine.project".into())
        })
}

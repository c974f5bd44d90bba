//! Async client for the Earth Engine v1 REST API.

use std::sync::Arc;

use satembed_core::Region;
use tracing::debug;

use crate::auth::CloudAuth;
use crate::ee_models::{EeImage, GetPixelsRequest, ListAssetsResponse, ListImagesResponse, PixelGrid};
use crate::error::{CloudError, Result};
use crate::http::HttpClient;

/// Asset root that public catalog collections live under.
const PUBLIC_ASSET_ROOT: &str = "projects/earthengine-public/assets";

const LIST_PAGE_SIZE: usize = 100;

/// Options for [`EarthEngineClient`].
#[derive(Debug, Clone)]
pub struct EarthEngineClientOptions {
    /// Per-request timeout (default 60 s).
    pub request_timeout: std::time::Duration,
    /// Maximum retries on transient failures (default 3).
    pub max_retries: u32,
    /// Maximum images collected across pages (default 100).
    pub max_images: usize,
}

impl Default for EarthEngineClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: std::time::Duration::from_secs(60),
            max_retries: 3,
            max_images: 100,
        }
    }
}

/// Thin typed wrapper over the endpoints the fetcher needs.
pub struct EarthEngineClient {
    endpoint: String,
    http: HttpClient,
    auth: Arc<dyn CloudAuth>,
    options: EarthEngineClientOptions,
}

impl EarthEngineClient {
    pub fn new(
        endpoint: &str,
        auth: Arc<dyn CloudAuth>,
        options: EarthEngineClientOptions,
    ) -> Result<Self> {
        let http = HttpClient::new(options.request_timeout, options.max_retries)?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
            auth,
            options,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Cheap authenticated call used to validate credentials and project.
    pub async fn verify_project(&self, project: &str) -> Result<()> {
        let url = format!("{}/projects/{}:listAssets", self.endpoint, project);
        let _: ListAssetsResponse = self
            .http
            .get_json(&url, &[("pageSize", "1".to_string())], self.auth.as_ref())
            .await
            .map_err(|e| match e {
                CloudError::DataUnavailable(msg) => {
                    CloudError::Auth(format!("project {project} not found: {msg}"))
                }
                other => other,
            })?;
        Ok(())
    }

    /// List images of `collection` intersecting `region` with a start time
    /// in `[start_time, end_time)`, following pagination up to `max_images`.
    pub async fn list_images(
        &self,
        collection: &str,
        start_time: &str,
        end_time: &str,
        region: &Region,
    ) -> Result<Vec<EeImage>> {
        let url = format!("{}/{}:listImages", self.endpoint, collection_parent(collection));
        let region_json = region.to_geojson().to_string();
        let max = self.options.max_images;

        let mut images = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("startTime", start_time.to_string()),
                ("endTime", end_time.to_string()),
                ("region", region_json.clone()),
                ("pageSize", LIST_PAGE_SIZE.min(max).to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: ListImagesResponse = self.http.get_json(&url, &query, self.auth.as_ref()).await?;
            debug!(count = page.images.len(), "listImages page");
            let empty = page.images.is_empty();
            images.extend(page.images);

            match page.next_page_token {
                Some(token) if !empty && images.len() < max && !token.is_empty() => {
                    page_token = Some(token)
                }
                _ => break,
            }
        }

        images.truncate(max);
        Ok(images)
    }

    /// Fetch a pixel grid of `image` as a GeoTIFF.
    pub async fn get_pixels(&self, image: &str, band_ids: &[String], grid: PixelGrid) -> Result<Vec<u8>> {
        let url = format!("{}/{}:getPixels", self.endpoint, image);
        let body = serde_json::to_value(GetPixelsRequest::geotiff(band_ids, grid))
            .map_err(|e| CloudError::InvalidRequest(e.to_string()))?;
        self.http.post_json_for_bytes(&url, &body, self.auth.as_ref()).await
    }
}

/// Resource name of a collection: catalog ids live under the public root,
/// full `projects/...` names pass through.
pub fn collection_parent(collection: &str) -> String {
    let collection = collection.trim_matches('/');
    if collection.starts_with("projects/") {
        collection.to_string()
    } else {
        format!("{PUBLIC_ASSET_ROOT}/{collection}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_resolve_under_public_root() {
        assert_eq!(
            collection_parent("GOOGLE/SATELLITE_EMBEDDING/V1/ANNUAL"),
            "projects/earthengine-public/assets/GOOGLE/SATELLITE_EMBEDDING/V1/ANNUAL"
        );
        assert_eq!(
            collection_parent("projects/my-proj/assets/emb"),
            "projects/my-proj/assets/emb"
        );
    }
}

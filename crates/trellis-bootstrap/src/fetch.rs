use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use trellis_core::manifest::WidgetManifest;

/// Why a bootstrap run could not produce a working page. A failed manifest
/// fetch aborts the run; per-widget failures never reach this type.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("widget manifest request failed: {0}")]
    ManifestRequest(String),

    #[error("widget manifest request returned HTTP {0}")]
    ManifestStatus(StatusCode),

    #[error("widget manifest is not valid JSON: {0}")]
    ManifestParse(String),
}

/// HTTP client for the widget manifest endpoint.
pub struct ManifestClient {
    client: reqwest::Client,
    base_url: String,
}

impl ManifestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("trellis/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    pub fn manifest_url(&self) -> String {
        format!("{}/api/widgets", self.base_url)
    }

    /// Fetch and parse the manifest. The `session_id` query parameter is
    /// always present, empty on a first run, so the server can decide
    /// between resuming and issuing a fresh session.
    pub async fn fetch_manifest(
        &self,
        session_id: Option<&str>,
    ) -> Result<WidgetManifest, BootstrapError> {
        let response = self
            .client
            .get(self.manifest_url())
            .query(&[("session_id", session_id.unwrap_or(""))])
            .send()
            .await
            .map_err(|e| BootstrapError::ManifestRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BootstrapError::ManifestStatus(status));
        }

        response
            .json::<WidgetManifest>()
            .await
            .map_err(|e| BootstrapError::ManifestParse(e.to_string()))
    }
}

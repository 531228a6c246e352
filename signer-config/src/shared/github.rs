use serde::Deserialize;

use crate::shared::ValidationError;
use crate::shared::base::require_non_empty;

/// Repository whose release assets are signed.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitHubConfig {
    /// Base URL of the REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Base URL of the asset upload API, which is served from a separate host.
    #[serde(default = "default_uploads_url")]
    pub uploads_url: String,
    pub owner: String,
    pub repo: String,
    /// Timeout applied to every request, in seconds. Covers the whole transfer of an asset.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl GitHubConfig {
    pub const DEFAULT_API_URL: &'static str = "https://api.github.com";

    pub const DEFAULT_UPLOADS_URL: &'static str = "https://uploads.github.com";

    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("github.api_url", &self.api_url)?;
        require_non_empty("github.uploads_url", &self.uploads_url)?;
        require_non_empty("github.owner", &self.owner)?;
        require_non_empty("github.repo", &self.repo)?;

        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "github.request_timeout_secs".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

fn default_api_url() -> String {
    GitHubConfig::DEFAULT_API_URL.to_string()
}

fn default_uploads_url() -> String {
    GitHubConfig::DEFAULT_UPLOADS_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    GitHubConfig::DEFAULT_REQUEST_TIMEOUT_SECS
}

use serde::Deserialize;

use crate::shared::{ArchiveConfig, ArtifactsConfig, GitHubConfig, SigningConfig, ValidationError};

/// Complete configuration of the release signer.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SignerConfig {
    pub github: GitHubConfig,
    pub signing: SigningConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    pub artifacts: ArtifactsConfig,
}

impl SignerConfig {
    /// Validates every section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.github.validate()?;
        self.signing.validate()?;
        self.artifacts.validate()?;

        Ok(())
    }
}

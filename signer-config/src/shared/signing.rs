use serde::Deserialize;
use std::path::PathBuf;

use crate::shared::ValidationError;
use crate::shared::base::require_non_empty;

/// Code signing certificate and `signtool` invocation settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SigningConfig {
    /// Explicit path of `signtool.exe`. When unset the newest Windows SDK under
    /// `windows_kits_dir` is used.
    #[serde(default)]
    pub signtool_path: Option<PathBuf>,
    #[serde(default = "default_windows_kits_dir")]
    pub windows_kits_dir: PathBuf,
    /// SHA-1 thumbprint selecting the certificate from the store.
    pub certificate_sha1: String,
    pub subject_name: String,
    /// RFC 3161 timestamp server.
    pub timestamp_url: String,
    #[serde(default = "default_digest_algorithm")]
    pub digest_algorithm: String,
}

impl SigningConfig {
    pub const DEFAULT_WINDOWS_KITS_DIR: &'static str = r"C:\Program Files (x86)\Windows Kits\10\bin";

    pub const DEFAULT_DIGEST_ALGORITHM: &'static str = "SHA256";

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("signing.certificate_sha1", &self.certificate_sha1)?;
        require_non_empty("signing.subject_name", &self.subject_name)?;
        require_non_empty("signing.timestamp_url", &self.timestamp_url)?;
        require_non_empty("signing.digest_algorithm", &self.digest_algorithm)?;

        if !self
            .certificate_sha1
            .chars()
            .all(|c| c.is_ascii_hexdigit())
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "signing.certificate_sha1".to_string(),
                constraint: "must be a hexadecimal thumbprint".to_string(),
            });
        }

        Ok(())
    }
}

fn default_windows_kits_dir() -> PathBuf {
    PathBuf::from(SigningConfig::DEFAULT_WINDOWS_KITS_DIR)
}

fn default_digest_algorithm() -> String {
    SigningConfig::DEFAULT_DIGEST_ALGORITHM.to_string()
}

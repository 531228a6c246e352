use serde::Deserialize;
use std::path::PathBuf;

/// Location of the `7z` executable used to extract and repack archives.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ArchiveConfig {
    #[serde(default = "default_seven_zip_path")]
    pub seven_zip_path: PathBuf,
}

impl ArchiveConfig {
    /// Resolved through `PATH` when not absolute.
    pub const DEFAULT_SEVEN_ZIP_PATH: &'static str = "7z";
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            seven_zip_path: default_seven_zip_path(),
        }
    }
}

fn default_seven_zip_path() -> PathBuf {
    PathBuf::from(ArchiveConfig::DEFAULT_SEVEN_ZIP_PATH)
}

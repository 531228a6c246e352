use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::shared::ValidationError;
use crate::shared::base::require_non_empty;

/// Architecture of a portable archive published next to the manifest package.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveKind {
    X64,
    X86,
}

/// Matches a release asset to an archive kind and names the file signed inside it.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ArchiveRule {
    pub kind: ArchiveKind,
    /// Suffix of the asset name, such as `-win32-x64.zip`.
    pub suffix: String,
    /// Name of the executable inside the archive.
    pub inner_file: String,
}

/// Which assets are signed and where they are processed.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ArtifactsConfig {
    /// Substring removed from asset names when publishing the signed asset.
    #[serde(default = "default_unsigned_marker")]
    pub unsigned_marker: String,
    /// Directory receiving one subdirectory per artifact.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Removes the unsigned assets from the release once replaced.
    #[serde(default)]
    pub delete_unsigned: bool,
    #[serde(default)]
    pub archives: Vec<ArchiveRule>,
}

impl ArtifactsConfig {
    pub const DEFAULT_UNSIGNED_MARKER: &'static str = "-unsigned";

    pub const DEFAULT_WORK_DIR: &'static str = "build/signing";

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("artifacts.unsigned_marker", &self.unsigned_marker)?;

        if self.work_dir.as_os_str().is_empty() {
            return Err(ValidationError::EmptyField("artifacts.work_dir".to_string()));
        }

        let mut kinds = HashSet::with_capacity(self.archives.len());
        for (index, rule) in self.archives.iter().enumerate() {
            require_non_empty(&format!("artifacts.archives[{index}].suffix"), &rule.suffix)?;
            require_non_empty(
                &format!("artifacts.archives[{index}].inner_file"),
                &rule.inner_file,
            )?;

            if !kinds.insert(rule.kind) {
                return Err(ValidationError::InvalidFieldValue {
                    field: format!("artifacts.archives[{index}].kind"),
                    constraint: "each archive kind can only be configured once".to_string(),
                });
            }
        }

        Ok(())
    }
}

fn default_unsigned_marker() -> String {
    ArtifactsConfig::DEFAULT_UNSIGNED_MARKER.to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(ArtifactsConfig::DEFAULT_WORK_DIR)
}

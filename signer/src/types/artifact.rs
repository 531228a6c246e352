use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifier of an asset at the artifact source or sink.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AssetId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Metadata describing a remote asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub id: AssetId,
    pub name: String,
}

/// The kind of artifact flowing through a pipeline.
///
/// The kind decides whether the pipeline extracts an inner file before signing and repacks it
/// afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A package file that is signed as a whole (e.g. an `.appx`).
    ManifestPackage,
    /// A 64-bit archive whose inner executable is signed.
    ArchiveX64,
    /// A 32-bit archive whose inner executable is signed.
    ArchiveX86,
}

impl ArtifactKind {
    /// Returns `true` for kinds that go through extraction and repacking.
    pub fn is_archive(&self) -> bool {
        matches!(self, ArtifactKind::ArchiveX64 | ArtifactKind::ArchiveX86)
    }

    /// Returns the working subdirectory name for this kind.
    ///
    /// Each kind gets its own directory so that archives containing identically named inner
    /// files never collide when extracted concurrently.
    pub fn work_dir_name(&self) -> &'static str {
        self.as_static_str()
    }

    pub fn as_static_str(&self) -> &'static str {
        match self {
            ArtifactKind::ManifestPackage => "manifest_package",
            ArtifactKind::ArchiveX64 => "archive_x64",
            ArtifactKind::ArchiveX86 => "archive_x86",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_static_str())
    }
}

impl From<signer_config::shared::ArchiveKind> for ArtifactKind {
    fn from(value: signer_config::shared::ArchiveKind) -> Self {
        match value {
            signer_config::shared::ArchiveKind::X64 => ArtifactKind::ArchiveX64,
            signer_config::shared::ArchiveKind::X86 => ArtifactKind::ArchiveX86,
        }
    }
}

/// One artifact to be signed and republished.
///
/// Created by the orchestrator during discovery and mutated by its owning pipeline as it moves
/// through fetching, extraction and repacking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Handle at the source, `None` when an expected artifact was not found.
    pub id: Option<AssetId>,
    pub display_name: String,
    pub kind: ArtifactKind,
    /// Name of the file inside the archive that gets signed, only set for archive kinds.
    pub inner_file: Option<String>,
    /// Location of the fetched bytes.
    pub download_path: Option<PathBuf>,
    /// Location of the file handed to the signer.
    pub local_path: Option<PathBuf>,
}

impl Artifact {
    /// Creates an artifact for a manifest package asset.
    pub fn manifest_package(asset: AssetMetadata) -> Self {
        Self {
            id: Some(asset.id),
            display_name: asset.name,
            kind: ArtifactKind::ManifestPackage,
            inner_file: None,
            download_path: None,
            local_path: None,
        }
    }

    /// Creates an artifact for an archive asset whose `inner_file` must be signed.
    pub fn archive(
        kind: ArtifactKind,
        asset: AssetMetadata,
        inner_file: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(asset.id),
            display_name: asset.name,
            kind,
            inner_file: Some(inner_file.into()),
            download_path: None,
            local_path: None,
        }
    }

    /// Creates a placeholder for an expected artifact that is not available at the source.
    ///
    /// The pipeline built from it fails while fetching with [`crate::error::ErrorKind::NotFound`].
    pub fn missing(kind: ArtifactKind, expected_name: impl Into<String>) -> Self {
        Self {
            id: None,
            display_name: expected_name.into(),
            kind,
            inner_file: None,
            download_path: None,
            local_path: None,
        }
    }

    /// Returns the upload name, which is the display name without the unsigned marker.
    pub fn signed_name(&self, unsigned_marker: &str) -> String {
        if unsigned_marker.is_empty() {
            return self.display_name.clone();
        }

        self.display_name.replace(unsigned_marker, "")
    }

    /// Returns the working directory of this artifact below `work_dir`.
    pub fn work_dir(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(self.kind.work_dir_name())
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} ({}, asset {})", self.display_name, self.kind, id),
            None => write!(f, "{} ({}, missing)", self.display_name, self.kind),
        }
    }
}

//! Configuration sections of the release signer.

mod archive;
mod artifacts;
mod base;
mod github;
mod signer;
mod signing;

pub use archive::ArchiveConfig;
pub use artifacts::{ArchiveKind, ArchiveRule, ArtifactsConfig};
pub use base::ValidationError;
pub use github::GitHubConfig;
pub use signer::SignerConfig;
pub use signing::SigningConfig;

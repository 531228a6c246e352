//! Core data types shared by pipelines, collaborators and the orchestrator.

mod artifact;

pub use artifact::{Artifact, ArtifactKind, AssetId, AssetMetadata};

mod base;

pub use base::ArtifactSource;

mod base;

pub use base::ArtifactSink;

//! Metrics definitions for release signing runs.

/// Label for the artifact kind in metrics.
pub const ARTIFACT_KIND_LABEL: &str = "artifact_kind";

/// Label for the outcome of an operation in metrics.
pub const OUTCOME_LABEL: &str = "outcome";

/// Label for the failure stage in metrics.
pub const FAILURE_STAGE_LABEL: &str = "failure_stage";

// Pipeline metrics

/// Counter for finished artifact pipelines, labeled by kind and outcome.
pub const SIGNER_PIPELINES_TOTAL: &str = "signer_pipelines_total";

/// Histogram for the duration of artifact pipelines in seconds.
pub const SIGNER_PIPELINE_DURATION_SECONDS: &str = "signer_pipeline_duration_seconds";

/// Counter for bytes uploaded to the artifact sink.
pub const SIGNER_UPLOADED_BYTES_TOTAL: &str = "signer_uploaded_bytes_total";

// Signing metrics

/// Counter for signing invocations, labeled by outcome.
pub const SIGNER_SIGN_INVOCATIONS_TOTAL: &str = "signer_sign_invocations_total";

/// Histogram for the duration of the signing invocation in seconds.
pub const SIGNER_SIGN_DURATION_SECONDS: &str = "signer_sign_duration_seconds";

/// Gauge for the number of paths handed to the signing invocation.
pub const SIGNER_SIGN_BATCH_SIZE: &str = "signer_sign_batch_size";

use std::fmt;

use crate::error::{ErrorKind, SignerError};

/// Stage of a pipeline in which a failure happened.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FailureStage {
    Fetch,
    Extract,
    Sign,
    Repack,
    Upload,
}

impl FailureStage {
    /// Returns the stage a pipeline was in while it was in `phase`.
    pub fn from_phase(phase: ArtifactPhaseType) -> Self {
        match phase {
            ArtifactPhaseType::Idle | ArtifactPhaseType::Fetching => Self::Fetch,
            ArtifactPhaseType::Extracting => Self::Extract,
            ArtifactPhaseType::RegisteredForSign | ArtifactPhaseType::AwaitingSign => Self::Sign,
            ArtifactPhaseType::Repacking => Self::Repack,
            ArtifactPhaseType::Uploading | ArtifactPhaseType::Done | ArtifactPhaseType::Failed => {
                Self::Upload
            }
        }
    }

    pub fn as_static_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Sign => "sign",
            Self::Repack => "repack",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_static_str())
    }
}

/// Reason why a pipeline ended in [`ArtifactPhase::Failed`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineFailure {
    pub stage: FailureStage,
    pub error: SignerError,
    /// Output of the external tool involved in the failure, if any.
    pub tool_output: Option<String>,
}

impl PipelineFailure {
    pub fn new(stage: FailureStage, error: SignerError) -> Self {
        Self {
            stage,
            error,
            tool_output: None,
        }
    }

    pub fn with_tool_output(mut self, tool_output: Option<String>) -> Self {
        self.tool_output = tool_output;
        self
    }

    /// Returns the error kind of the underlying error.
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure: {}", self.stage, self.error)
    }
}

/// Phase of an artifact pipeline.
///
/// Phases only move forward. Extracting and repacking are skipped by artifacts that are not
/// archives, `Done` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactPhase {
    /// The pipeline was created but did not start yet.
    Idle,
    /// Bytes are being downloaded from the artifact source.
    Fetching,
    /// The inner file is being extracted from the downloaded archive.
    Extracting,
    /// The local path was added to the pending sign set.
    RegisteredForSign,
    /// The pipeline arrived at the barrier and waits for the signing outcome.
    AwaitingSign,
    /// The signed inner file is being written back into its archive.
    Repacking,
    /// The signed artifact is being uploaded to the sink.
    Uploading,
    /// The signed artifact was published.
    Done,
    /// The pipeline stopped because of an error.
    Failed(PipelineFailure),
}

impl ArtifactPhase {
    pub fn as_type(&self) -> ArtifactPhaseType {
        self.into()
    }
}

impl fmt::Display for ArtifactPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(failure) => write!(f, "failed({})", failure.stage),
            phase => write!(f, "{}", phase.as_type()),
        }
    }
}

impl From<PipelineFailure> for ArtifactPhase {
    fn from(value: PipelineFailure) -> Self {
        Self::Failed(value)
    }
}

/// A variant of [`ArtifactPhase`] without the failure payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactPhaseType {
    Idle,
    Fetching,
    Extracting,
    RegisteredForSign,
    AwaitingSign,
    Repacking,
    Uploading,
    Done,
    Failed,
}

impl ArtifactPhaseType {
    /// Returns `true` if no transition can leave this phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns `true` if a pipeline may move from `self` to `next`.
    pub fn can_transition_to(&self, next: ArtifactPhaseType) -> bool {
        if self.is_terminal() {
            return false;
        }

        match next {
            Self::Failed => true,
            next => next.position() > self.position(),
        }
    }

    fn position(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Fetching => 1,
            Self::Extracting => 2,
            Self::RegisteredForSign => 3,
            Self::AwaitingSign => 4,
            Self::Repacking => 5,
            Self::Uploading => 6,
            Self::Done => 7,
            Self::Failed => 8,
        }
    }

    pub fn as_static_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::RegisteredForSign => "registered_for_sign",
            Self::AwaitingSign => "awaiting_sign",
            Self::Repacking => "repacking",
            Self::Uploading => "uploading",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl<'a> From<&'a ArtifactPhase> for ArtifactPhaseType {
    fn from(phase: &'a ArtifactPhase) -> Self {
        match phase {
            ArtifactPhase::Idle => Self::Idle,
            ArtifactPhase::Fetching => Self::Fetching,
            ArtifactPhase::Extracting => Self::Extracting,
            ArtifactPhase::RegisteredForSign => Self::RegisteredForSign,
            ArtifactPhase::AwaitingSign => Self::AwaitingSign,
            ArtifactPhase::Repacking => Self::Repacking,
            ArtifactPhase::Uploading => Self::Uploading,
            ArtifactPhase::Done => Self::Done,
            ArtifactPhase::Failed(_) => Self::Failed,
        }
    }
}

impl fmt::Display for ArtifactPhaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_static_str())
    }
}

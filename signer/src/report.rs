//! Final report of a signing run.

use std::time::Duration;

use crate::concurrency::signal::SignOutcome;
use crate::state::phase::{ArtifactPhase, PipelineFailure};
use crate::types::{ArtifactKind, AssetId};

/// Result of a single artifact pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactReport {
    pub kind: ArtifactKind,
    pub display_name: String,
    /// Terminal phase reached by the pipeline.
    pub phase: ArtifactPhase,
    /// Identifier of the uploaded signed asset.
    pub remote_id: Option<AssetId>,
    /// Non-fatal problems, such as an unsigned asset that could not be deleted.
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

impl ArtifactReport {
    /// Returns `true` if the pipeline published its signed artifact.
    pub fn is_done(&self) -> bool {
        matches!(self.phase, ArtifactPhase::Done)
    }

    pub fn failure(&self) -> Option<&PipelineFailure> {
        match &self.phase {
            ArtifactPhase::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Summary of the signing invocation of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SignSummary {
    pub outcome: SignOutcome,
}

impl SignSummary {
    /// Number of paths signed, zero when signing failed.
    pub fn signed_paths(&self) -> usize {
        match &self.outcome {
            SignOutcome::Signed { signed_paths, .. } => *signed_paths,
            SignOutcome::Failed { .. } => 0,
        }
    }

    pub fn log(&self) -> Option<&str> {
        self.outcome.log()
    }
}

/// Aggregated result of a signing run, one entry per artifact pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub artifacts: Vec<ArtifactReport>,
    pub signing: SignSummary,
    pub elapsed: Duration,
}

impl RunReport {
    /// Returns `true` if every pipeline reached [`ArtifactPhase::Done`].
    pub fn is_success(&self) -> bool {
        !self.artifacts.is_empty() && self.artifacts.iter().all(ArtifactReport::is_done)
    }

    pub fn done_count(&self) -> usize {
        self.artifacts.iter().filter(|report| report.is_done()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ArtifactReport> {
        self.artifacts.iter().filter(|report| !report.is_done())
    }

    /// Renders a human readable summary, one line per artifact.
    ///
    /// Captured tool output is rendered indented below the line it belongs to. The output of a
    /// failed signing invocation is rendered once below the signing line instead of under every
    /// artifact it failed.
    pub fn render(&self) -> String {
        let mut out = format!(
            "signing: {} ({} paths)\n",
            self.signing.outcome,
            self.signing.signed_paths()
        );

        let signing_log = match &self.signing.outcome {
            SignOutcome::Failed { log, .. } => log.as_deref(),
            SignOutcome::Signed { .. } => None,
        };
        if let Some(log) = signing_log {
            push_tool_output(&mut out, log);
        }

        for report in &self.artifacts {
            out.push_str(&format!(
                "{} [{}]: {}",
                report.display_name, report.kind, report.phase
            ));

            if let Some(remote_id) = report.remote_id {
                out.push_str(&format!(" -> asset {remote_id}"));
            }

            if let Some(failure) = report.failure() {
                out.push_str(&format!(
                    " ({:?}: {})",
                    failure.kind(),
                    failure.error.detail().unwrap_or(failure.error.description())
                ));
            }

            out.push_str(&format!(" in {:.1}s\n", report.elapsed.as_secs_f64()));

            if let Some(tool_output) = report.failure().and_then(|f| f.tool_output.as_deref())
                && Some(tool_output) != signing_log
            {
                push_tool_output(&mut out, tool_output);
            }

            for warning in &report.warnings {
                out.push_str(&format!("  warning: {warning}\n"));
            }
        }

        out.push_str(&format!(
            "{} of {} artifacts published in {:.1}s",
            self.done_count(),
            self.artifacts.len(),
            self.elapsed.as_secs_f64()
        ));

        out
    }
}

/// Appends the non-blank lines of `tool_output`, indented.
fn push_tool_output(out: &mut String, tool_output: &str) {
    for line in tool_output.lines().filter(|line| !line.trim().is_empty()) {
        out.push_str("  | ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
}

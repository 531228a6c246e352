//! Per-artifact pipeline: fetch, extract, register for signing, wait, repack and upload.

use bytes::Bytes;
use futures::FutureExt;
use metrics::{counter, histogram};
use signer_config::shared::ArtifactsConfig;
use std::ops::Deref;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

use crate::archive::ArchiveExtractor;
use crate::concurrency::signal::SignOutcome;
use crate::error::{ErrorKind, SignerError, SignerResult};
use crate::metrics::{
    ARTIFACT_KIND_LABEL, FAILURE_STAGE_LABEL, OUTCOME_LABEL, SIGNER_PIPELINE_DURATION_SECONDS,
    SIGNER_PIPELINES_TOTAL, SIGNER_UPLOADED_BYTES_TOTAL,
};
use crate::report::ArtifactReport;
use crate::signing::SignHandle;
use crate::sink::ArtifactSink;
use crate::source::ArtifactSource;
use crate::state::phase::{ArtifactPhase, ArtifactPhaseType, FailureStage, PipelineFailure};
use crate::types::{Artifact, ArtifactKind, AssetId};
use crate::work_dir::clear_dir;
use crate::{bail, signer_error};

/// Name of the directory below the artifact working directory receiving extracted files.
const EXTRACTED_DIR_NAME: &str = "extracted";

/// Internal state of [`ArtifactPipelineState`].
#[derive(Debug)]
pub struct ArtifactPipelineStateInner {
    display_name: String,
    kind: ArtifactKind,
    phase: ArtifactPhase,
    /// Every phase the pipeline went through, starting with [`ArtifactPhase::Idle`].
    history: Vec<ArtifactPhaseType>,
    phase_change: Arc<Notify>,
}

impl ArtifactPipelineStateInner {
    /// Moves the pipeline to `phase` and notifies all waiters.
    ///
    /// Backward transitions and transitions out of a terminal phase are rejected with
    /// [`ErrorKind::InvalidState`], leaving the current phase untouched.
    pub fn set(&mut self, phase: ArtifactPhase) -> SignerResult<()> {
        let from = self.phase.as_type();
        let to = phase.as_type();

        if !from.can_transition_to(to) {
            bail!(
                ErrorKind::InvalidState,
                "Invalid pipeline phase transition",
                format!(
                    "Pipeline of '{}' cannot move from {from} to {to}",
                    self.display_name
                )
            );
        }

        info!(
            artifact = %self.display_name,
            kind = %self.kind,
            from_phase = %self.phase,
            to_phase = %phase,
            "artifact phase changing",
        );

        self.phase = phase;
        self.history.push(to);

        self.phase_change.notify_waiters();

        Ok(())
    }

    pub fn phase(&self) -> ArtifactPhase {
        self.phase.clone()
    }

    pub fn history(&self) -> &[ArtifactPhaseType] {
        &self.history
    }
}

/// Shared handle on the phase of one artifact pipeline.
#[derive(Debug, Clone)]
pub struct ArtifactPipelineState {
    inner: Arc<Mutex<ArtifactPipelineStateInner>>,
}

impl ArtifactPipelineState {
    pub fn new(artifact: &Artifact) -> Self {
        let inner = ArtifactPipelineStateInner {
            display_name: artifact.display_name.clone(),
            kind: artifact.kind,
            phase: ArtifactPhase::Idle,
            history: vec![ArtifactPhaseType::Idle],
            phase_change: Arc::new(Notify::new()),
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns the current phase.
    pub async fn phase(&self) -> ArtifactPhase {
        self.inner.lock().await.phase()
    }

    /// Returns the phases the pipeline went through so far.
    pub async fn history(&self) -> Vec<ArtifactPhaseType> {
        self.inner.lock().await.history().to_vec()
    }

    /// Waits until the pipeline reaches one of `phase_types` and returns the reached phase.
    pub async fn wait_for_phase_type(&self, phase_types: &[ArtifactPhaseType]) -> ArtifactPhase {
        loop {
            let inner = self.inner.lock().await;

            let current_phase = inner.phase.as_type();
            if phase_types.contains(&current_phase) {
                return inner.phase();
            }

            // The notification future is created while holding the lock, otherwise a change
            // between unlocking and waiting would be missed.
            let phase_change = inner.phase_change.clone();
            let phase_change_notified = phase_change.notified();
            drop(inner);

            phase_change_notified.await;
        }
    }
}

impl Deref for ArtifactPipelineState {
    type Target = Mutex<ArtifactPipelineStateInner>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Pipeline moving a single artifact through the signing run.
///
/// Every pipeline arrives at the shared barrier exactly once, whether its pre-sign phase
/// succeeded, failed or panicked.
#[derive(Debug)]
pub struct ArtifactPipeline<S, E, K> {
    artifact: Artifact,
    config: Arc<ArtifactsConfig>,
    source: S,
    extractor: E,
    sink: K,
    sign: SignHandle,
    state: ArtifactPipelineState,
}

impl<S, E, K> ArtifactPipeline<S, E, K>
where
    S: ArtifactSource + Send + Sync,
    E: ArchiveExtractor + Send + Sync,
    K: ArtifactSink + Send + Sync,
{
    pub fn new(
        artifact: Artifact,
        config: Arc<ArtifactsConfig>,
        source: S,
        extractor: E,
        sink: K,
        sign: SignHandle,
    ) -> Self {
        let state = ArtifactPipelineState::new(&artifact);

        Self {
            artifact,
            config,
            source,
            extractor,
            sink,
            sign,
            state,
        }
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn state(&self) -> ArtifactPipelineState {
        self.state.clone()
    }

    /// Runs the pipeline to a terminal phase and reports the result.
    ///
    /// Only coordination defects are returned as errors, every artifact level failure is part
    /// of the returned report.
    pub async fn run(mut self) -> SignerResult<ArtifactReport> {
        let started = Instant::now();
        info!(artifact = %self.artifact, "artifact pipeline started");

        let pre_sign = AssertUnwindSafe(self.pre_sign()).catch_unwind().await;
        let pre_sign = match pre_sign {
            Ok(result) => result,
            Err(_) => Err(self.panic_failure("pre-sign").await),
        };

        if let Err(failure) = &pre_sign
            && failure.kind().is_fatal()
        {
            error!(artifact = %self.artifact, %failure, "coordination failure before signing");

            return Err(failure.error.clone());
        }

        // Arrival happens for failed pipelines too, the run cannot progress otherwise.
        self.sign.arrive()?;

        let mut warnings = Vec::new();
        let result = match pre_sign {
            Ok(local_path) => {
                let post_sign = AssertUnwindSafe(self.post_sign(local_path, &mut warnings))
                    .catch_unwind()
                    .await;

                match post_sign {
                    Ok(result) => result,
                    Err(_) => Err(self.panic_failure("post-sign").await),
                }
            }
            Err(failure) => Err(failure),
        };

        let remote_id = match result {
            Ok(remote_id) => Some(remote_id),
            Err(failure) => {
                self.fail(failure).await;
                None
            }
        };

        let phase = self.state.phase().await;
        let elapsed = started.elapsed();
        self.record_outcome(&phase, elapsed);

        Ok(ArtifactReport {
            kind: self.artifact.kind,
            display_name: self.artifact.display_name,
            phase,
            remote_id,
            warnings,
            elapsed,
        })
    }

    async fn pre_sign(&mut self) -> Result<PathBuf, PipelineFailure> {
        self.transition(ArtifactPhase::Fetching, FailureStage::Fetch)
            .await?;

        let Some(id) = self.artifact.id else {
            return Err(PipelineFailure::new(
                FailureStage::Fetch,
                signer_error!(
                    ErrorKind::NotFound,
                    "Artifact not found at source",
                    format!(
                        "No asset matching '{}' is attached to the release",
                        self.artifact.display_name
                    )
                ),
            ));
        };

        let work_dir = self.artifact.work_dir(&self.config.work_dir);
        let download_path = work_dir.join(&self.artifact.display_name);
        let stage = FailureStage::Fetch;

        clear_dir(&work_dir)
            .await
            .map_err(|err| failure(stage, err))?;

        let content = self
            .source
            .fetch(id)
            .await
            .map_err(|err| failure(stage, err))?;

        tokio::fs::write(&download_path, &content)
            .await
            .map_err(|err| failure(stage, err.into()))?;

        debug!(
            artifact = %self.artifact,
            bytes = content.len(),
            path = %download_path.display(),
            "artifact downloaded"
        );
        self.artifact.download_path = Some(download_path.clone());

        let local_path = if self.artifact.kind.is_archive() {
            let stage = FailureStage::Extract;
            self.transition(ArtifactPhase::Extracting, stage).await?;

            let Some(inner_file) = self.artifact.inner_file.clone() else {
                return Err(failure(
                    stage,
                    signer_error!(
                        ErrorKind::InvalidState,
                        "Archive artifact without inner file",
                        format!("No inner file configured for '{}'", self.artifact)
                    ),
                ));
            };

            self.extractor
                .extract(
                    &download_path,
                    &inner_file,
                    &work_dir.join(EXTRACTED_DIR_NAME),
                )
                .await
                .map_err(|err| failure(stage, err))?
        } else {
            download_path
        };
        self.artifact.local_path = Some(local_path.clone());

        self.sign
            .register(local_path.clone())
            .await
            .map_err(|err| failure(FailureStage::Sign, err))?;
        self.transition(ArtifactPhase::RegisteredForSign, FailureStage::Sign)
            .await?;

        Ok(local_path)
    }

    async fn post_sign(
        &mut self,
        local_path: PathBuf,
        warnings: &mut Vec<String>,
    ) -> Result<AssetId, PipelineFailure> {
        self.transition(ArtifactPhase::AwaitingSign, FailureStage::Sign)
            .await?;

        match self.sign.wait_for_signing().await {
            SignOutcome::Signed { .. } => {}
            SignOutcome::Failed { error, log } => {
                return Err(PipelineFailure::new(FailureStage::Sign, error).with_tool_output(log));
            }
        }

        let upload_path = match &self.artifact.download_path {
            Some(download_path) if self.artifact.kind.is_archive() => {
                let stage = FailureStage::Repack;
                self.transition(ArtifactPhase::Repacking, stage).await?;

                self.extractor
                    .update_in_place(download_path, &local_path)
                    .await
                    .map_err(|err| failure(stage, err))?;

                download_path.clone()
            }
            _ => local_path,
        };

        let stage = FailureStage::Upload;
        self.transition(ArtifactPhase::Uploading, stage).await?;

        let content = tokio::fs::read(&upload_path)
            .await
            .map_err(|err| failure(stage, err.into()))?;
        let content = Bytes::from(content);
        let content_len = content.len();

        let name = self.artifact.signed_name(&self.config.unsigned_marker);
        let replaces_source = name == self.artifact.display_name;

        // An upload under the unchanged name would collide with the unsigned asset, which
        // therefore has to go first.
        if self.config.delete_unsigned
            && replaces_source
            && let Some(id) = self.artifact.id
        {
            info!(artifact = %self.artifact, "deleting unsigned asset before replacing it");

            self.source
                .delete(id)
                .await
                .map_err(|err| failure(stage, err))?;
        }

        let remote_id = self
            .sink
            .upload(&name, content)
            .await
            .map_err(|err| failure(stage, err))?;

        counter!(
            SIGNER_UPLOADED_BYTES_TOTAL,
            ARTIFACT_KIND_LABEL => self.artifact.kind.as_static_str()
        )
        .increment(content_len as u64);
        info!(
            artifact = %self.artifact,
            %remote_id,
            upload_name = %name,
            "signed artifact uploaded"
        );

        if self.config.delete_unsigned
            && !replaces_source
            && let Some(id) = self.artifact.id
            && let Err(err) = self.source.delete(id).await
        {
            warn!(artifact = %self.artifact, error = %err, "failed to delete unsigned asset");
            warnings.push(format!("unsigned asset {id} was not deleted: {err}"));
        }

        self.transition(ArtifactPhase::Done, stage).await?;

        Ok(remote_id)
    }

    async fn transition(
        &self,
        phase: ArtifactPhase,
        stage: FailureStage,
    ) -> Result<(), PipelineFailure> {
        self.state
            .lock()
            .await
            .set(phase)
            .map_err(|err| failure(stage, err))
    }

    async fn fail(&self, failure: PipelineFailure) {
        error!(
            artifact = %self.artifact,
            stage = %failure.stage,
            error = %failure.error,
            "artifact pipeline failed"
        );

        if let Some(tool_output) = &failure.tool_output {
            for line in tool_output.lines().filter(|line| !line.trim().is_empty()) {
                warn!(artifact = %self.artifact, "{line}");
            }
        }

        let mut inner = self.state.lock().await;
        if let Err(err) = inner.set(ArtifactPhase::Failed(failure)) {
            error!(artifact = %self.artifact, error = %err, "could not mark pipeline as failed");
        }
    }

    async fn panic_failure(&self, step: &str) -> PipelineFailure {
        let phase = self.state.phase().await.as_type();
        let stage = FailureStage::from_phase(phase);

        failure(
            stage,
            signer_error!(
                ErrorKind::PipelineWorkerPanic,
                "Artifact pipeline panicked",
                format!("The {step} phase of '{}' panicked in {phase}", self.artifact)
            ),
        )
    }

    fn record_outcome(&self, phase: &ArtifactPhase, elapsed: std::time::Duration) {
        let kind = self.artifact.kind.as_static_str();
        let elapsed_ms = elapsed.as_millis() as u64;

        match phase {
            ArtifactPhase::Failed(failure) => counter!(
                SIGNER_PIPELINES_TOTAL,
                ARTIFACT_KIND_LABEL => kind,
                OUTCOME_LABEL => "failed",
                FAILURE_STAGE_LABEL => failure.stage.as_static_str()
            )
            .increment(1),
            _ => counter!(
                SIGNER_PIPELINES_TOTAL,
                ARTIFACT_KIND_LABEL => kind,
                OUTCOME_LABEL => "done"
            )
            .increment(1),
        }

        info!(artifact = %self.artifact, %phase, elapsed_ms, "artifact pipeline finished");
        histogram!(SIGNER_PIPELINE_DURATION_SECONDS, ARTIFACT_KIND_LABEL => kind)
            .record(elapsed.as_secs_f64());
    }
}

fn failure(stage: FailureStage, error: SignerError) -> PipelineFailure {
    PipelineFailure::new(stage, error)
}

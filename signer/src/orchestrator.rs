//! Discovery of the release artifacts and execution of a complete signing run.

use signer_config::shared::ArtifactsConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{Instrument, error, info, info_span, warn};

use crate::archive::ArchiveExtractor;
use crate::bail;
use crate::concurrency::barrier::JoinBarrier;
use crate::error::{ErrorKind, SignerResult};
use crate::pipeline::{ArtifactPipeline, ArtifactPipelineState};
use crate::report::{ArtifactReport, RunReport, SignSummary};
use crate::signer_error;
use crate::signing::{SignCoordinator, SigningService};
use crate::sink::ArtifactSink;
use crate::source::ArtifactSource;
use crate::state::phase::{ArtifactPhase, FailureStage, PipelineFailure};
use crate::types::{Artifact, ArtifactKind, AssetId, AssetMetadata};

/// Bookkeeping for a spawned pipeline task.
struct PipelineTask {
    position: usize,
    artifact: Artifact,
    state: ArtifactPipelineState,
}

/// Drives a whole signing run: discovery, the concurrent pipelines, the single signing step
/// and the final report.
#[derive(Debug)]
pub struct Orchestrator<S, E, K, G> {
    config: Arc<ArtifactsConfig>,
    source: S,
    extractor: E,
    sink: K,
    signing_service: G,
}

impl<S, E, K, G> Orchestrator<S, E, K, G>
where
    S: ArtifactSource + Clone + Send + Sync + 'static,
    E: ArchiveExtractor + Clone + Send + Sync + 'static,
    K: ArtifactSink + Clone + Send + Sync + 'static,
    G: SigningService + Send + Sync,
{
    pub fn new(
        config: ArtifactsConfig,
        source: S,
        extractor: E,
        sink: K,
        signing_service: G,
    ) -> Self {
        Self {
            config: Arc::new(config),
            source,
            extractor,
            sink,
            signing_service,
        }
    }

    /// Determines the artifacts of the release.
    ///
    /// The primary asset is the manifest package. Every configured archive rule is matched by
    /// name suffix against the other assets of the release, a rule without a matching asset
    /// yields a missing artifact whose pipeline fails while fetching.
    pub async fn discover(&self, primary_asset_id: AssetId) -> SignerResult<Vec<Artifact>> {
        let primary = self.source.get_metadata(primary_asset_id).await?;
        info!(asset = %primary.name, id = %primary.id, "primary asset resolved");

        let mut artifacts = vec![Artifact::manifest_package(primary.clone())];
        if self.config.archives.is_empty() {
            return Ok(artifacts);
        }

        let assets = self.source.list_assets().await?;
        for rule in &self.config.archives {
            let kind = ArtifactKind::from(rule.kind);

            match self.match_archive(&assets, &primary, &rule.suffix) {
                Some(asset) => {
                    info!(asset = %asset.name, id = %asset.id, %kind, "archive asset discovered");
                    artifacts.push(Artifact::archive(kind, asset.clone(), &rule.inner_file));
                }
                None => {
                    warn!(suffix = %rule.suffix, %kind, "no asset matches the archive rule");
                    artifacts.push(Artifact::missing(kind, format!("*{}", rule.suffix)));
                }
            }
        }

        Ok(artifacts)
    }

    /// Picks the asset ending with `suffix`, preferring names carrying the unsigned marker.
    fn match_archive<'a>(
        &self,
        assets: &'a [AssetMetadata],
        primary: &AssetMetadata,
        suffix: &str,
    ) -> Option<&'a AssetMetadata> {
        let mut candidates = assets
            .iter()
            .filter(|asset| asset.id != primary.id && asset.name.ends_with(suffix));

        let first = candidates.next()?;
        if first.name.contains(&self.config.unsigned_marker) {
            return Some(first);
        }

        candidates
            .find(|asset| asset.name.contains(&self.config.unsigned_marker))
            .or(Some(first))
    }

    /// Discovers the artifacts of the release and signs them.
    pub async fn run(self, primary_asset_id: AssetId) -> SignerResult<RunReport> {
        let artifacts = self.discover(primary_asset_id).await?;
        self.run_artifacts(artifacts).await
    }

    /// Runs one pipeline per artifact around a single signing invocation.
    ///
    /// Returns an error only for coordination defects, in which case every remaining pipeline
    /// is aborted. Artifact failures are part of the returned report.
    pub async fn run_artifacts(self, artifacts: Vec<Artifact>) -> SignerResult<RunReport> {
        if artifacts.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "No artifacts to sign",
                "Discovery did not produce any artifact"
            );
        }

        let started = Instant::now();
        let participants = artifacts.len();
        info!(participants, "starting signing run");

        let coordinator = SignCoordinator::new(self.signing_service, participants);
        let barrier = coordinator.barrier();

        let mut join_set = JoinSet::new();
        let mut tasks = HashMap::with_capacity(participants);
        for (position, artifact) in artifacts.into_iter().enumerate() {
            let pipeline = ArtifactPipeline::new(
                artifact.clone(),
                self.config.clone(),
                self.source.clone(),
                self.extractor.clone(),
                self.sink.clone(),
                coordinator.handle(),
            );
            let state = pipeline.state();

            let span = info_span!(
                "artifact_pipeline",
                artifact = %artifact.display_name,
                kind = %artifact.kind
            );
            let handle = join_set.spawn(pipeline.run().instrument(span));

            tasks.insert(
                handle.id(),
                PipelineTask {
                    position,
                    artifact,
                    state,
                },
            );
        }

        let mut reports = Vec::with_capacity(participants);
        if let Err(err) =
            Self::wait_for_barrier(&barrier, &mut join_set, &tasks, &mut reports, started).await
        {
            join_set.abort_all();
            return Err(err);
        }

        let outcome = match coordinator.run_on_barrier_release().await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "signing coordination failed, aborting pipelines");
                join_set.abort_all();
                return Err(err);
            }
        };

        while let Some(result) = join_set.join_next_with_id().await {
            if let Err(err) = Self::collect(result, &tasks, &mut reports, started).await {
                join_set.abort_all();
                return Err(err);
            }
        }

        reports.sort_by_key(|(position, _)| *position);
        let report = RunReport {
            artifacts: reports.into_iter().map(|(_, report)| report).collect(),
            signing: SignSummary { outcome },
            elapsed: started.elapsed(),
        };

        info!(
            done = report.done_count(),
            total = report.artifacts.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "signing run finished"
        );

        Ok(report)
    }

    /// Waits for the barrier while collecting pipelines that finish before the release.
    async fn wait_for_barrier(
        barrier: &JoinBarrier,
        join_set: &mut JoinSet<SignerResult<ArtifactReport>>,
        tasks: &HashMap<task::Id, PipelineTask>,
        reports: &mut Vec<(usize, ArtifactReport)>,
        started: Instant,
    ) -> SignerResult<()> {
        loop {
            if barrier.is_released() {
                return Ok(());
            }

            // Finished pipelines have arrived, so more missing arrivals than running tasks means
            // a task died without arriving.
            if barrier.remaining() > join_set.len() {
                bail!(
                    ErrorKind::InternalBarrierViolation,
                    "Barrier can no longer be released",
                    format!(
                        "{} arrivals are missing but only {} pipelines are running",
                        barrier.remaining(),
                        join_set.len()
                    )
                );
            }

            tokio::select! {
                biased;

                _ = barrier.wait() => return Ok(()),

                Some(result) = join_set.join_next_with_id() => {
                    Self::collect(result, tasks, reports, started).await?;
                }
            }
        }
    }

    /// Records the result of a finished pipeline task.
    ///
    /// A panicked task becomes a failed report, a coordination error is returned.
    async fn collect(
        result: Result<(task::Id, SignerResult<ArtifactReport>), JoinError>,
        tasks: &HashMap<task::Id, PipelineTask>,
        reports: &mut Vec<(usize, ArtifactReport)>,
        started: Instant,
    ) -> SignerResult<()> {
        match result {
            Ok((id, Ok(report))) => {
                let position = tasks.get(&id).map_or(usize::MAX, |task| task.position);
                reports.push((position, report));

                Ok(())
            }
            Ok((_, Err(err))) => {
                error!(error = %err, "artifact pipeline reported a coordination failure");

                Err(err)
            }
            Err(join_error) => {
                let Some(task) = tasks.get(&join_error.id()) else {
                    bail!(
                        ErrorKind::InvalidState,
                        "Unknown pipeline task finished",
                        format!("Task {} is not a pipeline of this run", join_error.id())
                    );
                };

                error!(
                    artifact = %task.artifact,
                    error = %join_error,
                    "artifact pipeline task died"
                );

                let phase = task.state.phase().await.as_type();
                let failure = PipelineFailure::new(
                    FailureStage::from_phase(phase),
                    signer_error!(
                        ErrorKind::PipelineWorkerPanic,
                        "Artifact pipeline task died",
                        format!("{join_error} while in {phase}")
                    ),
                );

                reports.push((
                    task.position,
                    ArtifactReport {
                        kind: task.artifact.kind,
                        display_name: task.artifact.display_name.clone(),
                        phase: ArtifactPhase::Failed(failure),
                        remote_id: None,
                        warnings: vec![],
                        elapsed: started.elapsed(),
                    },
                ));

                Ok(())
            }
        }
    }
}

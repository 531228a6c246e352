use futures::FutureExt;
use metrics::{counter, gauge, histogram};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::bail;
use crate::concurrency::barrier::{Arrival, JoinBarrier};
use crate::concurrency::signal::{
    SignCompletionRx, SignCompletionTx, SignOutcome, create_sign_completion,
};
use crate::error::{ErrorKind, SignerResult};
use crate::metrics::{
    OUTCOME_LABEL, SIGNER_SIGN_BATCH_SIZE, SIGNER_SIGN_DURATION_SECONDS,
    SIGNER_SIGN_INVOCATIONS_TOTAL,
};
use crate::signer_error;
use crate::signing::base::SigningService;
use crate::signing::pending::PendingSignSet;

/// Handle given to each pipeline to take part in the shared signing step.
///
/// A pipeline registers its path, arrives at the barrier and then waits for the outcome. The
/// registration must happen before the arrival, otherwise the path might miss the snapshot.
#[derive(Debug, Clone)]
pub struct SignHandle {
    pending: PendingSignSet,
    barrier: JoinBarrier,
    completion_rx: SignCompletionRx,
}

impl SignHandle {
    /// Registers `path` for signing.
    pub async fn register(&self, path: PathBuf) -> SignerResult<()> {
        self.pending.append(path).await
    }

    /// Marks the end of the pre-sign phase of the calling pipeline.
    pub fn arrive(&self) -> SignerResult<Arrival> {
        self.barrier.arrive()
    }

    /// Waits for the outcome of the signing invocation.
    pub async fn wait_for_signing(&self) -> SignOutcome {
        self.completion_rx.wait().await
    }
}

/// Owner of the pending sign set and of the single signing invocation of a run.
///
/// [`SignCoordinator::run_on_barrier_release`] consumes the coordinator, so the signing service
/// can be invoked at most once per coordinator.
#[derive(Debug)]
pub struct SignCoordinator<G> {
    signing_service: G,
    pending: PendingSignSet,
    barrier: JoinBarrier,
    completion_tx: SignCompletionTx,
    completion_rx: SignCompletionRx,
}

impl<G> SignCoordinator<G>
where
    G: SigningService,
{
    /// Creates a coordinator whose barrier expects `participants` pipelines.
    pub fn new(signing_service: G, participants: usize) -> Self {
        let (completion_tx, completion_rx) = create_sign_completion();

        Self {
            signing_service,
            pending: PendingSignSet::new(),
            barrier: JoinBarrier::new(participants),
            completion_tx,
            completion_rx,
        }
    }

    /// Returns a handle for one participating pipeline.
    pub fn handle(&self) -> SignHandle {
        SignHandle {
            pending: self.pending.clone(),
            barrier: self.barrier.clone(),
            completion_rx: self.completion_rx.clone(),
        }
    }

    /// Returns the barrier the coordinator waits on.
    pub fn barrier(&self) -> JoinBarrier {
        self.barrier.clone()
    }

    /// Registers `path` for signing.
    pub async fn register(&self, path: PathBuf) -> SignerResult<()> {
        self.pending.append(path).await
    }

    /// Signs the snapshot of registered paths once every participant arrived and publishes the
    /// outcome.
    ///
    /// Calling this before the barrier released is an [`ErrorKind::InternalBarrierViolation`].
    /// The completion signal is then dropped unfired, which fails every waiting pipeline.
    /// A signing failure is not an error of this method: it is published and returned as a
    /// [`SignOutcome::Failed`].
    pub async fn run_on_barrier_release(self) -> SignerResult<SignOutcome> {
        if !self.barrier.is_released() {
            error!(
                remaining = self.barrier.remaining(),
                participants = self.barrier.participants(),
                "signing requested before every pipeline arrived"
            );

            bail!(
                ErrorKind::InternalBarrierViolation,
                "Signing requested before barrier release",
                format!(
                    "{} of {} participants have not arrived yet",
                    self.barrier.remaining(),
                    self.barrier.participants()
                )
            );
        }

        let paths = self.pending.seal_and_snapshot().await?;

        if paths.is_empty() {
            warn!("no path was registered for signing, skipping the signing invocation");

            let outcome = SignOutcome::Signed {
                signed_paths: 0,
                log: String::new(),
            };
            self.completion_tx.complete(outcome.clone());

            return Ok(outcome);
        }

        info!(
            paths = paths.len(),
            service = G::name(),
            "invoking signing service"
        );
        gauge!(SIGNER_SIGN_BATCH_SIZE).set(paths.len() as f64);

        let started = Instant::now();
        let result = AssertUnwindSafe(self.signing_service.sign(&paths))
            .catch_unwind()
            .await;

        let outcome = match result {
            Ok(Ok(report)) if report.success => SignOutcome::Signed {
                signed_paths: paths.len(),
                log: report.log,
            },
            Ok(Ok(report)) => SignOutcome::Failed {
                error: signer_error!(
                    ErrorKind::SignerRejected,
                    "Signing tool rejected the batch",
                    format!(
                        "{} reported a failure while signing {} paths",
                        G::name(),
                        paths.len()
                    )
                ),
                log: Some(report.log),
            },
            Ok(Err(err)) => SignOutcome::Failed {
                error: err,
                log: None,
            },
            Err(_) => SignOutcome::Failed {
                error: signer_error!(
                    ErrorKind::PipelineWorkerPanic,
                    "Signing service panicked",
                    format!("{} panicked while signing {} paths", G::name(), paths.len())
                ),
                log: None,
            },
        };

        let elapsed = started.elapsed();
        if let Some(log) = outcome.log() {
            for line in log.lines().filter(|line| !line.trim().is_empty()) {
                info!(service = G::name(), "{line}");
            }
        }

        let outcome_label = if outcome.is_signed() {
            "signed"
        } else {
            "failed"
        };
        counter!(SIGNER_SIGN_INVOCATIONS_TOTAL, OUTCOME_LABEL => outcome_label).increment(1);
        histogram!(SIGNER_SIGN_DURATION_SECONDS).record(elapsed.as_secs_f64());

        match &outcome {
            SignOutcome::Signed { signed_paths, .. } => info!(
                signed_paths,
                elapsed_ms = elapsed.as_millis() as u64,
                "signing completed"
            ),
            SignOutcome::Failed { error, .. } => error!(
                %error,
                elapsed_ms = elapsed.as_millis() as u64,
                "signing failed"
            ),
        }

        // The outcome is fired in both cases, pipelines waiting on it must never hang.
        self.completion_tx.complete(outcome.clone());

        Ok(outcome)
    }
}

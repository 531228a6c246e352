//! Durable one-shot broadcast of the signing outcome.
//!
//! The signing coordinator owns the only [`SignCompletionTx`] and fires it once, consuming it.
//! Every pipeline holds a [`SignCompletionRx`] and observes the same outcome, including
//! pipelines that start waiting after the outcome was published.

use std::fmt;
use tokio::sync::watch;
use tracing::warn;

use crate::error::{ErrorKind, SignerError};
use crate::signer_error;

/// Outcome of the single signing invocation of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum SignOutcome {
    /// Every registered path was signed.
    Signed {
        /// Number of paths handed to the signing service.
        signed_paths: usize,
        /// Captured output of the signing tool.
        log: String,
    },
    /// The signing invocation failed, no path should be considered signed.
    Failed {
        error: SignerError,
        /// Captured output of the signing tool, if it ran at all.
        log: Option<String>,
    },
}

impl SignOutcome {
    /// Returns `true` if signing succeeded.
    pub fn is_signed(&self) -> bool {
        matches!(self, SignOutcome::Signed { .. })
    }

    /// Returns the captured tool output, if any.
    pub fn log(&self) -> Option<&str> {
        match self {
            SignOutcome::Signed { log, .. } => Some(log),
            SignOutcome::Failed { log, .. } => log.as_deref(),
        }
    }
}

impl fmt::Display for SignOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignOutcome::Signed { signed_paths, .. } => write!(f, "signed({signed_paths})"),
            SignOutcome::Failed { error, .. } => write!(f, "failed({:?})", error.kind()),
        }
    }
}

/// Transmitter side of the sign completion signal.
///
/// Not cloneable and consumed by [`SignCompletionTx::complete`], so the outcome can be
/// published at most once.
#[derive(Debug)]
pub struct SignCompletionTx(watch::Sender<Option<SignOutcome>>);

impl SignCompletionTx {
    /// Publishes the outcome to every current and future receiver.
    pub fn complete(self, outcome: SignOutcome) {
        // Infallible send, the value must be stored even when no receiver is waiting yet.
        self.0.send_replace(Some(outcome));
    }
}

/// Receiver side of the sign completion signal.
#[derive(Debug, Clone)]
pub struct SignCompletionRx(watch::Receiver<Option<SignOutcome>>);

impl SignCompletionRx {
    /// Waits for the signing outcome.
    ///
    /// If the transmitter is dropped without publishing, a failed outcome is returned instead of
    /// waiting forever.
    pub async fn wait(&self) -> SignOutcome {
        let mut rx = self.0.clone();

        let result = rx
            .wait_for(Option::is_some)
            .await
            .map(|outcome| outcome.clone());

        match result {
            Ok(Some(outcome)) => outcome,
            Ok(None) | Err(_) => {
                warn!("sign completion dropped before an outcome was published");

                SignOutcome::Failed {
                    error: signer_error!(
                        ErrorKind::InvalidState,
                        "Signing never completed",
                        "The signing coordinator stopped before publishing an outcome"
                    ),
                    log: None,
                }
            }
        }
    }

    /// Returns the outcome if it has already been published.
    pub fn try_outcome(&self) -> Option<SignOutcome> {
        self.0.borrow().clone()
    }
}

/// Creates a new sign completion channel.
pub fn create_sign_completion() -> (SignCompletionTx, SignCompletionRx) {
    let (tx, rx) = watch::channel(None);
    (SignCompletionTx(tx), SignCompletionRx(rx))
}

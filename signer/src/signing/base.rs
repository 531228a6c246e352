use std::future::Future;
use std::path::PathBuf;

use crate::error::SignerResult;

/// Result reported by a [`SigningService`] invocation that actually ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningReport {
    /// Whether the tool reported success for the whole batch.
    pub success: bool,
    /// Captured tool output.
    pub log: String,
}

/// Trait for external code-signing tools.
///
/// The whole batch of paths is signed in a single invocation. A tool that cannot be located
/// fails with [`crate::error::ErrorKind::ToolNotFound`]; a tool that runs and refuses the batch
/// either returns a report with `success == false` or fails with
/// [`crate::error::ErrorKind::SignerRejected`].
pub trait SigningService {
    /// Returns the name of the signing service.
    fn name() -> &'static str;

    /// Signs every file in `paths` in place.
    fn sign(&self, paths: &[PathBuf]) -> impl Future<Output = SignerResult<SigningReport>> + Send;
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, SignerResult};
use crate::signing::{SigningReport, SigningService};

/// Suffix appended to every file signed by [`RecordingSigner`].
pub const SIGNATURE: &[u8] = b"+signed";

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<Vec<PathBuf>>,
    reject: bool,
    error: Option<ErrorKind>,
    delay: Option<Duration>,
}

/// Signing service recording every invocation.
///
/// A successful invocation appends [`SIGNATURE`] to each file, so uploads can be checked for
/// signed content.
#[derive(Debug, Clone, Default)]
pub struct RecordingSigner {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the tool run but report a failure for the batch.
    pub async fn reject(&self) {
        self.inner.lock().await.reject = true;
    }

    /// Makes every invocation fail with `kind` before the tool runs.
    pub async fn fail_with(&self, kind: ErrorKind) {
        self.inner.lock().await.error = Some(kind);
    }

    /// Delays every invocation by `delay`.
    pub async fn delay(&self, delay: Duration) {
        self.inner.lock().await.delay = Some(delay);
    }

    /// Returns the paths of every invocation, in invocation order.
    pub async fn calls(&self) -> Vec<Vec<PathBuf>> {
        self.inner.lock().await.calls.clone()
    }
}

impl SigningService for RecordingSigner {
    fn name() -> &'static str {
        "recording"
    }

    async fn sign(&self, paths: &[PathBuf]) -> SignerResult<SigningReport> {
        let (reject, error, delay) = {
            let mut inner = self.inner.lock().await;
            inner.calls.push(paths.to_vec());
            (inner.reject, inner.error, inner.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(kind) = error {
            bail!(
                kind,
                "Injected signing failure",
                format!("Signing {} paths failed", paths.len())
            );
        }

        if reject {
            return Ok(SigningReport {
                success: false,
                log: "SignTool Error: No certificates were found that met all the given criteria."
                    .to_string(),
            });
        }

        let mut log = String::new();
        for path in paths {
            let mut file = tokio::fs::OpenOptions::new()
                .append(true)
                .open(path)
                .await?;
            file.write_all(SIGNATURE).await?;
            file.flush().await?;

            log.push_str(&format!("Successfully signed: {}\n", path.display()));
        }

        Ok(SigningReport { success: true, log })
    }
}

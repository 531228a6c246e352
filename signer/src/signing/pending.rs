use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, SignerResult};

#[derive(Debug, Default)]
struct PendingSignSetInner {
    paths: Vec<PathBuf>,
    sealed: bool,
}

/// Paths collected from every pipeline before the signing invocation.
///
/// Appends are serialized through a mutex. The set is sealed when the signing coordinator takes
/// its snapshot, after which no further path can be registered.
#[derive(Debug, Clone, Default)]
pub struct PendingSignSet {
    inner: Arc<Mutex<PendingSignSetInner>>,
}

impl PendingSignSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a path to the set.
    ///
    /// Fails with [`ErrorKind::InternalBarrierViolation`] once the set is sealed and with
    /// [`ErrorKind::InvalidState`] when the same path is registered twice.
    pub async fn append(&self, path: PathBuf) -> SignerResult<()> {
        let mut inner = self.inner.lock().await;

        if inner.sealed {
            bail!(
                ErrorKind::InternalBarrierViolation,
                "Path registered after signing started",
                format!(
                    "The path '{}' was registered after the pending sign set was sealed",
                    path.display()
                )
            );
        }

        if inner.paths.contains(&path) {
            bail!(
                ErrorKind::InvalidState,
                "Path registered twice",
                format!("The path '{}' is already pending signature", path.display())
            );
        }

        debug!(path = %path.display(), "path registered for signing");
        inner.paths.push(path);

        Ok(())
    }

    /// Seals the set and returns every registered path.
    ///
    /// Only one snapshot can ever be taken, a second call is a coordination defect.
    pub async fn seal_and_snapshot(&self) -> SignerResult<Vec<PathBuf>> {
        let mut inner = self.inner.lock().await;

        if inner.sealed {
            bail!(
                ErrorKind::InternalBarrierViolation,
                "Pending sign set snapshot taken twice"
            );
        }

        inner.sealed = true;

        Ok(inner.paths.clone())
    }
}

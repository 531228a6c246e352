use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::archive::ArchiveExtractor;
use crate::bail;
use crate::error::{ErrorKind, SignerResult};

#[derive(Debug, Default)]
struct Inner {
    extracted: Vec<PathBuf>,
    updated: Vec<PathBuf>,
    extract_failures: HashMap<String, ErrorKind>,
    extract_panics: HashSet<String>,
    update_failures: HashMap<String, ErrorKind>,
}

/// Archive extractor treating an archive file as the content of its only member.
///
/// Extraction copies the archive bytes to the member path, updating copies the member bytes
/// back over the archive. Failures and panics are injected per archive file name.
#[derive(Debug, Clone, Default)]
pub struct FakeArchiveExtractor {
    inner: Arc<Mutex<Inner>>,
}

impl FakeArchiveExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the extraction from archives named `archive_name` fail with `kind`.
    pub async fn fail_extract(&self, archive_name: &str, kind: ErrorKind) {
        self.inner
            .lock()
            .await
            .extract_failures
            .insert(archive_name.to_string(), kind);
    }

    /// Makes the extraction from archives named `archive_name` panic.
    pub async fn panic_on_extract(&self, archive_name: &str) {
        self.inner
            .lock()
            .await
            .extract_panics
            .insert(archive_name.to_string());
    }

    /// Makes updates of archives named `archive_name` fail with `kind`.
    pub async fn fail_update(&self, archive_name: &str, kind: ErrorKind) {
        self.inner
            .lock()
            .await
            .update_failures
            .insert(archive_name.to_string(), kind);
    }

    /// Returns the archives files were extracted from.
    pub async fn extracted(&self) -> Vec<PathBuf> {
        self.inner.lock().await.extracted.clone()
    }

    /// Returns the archives that were updated in place.
    pub async fn updated(&self) -> Vec<PathBuf> {
        self.inner.lock().await.updated.clone()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl ArchiveExtractor for FakeArchiveExtractor {
    fn name() -> &'static str {
        "fake"
    }

    async fn extract(
        &self,
        archive: &Path,
        inner_name: &str,
        dest_dir: &Path,
    ) -> SignerResult<PathBuf> {
        let (failure, panics) = {
            let mut inner = self.inner.lock().await;
            inner.extracted.push(archive.to_path_buf());
            let name = file_name(archive);
            (
                inner.extract_failures.get(&name).copied(),
                inner.extract_panics.contains(&name),
            )
        };

        if panics {
            panic!("injected panic while extracting '{inner_name}'");
        }

        if let Some(kind) = failure {
            bail!(
                kind,
                "Injected extraction failure",
                format!("Extracting '{inner_name}' from '{}' failed", archive.display())
            );
        }

        let content = tokio::fs::read(archive).await?;
        tokio::fs::create_dir_all(dest_dir).await?;
        let extracted = dest_dir.join(inner_name);
        tokio::fs::write(&extracted, content).await?;

        Ok(extracted)
    }

    async fn update_in_place(&self, archive: &Path, inner_path: &Path) -> SignerResult<()> {
        let failure = {
            let mut inner = self.inner.lock().await;
            inner.updated.push(archive.to_path_buf());
            inner.update_failures.get(&file_name(archive)).copied()
        };

        if let Some(kind) = failure {
            bail!(
                kind,
                "Injected update failure",
                format!("Updating '{}' failed", archive.display())
            );
        }

        let content = tokio::fs::read(inner_path).await?;
        tokio::fs::write(archive, content).await?;

        Ok(())
    }
}

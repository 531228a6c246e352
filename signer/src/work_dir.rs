//! Working directories of the pipelines.

use std::path::Path;
use tracing::debug;

use crate::error::SignerResult;

/// Removes `dir` with everything below it and creates it again empty.
///
/// Working directories are reused across runs, nothing an earlier run left behind may be taken
/// for a file of the current run.
pub async fn clear_dir(dir: &Path) -> SignerResult<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(dir = %dir.display(), "removed leftovers of an earlier run"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    tokio::fs::create_dir_all(dir).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn leftovers_are_removed() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("archive_x64");
        tokio::fs::create_dir_all(dir.join("extracted")).await.unwrap();
        tokio::fs::write(dir.join("extracted/app.exe"), b"stale").await.unwrap();

        clear_dir(&dir).await.unwrap();

        assert!(dir.is_dir());
        assert!(!dir.join("extracted").exists());
    }

    #[tokio::test]
    async fn missing_directory_is_created() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("a").join("b");

        clear_dir(&dir).await.unwrap();

        assert!(dir.is_dir());
    }
}

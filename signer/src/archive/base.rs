use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::SignerResult;

/// Trait for tools that can pull a single file out of an archive and write it back.
///
/// Unreadable archives fail with [`crate::error::ErrorKind::CorruptArchive`], archives that
/// do not contain the requested file fail with [`crate::error::ErrorKind::MemberNotFound`].
pub trait ArchiveExtractor {
    /// Returns the name of the extractor.
    fn name() -> &'static str;

    /// Extracts `inner_name` from `archive` into `dest_dir` and returns the extracted file path.
    fn extract(
        &self,
        archive: &Path,
        inner_name: &str,
        dest_dir: &Path,
    ) -> impl Future<Output = SignerResult<PathBuf>> + Send;

    /// Replaces the member of `archive` matching the file name of `inner_path` with the content
    /// of `inner_path`.
    fn update_in_place(
        &self,
        archive: &Path,
        inner_path: &Path,
    ) -> impl Future<Output = SignerResult<()>> + Send;
}

//! Testing utilities for signing runs.
//!
//! The collaborators of a run are replaced by in-memory fakes that record every interaction
//! and accept injected failures and delays:
//!
//! - [`memory_store::MemoryReleaseStore`] is both the artifact source and the artifact sink.
//! - [`fake_archive::FakeArchiveExtractor`] treats an archive file as the content of its single
//!   member.
//! - [`recording_signer::RecordingSigner`] records every signing invocation and marks the
//!   signed files.
//! - [`notify::TimedNotify`] waits for notifications with a timeout.

pub mod fake_archive;
pub mod memory_store;
pub mod notify;
pub mod recording_signer;

use signer_config::shared::{ArchiveKind, ArchiveRule, ArtifactsConfig};
use std::path::Path;

/// Unsigned marker used by the test configuration.
pub const TEST_UNSIGNED_MARKER: &str = "-unsigned";

/// Inner file name of the archives of the test configuration.
pub const TEST_INNER_FILE: &str = "app.exe";

/// Returns an artifacts configuration with a 64-bit and a 32-bit archive rule, working in
/// `work_dir`.
pub fn test_artifacts_config(work_dir: &Path) -> ArtifactsConfig {
    ArtifactsConfig {
        unsigned_marker: TEST_UNSIGNED_MARKER.to_string(),
        work_dir: work_dir.to_path_buf(),
        delete_unsigned: false,
        archives: vec![
            ArchiveRule {
                kind: ArchiveKind::X64,
                suffix: "-x64.zip".to_string(),
                inner_file: TEST_INNER_FILE.to_string(),
            },
            ArchiveRule {
                kind: ArchiveKind::X86,
                suffix: "-ia32.zip".to_string(),
                inner_file: TEST_INNER_FILE.to_string(),
            },
        ],
    }
}

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::archive::base::ArchiveExtractor;
use crate::bail;
use crate::error::{ErrorKind, SignerResult};
use crate::work_dir::clear_dir;
use crate::process::{ToolOutput, run_tool};

/// Exit code reported by `7z` for fatal errors, including unreadable archives.
const SEVEN_ZIP_FATAL_ERROR: i32 = 2;

/// [`ArchiveExtractor`] backed by the `7z` command line tool.
#[derive(Debug, Clone)]
pub struct SevenZipExtractor {
    program: PathBuf,
}

impl SevenZipExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn check_exit(archive: &Path, action: &'static str, output: &ToolOutput) -> SignerResult<()> {
        match output.exit_code {
            Some(0) | Some(1) => Ok(()),
            Some(SEVEN_ZIP_FATAL_ERROR) => bail!(
                ErrorKind::CorruptArchive,
                "Archive could not be processed",
                format!(
                    "7z failed to {action} '{}': {}",
                    archive.display(),
                    output.combined().trim()
                )
            ),
            code => bail!(
                ErrorKind::IoError,
                "Archive tool failed",
                format!(
                    "7z exited with {code:?} while trying to {action} '{}': {}",
                    archive.display(),
                    output.combined().trim()
                )
            ),
        }
    }
}

impl ArchiveExtractor for SevenZipExtractor {
    fn name() -> &'static str {
        "seven_zip"
    }

    async fn extract(
        &self,
        archive: &Path,
        inner_name: &str,
        dest_dir: &Path,
    ) -> SignerResult<PathBuf> {
        clear_dir(dest_dir).await?;

        // `e` flattens paths, so the member lands directly in the destination directory.
        let mut output_flag = OsString::from("-o");
        output_flag.push(dest_dir.as_os_str());
        let args = [
            OsString::from("e"),
            archive.as_os_str().to_owned(),
            OsString::from(inner_name),
            output_flag,
            OsString::from("-y"),
        ];

        let output = run_tool(&self.program, args, None).await?;
        Self::check_exit(archive, "extract", &output)?;

        let extracted = dest_dir.join(inner_name);
        if !tokio::fs::try_exists(&extracted).await? {
            bail!(
                ErrorKind::MemberNotFound,
                "Archive does not contain the expected file",
                format!(
                    "'{}' was not found in '{}'",
                    inner_name,
                    archive.display()
                )
            );
        }

        info!(
            archive = %archive.display(),
            extracted = %extracted.display(),
            "extracted file from archive"
        );

        Ok(extracted)
    }

    async fn update_in_place(&self, archive: &Path, inner_path: &Path) -> SignerResult<()> {
        let (Some(parent), Some(file_name)) = (inner_path.parent(), inner_path.file_name())
        else {
            bail!(
                ErrorKind::InvalidState,
                "Archive member path has no file name",
                format!("Cannot update an archive from '{}'", inner_path.display())
            );
        };

        // Archive paths are relative to the working directory of 7z, running it next to the
        // member keeps it at the archive root.
        let archive = std::path::absolute(archive)?;
        let args = [
            OsString::from("u"),
            archive.as_os_str().to_owned(),
            file_name.to_owned(),
        ];

        let output = run_tool(&self.program, args, Some(parent)).await?;
        Self::check_exit(&archive, "update", &output)?;

        debug!(
            archive = %archive.display(),
            member = %inner_path.display(),
            "updated archive member"
        );

        Ok(())
    }
}

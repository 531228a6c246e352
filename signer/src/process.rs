//! Execution of the external tools the collaborators wrap.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ErrorKind, SignerResult};
use crate::signer_error;

/// Captured result of an external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Returns `true` if the tool exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns stdout followed by stderr.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }

        if self.stdout.is_empty() {
            return self.stderr.clone();
        }

        format!("{}\n{}", self.stdout.trim_end(), self.stderr)
    }
}

/// Runs `program` with `args` to completion and captures its output.
///
/// When `current_dir` is set the tool runs inside that directory.
///
/// Spawning a program that does not exist fails with [`ErrorKind::ToolNotFound`]. A non-zero
/// exit status is not an error, callers interpret it through [`ToolOutput::exit_code`].
pub async fn run_tool<I, S>(
    program: &Path,
    args: I,
    current_dir: Option<&Path>,
) -> SignerResult<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(current_dir) = current_dir {
        cmd.current_dir(current_dir);
    }

    debug!(program = %program.display(), "spawning external tool");

    let child = cmd.spawn().map_err(|err| {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::ToolNotFound,
            _ => ErrorKind::IoError,
        };

        signer_error!(
            kind,
            "Failed to start external tool",
            format!("Could not spawn '{}'", program.display()),
            source: err
        )
    })?;

    let output = child.wait_with_output().await?;

    let tool_output = ToolOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    debug!(
        program = %program.display(),
        exit_code = ?tool_output.exit_code,
        "external tool exited"
    );

    Ok(tool_output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_output_joins_both_streams() {
        let output = ToolOutput {
            exit_code: Some(1),
            stdout: "Signing app.exe\n".to_string(),
            stderr: "SignTool Error: No certificates were found.\n".to_string(),
        };

        assert!(!output.success());
        assert_eq!(
            output.combined(),
            "Signing app.exe\nSignTool Error: No certificates were found.\n"
        );
    }

    #[tokio::test]
    async fn missing_program_is_tool_not_found() {
        let err = run_tool(Path::new("/nonexistent/release-signer-tool"), ["--help"], None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ToolNotFound);
    }
}

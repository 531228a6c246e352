use signer_config::shared::SigningConfig;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::bail;
use crate::error::{ErrorKind, SignerResult};
use crate::process::run_tool;
use crate::signing::base::{SigningReport, SigningService};

/// Prefix of the SDK version directories below the Windows Kits `bin` directory.
const WINDOWS_10_SDK_PREFIX: &str = "10.0";

/// [`SigningService`] invoking Windows `signtool.exe` once for the whole batch.
#[derive(Debug, Clone)]
pub struct SignToolService {
    config: SigningConfig,
}

impl SignToolService {
    pub fn new(config: SigningConfig) -> Self {
        Self { config }
    }

    /// Returns the path of `signtool.exe`.
    ///
    /// An explicitly configured path wins, otherwise the newest Windows 10 SDK below the
    /// configured Windows Kits directory is used.
    pub async fn locate(&self) -> SignerResult<PathBuf> {
        if let Some(path) = &self.config.signtool_path {
            if !tokio::fs::try_exists(path).await? {
                bail!(
                    ErrorKind::ToolNotFound,
                    "Configured signtool does not exist",
                    format!("No file at '{}'", path.display())
                );
            }

            return Ok(path.clone());
        }

        locate_in_windows_kits(&self.config.windows_kits_dir).await
    }

    /// Builds the argument list of a single `signtool sign` invocation.
    pub fn sign_args(&self, paths: &[PathBuf]) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "sign",
            "/sha1",
            self.config.certificate_sha1.as_str(),
            "/fd",
            self.config.digest_algorithm.as_str(),
            "/n",
            self.config.subject_name.as_str(),
            "/tr",
            self.config.timestamp_url.as_str(),
            "/v",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        args.extend(paths.iter().map(|path| path.as_os_str().to_owned()));

        args
    }
}

impl SigningService for SignToolService {
    fn name() -> &'static str {
        "signtool"
    }

    async fn sign(&self, paths: &[PathBuf]) -> SignerResult<SigningReport> {
        let signtool = self.locate().await?;
        info!(signtool = %signtool.display(), paths = paths.len(), "running signtool");

        let output = run_tool(&signtool, self.sign_args(paths), None).await?;

        Ok(SigningReport {
            success: output.success(),
            log: output.combined(),
        })
    }
}

/// Finds `x64/signtool.exe` in the newest `10.0*` SDK directory below `windows_kits_bin`.
pub async fn locate_in_windows_kits(windows_kits_bin: &Path) -> SignerResult<PathBuf> {
    let mut entries = match tokio::fs::read_dir(windows_kits_bin).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            bail!(
                ErrorKind::ToolNotFound,
                "Windows Kits directory does not exist",
                format!("No directory at '{}'", windows_kits_bin.display()),
                source: err
            );
        }
        Err(err) => return Err(err.into()),
    };

    let mut newest: Option<(Vec<u64>, PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        if !name.starts_with(WINDOWS_10_SDK_PREFIX) || !entry.file_type().await?.is_dir() {
            continue;
        }

        let version = parse_sdk_version(name);
        debug!(sdk = name, "found windows sdk directory");

        if newest
            .as_ref()
            .is_none_or(|(newest_version, _)| version > *newest_version)
        {
            newest = Some((version, entry.path()));
        }
    }

    let Some((_, sdk_dir)) = newest else {
        bail!(
            ErrorKind::ToolNotFound,
            "No Windows 10 SDK found",
            format!(
                "'{}' contains no '{}*' directory",
                windows_kits_bin.display(),
                WINDOWS_10_SDK_PREFIX
            )
        );
    };

    let signtool = sdk_dir.join("x64").join("signtool.exe");
    if !tokio::fs::try_exists(&signtool).await? {
        bail!(
            ErrorKind::ToolNotFound,
            "signtool.exe not found",
            format!("No file at '{}'", signtool.display())
        );
    }

    Ok(signtool)
}

/// Parses a dotted SDK version, non-numeric components sort first.
fn parse_sdk_version(name: &str) -> Vec<u64> {
    name.split('.')
        .map(|component| component.parse().unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(windows_kits_dir: &Path) -> SigningConfig {
        SigningConfig {
            signtool_path: None,
            windows_kits_dir: windows_kits_dir.to_path_buf(),
            certificate_sha1: "ABCDEF0123".to_string(),
            subject_name: "Open Source Developer".to_string(),
            timestamp_url: "http://time.certum.pl".to_string(),
            digest_algorithm: "SHA256".to_string(),
        }
    }

    async fn create_sdk(root: &Path, version: &str) -> PathBuf {
        let dir = root.join(version).join("x64");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let signtool = dir.join("signtool.exe");
        tokio::fs::write(&signtool, b"").await.unwrap();
        signtool
    }

    #[test]
    fn sdk_versions_compare_numerically() {
        assert!(parse_sdk_version("10.0.22621.0") > parse_sdk_version("10.0.9600.0"));
        assert!(parse_sdk_version("10.0.19041.0") > parse_sdk_version("10.0.17763.0"));
    }

    #[test]
    fn sign_args_list_every_path_after_options() {
        let service = SignToolService::new(config(Path::new("C:/kits")));
        let args = service.sign_args(&[PathBuf::from("a.appx"), PathBuf::from("x64/app.exe")]);

        let args: Vec<_> = args.iter().map(|arg| arg.to_string_lossy()).collect();
        assert_eq!(
            args,
            vec![
                "sign",
                "/sha1",
                "ABCDEF0123",
                "/fd",
                "SHA256",
                "/n",
                "Open Source Developer",
                "/tr",
                "http://time.certum.pl",
                "/v",
                "a.appx",
                "x64/app.exe",
            ]
        );
    }

    #[tokio::test]
    async fn picks_newest_sdk() {
        let kits = tempfile::tempdir().unwrap();
        create_sdk(kits.path(), "10.0.17763.0").await;
        let newest = create_sdk(kits.path(), "10.0.22621.0").await;
        create_sdk(kits.path(), "8.1").await;

        let located = SignToolService::new(config(kits.path()))
            .locate()
            .await
            .unwrap();
        assert_eq!(located, newest);
    }

    #[tokio::test]
    async fn missing_sdk_is_tool_not_found() {
        let kits = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(kits.path().join("arm64")).await.unwrap();

        let err = locate_in_windows_kits(kits.path()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolNotFound);

        let err = locate_in_windows_kits(&kits.path().join("missing"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolNotFound);
    }

    #[tokio::test]
    async fn configured_path_must_exist() {
        let kits = tempfile::tempdir().unwrap();
        let mut config = config(kits.path());
        config.signtool_path = Some(kits.path().join("signtool.exe"));

        let err = SignToolService::new(config).locate().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolNotFound);
    }
}

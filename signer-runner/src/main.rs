//! Signs the Windows artifacts of a GitHub release.
//!
//! Downloads the unsigned manifest package and portable archives of the release, signs all of
//! their executables with a single `signtool` invocation and uploads the signed artifacts back
//! to the release.

use clap::Parser;
use secrecy::SecretString;
use signer_telemetry::metrics::init_metrics_handle;
use signer_telemetry::tracing::{DEFAULT_LOG_FILTER, init_tracing};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::config::load_signer_config;
use crate::core::sign_release;
use crate::error::{RunnerError, RunnerResult};

mod config;
mod core;
mod error;

/// Environment variable holding the GitHub token used for every API call.
const GITHUB_TOKEN_ENV_NAME: &str = "GITHUB_PAT";

#[derive(Debug, Parser)]
#[command(name = "release-signer", version, about = "Sign the Windows artifacts of a GitHub release")]
struct Args {
    /// Identifier of the GitHub release.
    release_id: u64,
    /// Identifier of the unsigned manifest package asset.
    primary_asset_id: u64,
    /// Writes the metrics of the run to this file in the Prometheus text format.
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> RunnerResult<ExitCode> {
    let config = load_signer_config()?;
    init_tracing(DEFAULT_LOG_FILTER).map_err(RunnerError::config)?;
    let metrics = init_metrics_handle().map_err(RunnerError::config)?;

    let token = std::env::var(GITHUB_TOKEN_ENV_NAME)
        .map(SecretString::new)
        .map_err(|_| RunnerError::missing_env_var(GITHUB_TOKEN_ENV_NAME))?;

    let report = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(sign_release(
            config,
            token,
            args.release_id,
            args.primary_asset_id,
        ))?;

    println!("{}", report.render());

    if let Some(path) = &args.metrics_file {
        // The report is already out, a metrics file that cannot be written does not fail the run.
        if let Err(err) = std::fs::write(path, metrics.render()) {
            warn!(path = %path.display(), error = %err, "failed to write the metrics file");
        }
    }

    if report.is_success() {
        info!("all artifacts were signed and published");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(
            failed = report.failed().count(),
            "some artifacts were not published"
        );
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positional_identifiers() {
        let args = Args::try_parse_from(["release-signer", "1234", "5678"]).unwrap();

        assert_eq!(args.release_id, 1234);
        assert_eq!(args.primary_asset_id, 5678);
        assert_eq!(args.metrics_file, None);
    }

    #[test]
    fn requires_both_identifiers() {
        assert!(Args::try_parse_from(["release-signer", "1234"]).is_err());
    }

    #[test]
    fn rejects_non_numeric_identifiers() {
        assert!(Args::try_parse_from(["release-signer", "latest", "5678"]).is_err());
    }
}

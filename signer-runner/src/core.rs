use secrecy::SecretString;
use signer::archive::SevenZipExtractor;
use signer::clients::github::GitHubReleaseClient;
use signer::orchestrator::Orchestrator;
use signer::report::RunReport;
use signer::signing::SignToolService;
use signer::types::AssetId;
use signer_config::shared::SignerConfig;
use tracing::info;

use crate::error::RunnerResult;

/// Signs the Windows artifacts of `release_id`, starting from its primary asset.
///
/// The release client is both the source of the unsigned assets and the sink of the signed
/// ones.
pub async fn sign_release(
    config: SignerConfig,
    token: SecretString,
    release_id: u64,
    primary_asset_id: u64,
) -> RunnerResult<RunReport> {
    info!(
        owner = %config.github.owner,
        repo = %config.github.repo,
        release_id,
        primary_asset_id,
        "signing release"
    );

    tokio::fs::create_dir_all(&config.artifacts.work_dir).await?;

    let client = GitHubReleaseClient::new(config.github, token, release_id)?;
    let extractor = SevenZipExtractor::new(config.archive.seven_zip_path);
    let signing_service = SignToolService::new(config.signing);

    let orchestrator = Orchestrator::new(
        config.artifacts,
        client.clone(),
        extractor,
        client,
        signing_service,
    );
    let report = orchestrator.run(AssetId(primary_asset_id)).await?;

    Ok(report)
}

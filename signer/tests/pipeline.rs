use signer::error::ErrorKind;
use signer::orchestrator::Orchestrator;
use signer::pipeline::ArtifactPipeline;
use signer::report::RunReport;
use signer::signing::SignCoordinator;
use signer::state::phase::{ArtifactPhase, ArtifactPhaseType, FailureStage};
use signer::test_utils::fake_archive::FakeArchiveExtractor;
use signer::test_utils::memory_store::MemoryReleaseStore;
use signer::test_utils::recording_signer::{RecordingSigner, SIGNATURE};
use signer::test_utils::test_artifacts_config;
use signer::types::{Artifact, ArtifactKind, AssetId, AssetMetadata};
use signer_config::shared::ArtifactsConfig;
use signer_telemetry::tracing::init_test_tracing;
use std::sync::Arc;
use tempfile::TempDir;

const PACKAGE_NAME: &str = "app-1.0.0-unsigned.appx";
const X64_NAME: &str = "app-1.0.0-unsigned-x64.zip";
const X86_NAME: &str = "app-1.0.0-unsigned-ia32.zip";

struct TestRelease {
    store: MemoryReleaseStore,
    extractor: FakeArchiveExtractor,
    signer: RecordingSigner,
    package: AssetId,
    x64: AssetId,
    x86: AssetId,
    work_dir: TempDir,
}

impl TestRelease {
    async fn new() -> Self {
        let store = MemoryReleaseStore::new();
        let package = store.add_asset(PACKAGE_NAME, b"appx".to_vec()).await;
        let x64 = store.add_asset(X64_NAME, b"x64 exe".to_vec()).await;
        let x86 = store.add_asset(X86_NAME, b"x86 exe".to_vec()).await;

        Self {
            store,
            extractor: FakeArchiveExtractor::new(),
            signer: RecordingSigner::new(),
            package,
            x64,
            x86,
            work_dir: tempfile::tempdir().unwrap(),
        }
    }

    fn config(&self) -> ArtifactsConfig {
        test_artifacts_config(self.work_dir.path())
    }

    async fn run(&self, config: ArtifactsConfig) -> RunReport {
        Orchestrator::new(
            config,
            self.store.clone(),
            self.extractor.clone(),
            self.store.clone(),
            self.signer.clone(),
        )
        .run(self.package)
        .await
        .unwrap()
    }

    async fn uploaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .store
            .uploads()
            .await
            .into_iter()
            .map(|upload| upload.name)
            .collect();
        names.sort();

        names
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn all_artifacts_are_signed_once_and_published() {
    init_test_tracing();
    let release = TestRelease::new().await;

    let report = release.run(release.config()).await;

    assert!(report.is_success());
    assert_eq!(report.done_count(), 3);
    assert_eq!(report.signing.signed_paths(), 3);

    let kinds: Vec<ArtifactKind> = report.artifacts.iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ArtifactKind::ManifestPackage,
            ArtifactKind::ArchiveX64,
            ArtifactKind::ArchiveX86
        ]
    );

    let calls = release.signer.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 3);

    assert_eq!(
        release.uploaded_names().await,
        vec!["app-1.0.0-ia32.zip", "app-1.0.0-x64.zip", "app-1.0.0.appx"]
    );
    for upload in release.store.uploads().await {
        assert!(upload.content.ends_with(SIGNATURE), "{} is not signed", upload.name);
    }

    let mut fetched = release.store.fetched().await;
    fetched.sort();
    assert_eq!(fetched, vec![release.package, release.x64, release.x86]);

    // Unsigned assets stay attached unless deletion is configured.
    assert!(release.store.deleted().await.is_empty());
    assert_eq!(release.extractor.updated().await.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_fetch_does_not_block_the_other_artifacts() {
    init_test_tracing();
    let release = TestRelease::new().await;
    release
        .store
        .fail_fetch(release.x86, ErrorKind::TransferError)
        .await;

    let report = release.run(release.config()).await;

    assert!(!report.is_success());
    assert_eq!(report.done_count(), 2);

    let failure = report.artifacts[2].failure().unwrap();
    assert_eq!(failure.stage, FailureStage::Fetch);
    assert_eq!(failure.kind(), ErrorKind::TransferError);

    let calls = release.signer.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 2);

    assert_eq!(
        release.uploaded_names().await,
        vec!["app-1.0.0-x64.zip", "app-1.0.0.appx"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_signing_fails_every_pipeline_without_uploads() {
    init_test_tracing();
    let release = TestRelease::new().await;
    release.signer.reject().await;

    let report = release.run(release.config()).await;

    assert_eq!(report.done_count(), 0);
    assert!(!report.signing.outcome.is_signed());
    for artifact in &report.artifacts {
        let failure = artifact.failure().unwrap();
        assert_eq!(failure.stage, FailureStage::Sign);
        assert_eq!(failure.kind(), ErrorKind::SignerRejected);
        assert!(
            failure
                .tool_output
                .as_deref()
                .unwrap()
                .contains("No certificates were found")
        );
    }

    assert_eq!(release.signer.calls().await.len(), 1);
    assert!(release.store.uploads().await.is_empty());
    assert!(release.extractor.updated().await.is_empty());

    let rendered = report.render();
    assert!(rendered.contains("No certificates were found"));
    assert!(rendered.contains("app-1.0.0-unsigned.appx [manifest_package]: failed(sign)"));
}

#[tokio::test(flavor = "multi_thread")]
async fn signing_service_error_fails_every_pipeline() {
    init_test_tracing();
    let release = TestRelease::new().await;
    release.signer.fail_with(ErrorKind::ToolNotFound).await;

    let report = release.run(release.config()).await;

    assert_eq!(report.done_count(), 0);
    assert!(
        report
            .artifacts
            .iter()
            .all(|artifact| artifact.failure().unwrap().kind() == ErrorKind::ToolNotFound)
    );
    assert!(release.store.uploads().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_archive_fails_while_fetching() {
    init_test_tracing();
    let store = MemoryReleaseStore::new();
    let package = store.add_asset(PACKAGE_NAME, b"appx".to_vec()).await;
    store.add_asset(X64_NAME, b"x64 exe".to_vec()).await;
    let signer = RecordingSigner::new();
    let work_dir = tempfile::tempdir().unwrap();

    let report = Orchestrator::new(
        test_artifacts_config(work_dir.path()),
        store.clone(),
        FakeArchiveExtractor::new(),
        store.clone(),
        signer.clone(),
    )
    .run(package)
    .await
    .unwrap();

    assert_eq!(report.done_count(), 2);

    let missing = &report.artifacts[2];
    assert_eq!(missing.display_name, "*-ia32.zip");
    assert_eq!(missing.kind, ArtifactKind::ArchiveX86);
    assert_eq!(missing.failure().unwrap().stage, FailureStage::Fetch);
    assert_eq!(missing.failure().unwrap().kind(), ErrorKind::NotFound);

    assert_eq!(signer.calls().await[0].len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn extraction_and_repack_failures_are_reported_per_artifact() {
    init_test_tracing();
    let release = TestRelease::new().await;
    release
        .extractor
        .fail_extract(X64_NAME, ErrorKind::CorruptArchive)
        .await;
    release
        .extractor
        .fail_update(X86_NAME, ErrorKind::IoError)
        .await;

    let report = release.run(release.config()).await;

    assert!(report.artifacts[0].is_done());

    let x64 = report.artifacts[1].failure().unwrap();
    assert_eq!(x64.stage, FailureStage::Extract);
    assert_eq!(x64.kind(), ErrorKind::CorruptArchive);

    let x86 = report.artifacts[2].failure().unwrap();
    assert_eq!(x86.stage, FailureStage::Repack);
    assert_eq!(x86.kind(), ErrorKind::IoError);

    // The x86 archive was registered and signed before its repack failed.
    assert_eq!(release.signer.calls().await[0].len(), 2);
    assert_eq!(release.uploaded_names().await, vec!["app-1.0.0.appx"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn existing_signed_asset_is_an_upload_conflict() {
    init_test_tracing();
    let release = TestRelease::new().await;
    release.store.add_asset("app-1.0.0.appx", b"old".to_vec()).await;

    let report = release.run(release.config()).await;

    let failure = report.artifacts[0].failure().unwrap();
    assert_eq!(failure.stage, FailureStage::Upload);
    assert_eq!(failure.kind(), ErrorKind::Conflict);
    assert!(report.artifacts[1].is_done());
    assert!(report.artifacts[2].is_done());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_upload_keeps_the_unsigned_asset() {
    init_test_tracing();
    let release = TestRelease::new().await;
    release
        .store
        .fail_upload("app-1.0.0-ia32.zip", ErrorKind::TransferError)
        .await;
    let mut config = release.config();
    config.delete_unsigned = true;

    let report = release.run(config).await;

    let failure = report.artifacts[2].failure().unwrap();
    assert_eq!(failure.stage, FailureStage::Upload);
    assert_eq!(failure.kind(), ErrorKind::TransferError);
    assert!(report.artifacts[0].is_done());
    assert!(report.artifacts[1].is_done());

    let mut deleted = release.store.deleted().await;
    deleted.sort();
    assert_eq!(deleted, vec![release.package, release.x64]);
    assert!(release
        .store
        .asset_names()
        .await
        .contains(&X86_NAME.to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn unsigned_assets_are_deleted_after_upload() {
    init_test_tracing();
    let release = TestRelease::new().await;
    release
        .store
        .fail_delete(release.x64, ErrorKind::TransferError)
        .await;
    let mut config = release.config();
    config.delete_unsigned = true;

    let report = release.run(config).await;

    assert!(report.is_success());
    assert_eq!(report.artifacts[1].warnings.len(), 1);
    assert!(report.artifacts[0].warnings.is_empty());

    let mut deleted = release.store.deleted().await;
    deleted.sort();
    assert_eq!(deleted, vec![release.package, release.x86]);

    let names = release.store.asset_names().await;
    assert!(names.contains(&X64_NAME.to_string()));
    assert!(!names.contains(&PACKAGE_NAME.to_string()));
    assert!(!names.contains(&X86_NAME.to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn asset_without_marker_is_replaced_in_place() {
    init_test_tracing();
    let store = MemoryReleaseStore::new();
    let package = store.add_asset("app-1.0.0.appx", b"appx".to_vec()).await;
    let work_dir = tempfile::tempdir().unwrap();
    let mut config = test_artifacts_config(work_dir.path());
    config.archives.clear();
    config.delete_unsigned = true;

    let report = Orchestrator::new(
        config,
        store.clone(),
        FakeArchiveExtractor::new(),
        store.clone(),
        RecordingSigner::new(),
    )
    .run(package)
    .await
    .unwrap();

    assert!(report.is_success());
    assert_eq!(store.deleted().await, vec![package]);
    assert_eq!(store.asset_names().await, vec!["app-1.0.0.appx"]);
    assert_ne!(report.artifacts[0].remote_id, Some(package));
}

#[tokio::test(flavor = "multi_thread")]
async fn archive_pipeline_goes_through_every_phase() {
    init_test_tracing();
    let release = TestRelease::new().await;
    let coordinator = SignCoordinator::new(release.signer.clone(), 1);
    let artifact = Artifact::archive(
        ArtifactKind::ArchiveX64,
        AssetMetadata {
            id: release.x64,
            name: X64_NAME.to_string(),
        },
        "app.exe",
    );

    let pipeline = ArtifactPipeline::new(
        artifact,
        Arc::new(release.config()),
        release.store.clone(),
        release.extractor.clone(),
        release.store.clone(),
        coordinator.handle(),
    );
    let state = pipeline.state();
    let task = tokio::spawn(pipeline.run());

    coordinator.barrier().wait().await;
    let parked = state
        .wait_for_phase_type(&[ArtifactPhaseType::AwaitingSign, ArtifactPhaseType::Failed])
        .await;
    assert_eq!(parked, ArtifactPhase::AwaitingSign);
    assert!(release.store.uploads().await.is_empty());

    coordinator.run_on_barrier_release().await.unwrap();
    let finished = state
        .wait_for_phase_type(&[ArtifactPhaseType::Done, ArtifactPhaseType::Failed])
        .await;
    assert_eq!(finished, ArtifactPhase::Done);

    let report = task.await.unwrap().unwrap();
    assert!(report.is_done());
    assert_eq!(
        state.history().await,
        vec![
            ArtifactPhaseType::Idle,
            ArtifactPhaseType::Fetching,
            ArtifactPhaseType::Extracting,
            ArtifactPhaseType::RegisteredForSign,
            ArtifactPhaseType::AwaitingSign,
            ArtifactPhaseType::Repacking,
            ArtifactPhaseType::Uploading,
            ArtifactPhaseType::Done,
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn manifest_package_skips_extraction_and_repacking() {
    init_test_tracing();
    let release = TestRelease::new().await;
    let coordinator = SignCoordinator::new(release.signer.clone(), 1);
    let artifact = Artifact::manifest_package(AssetMetadata {
        id: release.package,
        name: PACKAGE_NAME.to_string(),
    });

    let pipeline = ArtifactPipeline::new(
        artifact,
        Arc::new(release.config()),
        release.store.clone(),
        release.extractor.clone(),
        release.store.clone(),
        coordinator.handle(),
    );
    let state = pipeline.state();
    let task = tokio::spawn(pipeline.run());

    coordinator.barrier().wait().await;
    coordinator.run_on_barrier_release().await.unwrap();
    let report = task.await.unwrap().unwrap();

    assert!(report.is_done());
    let history = state.history().await;
    assert!(!history.contains(&ArtifactPhaseType::Extracting));
    assert!(!history.contains(&ArtifactPhaseType::Repacking));
    assert!(release.extractor.extracted().await.is_empty());

    let uploads = release.store.uploads().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(&uploads[0].content[..], b"appx+signed");
}

#[tokio::test(flavor = "multi_thread")]
async fn leftovers_of_an_earlier_run_are_never_signed() {
    init_test_tracing();
    let release = TestRelease::new().await;
    let extracted = release
        .work_dir
        .path()
        .join(ArtifactKind::ArchiveX64.work_dir_name())
        .join("extracted");
    std::fs::create_dir_all(&extracted).unwrap();
    std::fs::write(extracted.join("app.exe"), b"stale exe").unwrap();
    release
        .extractor
        .fail_extract(X64_NAME, ErrorKind::MemberNotFound)
        .await;

    let report = release.run(release.config()).await;

    let x64 = report.artifacts[1].failure().unwrap();
    assert_eq!(x64.stage, FailureStage::Extract);
    assert_eq!(x64.kind(), ErrorKind::MemberNotFound);
    assert!(!extracted.join("app.exe").exists());

    let calls = release.signer.calls().await;
    assert_eq!(calls[0].len(), 2);
    assert!(!calls[0].contains(&extracted.join("app.exe")));
    assert_eq!(
        release.uploaded_names().await,
        vec!["app-1.0.0-ia32.zip", "app-1.0.0.appx"]
    );
}

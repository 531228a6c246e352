use signer::concurrency::barrier::Arrival;
use signer::concurrency::signal::SignOutcome;
use signer::error::ErrorKind;
use signer::orchestrator::Orchestrator;
use signer::signing::SignCoordinator;
use signer::state::phase::FailureStage;
use signer::test_utils::fake_archive::FakeArchiveExtractor;
use signer::test_utils::memory_store::MemoryReleaseStore;
use signer::test_utils::recording_signer::RecordingSigner;
use signer::test_utils::test_artifacts_config;
use signer::types::{Artifact, AssetMetadata};
use signer_telemetry::tracing::init_test_tracing;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Adds `count` packages to `store`, delaying the fetch of package `i` by `delay_ms(i)`.
async fn delayed_packages(
    store: &MemoryReleaseStore,
    count: usize,
    delay_ms: impl Fn(usize) -> u64,
) -> Vec<Artifact> {
    let mut artifacts = Vec::with_capacity(count);
    for i in 0..count {
        let name = format!("package-{i:02}-unsigned.appx");
        let id = store.add_asset(&name, format!("package {i}").into_bytes()).await;
        store
            .delay_fetch(id, Duration::from_millis(delay_ms(i)))
            .await;

        artifacts.push(Artifact::manifest_package(AssetMetadata { id, name }));
    }

    artifacts
}

fn file_names(paths: &[PathBuf]) -> BTreeSet<String> {
    paths
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_pipelines_share_a_single_signing_invocation() {
    init_test_tracing();
    let store = MemoryReleaseStore::new();
    let signer = RecordingSigner::new();
    signer.delay(Duration::from_millis(20)).await;
    let work_dir = tempfile::tempdir().unwrap();
    let artifacts = delayed_packages(&store, 16, |i| (i as u64 * 7) % 40).await;

    let report = Orchestrator::new(
        test_artifacts_config(work_dir.path()),
        store.clone(),
        FakeArchiveExtractor::new(),
        store.clone(),
        signer.clone(),
    )
    .run_artifacts(artifacts)
    .await
    .unwrap();

    assert!(report.is_success());

    let calls = signer.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 16);
    assert_eq!(file_names(&calls[0]).len(), 16);
    assert_eq!(store.uploads().await.len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn snapshot_is_independent_of_arrival_order() {
    init_test_tracing();
    let orders: [fn(usize) -> u64; 3] = [
        |i| i as u64 * 10,
        |i| (5 - i as u64) * 10,
        |i| if i % 2 == 0 { 0 } else { 30 },
    ];

    let mut snapshots = Vec::new();
    for delay_ms in orders {
        let store = MemoryReleaseStore::new();
        let signer = RecordingSigner::new();
        let work_dir = tempfile::tempdir().unwrap();
        let artifacts = delayed_packages(&store, 6, delay_ms).await;

        let report = Orchestrator::new(
            test_artifacts_config(work_dir.path()),
            store.clone(),
            FakeArchiveExtractor::new(),
            store,
            signer.clone(),
        )
        .run_artifacts(artifacts)
        .await
        .unwrap();

        assert!(report.is_success());

        let calls = signer.calls().await;
        assert_eq!(calls.len(), 1);
        snapshots.push(file_names(&calls[0]));
    }

    assert_eq!(snapshots[0].len(), 6);
    assert!(snapshots.iter().all(|snapshot| *snapshot == snapshots[0]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn snapshot_contains_every_concurrently_registered_path() {
    init_test_tracing();
    let signer = RecordingSigner::new();
    let coordinator = SignCoordinator::new(signer.clone(), 32);
    let dir = tempfile::tempdir().unwrap();

    let mut expected = BTreeSet::new();
    let mut tasks = Vec::new();
    for i in 0..32 {
        let path = dir.path().join(format!("file-{i}.exe"));
        std::fs::write(&path, b"exe").unwrap();
        expected.insert(path.clone());

        let handle = coordinator.handle();
        tasks.push(tokio::spawn(async move {
            handle.register(path).await.unwrap();
            handle.arrive().unwrap();
            handle.wait_for_signing().await
        }));
    }

    coordinator.barrier().wait().await;
    let outcome = coordinator.run_on_barrier_release().await.unwrap();

    for task in tasks {
        assert_eq!(task.await.unwrap(), outcome);
    }

    let calls = signer.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 32);
    assert_eq!(calls[0].iter().cloned().collect::<BTreeSet<_>>(), expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn only_the_last_arrival_releases_the_barrier() {
    let coordinator = SignCoordinator::new(RecordingSigner::new(), 3);
    let handle = coordinator.handle();
    let barrier = coordinator.barrier();

    assert_eq!(handle.arrive().unwrap(), Arrival::Waiting { remaining: 2 });
    assert_eq!(handle.arrive().unwrap(), Arrival::Waiting { remaining: 1 });
    assert!(!barrier.is_released());
    assert_eq!(handle.arrive().unwrap(), Arrival::Released);
    assert!(barrier.is_released());

    let err = handle.arrive().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalBarrierViolation);
}

#[tokio::test(flavor = "multi_thread")]
async fn late_waiters_observe_the_published_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.exe");
    std::fs::write(&path, b"exe").unwrap();

    let coordinator = SignCoordinator::new(RecordingSigner::new(), 1);
    let handle = coordinator.handle();
    coordinator.register(path).await.unwrap();
    handle.arrive().unwrap();

    let outcome = coordinator.run_on_barrier_release().await.unwrap();

    let late = tokio::time::timeout(Duration::from_secs(1), handle.wait_for_signing())
        .await
        .unwrap();
    assert_eq!(late, outcome);
    assert!(late.is_signed());
}

#[tokio::test(flavor = "multi_thread")]
async fn registration_after_the_snapshot_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.exe");
    std::fs::write(&path, b"exe").unwrap();

    let coordinator = SignCoordinator::new(RecordingSigner::new(), 1);
    let handle = coordinator.handle();
    handle.register(path).await.unwrap();
    handle.arrive().unwrap();
    coordinator.run_on_barrier_release().await.unwrap();

    let err = handle
        .register(dir.path().join("late.exe"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalBarrierViolation);
}

#[tokio::test(flavor = "multi_thread")]
async fn signing_before_release_fails_waiting_pipelines() {
    let signer = RecordingSigner::new();
    let coordinator = SignCoordinator::new(signer.clone(), 2);
    let handle = coordinator.handle();
    handle.arrive().unwrap();

    let err = coordinator.run_on_barrier_release().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalBarrierViolation);

    let outcome = tokio::time::timeout(Duration::from_secs(1), handle.wait_for_signing())
        .await
        .unwrap();
    assert!(matches!(outcome, SignOutcome::Failed { .. }));
    assert!(signer.calls().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn nothing_is_signed_when_every_pipeline_fails_before_signing() {
    init_test_tracing();
    let store = MemoryReleaseStore::new();
    let package = store.add_asset("app-unsigned.appx", b"appx".to_vec()).await;
    store.fail_fetch(package, ErrorKind::TransferError).await;
    let signer = RecordingSigner::new();
    let work_dir = tempfile::tempdir().unwrap();
    let mut config = test_artifacts_config(work_dir.path());
    config.archives.clear();

    let report = Orchestrator::new(
        config,
        store.clone(),
        FakeArchiveExtractor::new(),
        store.clone(),
        signer.clone(),
    )
    .run(package)
    .await
    .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.signing.signed_paths(), 0);
    assert!(signer.calls().await.is_empty());
    assert!(store.uploads().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_artifact_list_is_a_configuration_error() {
    let store = MemoryReleaseStore::new();
    let work_dir = tempfile::tempdir().unwrap();

    let err = Orchestrator::new(
        test_artifacts_config(work_dir.path()),
        store.clone(),
        FakeArchiveExtractor::new(),
        store,
        RecordingSigner::new(),
    )
    .run_artifacts(vec![])
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
}

#[tokio::test(flavor = "multi_thread")]
async fn uploads_wait_for_the_signing_outcome() {
    init_test_tracing();
    let store = MemoryReleaseStore::new();
    let signer = RecordingSigner::new();
    signer.delay(Duration::from_millis(100)).await;
    let work_dir = tempfile::tempdir().unwrap();
    let artifacts = delayed_packages(&store, 3, |_| 0).await;
    let uploaded = store.notify_on_uploads(3).await;

    let run = tokio::spawn(
        Orchestrator::new(
            test_artifacts_config(work_dir.path()),
            store.clone(),
            FakeArchiveExtractor::new(),
            store.clone(),
            signer.clone(),
        )
        .run_artifacts(artifacts),
    );

    uploaded.notified().await;
    assert_eq!(signer.calls().await.len(), 1);

    let report = run.await.unwrap().unwrap();
    assert!(report.is_success());
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_pipeline_still_arrives_and_is_reported() {
    init_test_tracing();
    let store = MemoryReleaseStore::new();
    let package = store.add_asset("app-unsigned.appx", b"appx".to_vec()).await;
    store
        .add_asset("app-unsigned-x64.zip", b"x64 exe".to_vec())
        .await;
    store
        .add_asset("app-unsigned-ia32.zip", b"x86 exe".to_vec())
        .await;
    let extractor = FakeArchiveExtractor::new();
    extractor.panic_on_extract("app-unsigned-x64.zip").await;
    let signer = RecordingSigner::new();
    let work_dir = tempfile::tempdir().unwrap();

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        Orchestrator::new(
            test_artifacts_config(work_dir.path()),
            store.clone(),
            extractor,
            store.clone(),
            signer.clone(),
        )
        .run(package),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(report.artifacts[0].is_done());
    assert!(report.artifacts[2].is_done());

    let panicked = report.artifacts[1].failure().unwrap();
    assert_eq!(panicked.kind(), ErrorKind::PipelineWorkerPanic);
    assert_eq!(panicked.stage, FailureStage::Extract);

    let calls = signer.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 2);
    assert_eq!(store.uploads().await.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_that_never_arrives_aborts_the_run() {
    init_test_tracing();
    let store = MemoryReleaseStore::new();
    let signer = RecordingSigner::new();
    let work_dir = tempfile::tempdir().unwrap();
    let artifacts = delayed_packages(&store, 3, |_| 0).await;
    // A coordination failure before signing makes the pipeline leave without arriving.
    store
        .fail_fetch(artifacts[1].id.unwrap(), ErrorKind::InternalBarrierViolation)
        .await;

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        Orchestrator::new(
            test_artifacts_config(work_dir.path()),
            store.clone(),
            FakeArchiveExtractor::new(),
            store.clone(),
            signer.clone(),
        )
        .run_artifacts(artifacts),
    )
    .await
    .unwrap()
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InternalBarrierViolation);
    assert!(signer.calls().await.is_empty());
    assert!(store.uploads().await.is_empty());
}

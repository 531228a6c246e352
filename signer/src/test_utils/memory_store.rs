use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, SignerResult};
use crate::sink::ArtifactSink;
use crate::source::ArtifactSource;
use crate::test_utils::notify::TimedNotify;
use crate::types::{AssetId, AssetMetadata};

/// An upload received by [`MemoryReleaseStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub id: AssetId,
    pub name: String,
    pub content: Bytes,
}

type UploadCondition = Box<dyn Fn(&[Upload]) -> bool + Send + Sync>;

#[derive(Default)]
struct Inner {
    assets: BTreeMap<AssetId, (String, Bytes)>,
    next_id: u64,
    fetched: Vec<AssetId>,
    uploads: Vec<Upload>,
    deleted: Vec<AssetId>,
    fetch_failures: HashMap<AssetId, ErrorKind>,
    fetch_delays: HashMap<AssetId, Duration>,
    upload_failures: HashMap<String, ErrorKind>,
    delete_failures: HashMap<AssetId, ErrorKind>,
    upload_conditions: Vec<(UploadCondition, Arc<Notify>)>,
}

impl Inner {
    fn check_conditions(&mut self) {
        let uploads = &self.uploads;
        self.upload_conditions.retain(|(condition, notify)| {
            let should_retain = !condition(uploads);
            if !should_retain {
                notify.notify_one();
            }
            should_retain
        });
    }
}

/// In-memory release acting as artifact source and artifact sink.
///
/// Uploads become assets of the release, so uploading a name that already exists fails with
/// [`ErrorKind::Conflict`] like the real service does.
#[derive(Clone)]
pub struct MemoryReleaseStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryReleaseStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 1,
                ..Default::default()
            })),
        }
    }

    /// Adds an asset to the release and returns its id.
    pub async fn add_asset(&self, name: &str, content: impl Into<Bytes>) -> AssetId {
        let mut inner = self.inner.lock().await;
        let id = AssetId(inner.next_id);
        inner.next_id += 1;
        inner.assets.insert(id, (name.to_string(), content.into()));

        id
    }

    /// Makes every fetch of `id` fail with `kind`.
    pub async fn fail_fetch(&self, id: AssetId, kind: ErrorKind) {
        self.inner.lock().await.fetch_failures.insert(id, kind);
    }

    /// Delays every fetch of `id` by `delay`.
    pub async fn delay_fetch(&self, id: AssetId, delay: Duration) {
        self.inner.lock().await.fetch_delays.insert(id, delay);
    }

    /// Makes every upload named `name` fail with `kind`.
    pub async fn fail_upload(&self, name: &str, kind: ErrorKind) {
        self.inner
            .lock()
            .await
            .upload_failures
            .insert(name.to_string(), kind);
    }

    /// Makes every deletion of `id` fail with `kind`.
    pub async fn fail_delete(&self, id: AssetId, kind: ErrorKind) {
        self.inner.lock().await.delete_failures.insert(id, kind);
    }

    pub async fn fetched(&self) -> Vec<AssetId> {
        self.inner.lock().await.fetched.clone()
    }

    pub async fn uploads(&self) -> Vec<Upload> {
        self.inner.lock().await.uploads.clone()
    }

    pub async fn deleted(&self) -> Vec<AssetId> {
        self.inner.lock().await.deleted.clone()
    }

    /// Returns the names of the assets currently attached to the release.
    pub async fn asset_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .assets
            .values()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Returns a notification fired once `count` uploads were received.
    pub async fn notify_on_uploads(&self, count: usize) -> TimedNotify {
        let notify = Arc::new(Notify::new());

        let mut inner = self.inner.lock().await;
        inner.upload_conditions.push((
            Box::new(move |uploads| uploads.len() >= count),
            notify.clone(),
        ));
        inner.check_conditions();

        TimedNotify::new(notify)
    }
}

impl Default for MemoryReleaseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryReleaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryReleaseStore").finish_non_exhaustive()
    }
}

impl ArtifactSource for MemoryReleaseStore {
    fn name() -> &'static str {
        "memory"
    }

    async fn get_metadata(&self, id: AssetId) -> SignerResult<AssetMetadata> {
        let inner = self.inner.lock().await;
        let Some((name, _)) = inner.assets.get(&id) else {
            bail!(
                ErrorKind::NotFound,
                "Asset not found",
                format!("No asset with id {id}")
            );
        };

        Ok(AssetMetadata {
            id,
            name: name.clone(),
        })
    }

    async fn list_assets(&self) -> SignerResult<Vec<AssetMetadata>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .assets
            .iter()
            .map(|(id, (name, _))| AssetMetadata {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    async fn fetch(&self, id: AssetId) -> SignerResult<Bytes> {
        let delay = self.inner.lock().await.fetch_delays.get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().await;
        inner.fetched.push(id);

        if let Some(kind) = inner.fetch_failures.get(&id).copied() {
            bail!(kind, "Injected fetch failure", format!("Fetching asset {id} failed"));
        }

        match inner.assets.get(&id) {
            Some((_, content)) => Ok(content.clone()),
            None => bail!(
                ErrorKind::NotFound,
                "Asset not found",
                format!("No asset with id {id}")
            ),
        }
    }

    async fn delete(&self, id: AssetId) -> SignerResult<()> {
        let mut inner = self.inner.lock().await;

        if let Some(kind) = inner.delete_failures.get(&id).copied() {
            bail!(kind, "Injected delete failure", format!("Deleting asset {id} failed"));
        }

        if inner.assets.remove(&id).is_none() {
            bail!(
                ErrorKind::NotFound,
                "Asset not found",
                format!("No asset with id {id}")
            );
        }
        inner.deleted.push(id);

        Ok(())
    }
}

impl ArtifactSink for MemoryReleaseStore {
    fn name() -> &'static str {
        "memory"
    }

    async fn upload(&self, name: &str, content: Bytes) -> SignerResult<AssetId> {
        let mut inner = self.inner.lock().await;

        if let Some(kind) = inner.upload_failures.get(name).copied() {
            bail!(kind, "Injected upload failure", format!("Uploading '{name}' failed"));
        }

        if inner.assets.values().any(|(existing, _)| existing == name) {
            bail!(
                ErrorKind::Conflict,
                "Asset already exists",
                format!("An asset named '{name}' is already attached to the release")
            );
        }

        let id = AssetId(inner.next_id);
        inner.next_id += 1;
        inner
            .assets
            .insert(id, (name.to_string(), content.clone()));
        inner.uploads.push(Upload {
            id,
            name: name.to_string(),
            content,
        });
        info!(asset = name, %id, "asset uploaded to memory store");

        inner.check_conditions();

        Ok(id)
    }
}

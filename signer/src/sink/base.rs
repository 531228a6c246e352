use bytes::Bytes;
use std::future::Future;

use crate::error::SignerResult;
use crate::types::AssetId;

/// Trait for systems receiving signed artifacts.
///
/// Uploading a name that already exists must fail with [`crate::error::ErrorKind::Conflict`],
/// transfer problems with [`crate::error::ErrorKind::TransferError`].
pub trait ArtifactSink {
    /// Returns the name of the sink.
    fn name() -> &'static str;

    /// Uploads `content` under `name` and returns the identifier of the new remote asset.
    fn upload(
        &self,
        name: &str,
        content: Bytes,
    ) -> impl Future<Output = SignerResult<AssetId>> + Send;
}

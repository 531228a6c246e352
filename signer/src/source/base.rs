use bytes::Bytes;
use std::future::Future;

use crate::error::SignerResult;
use crate::types::{AssetId, AssetMetadata};

/// Trait for systems that hold the unsigned artifacts of a release.
///
/// [`ArtifactSource`] implementations resolve asset metadata, list the assets available for the
/// release being signed and download asset content. Lookups of unknown assets must fail with
/// [`crate::error::ErrorKind::NotFound`], transfer problems with
/// [`crate::error::ErrorKind::TransferError`].
pub trait ArtifactSource {
    /// Returns the name of the source.
    fn name() -> &'static str;

    /// Returns the metadata of a single asset.
    fn get_metadata(&self, id: AssetId) -> impl Future<Output = SignerResult<AssetMetadata>> + Send;

    /// Lists every asset attached to the release.
    fn list_assets(&self) -> impl Future<Output = SignerResult<Vec<AssetMetadata>>> + Send;

    /// Downloads the content of an asset.
    fn fetch(&self, id: AssetId) -> impl Future<Output = SignerResult<Bytes>> + Send;

    /// Deletes an asset once its signed replacement has been published.
    fn delete(&self, id: AssetId) -> impl Future<Output = SignerResult<()>> + Send;
}

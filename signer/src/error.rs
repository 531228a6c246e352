//! Error type shared by every part of a signing run.
//!
//! A [`SignerError`] carries an [`ErrorKind`] for programmatic handling, a static description,
//! an optional dynamic detail and source, and the call site that created it. Errors are
//! reference counted because the signing outcome, failure included, is broadcast to every
//! pipeline of the run.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

pub type SignerResult<T> = Result<T, SignerError>;

/// Category of a [`SignerError`].
///
/// The stage in which a pipeline failed is tracked separately by
/// [`crate::state::phase::FailureStage`], so kinds only describe what went wrong.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Source and sink
    NotFound,
    TransferError,
    Conflict,
    AuthenticationError,

    // Archives
    CorruptArchive,
    MemberNotFound,

    // Signing
    ToolNotFound,
    SignerRejected,

    // Coordination
    InternalBarrierViolation,
    InvalidState,
    PipelineWorkerPanic,

    ConfigError,
    IoError,
    DeserializationError,
}

impl ErrorKind {
    /// Returns `true` for synchronization defects, which abort the whole run instead of failing
    /// a single artifact.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::InternalBarrierViolation)
    }
}

struct ErrorInner {
    kind: ErrorKind,
    description: &'static str,
    detail: Option<Cow<'static, str>>,
    source: Option<Box<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Backtrace,
}

/// Error raised during a signing run. Cloning is cheap.
#[derive(Clone)]
pub struct SignerError {
    inner: Arc<ErrorInner>,
}

impl SignerError {
    #[track_caller]
    pub fn new(kind: ErrorKind, description: &'static str) -> Self {
        Self::build(kind, description, None)
    }

    #[track_caller]
    pub fn with_detail(
        kind: ErrorKind,
        description: &'static str,
        detail: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::build(kind, description, Some(detail.into()))
    }

    #[track_caller]
    fn build(
        kind: ErrorKind,
        description: &'static str,
        detail: Option<Cow<'static, str>>,
    ) -> Self {
        Self {
            inner: Arc::new(ErrorInner {
                kind,
                description,
                detail,
                source: None,
                location: Location::caller(),
                backtrace: Backtrace::capture(),
            }),
        }
    }

    /// Attaches the error that caused this one.
    ///
    /// Only effective on an error that was not cloned yet, which is always the case when
    /// chained right after construction.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.source = Some(Box::new(source));
        }

        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn description(&self) -> &str {
        self.inner.description
    }

    pub fn detail(&self) -> Option<&str> {
        self.inner.detail.as_deref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.inner.backtrace
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.inner.location
    }
}

/// Errors are equal when they have the same kind, which is what tests and outcome comparisons
/// care about.
impl PartialEq for SignerError {
    fn eq(&self, other: &SignerError) -> bool {
        self.kind() == other.kind()
    }
}

impl fmt::Debug for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerError")
            .field("kind", &self.inner.kind)
            .field("description", &self.inner.description)
            .field("detail", &self.inner.detail)
            .field("source", &self.inner.source)
            .field("location", &self.inner.location)
            .finish()
    }
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.inner.kind, self.inner.description)?;

        if let Some(detail) = self.detail() {
            write!(f, ": {detail}")?;
        }

        let location = self.inner.location;
        write!(f, " ({}:{})", location.file(), location.line())
    }
}

impl error::Error for SignerError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.inner
            .source
            .as_deref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for SignerError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> SignerError {
        SignerError::new(kind, description)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for SignerError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> SignerError {
        SignerError::with_detail(kind, description, detail)
    }
}

impl From<std::io::Error> for SignerError {
    #[track_caller]
    fn from(err: std::io::Error) -> SignerError {
        let detail = err.to_string();

        SignerError::with_detail(ErrorKind::IoError, "I/O operation failed", detail)
            .with_source(err)
    }
}

/// HTTP status errors are classified by status code. A response body that cannot be decoded is
/// a [`ErrorKind::DeserializationError`], anything else a [`ErrorKind::TransferError`].
impl From<reqwest::Error> for SignerError {
    #[track_caller]
    fn from(err: reqwest::Error) -> SignerError {
        let (kind, description) = match err.status().map(|status| status.as_u16()) {
            Some(404) => (ErrorKind::NotFound, "Remote resource not found"),
            Some(401) | Some(403) => (
                ErrorKind::AuthenticationError,
                "Remote request was not authorized",
            ),
            Some(409) | Some(422) => (ErrorKind::Conflict, "Remote resource already exists"),
            Some(_) => (ErrorKind::TransferError, "Remote request failed"),
            None if err.is_decode() => (
                ErrorKind::DeserializationError,
                "Remote response could not be decoded",
            ),
            None => (ErrorKind::TransferError, "Remote transfer failed"),
        };
        let detail = err.to_string();

        SignerError::with_detail(kind, description, detail).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, signer_error};

    fn failing(kind: ErrorKind) -> SignerResult<()> {
        bail!(kind, "Operation failed", "with some detail");
    }

    #[test]
    fn error_exposes_kind_and_detail() {
        let err = signer_error!(ErrorKind::NotFound, "Asset missing", "asset 42");

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.description(), "Asset missing");
        assert_eq!(err.detail(), Some("asset 42"));
        assert!(err.to_string().starts_with("[NotFound] Asset missing: asset 42 ("));
    }

    #[test]
    fn bail_returns_error_with_kind() {
        let err = failing(ErrorKind::CorruptArchive).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CorruptArchive);
        assert_eq!(err.detail(), Some("with some detail"));
        assert_eq!(err.location().file(), file!());
    }

    #[test]
    fn io_error_converts_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: SignerError = io.into();

        assert_eq!(err.kind(), ErrorKind::IoError);
        assert_eq!(error::Error::source(&err).unwrap().to_string(), "denied");
    }

    #[test]
    fn clones_share_the_source() {
        let err = signer_error!(
            ErrorKind::TransferError,
            "Download failed",
            source: std::io::Error::other("reset")
        );
        let clone = err.clone();

        assert_eq!(clone, err);
        assert!(error::Error::source(&clone).is_some());
    }

    #[test]
    fn only_barrier_violations_are_fatal() {
        assert!(ErrorKind::InternalBarrierViolation.is_fatal());
        assert!(!ErrorKind::SignerRejected.is_fatal());
        assert!(!ErrorKind::InvalidState.is_fatal());
    }
}

/// Builds a [`crate::error::SignerError`] from a kind, a static description and optionally a
/// detail (anything implementing `Display`) and a source error.
#[macro_export]
macro_rules! signer_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::SignerError::new($kind, $desc)
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::SignerError::new($kind, $desc).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::SignerError::with_detail($kind, $desc, $detail.to_string())
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::SignerError::with_detail($kind, $desc, $detail.to_string())
            .with_source($source)
    };
}

/// Returns early with a [`crate::error::SignerError`] built by [`signer_error!`].
#[macro_export]
macro_rules! bail {
    ($($args:tt)+) => {
        return ::core::result::Result::Err($crate::signer_error!($($args)+))
    };
}

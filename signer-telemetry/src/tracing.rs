use std::sync::Once;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Filter used by tests when `RUST_LOG` is not set.
const TEST_LOG_FILTER: &str = "signer=debug";

static TEST_TRACING: Once = Once::new();

/// Installs the global subscriber: an [`EnvFilter`] read from `RUST_LOG`, falling back to
/// `default_filter`, in front of the `fmt` layer writing to stderr.
///
/// Logs go to stderr so that the report printed on stdout stays machine readable.
pub fn init_tracing(default_filter: &str) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init()
}

/// Installs a subscriber writing through the test harness capture.
///
/// Safe to call from every test, only the first call installs it.
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(TEST_LOG_FILTER));

        // Another subscriber may already be installed by the test binary.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::{Mutex, PoisonError};

// A recorder can only be installed once per process while tests call the initialization
// repeatedly, so the handle is cached. The initialization is fallible, hence a `Mutex` and not
// a `OnceLock`.
static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the global Prometheus recorder and returns a handle rendering its metrics.
///
/// A signing run is short lived, so no HTTP listener is started: the caller renders the
/// metrics once the run completed, for instance into a node exporter textfile.
pub fn init_metrics_handle() -> Result<PrometheusHandle, BuildError> {
    let mut cached = PROMETHEUS_HANDLE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(handle) = &*cached {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    *cached = Some(handle.clone());

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialization_returns_the_same_recorder() {
        let first = init_metrics_handle().unwrap();
        let second = init_metrics_handle().unwrap();

        metrics::counter!("signer_telemetry_test_total").increment(2);

        assert!(first.render().contains("signer_telemetry_test_total 2"));
        assert!(second.render().contains("signer_telemetry_test_total 2"));
    }
}

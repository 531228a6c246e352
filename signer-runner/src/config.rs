use signer_config::load_config;
use signer_config::shared::SignerConfig;

use crate::error::{RunnerError, RunnerResult};

/// Loads the configuration from `./configuration` and validates it.
pub fn load_signer_config() -> RunnerResult<SignerConfig> {
    let config = load_config::<SignerConfig>().map_err(RunnerError::config)?;
    config.validate().map_err(RunnerError::config)?;

    Ok(config)
}

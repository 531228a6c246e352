//! Configuration of the release signer.
//!
//! Configuration is loaded from `configuration/base.yaml` and the file of the current
//! [`environment::Environment`], then overridden by `APP_` prefixed environment variables.

pub mod environment;
mod load;
pub mod shared;

pub use load::{LoadConfigError, load_config, load_config_from};

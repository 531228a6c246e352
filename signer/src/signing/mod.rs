//! The shared signing step: the pending path set, the coordinator running the single signing
//! invocation and the signing tool integration.

mod base;
pub mod coordinator;
pub mod pending;
mod signtool;

pub use base::{SigningReport, SigningService};
pub use coordinator::{SignCoordinator, SignHandle};
pub use signtool::SignToolService;

//! Signing of release artifacts.
//!
//! A signing run fetches the unsigned artifacts of a release, hands all of them to a code
//! signing tool in a single invocation and publishes the signed results. Each artifact is
//! processed by its own [`pipeline::ArtifactPipeline`]; the pipelines join on a
//! [`concurrency::barrier::JoinBarrier`] before signing and are released again by the
//! [`signing::SignCoordinator`] once the single signing invocation is over.
//!
//! The [`orchestrator::Orchestrator`] discovers the artifacts, drives the run and produces a
//! [`report::RunReport`].

pub mod archive;
pub mod clients;
pub mod concurrency;
pub mod error;
mod macros;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod signing;
pub mod sink;
pub mod source;
pub mod state;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod work_dir;

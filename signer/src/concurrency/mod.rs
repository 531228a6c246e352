//! Concurrency primitives coordinating artifact pipelines around the shared signing step.
//!
//! A run fans out into one pipeline per artifact, joins them before the signing invocation and
//! fans out again once signing is over. Two primitives implement the join and the fan-out:
//!
//! - [`barrier::JoinBarrier`] counts pipelines that have not finished their pre-sign phase yet
//!   and releases exactly once, when the last one arrives. Pipelines that fail before signing
//!   still arrive, otherwise the run would never progress.
//! - [`signal::SignCompletionTx`] and [`signal::SignCompletionRx`] broadcast the outcome of the
//!   single signing invocation. The signal is durable, so a pipeline that starts waiting late
//!   still sees the outcome.
//!
//! Every registration into the pending sign set happens before the registering pipeline
//! arrives at the barrier, and the barrier releases only after the last arrival, so the
//! snapshot taken after the release always contains every registered path.

pub mod barrier;
pub mod signal;

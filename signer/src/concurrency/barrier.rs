//! One-shot join barrier for the pre-sign phase of artifact pipelines.
//!
//! A [`JoinBarrier`] is created with the number of participating pipelines. Every pipeline
//! arrives exactly once when its pre-sign phase ends, successfully or not, and the barrier
//! releases as soon as the last participant arrives. The release is durable: waiters that
//! start waiting after the release return immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::bail;
use crate::error::{ErrorKind, SignerResult};

/// Result of a successful call to [`JoinBarrier::arrive`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Arrival {
    /// Other participants are still expected.
    Waiting { remaining: usize },
    /// This arrival was the last one and released the barrier.
    Released,
}

#[derive(Debug)]
struct JoinBarrierInner {
    participants: usize,
    remaining: AtomicUsize,
    released_tx: watch::Sender<bool>,
}

/// Counting barrier that releases once after all participants arrived.
///
/// Cloning a [`JoinBarrier`] yields another handle to the same barrier.
#[derive(Debug, Clone)]
pub struct JoinBarrier {
    inner: Arc<JoinBarrierInner>,
}

impl JoinBarrier {
    /// Creates a barrier expecting `participants` arrivals.
    ///
    /// A barrier without participants is released immediately.
    pub fn new(participants: usize) -> Self {
        let (released_tx, _) = watch::channel(participants == 0);

        Self {
            inner: Arc::new(JoinBarrierInner {
                participants,
                remaining: AtomicUsize::new(participants),
                released_tx,
            }),
        }
    }

    /// Registers the arrival of one participant.
    ///
    /// The decrement is atomic, so concurrent arrivals from every pipeline are safe. Arriving
    /// on a barrier whose counter is already zero means some participant arrived twice, which
    /// is reported as [`ErrorKind::InternalBarrierViolation`] and leaves the barrier untouched.
    pub fn arrive(&self) -> SignerResult<Arrival> {
        let previous = self
            .inner
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |remaining| {
                remaining.checked_sub(1)
            });

        let Ok(previous) = previous else {
            error!(
                participants = self.inner.participants,
                "arrival on a barrier with no remaining participants"
            );

            bail!(
                ErrorKind::InternalBarrierViolation,
                "Barrier arrival after release",
                format!(
                    "All {} participants had already arrived when another arrival was registered",
                    self.inner.participants
                )
            );
        };

        let remaining = previous - 1;
        if remaining > 0 {
            debug!(remaining, "participant arrived at barrier");

            return Ok(Arrival::Waiting { remaining });
        }

        debug!(
            participants = self.inner.participants,
            "last participant arrived, releasing barrier"
        );

        // We use `send_replace` since there might be no subscribed receiver at this point, the
        // value is stored anyway and later subscribers will observe the release.
        let already_released = self.inner.released_tx.send_replace(true);
        if already_released {
            bail!(
                ErrorKind::InternalBarrierViolation,
                "Barrier released twice",
                format!(
                    "The barrier for {} participants was released more than once",
                    self.inner.participants
                )
            );
        }

        Ok(Arrival::Released)
    }

    /// Waits until the barrier has been released.
    ///
    /// Returns immediately if the release already happened.
    pub async fn wait(&self) {
        let mut released_rx = self.inner.released_tx.subscribe();

        // The sender lives as long as `self`, so waiting can only end with the release.
        let _ = released_rx.wait_for(|released| *released).await;
    }

    /// Returns `true` once every participant has arrived.
    pub fn is_released(&self) -> bool {
        *self.inner.released_tx.borrow()
    }

    /// Returns the number of participants that have not arrived yet.
    pub fn remaining(&self) -> usize {
        self.inner.remaining.load(Ordering::Acquire)
    }

    /// Returns the number of participants the barrier was created for.
    pub fn participants(&self) -> usize {
        self.inner.participants
    }
}

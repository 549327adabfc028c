//! Background keepalive pings.
//!
//! A single task per connection sends an empty PING to the control plane on
//! every tick until it is cancelled. Failed pings are counted and logged but
//! never stop the task: a broken transport shows up on the caller's next
//! read or write.

use crate::connection::Shared;
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

/// One-shot cancellation signal.
///
/// Cancelling more than once is harmless; only the first call reports `true`.
#[derive(Debug)]
pub struct Canceller {
    fired: AtomicBool,
    tx: watch::Sender<bool>,
}

impl Canceller {
    /// Create a canceller and the receiver the task observes
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                fired: AtomicBool::new(false),
                tx,
            },
            rx,
        )
    }

    /// Signal cancellation; returns `true` only for the first call
    pub fn cancel(&self) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // No receiver left just means the task is already gone.
        let _ = self.tx.send(true);
        true
    }

    /// Whether cancellation has been signalled
    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Spawn the keepalive task for `shared`.
///
/// The first ping goes out one full `period` after the call.
pub(crate) fn spawn_keepalive<S: Transport>(
    shared: Arc<Shared<S>>,
    period: Duration,
    mut cancelled: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *cancelled.borrow() {
                break;
            }

            tokio::select! {
                biased;

                // Fires on cancel, and on error once the connection is dropped
                _ = cancelled.changed() => break,

                _ = ticker.tick() => {}
            }

            match shared.ping().await {
                Ok(()) => trace!("Sent PING for {}", shared.user()),
                Err(e) => warn!("Keepalive PING for {} failed: {}", shared.user(), e),
            }
        }

        debug!("Keepalive for {} stopped", shared.user());
    })
}

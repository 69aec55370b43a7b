//! Shutdown coordination.
//!
//! The dispatcher runs three long-lived loops (queue drain, load decay,
//! health probes). Each holds a [`ShutdownSignal`] and exits its `select!`
//! when the signal fires; dropping the signal acknowledges the exit, so
//! [`Shutdown::drained`] can wait for a clean stop. In-flight task
//! executions are not tracked here and finish on their own.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Notify};

/// Shutdown coordinator shared by all background loops.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    active: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

/// One loop's handle on the shutdown signal. Dropping it acknowledges that
/// the holding loop has exited.
pub struct ShutdownSignal {
    rx: broadcast::Receiver<()>,
    active: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl ShutdownSignal {
    /// Resolves once shutdown is triggered. A closed channel counts as a
    /// trigger so loops never outlive a dropped coordinator.
    pub async fn recv(&mut self) {
        let _ = self.rx.recv().await;
    }
}

impl Drop for ShutdownSignal {
    fn drop(&mut self) {
        if self.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            active: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Subscribe before spawning a loop; late subscribers miss the signal.
    pub fn subscribe(&self) -> ShutdownSignal {
        self.active.fetch_add(1, Ordering::AcqRel);
        ShutdownSignal {
            rx: self.tx.subscribe(),
            active: self.active.clone(),
            idle: self.idle.clone(),
        }
    }

    /// Signal every subscribed loop to exit.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Wait until every subscribed loop has dropped its signal.
    pub async fn drained(&self) {
        loop {
            if self.active.load(Ordering::Acquire) == 0 {
                return;
            }
            let idle = self.idle.notified();
            // Re-check after registering the waiter; the last drop may have
            // landed between the load and the registration.
            if self.active.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Number of loops still holding a signal.
    pub fn active_loops(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

//! Cooperative cancellation observed between instances.

use std::future::Future;
use std::io;
use std::process;

use tokio::sync::watch;
use tracing::warn;

use crate::report::CANCELLED_EXIT_CODE;

/// Sending half used to request cancellation.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

/// Receiving half polled by the orchestrator.
#[derive(Clone, Debug)]
pub struct Cancellation {
    receiver: watch::Receiver<bool>,
}

impl Cancellation {
    /// Creates a linked handle and cancellation pair.
    #[must_use]
    pub fn pair() -> (CancelHandle, Self) {
        let (sender, receiver) = watch::channel(false);
        (CancelHandle { sender }, Self { receiver })
    }

    /// Returns a cancellation that never fires.
    #[must_use]
    pub fn never() -> Self {
        let (_, cancellation) = Self::pair();
        cancellation
    }

    /// Returns a cancellation that fires on the first Ctrl-C.
    ///
    /// A second Ctrl-C exits the process with status 130 without waiting
    /// for the current instance. Must be called from within a tokio runtime.
    #[must_use]
    pub fn on_interrupt() -> Self {
        let (handle, cancellation) = Self::pair();
        tokio::spawn(async move {
            if relay_interrupts(tokio::signal::ctrl_c, handle).await == InterruptRelay::Forced {
                process::exit(CANCELLED_EXIT_CODE);
            }
        });
        cancellation
    }

    /// Reports whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// How [`relay_interrupts`] finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptRelay {
    /// A second interrupt arrived; the caller should exit now.
    Forced,
    /// The signal source failed before a second interrupt arrived.
    Unavailable,
}

/// Cancels `handle` on the first interrupt and waits for a second one.
///
/// `next` resolves once per interrupt.
pub async fn relay_interrupts<F, Fut>(mut next: F, handle: CancelHandle) -> InterruptRelay
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if next().await.is_err() {
        return InterruptRelay::Unavailable;
    }
    warn!("interrupt received; finishing the current instance (Ctrl-C again exits now)");
    handle.cancel();

    if next().await.is_err() {
        return InterruptRelay::Unavailable;
    }
    warn!("second interrupt received; exiting without waiting");
    InterruptRelay::Forced
}

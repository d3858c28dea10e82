//! Network link availability.
//!
//! The session manager never attempts a connect while the link is down; it
//! suspends on [`LinkMonitor::wait_link_up`] instead.

use std::future::Future;

use tokio::sync::watch;

/// Reports whether the underlying network link is usable.
pub trait LinkMonitor: Send + Sync {
    fn is_link_up(&self) -> bool;

    /// Resolves once the link is usable. Returns immediately if it already
    /// is; safe to call repeatedly.
    fn wait_link_up(&self) -> impl Future<Output = ()> + Send;
}

/// Link monitor for transports that need no link bring-up.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysUp;

impl LinkMonitor for AlwaysUp {
    fn is_link_up(&self) -> bool {
        true
    }

    async fn wait_link_up(&self) {}
}

/// Link state published through a `watch` channel.
///
/// Whatever observes the real interface holds the paired [`LinkHandle`].
#[derive(Debug, Clone)]
pub struct WatchLinkMonitor {
    rx: watch::Receiver<bool>,
}

/// Publishing side of a [`WatchLinkMonitor`].
#[derive(Debug, Clone)]
pub struct LinkHandle {
    tx: watch::Sender<bool>,
}

impl WatchLinkMonitor {
    /// Creates a monitor with the given initial state.
    pub fn new(initially_up: bool) -> (LinkHandle, Self) {
        let (tx, rx) = watch::channel(initially_up);
        (LinkHandle { tx }, Self { rx })
    }
}

impl LinkMonitor for WatchLinkMonitor {
    fn is_link_up(&self) -> bool {
        *self.rx.borrow()
    }

    async fn wait_link_up(&self) {
        let mut rx = self.rx.clone();
        let publisher_gone = rx.wait_for(|up| *up).await.is_err();
        if publisher_gone {
            // Down with nobody left to bring it up.
            std::future::pending::<()>().await;
        }
    }
}

impl LinkHandle {
    /// Publishes the link state. Returns `true` if it changed.
    pub fn set_up(&self, up: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == up {
                false
            } else {
                *current = up;
                true
            }
        })
    }

    pub fn is_up(&self) -> bool {
        *self.tx.borrow()
    }
}

//! Cooperative cancellation for scans, checked once per height.
use tokio::sync::watch;

/// Receiving side, handed to scans.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Sending side, kept by whoever may stop the scan.
#[derive(Debug)]
pub struct CancelTrigger {
    tx: watch::Sender<bool>,
}

/// Linked trigger/token pair.
pub fn cancel_pair() -> (CancelTrigger, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelTrigger { tx }, CancelToken { rx })
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        // Receiver keeps the last value after the sender is gone.
        cancel_pair().1
    }

    /// True once the paired trigger fired.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}

impl CancelTrigger {
    /// Ask every linked token to stop.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Another token linked to this trigger.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

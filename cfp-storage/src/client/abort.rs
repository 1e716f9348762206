//! Caller-controlled cancellation for uploads

use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation signal shared between a caller and an in-flight upload
///
/// Clones observe the same signal. Once aborted it stays aborted.
///
/// # Examples
///
/// ```rust
/// use cfp_storage::client::AbortSignal;
///
/// let signal = AbortSignal::new();
/// let handle = signal.clone();
/// handle.abort();
/// assert!(signal.is_aborted());
/// ```
#[derive(Debug, Clone)]
pub struct AbortSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal {
    /// Creates a signal that has not fired
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fires the signal
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal has fired
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal fires
    pub async fn aborted(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on abort
        let _ = rx.wait_for(|aborted| *aborted).await;
    }
}

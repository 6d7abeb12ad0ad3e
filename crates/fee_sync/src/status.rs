use tokio::sync::watch;

/// Whether the current account has fee transactions waiting for a signature.
///
/// Only the heartbeat channel and its reconciliation write here; everything
/// else gets a read handle.
#[derive(Debug)]
pub struct SigningStatus {
    tx: watch::Sender<bool>,
}

impl Default for SigningStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningStatus {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn has_unsigned_obligations(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Returns `true` when the stored value changed.
    pub(crate) fn set(&self, positive: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == positive {
                false
            } else {
                *current = positive;
                true
            }
        })
    }
}

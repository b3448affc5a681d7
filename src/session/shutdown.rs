//! Cooperative shutdown signal shared by the session tasks

use std::sync::Arc;

use tokio::sync::watch;

/// Sending side, held by whoever may stop the session
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: Arc<watch::Sender<bool>>,
}

/// Receiving side, one per task
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Ask every task to stop. Idempotent.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

impl ShutdownSignal {
    /// Resolves once shutdown has been triggered
    ///
    /// Also resolves if every [`Shutdown`] handle has been dropped.
    pub async fn wait(&mut self) {
        let _ = self.receiver.wait_for(|&stop| stop).await;
    }
}

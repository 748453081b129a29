//! Background notification queue.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::models::Link;
use crate::notify::Notifier;

/// Handle for handing claimed links to the notification worker.
///
/// Cloning is cheap. The worker exits once every handle is dropped and the
/// backlog is delivered.
#[derive(Clone)]
pub struct NotifyQueue {
    tx: mpsc::UnboundedSender<Link>,
}

impl NotifyQueue {
    /// Start the worker on the current runtime.
    pub fn spawn(notifier: Notifier) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Link>();

        let worker = tokio::spawn(async move {
            while let Some(link) = rx.recv().await {
                if let Err(e) = notifier.notify(&link).await {
                    error!(item_url = %link.item_url, "Notification failed, not retrying: {}", e);
                }
            }
            debug!("Notify queue closed");
        });

        (Self { tx }, worker)
    }

    /// Queue a notification. Never blocks and never fails the caller.
    pub fn enqueue(&self, link: Link) {
        if let Err(mpsc::error::SendError(link)) = self.tx.send(link) {
            warn!(item_url = %link.item_url, "Notify worker is gone, dropping notification");
        }
    }
}

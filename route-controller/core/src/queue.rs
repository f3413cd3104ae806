//! The work queue shared by discovery and the emitter.
//!
//! The queue is bounded. Producers wait for capacity when it is full, so a
//! slow transport throttles discovery instead of growing memory.

use crate::Message;
use tokio::sync::mpsc;

pub const DEFAULT_CAPACITY: usize = 1024;

/// A producer handle. Cloned for each discovery task.
#[derive(Clone, Debug)]
pub struct Sender(mpsc::Sender<Message>);

/// The single consumer handle.
#[derive(Debug)]
pub struct Receiver(mpsc::Receiver<Message>);

#[derive(Debug, thiserror::Error)]
#[error("work queue closed")]
pub struct Closed(pub Message);

pub fn channel(capacity: usize) -> (Sender, Receiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Sender(tx), Receiver(rx))
}

// === impl Sender ===

impl Sender {
    /// Pushes a message, waiting while the queue is full.
    pub async fn push(&self, msg: Message) -> Result<(), Closed> {
        self.0.send(msg).await.map_err(|mpsc::error::SendError(msg)| Closed(msg))
    }
}

// === impl Receiver ===

impl Receiver {
    /// Receives the next message, or `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<Message> {
        self.0.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        self.0.try_recv().ok()
    }
}

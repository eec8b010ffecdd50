//! Blocking FIFO used to hand events and updates between threads.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// An unbounded multi-producer queue with a blocking `pop`.
///
/// Each pushed item is delivered to exactly one `pop`, in push order. The queue owns
/// both channel ends, so neither side can observe a disconnect while it is alive.
#[derive(Debug)]
pub struct BlockingQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn push(&self, item: T) {
        // The receiver is owned by `self`, so the channel cannot be disconnected here.
        let _ = self.sender.send(item);
    }

    /// Blocks until an item is available and returns the oldest one.
    pub fn pop(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Removes everything currently queued without blocking.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

use burrow_proto::Datagram;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Bounded FIFO of handshake datagrams with an idempotent worker signal.
///
/// Producers are the receive entry point on any thread; the consumer is the
/// single handshake worker. Signals coalesce: any number of `poke` calls
/// while the worker is busy result in exactly one extra wakeup.
#[derive(Debug)]
pub struct HandshakeQueue {
    items: Mutex<VecDeque<Datagram>>,
    len: AtomicUsize,
    capacity: usize,
    poke: Notify,
}

impl HandshakeQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            len: AtomicUsize::new(0),
            capacity,
            poke: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current queue length, readable without the lock.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a datagram. On overflow the datagram is handed back so the
    /// caller can count the drop.
    pub fn push(&self, datagram: Datagram) -> Result<(), Datagram> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Err(datagram);
        }
        items.push_back(datagram);
        self.len.store(items.len(), Ordering::Relaxed);
        Ok(())
    }

    pub fn pop(&self) -> Option<Datagram> {
        let mut items = self.items.lock();
        let datagram = items.pop_front();
        self.len.store(items.len(), Ordering::Relaxed);
        datagram
    }

    /// Drop everything still queued. Used on device teardown.
    pub fn clear(&self) {
        let mut items = self.items.lock();
        items.clear();
        self.len.store(0, Ordering::Relaxed);
    }

    /// Signal the worker that work is available.
    pub fn poke(&self) {
        self.poke.notify_one();
    }

    /// Wait for the next poke.
    pub async fn poked(&self) {
        self.poke.notified().await;
    }
}

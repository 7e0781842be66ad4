use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

use burrow_proto::Datagram;

use crate::config::DeviceConfig;
use crate::cookie::CookieChecker;
use crate::peer::Peer;
use crate::queue::HandshakeQueue;
use crate::receive;
use crate::stack::TunnelStack;
use crate::stats::{DeviceStats, StatsSnapshot};

/// One tunnel device: the receive demultiplexer, its admission queue and
/// worker, and the peer registries.
///
/// Creation spawns the handshake worker, so a `Device` must be built inside
/// a Tokio runtime. [`Device::receive`] itself is synchronous and
/// non-blocking and may be called from any thread.
pub struct Device {
    inner: Arc<DeviceInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

pub(crate) struct DeviceInner {
    pub(crate) config: DeviceConfig,
    pub(crate) stats: DeviceStats,
    pub(crate) cookie_checker: CookieChecker,
    pub(crate) handshake_queue: HandshakeQueue,
    pub(crate) stack: TunnelStack,
    peers: DashMap<u64, Arc<Peer>>,
    /// Local session index -> peer, for routing cookie replies back to the
    /// handshake that solicited them.
    peers_by_index: DashMap<u32, Arc<Peer>>,
    peer_counter: AtomicU64,
    shutting_down: AtomicBool,
}

impl Device {
    pub fn new(config: DeviceConfig, stack: TunnelStack) -> Self {
        let cookie_checker = CookieChecker::new(
            &config.static_public,
            config.cookie_secret_max_age,
            config.cookie_secret_latency,
        );
        let handshake_queue = HandshakeQueue::new(config.max_queued_handshakes);
        let inner = Arc::new(DeviceInner {
            config,
            stats: DeviceStats::default(),
            cookie_checker,
            handshake_queue,
            stack,
            peers: DashMap::new(),
            peers_by_index: DashMap::new(),
            peer_counter: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        });
        let worker = tokio::spawn(receive::handshake_worker(Arc::clone(&inner)));
        Self {
            inner,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Ingress for every inbound datagram.
    pub fn receive(&self, datagram: Datagram) {
        Arc::clone(&self.inner).receive(datagram);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Handshake datagrams queued but not yet processed.
    pub fn pending_handshakes(&self) -> usize {
        self.inner.handshake_queue.len()
    }

    /// Register a configured peer. Returns `None` once the device is at its
    /// peer limit.
    pub fn create_peer(&self, public_key: [u8; 32]) -> Option<Arc<Peer>> {
        if self.inner.peers.len() >= self.inner.config.max_peers {
            return None;
        }
        let id = self.inner.peer_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let peer = Arc::new(Peer::new(id, public_key));
        self.inner.peers.insert(id, Arc::clone(&peer));
        debug!(target: "burrow::device", peer = id, "peer created");
        Some(peer)
    }

    /// Drop a peer from the device, along with any session indices still
    /// pointing at it.
    pub fn remove_peer(&self, peer: &Arc<Peer>) {
        self.inner.peers.remove(&peer.internal_id());
        self.inner
            .peers_by_index
            .retain(|_, registered| !Arc::ptr_eq(registered, peer));
        debug!(target: "burrow::device", peer = peer.internal_id(), "peer removed");
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.len()
    }

    pub fn get_peer(&self, internal_id: u64) -> Option<Arc<Peer>> {
        self.inner
            .peers
            .get(&internal_id)
            .map(|peer| Arc::clone(&peer))
    }

    /// Associate a local session index with a peer. Maintained by the
    /// handshake driver as it assigns and retires indices.
    pub fn register_index(&self, index: u32, peer: &Arc<Peer>) {
        self.inner.peers_by_index.insert(index, Arc::clone(peer));
    }

    pub fn unregister_index(&self, index: u32) {
        self.inner.peers_by_index.remove(&index);
    }

    pub fn lookup_index(&self, index: u32) -> Option<Arc<Peer>> {
        self.inner.lookup_index(index)
    }

    /// Retire the current cookie address secret. Timer collaborator entry
    /// point; see `CookieChecker::rotate_secret`.
    pub fn rotate_cookie_secret(&self) {
        self.inner.cookie_checker.rotate_secret();
    }

    /// Tear the device down: stop the worker, wait for an in-flight burst to
    /// finish, and drop everything still queued.
    pub async fn shutdown(self) {
        self.inner.shutting_down.store(true, Ordering::Release);
        self.inner.handshake_queue.poke();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
        self.inner.handshake_queue.clear();
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

impl DeviceInner {
    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub(crate) fn lookup_index(&self, index: u32) -> Option<Arc<Peer>> {
        self.peers_by_index
            .get(&index)
            .map(|peer| Arc::clone(&peer))
    }
}

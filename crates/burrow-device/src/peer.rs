use parking_lot::{Mutex, MutexGuard, RwLock};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use burrow_proto::{COOKIE_LEN, MAC_LEN};

/// Handshake progress for a single peer.
///
/// The receive path drives `Idle`/any -> `ConsumedInitiation` on a valid
/// initiation and `CreatedInitiation` -> `ConsumedResponse` on a valid
/// response; the send path and timers drive the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    CreatedInitiation,
    ConsumedInitiation,
    CreatedResponse,
    ConsumedResponse,
}

/// One symmetric session negotiated by a completed handshake.
///
/// The key material itself lives inside the decryption pipeline; the device
/// tracks session identity and age so keypair rotation stays observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeypair {
    pub local_index: u32,
    pub remote_index: u32,
    pub is_initiator: bool,
    pub birth: Instant,
}

impl SessionKeypair {
    pub fn new(local_index: u32, remote_index: u32) -> Self {
        Self {
            local_index,
            remote_index,
            is_initiator: false,
            birth: Instant::now(),
        }
    }
}

/// The previous/current/next keypair slots of one peer. Data packets may
/// arrive under any of the three while a rotation is in flight.
#[derive(Debug, Default)]
pub struct KeypairSet {
    pub previous: Option<SessionKeypair>,
    pub current: Option<SessionKeypair>,
    pub next: Option<SessionKeypair>,
}

/// Cookie bookkeeping for one peer: the cookie it most recently sent us, and
/// the MAC1 we most recently sent it (the associated data a cookie reply from
/// that peer must authenticate against).
#[derive(Debug, Default)]
pub struct PeerCookie {
    last_mac1_sent: Option<[u8; MAC_LEN]>,
    cookie: Option<([u8; COOKIE_LEN], Instant)>,
}

impl PeerCookie {
    /// Record the MAC1 of a handshake message sent to this peer.
    pub fn note_mac1_sent(&mut self, mac1: [u8; MAC_LEN]) {
        self.last_mac1_sent = Some(mac1);
    }

    pub fn last_mac1_sent(&self) -> Option<&[u8; MAC_LEN]> {
        self.last_mac1_sent.as_ref()
    }

    pub fn set_cookie(&mut self, cookie: [u8; COOKIE_LEN]) {
        self.cookie = Some((cookie, Instant::now()));
    }

    pub fn cookie(&self) -> Option<&[u8; COOKIE_LEN]> {
        self.cookie.as_ref().map(|(cookie, _)| cookie)
    }

    /// The stored cookie, if it is younger than `max_age`.
    pub fn cookie_if_fresh(&self, max_age: std::time::Duration) -> Option<&[u8; COOKIE_LEN]> {
        self.cookie
            .as_ref()
            .filter(|(_, birth)| birth.elapsed() <= max_age)
            .map(|(cookie, _)| cookie)
    }
}

/// A remote peer of the tunnel.
///
/// Handles are `Arc`s: cloning takes a reference, dropping releases it.
/// Handshake state and the keypair set are serialized by per-peer locks
/// (lock order: handshake before keypairs); counters and the endpoint
/// address are updated independently.
#[derive(Debug)]
pub struct Peer {
    internal_id: u64,
    public_key: [u8; 32],
    endpoint: RwLock<Option<SocketAddr>>,
    rx_bytes: AtomicU64,
    rx_packets: AtomicU64,
    handshake: Mutex<HandshakeState>,
    keypairs: Mutex<KeypairSet>,
    cookie: Mutex<PeerCookie>,
}

impl Peer {
    pub(crate) fn new(internal_id: u64, public_key: [u8; 32]) -> Self {
        Self {
            internal_id,
            public_key,
            endpoint: RwLock::new(None),
            rx_bytes: AtomicU64::new(0),
            rx_packets: AtomicU64::new(0),
            handshake: Mutex::new(HandshakeState::Idle),
            keypairs: Mutex::new(KeypairSet::default()),
            cookie: Mutex::new(PeerCookie::default()),
        }
    }

    pub fn internal_id(&self) -> u64 {
        self.internal_id
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Last address this peer was seen at.
    pub fn endpoint(&self) -> Option<SocketAddr> {
        *self.endpoint.read()
    }

    pub fn set_endpoint(&self, addr: SocketAddr) {
        *self.endpoint.write() = Some(addr);
    }

    pub fn rx_bytes(&self) -> u64 {
        self.rx_bytes.load(Ordering::Relaxed)
    }

    pub fn rx_packets(&self) -> u64 {
        self.rx_packets.load(Ordering::Relaxed)
    }

    pub(crate) fn record_rx(&self, bytes: u64) {
        self.rx_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.rx_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_state(&self) -> HandshakeState {
        *self.handshake.lock()
    }

    /// Advance the handshake state machine. Called by the handshake driver
    /// when it consumes a message, and by the send path when it emits one.
    pub fn set_handshake_state(&self, state: HandshakeState) {
        *self.handshake.lock() = state;
    }

    /// Stage a freshly derived session for promotion by `begin_session`.
    pub fn stage_keypair(&self, keypair: SessionKeypair) {
        self.keypairs.lock().next = Some(keypair);
    }

    pub fn keypairs(&self) -> MutexGuard<'_, KeypairSet> {
        self.keypairs.lock()
    }

    pub fn cookie_mut(&self) -> MutexGuard<'_, PeerCookie> {
        self.cookie.lock()
    }

    /// Promote the staged session into the active slot: `next` becomes
    /// `current`, `current` retires to `previous`, the old `previous` is
    /// discarded, and the handshake state resets. Returns false when no
    /// session is staged.
    pub fn begin_session(&self, is_initiator: bool) -> bool {
        let mut handshake = self.handshake.lock();
        let mut keypairs = self.keypairs.lock();
        let Some(mut next) = keypairs.next.take() else {
            return false;
        };
        next.is_initiator = is_initiator;
        keypairs.previous = keypairs.current.take();
        keypairs.current = Some(next);
        *handshake = HandshakeState::Idle;
        true
    }
}

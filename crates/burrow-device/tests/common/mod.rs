//! Shared harness for the receive-path integration tests: wire builders and
//! recording implementations of every collaborator trait.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use burrow_device::{
    mac1_key_for, seal_macs, DataDecryptOutcome, DecryptCompletion, DecryptError, DecryptPipeline,
    Delivery, Device, DeviceConfig, HandshakeDriver, HandshakeState, NetStack, Peer, RoutingTable,
    SendPath, SessionKeypair, TimerHooks, TunnelStack,
};
use burrow_proto::{
    handshake_sender_index, Datagram, PayloadSpan, COOKIE_LEN, COOKIE_REPLY_LEN,
    HANDSHAKE_INITIATION_LEN, HANDSHAKE_RESPONSE_LEN,
};

/// Static public key of the device under test; initiation MACs key to it.
pub const DEVICE_PUBLIC: [u8; 32] = [0x5a; 32];

pub fn addr(s: &str) -> SocketAddr {
    s.parse().expect("addr")
}

/// Wrap a tunnel payload in a minimal IPv4 + UDP envelope.
pub fn udp_envelope(payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; 20 + 8];
    buf[0] = 0x45;
    let udp_len = (8 + payload.len()) as u16;
    buf[24..26].copy_from_slice(&udp_len.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// A handshake initiation with a valid MAC1 (and MAC2 when given a cookie).
pub fn initiation(sender_index: u32, cookie: Option<&[u8; COOKIE_LEN]>) -> Vec<u8> {
    let mut msg = vec![0u8; HANDSHAKE_INITIATION_LEN];
    msg[..4].copy_from_slice(&1u32.to_le_bytes());
    msg[4..8].copy_from_slice(&sender_index.to_le_bytes());
    seal_macs(&mut msg, &mac1_key_for(&DEVICE_PUBLIC), cookie).expect("seal");
    msg
}

/// A handshake response with a valid MAC1.
pub fn response(sender_index: u32) -> Vec<u8> {
    let mut msg = vec![0u8; HANDSHAKE_RESPONSE_LEN];
    msg[..4].copy_from_slice(&2u32.to_le_bytes());
    msg[4..8].copy_from_slice(&sender_index.to_le_bytes());
    seal_macs(&mut msg, &mac1_key_for(&DEVICE_PUBLIC), None).expect("seal");
    msg
}

/// A data message; the ciphertext body is opaque to the receive path.
pub fn data_message(receiver_index: u32, body_len: usize) -> Vec<u8> {
    let mut msg = vec![0u8; 16 + body_len + 16];
    msg[..4].copy_from_slice(&4u32.to_le_bytes());
    msg[4..8].copy_from_slice(&receiver_index.to_le_bytes());
    msg
}

/// A minimal inner IPv4 packet with the given source address.
pub fn inner_ipv4(src: [u8; 4]) -> Vec<u8> {
    let mut packet = vec![0u8; 20];
    packet[0] = 0x45;
    packet[12..16].copy_from_slice(&src);
    packet
}

/// A minimal inner IPv6 packet with the given source address.
pub fn inner_ipv6(src: [u8; 16]) -> Vec<u8> {
    let mut packet = vec![0u8; 40];
    packet[0] = 0x60;
    packet[8..24].copy_from_slice(&src);
    packet
}

pub fn inner_src_ip(packet: &[u8]) -> Option<IpAddr> {
    match packet.first()? >> 4 {
        4 if packet.len() >= 20 => {
            let octets: [u8; 4] = packet[12..16].try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        6 if packet.len() >= 40 => {
            let octets: [u8; 16] = packet[8..24].try_into().ok()?;
            Some(IpAddr::from(octets))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendEvent {
    HandshakeResponse(u64),
    FlushQueue(u64),
    CookieReply { dst: SocketAddr, reply: Vec<u8> },
}

#[derive(Default)]
pub struct RecordingSendPath {
    events: Mutex<Vec<SendEvent>>,
}

impl RecordingSendPath {
    pub fn events(&self) -> Vec<SendEvent> {
        self.events.lock().clone()
    }

    pub fn cookie_replies(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SendEvent::CookieReply { dst, reply } => Some((dst, reply)),
                _ => None,
            })
            .collect()
    }

    pub fn flushes(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, SendEvent::FlushQueue(_)))
            .count()
    }

    pub fn responses(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, SendEvent::HandshakeResponse(_)))
            .count()
    }
}

impl SendPath for RecordingSendPath {
    fn send_handshake_response(&self, peer: &Arc<Peer>) {
        self.events
            .lock()
            .push(SendEvent::HandshakeResponse(peer.internal_id()));
    }

    fn flush_queue(&self, peer: &Arc<Peer>) {
        self.events.lock().push(SendEvent::FlushQueue(peer.internal_id()));
    }

    fn send_cookie_reply(&self, reply: [u8; COOKIE_REPLY_LEN], dst: SocketAddr) {
        self.events.lock().push(SendEvent::CookieReply {
            dst,
            reply: reply.to_vec(),
        });
    }
}

#[derive(Default)]
pub struct RecordingTimers {
    events: Mutex<Vec<(&'static str, u64)>>,
}

impl RecordingTimers {
    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(event, _)| *event == name)
            .count()
    }
}

impl TimerHooks for RecordingTimers {
    fn any_authorized_packet_received(&self, peer: &Arc<Peer>) {
        self.events
            .lock()
            .push(("any_authorized_packet_received", peer.internal_id()));
    }

    fn data_received(&self, peer: &Arc<Peer>) {
        self.events.lock().push(("data_received", peer.internal_id()));
    }

    fn handshake_complete(&self, peer: &Arc<Peer>) {
        self.events
            .lock()
            .push(("handshake_complete", peer.internal_id()));
    }

    fn ephemeral_key_created(&self, peer: &Arc<Peer>) {
        self.events
            .lock()
            .push(("ephemeral_key_created", peer.internal_id()));
    }
}

/// Handshake consumer scripted from the test body: consuming returns the
/// configured peer, and responses stage one keypair per queued entry.
#[derive(Default)]
pub struct ScriptedDriver {
    pub peer: Mutex<Option<Arc<Peer>>>,
    pub response_keypairs: Mutex<VecDeque<SessionKeypair>>,
    pub initiations: AtomicUsize,
    pub responses: AtomicUsize,
    pub seen_sender_indices: Mutex<Vec<u32>>,
}

impl HandshakeDriver for ScriptedDriver {
    fn consume_initiation(&self, payload: &[u8]) -> Option<Arc<Peer>> {
        self.initiations.fetch_add(1, Ordering::SeqCst);
        if let Some(index) = handshake_sender_index(payload) {
            self.seen_sender_indices.lock().push(index);
        }
        let peer = self.peer.lock().clone()?;
        peer.set_handshake_state(HandshakeState::ConsumedInitiation);
        Some(peer)
    }

    fn consume_response(&self, payload: &[u8]) -> Option<Arc<Peer>> {
        self.responses.fetch_add(1, Ordering::SeqCst);
        if let Some(index) = handshake_sender_index(payload) {
            self.seen_sender_indices.lock().push(index);
        }
        let peer = self.peer.lock().clone()?;
        if let Some(keypair) = self.response_keypairs.lock().pop_front() {
            peer.set_handshake_state(HandshakeState::ConsumedResponse);
            peer.stage_keypair(keypair);
        }
        Some(peer)
    }
}

/// What the scripted pipeline should do with one submitted data packet.
pub struct DecryptPlan {
    pub peer: Option<Arc<Peer>>,
    pub used_new_key: bool,
    pub result: Result<(), DecryptError>,
    /// Decrypted inner packet standing in for the real AEAD output.
    pub plaintext: Vec<u8>,
}

impl DecryptPlan {
    pub fn ok(peer: &Arc<Peer>, plaintext: Vec<u8>) -> Self {
        Self {
            peer: Some(Arc::clone(peer)),
            used_new_key: false,
            result: Ok(()),
            plaintext,
        }
    }
}

/// Completes submissions inline with pre-planned outcomes.
#[derive(Default)]
pub struct ScriptedPipeline {
    pub plans: Mutex<VecDeque<DecryptPlan>>,
    pub submissions: AtomicUsize,
}

impl DecryptPipeline for ScriptedPipeline {
    fn submit(&self, datagram: Datagram, _span: PayloadSpan, completion: DecryptCompletion) {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let src = datagram.src();
        let plan = self
            .plans
            .lock()
            .pop_front()
            .expect("unplanned decrypt submission");
        completion(DataDecryptOutcome {
            datagram: Datagram::from_slice(&plan.plaintext, src),
            peer: plan.peer,
            src: Some(src),
            used_new_key: plan.used_new_key,
            result: plan.result,
        });
    }
}

/// Exact-match source-address table.
#[derive(Default)]
pub struct TableRouting {
    pub entries: Mutex<Vec<(IpAddr, Arc<Peer>)>>,
}

impl TableRouting {
    pub fn delegate(&self, ip: IpAddr, peer: &Arc<Peer>) {
        self.entries.lock().push((ip, Arc::clone(peer)));
    }
}

impl RoutingTable for TableRouting {
    fn lookup_src(&self, inner_packet: &[u8]) -> Option<Arc<Peer>> {
        let ip = inner_src_ip(inner_packet)?;
        self.entries
            .lock()
            .iter()
            .find(|(delegated, _)| *delegated == ip)
            .map(|(_, peer)| Arc::clone(peer))
    }
}

pub struct RecordingNetStack {
    pub delivered: Mutex<Vec<Vec<u8>>>,
    pub accept: Mutex<Delivery>,
}

impl Default for RecordingNetStack {
    fn default() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            accept: Mutex::new(Delivery::Ok),
        }
    }
}

impl NetStack for RecordingNetStack {
    fn deliver(&self, packet: Datagram) -> Delivery {
        let verdict = *self.accept.lock();
        if verdict == Delivery::Ok {
            self.delivered.lock().push(packet.as_slice().to_vec());
        }
        verdict
    }
}

/// A device wired to recording fakes.
pub struct Harness {
    pub device: Device,
    pub driver: Arc<ScriptedDriver>,
    pub pipeline: Arc<ScriptedPipeline>,
    pub routing: Arc<TableRouting>,
    pub timers: Arc<RecordingTimers>,
    pub send_path: Arc<RecordingSendPath>,
    pub netstack: Arc<RecordingNetStack>,
}

impl Harness {
    pub fn new(config: DeviceConfig) -> Self {
        let driver = Arc::new(ScriptedDriver::default());
        let pipeline = Arc::new(ScriptedPipeline::default());
        let routing = Arc::new(TableRouting::default());
        let timers = Arc::new(RecordingTimers::default());
        let send_path = Arc::new(RecordingSendPath::default());
        let netstack = Arc::new(RecordingNetStack::default());
        let device = Device::new(
            config,
            TunnelStack {
                handshake: Arc::clone(&driver) as Arc<dyn HandshakeDriver>,
                pipeline: Arc::clone(&pipeline) as Arc<dyn DecryptPipeline>,
                routing: Arc::clone(&routing) as Arc<dyn RoutingTable>,
                timers: Arc::clone(&timers) as Arc<dyn TimerHooks>,
                send_path: Arc::clone(&send_path) as Arc<dyn SendPath>,
                netstack: Arc::clone(&netstack) as Arc<dyn NetStack>,
            },
        );
        Self {
            device,
            driver,
            pipeline,
            routing,
            timers,
            send_path,
            netstack,
        }
    }

    pub fn default_config() -> DeviceConfig {
        DeviceConfig::new(DEVICE_PUBLIC)
    }

    /// Hand the device a tunnel payload wrapped in an IPv4/UDP envelope.
    pub fn receive_payload(&self, payload: &[u8], src: SocketAddr) {
        self.device
            .receive(Datagram::from_slice(&udp_envelope(payload), src));
    }

    /// Wait for the handshake queue to drain and the worker to go idle.
    pub async fn settle(&self) {
        wait_until(|| self.device.pending_handshakes() == 0).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

//! Inert collaborator implementations for unit tests.

use std::net::SocketAddr;
use std::sync::Arc;

use burrow_proto::{Datagram, PayloadSpan, COOKIE_REPLY_LEN};

use crate::noise::HandshakeDriver;
use crate::peer::Peer;
use crate::pipeline::{DataDecryptOutcome, DecryptCompletion, DecryptPipeline};
use crate::routing::RoutingTable;
use crate::stack::{Delivery, NetStack, SendPath, TunnelStack};
use crate::timers::NoopTimers;

struct NullDriver;

impl HandshakeDriver for NullDriver {
    fn consume_initiation(&self, _payload: &[u8]) -> Option<Arc<Peer>> {
        None
    }

    fn consume_response(&self, _payload: &[u8]) -> Option<Arc<Peer>> {
        None
    }
}

/// Completes every submission inline, unauthenticated and peerless.
struct NullPipeline;

impl DecryptPipeline for NullPipeline {
    fn submit(&self, datagram: Datagram, _span: PayloadSpan, completion: DecryptCompletion) {
        completion(DataDecryptOutcome {
            datagram,
            peer: None,
            src: None,
            used_new_key: false,
            result: Ok(()),
        });
    }
}

struct NullRouting;

impl RoutingTable for NullRouting {
    fn lookup_src(&self, _inner_packet: &[u8]) -> Option<Arc<Peer>> {
        None
    }
}

struct NullSendPath;

impl SendPath for NullSendPath {
    fn send_handshake_response(&self, _peer: &Arc<Peer>) {}
    fn flush_queue(&self, _peer: &Arc<Peer>) {}
    fn send_cookie_reply(&self, _reply: [u8; COOKIE_REPLY_LEN], _dst: SocketAddr) {}
}

struct NullStack;

impl NetStack for NullStack {
    fn deliver(&self, _packet: Datagram) -> Delivery {
        Delivery::Ok
    }
}

pub(crate) fn test_stack() -> TunnelStack {
    TunnelStack {
        handshake: Arc::new(NullDriver),
        pipeline: Arc::new(NullPipeline),
        routing: Arc::new(NullRouting),
        timers: Arc::new(NoopTimers),
        send_path: Arc::new(NullSendPath),
        netstack: Arc::new(NullStack),
    }
}

use std::net::SocketAddr;
use std::sync::Arc;

use burrow_proto::{Datagram, COOKIE_REPLY_LEN};

use crate::noise::HandshakeDriver;
use crate::peer::Peer;
use crate::pipeline::DecryptPipeline;
use crate::routing::RoutingTable;
use crate::timers::TimerHooks;

/// Verdict from the upper network stack on a delivered inner packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Ok,
    Dropped,
}

/// The local network stack that receives decrypted inner packets.
pub trait NetStack: Send + Sync {
    fn deliver(&self, packet: Datagram) -> Delivery;
}

/// The tunnel's send path, as seen from the receive side.
pub trait SendPath: Send + Sync {
    /// Emit a handshake response to a peer whose initiation we just consumed.
    fn send_handshake_response(&self, peer: &Arc<Peer>);

    /// Flush the peer's queued outbound packets; called once a session is
    /// confirmed usable.
    fn flush_queue(&self, peer: &Arc<Peer>);

    /// Transmit an already-built cookie reply to a prospective initiator.
    fn send_cookie_reply(&self, reply: [u8; COOKIE_REPLY_LEN], dst: SocketAddr);
}

/// Every collaborator the receive path calls into, bundled for device
/// construction.
pub struct TunnelStack {
    pub handshake: Arc<dyn HandshakeDriver>,
    pub pipeline: Arc<dyn DecryptPipeline>,
    pub routing: Arc<dyn RoutingTable>,
    pub timers: Arc<dyn TimerHooks>,
    pub send_path: Arc<dyn SendPath>,
    pub netstack: Arc<dyn NetStack>,
}

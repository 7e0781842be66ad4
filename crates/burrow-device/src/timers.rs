use std::sync::Arc;

use crate::peer::Peer;

/// Timer notifications emitted by the receive path.
///
/// The timer subsystem itself lives outside this crate; these hooks are how
/// it learns that traffic arrived. Default implementations are no-ops so a
/// collaborator only implements the events it schedules on.
pub trait TimerHooks: Send + Sync {
    /// Any cryptographically authentic packet arrived from the peer.
    fn any_authorized_packet_received(&self, _peer: &Arc<Peer>) {}

    /// A data packet (not a keepalive) passed inner validation.
    fn data_received(&self, _peer: &Arc<Peer>) {}

    /// A handshake we initiated completed.
    fn handshake_complete(&self, _peer: &Arc<Peer>) {}

    /// A new ephemeral session was installed for the peer.
    fn ephemeral_key_created(&self, _peer: &Arc<Peer>) {}
}

/// Hook bundle for devices that run without a timer subsystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTimers;

impl TimerHooks for NoopTimers {}

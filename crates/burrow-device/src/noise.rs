use std::sync::Arc;

use crate::peer::Peer;

/// Cryptographic consumers for inbound handshake messages.
///
/// Implementations own the actual handshake transforms and the lookup from
/// message fields to configured peers. On success they return the peer the
/// message authenticated as, having advanced that peer's handshake state and,
/// for responses, staged the derived session in the peer's keypair set; the
/// receive path then finishes the bookkeeping. Returning `None` rejects the
/// message; rejection is also how replays surface when the transform refuses
/// a stale timestamp.
pub trait HandshakeDriver: Send + Sync {
    /// Consume a type-1 initiation. A returned peer is left in
    /// `ConsumedInitiation`, owing the remote a response.
    fn consume_initiation(&self, payload: &[u8]) -> Option<Arc<Peer>>;

    /// Consume a type-2 response to an initiation we sent. A returned peer
    /// has the completed session staged for `begin_session`.
    fn consume_response(&self, payload: &[u8]) -> Option<Arc<Peer>>;
}

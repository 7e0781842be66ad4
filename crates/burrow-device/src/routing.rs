use std::sync::Arc;

use crate::peer::Peer;

/// Cryptokey routing lookup over the tunnel's allowed-address table.
pub trait RoutingTable: Send + Sync {
    /// Resolve the source address of a decrypted inner IP packet to the peer
    /// that address is delegated to. The returned handle carries a reference
    /// like any other peer lookup.
    fn lookup_src(&self, inner_packet: &[u8]) -> Option<Arc<Peer>>;
}

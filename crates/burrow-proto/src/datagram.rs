use bytes::{Buf, BytesMut};
use std::net::SocketAddr;

/// An owned network datagram together with the address it arrived from.
///
/// The buffer is contiguous and single-owner: every hop through the receive
/// pipeline is an explicit move, and dropping the value frees it. Header
/// stripping is done in place with [`advance`](Datagram::advance) so the
/// decryption pipeline can hand the inner packet back without copying.
#[derive(Debug)]
pub struct Datagram {
    buf: BytesMut,
    src: SocketAddr,
}

impl Datagram {
    pub fn new(buf: impl Into<BytesMut>, src: SocketAddr) -> Self {
        Self {
            buf: buf.into(),
            src,
        }
    }

    pub fn from_slice(bytes: &[u8], src: SocketAddr) -> Self {
        Self {
            buf: BytesMut::from(bytes),
            src,
        }
    }

    /// Source address recorded when the datagram was read off the socket.
    pub fn src(&self) -> SocketAddr {
        self.src
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True when at least `n` bytes are available from the current offset.
    pub fn pull(&self, n: usize) -> bool {
        n <= self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Strip `n` bytes off the front in place.
    ///
    /// Panics if `n` exceeds the remaining length; callers check with
    /// [`pull`](Datagram::pull) first.
    pub fn advance(&mut self, n: usize) {
        self.buf.advance(n);
    }

    /// Shorten the datagram to `n` bytes, dropping any tail beyond it.
    pub fn truncate(&mut self, n: usize) {
        self.buf.truncate(n);
    }
}

//! Wire-level primitives for the burrow tunnel.
//!
//! This crate holds everything both directions of the tunnel agree on at the
//! byte level: the [`Datagram`] buffer that carries packets through the
//! receive pipeline, the outer IP/UDP envelope parser, and the four tunnel
//! message formats with their classifier. It deliberately knows nothing about
//! keys, peers, or queues; those live in `burrow-device`.

pub mod datagram;
pub mod envelope;
pub mod message;

pub use datagram::Datagram;
pub use envelope::{parse_envelope, EnvelopeError, PayloadSpan};
pub use message::{
    classify, encode_cookie_reply, handshake_macs, handshake_sender_index, CookieReply,
    DataHeader, HandshakeInitiation, HandshakeMacs, HandshakeResponse, MessageError, MessageKind,
    AEAD_TAG_LEN, COOKIE_LEN, COOKIE_NONCE_LEN, COOKIE_REPLY_LEN, DATA_MIN_LEN,
    HANDSHAKE_INITIATION_LEN, HANDSHAKE_RESPONSE_LEN, MAC_LEN, MESSAGE_HEADER_LEN,
};

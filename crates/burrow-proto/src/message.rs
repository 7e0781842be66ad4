use thiserror::Error;

/// Size of the message header: one type byte and three reserved zero bytes,
/// read as a little-endian u32.
pub const MESSAGE_HEADER_LEN: usize = 4;

/// Wire size of a handshake initiation message.
pub const HANDSHAKE_INITIATION_LEN: usize = 148;

/// Wire size of a handshake response message.
pub const HANDSHAKE_RESPONSE_LEN: usize = 92;

/// Wire size of a cookie reply message.
pub const COOKIE_REPLY_LEN: usize = 64;

/// Minimum wire size of a data message: header, receiver index, counter, and
/// an AEAD tag over an empty plaintext.
pub const DATA_MIN_LEN: usize = 32;

/// Trailing AEAD authentication tag length.
pub const AEAD_TAG_LEN: usize = 16;

/// Length of the MAC1 and MAC2 fields on handshake messages.
pub const MAC_LEN: usize = 16;

/// Length of the nonce carried by a cookie reply.
pub const COOKIE_NONCE_LEN: usize = 24;

/// Length of a decrypted cookie.
pub const COOKIE_LEN: usize = 16;

const TYPE_HANDSHAKE_INITIATION: u32 = 1;
const TYPE_HANDSHAKE_RESPONSE: u32 = 2;
const TYPE_COOKIE_REPLY: u32 = 3;
const TYPE_DATA: u32 = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message length does not match its type")]
    Length,
    #[error("message is not of the expected type")]
    Kind,
}

/// The four message kinds of the tunnel, plus everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    HandshakeInitiation,
    HandshakeResponse,
    CookieReply,
    Data,
    Invalid,
}

impl MessageKind {
    /// Handshake-class messages go through the admission queue; data goes
    /// straight to the decryption pipeline.
    pub fn is_handshake(self) -> bool {
        matches!(
            self,
            MessageKind::HandshakeInitiation | MessageKind::HandshakeResponse | MessageKind::CookieReply
        )
    }
}

fn header_type(payload: &[u8]) -> Option<u32> {
    if payload.len() < MESSAGE_HEADER_LEN {
        return None;
    }
    Some(u32::from_le_bytes(payload[..4].try_into().unwrap()))
}

/// Classify a tunnel payload by its message header, enforcing the per-type
/// length constraints. Anything that does not match exactly is `Invalid`.
pub fn classify(payload: &[u8]) -> MessageKind {
    match header_type(payload) {
        Some(TYPE_HANDSHAKE_INITIATION) if payload.len() == HANDSHAKE_INITIATION_LEN => {
            MessageKind::HandshakeInitiation
        }
        Some(TYPE_HANDSHAKE_RESPONSE) if payload.len() == HANDSHAKE_RESPONSE_LEN => {
            MessageKind::HandshakeResponse
        }
        Some(TYPE_COOKIE_REPLY) if payload.len() == COOKIE_REPLY_LEN => MessageKind::CookieReply,
        Some(TYPE_DATA) if payload.len() >= DATA_MIN_LEN => MessageKind::Data,
        _ => MessageKind::Invalid,
    }
}

/// Sender index of a handshake initiation or response, used when addressing a
/// cookie reply back at the message's origin.
pub fn handshake_sender_index(payload: &[u8]) -> Option<u32> {
    match classify(payload) {
        MessageKind::HandshakeInitiation | MessageKind::HandshakeResponse => {
            Some(u32::from_le_bytes(payload[4..8].try_into().unwrap()))
        }
        _ => None,
    }
}

/// Borrowed view of a handshake initiation message.
#[derive(Debug)]
pub struct HandshakeInitiation<'a> {
    pub sender_index: u32,
    pub ephemeral: &'a [u8; 32],
    pub encrypted_static: &'a [u8],
    pub encrypted_timestamp: &'a [u8],
    pub mac1: &'a [u8; MAC_LEN],
    pub mac2: &'a [u8; MAC_LEN],
}

impl<'a> HandshakeInitiation<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self, MessageError> {
        if header_type(payload) != Some(TYPE_HANDSHAKE_INITIATION) {
            return Err(MessageError::Kind);
        }
        if payload.len() != HANDSHAKE_INITIATION_LEN {
            return Err(MessageError::Length);
        }
        Ok(Self {
            sender_index: u32::from_le_bytes(payload[4..8].try_into().unwrap()),
            ephemeral: payload[8..40].try_into().unwrap(),
            encrypted_static: &payload[40..88],
            encrypted_timestamp: &payload[88..116],
            mac1: payload[116..132].try_into().unwrap(),
            mac2: payload[132..148].try_into().unwrap(),
        })
    }
}

/// Borrowed view of a handshake response message.
#[derive(Debug)]
pub struct HandshakeResponse<'a> {
    pub sender_index: u32,
    pub receiver_index: u32,
    pub ephemeral: &'a [u8; 32],
    pub encrypted_empty: &'a [u8],
    pub mac1: &'a [u8; MAC_LEN],
    pub mac2: &'a [u8; MAC_LEN],
}

impl<'a> HandshakeResponse<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self, MessageError> {
        if header_type(payload) != Some(TYPE_HANDSHAKE_RESPONSE) {
            return Err(MessageError::Kind);
        }
        if payload.len() != HANDSHAKE_RESPONSE_LEN {
            return Err(MessageError::Length);
        }
        Ok(Self {
            sender_index: u32::from_le_bytes(payload[4..8].try_into().unwrap()),
            receiver_index: u32::from_le_bytes(payload[8..12].try_into().unwrap()),
            ephemeral: payload[12..44].try_into().unwrap(),
            encrypted_empty: &payload[44..60],
            mac1: payload[60..76].try_into().unwrap(),
            mac2: payload[76..92].try_into().unwrap(),
        })
    }
}

/// Borrowed view of a cookie reply message.
#[derive(Debug)]
pub struct CookieReply<'a> {
    pub receiver_index: u32,
    pub nonce: &'a [u8; COOKIE_NONCE_LEN],
    pub encrypted_cookie: &'a [u8; COOKIE_LEN + AEAD_TAG_LEN],
}

impl<'a> CookieReply<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self, MessageError> {
        if header_type(payload) != Some(TYPE_COOKIE_REPLY) {
            return Err(MessageError::Kind);
        }
        if payload.len() != COOKIE_REPLY_LEN {
            return Err(MessageError::Length);
        }
        Ok(Self {
            receiver_index: u32::from_le_bytes(payload[4..8].try_into().unwrap()),
            nonce: payload[8..32].try_into().unwrap(),
            encrypted_cookie: payload[32..64].try_into().unwrap(),
        })
    }
}

/// Borrowed view of a data message header.
#[derive(Debug)]
pub struct DataHeader<'a> {
    pub receiver_index: u32,
    pub counter: u64,
    pub ciphertext: &'a [u8],
}

impl<'a> DataHeader<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self, MessageError> {
        if header_type(payload) != Some(TYPE_DATA) {
            return Err(MessageError::Kind);
        }
        if payload.len() < DATA_MIN_LEN {
            return Err(MessageError::Length);
        }
        Ok(Self {
            receiver_index: u32::from_le_bytes(payload[4..8].try_into().unwrap()),
            counter: u64::from_le_bytes(payload[8..16].try_into().unwrap()),
            ciphertext: &payload[16..],
        })
    }
}

/// MAC fields of a handshake message together with the byte ranges each one
/// covers: MAC1 is keyed over everything before it, MAC2 over everything
/// before it (including MAC1).
#[derive(Debug)]
pub struct HandshakeMacs<'a> {
    pub mac1_coverage: &'a [u8],
    pub mac1: &'a [u8; MAC_LEN],
    pub mac2_coverage: &'a [u8],
    pub mac2: &'a [u8; MAC_LEN],
}

/// Split the trailing MACs off a handshake initiation or response.
pub fn handshake_macs(payload: &[u8]) -> Option<HandshakeMacs<'_>> {
    if !matches!(
        classify(payload),
        MessageKind::HandshakeInitiation | MessageKind::HandshakeResponse
    ) {
        return None;
    }
    let len = payload.len();
    Some(HandshakeMacs {
        mac1_coverage: &payload[..len - 2 * MAC_LEN],
        mac1: payload[len - 2 * MAC_LEN..len - MAC_LEN].try_into().unwrap(),
        mac2_coverage: &payload[..len - MAC_LEN],
        mac2: payload[len - MAC_LEN..].try_into().unwrap(),
    })
}

/// Assemble a cookie reply message from its parts.
pub fn encode_cookie_reply(
    receiver_index: u32,
    nonce: &[u8; COOKIE_NONCE_LEN],
    encrypted_cookie: &[u8; COOKIE_LEN + AEAD_TAG_LEN],
) -> [u8; COOKIE_REPLY_LEN] {
    let mut msg = [0u8; COOKIE_REPLY_LEN];
    msg[..4].copy_from_slice(&TYPE_COOKIE_REPLY.to_le_bytes());
    msg[4..8].copy_from_slice(&receiver_index.to_le_bytes());
    msg[8..32].copy_from_slice(nonce);
    msg[32..64].copy_from_slice(encrypted_cookie);
    msg
}

use thiserror::Error;

use crate::message::MESSAGE_HEADER_LEN;

/// Minimum length of an IPv4 header (no options).
pub const IPV4_HEADER_MIN: usize = 20;

/// Fixed length of the IPv6 base header.
pub const IPV6_HEADER_LEN: usize = 40;

/// Length of a UDP header.
pub const UDP_HEADER_LEN: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("datagram too short for an IP header")]
    TruncatedIp,
    #[error("unsupported outer IP version {0}")]
    IpVersion(u8),
    #[error("datagram too short to hold UDP fields")]
    TruncatedUdp,
    #[error("UDP length field inconsistent with the datagram")]
    BogusUdpLength,
    #[error("tunnel message header missing")]
    MissingMessageHeader,
}

/// Location of the tunnel payload inside an outer IP/UDP envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSpan {
    /// Byte offset of the first payload byte (just past the UDP header).
    pub offset: usize,
    /// Payload length as claimed by the UDP length field.
    pub len: usize,
}

impl PayloadSpan {
    /// Borrow the payload bytes out of the datagram this span was parsed from.
    pub fn of<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.offset..self.offset + self.len]
    }
}

/// Validate the outer IP/UDP envelope and locate the tunnel payload.
///
/// Accepts IPv4 (honouring the IHL field) and IPv6 (fixed base header). The
/// returned span is guaranteed to start with a full message header, so later
/// stages can classify without re-checking bounds.
pub fn parse_envelope(buf: &[u8]) -> Result<PayloadSpan, EnvelopeError> {
    if buf.len() < IPV4_HEADER_MIN {
        return Err(EnvelopeError::TruncatedIp);
    }

    let version = buf[0] >> 4;
    let udp_offset = match version {
        4 => {
            let ihl = usize::from(buf[0] & 0x0f) * 4;
            if ihl < IPV4_HEADER_MIN {
                return Err(EnvelopeError::TruncatedIp);
            }
            ihl
        }
        6 => {
            if buf.len() < IPV6_HEADER_LEN {
                return Err(EnvelopeError::TruncatedIp);
            }
            IPV6_HEADER_LEN
        }
        other => return Err(EnvelopeError::IpVersion(other)),
    };

    if udp_offset + UDP_HEADER_LEN > buf.len() {
        return Err(EnvelopeError::TruncatedUdp);
    }

    let udp_len = usize::from(u16::from_be_bytes([buf[udp_offset + 4], buf[udp_offset + 5]]));
    if udp_len < UDP_HEADER_LEN {
        return Err(EnvelopeError::BogusUdpLength);
    }
    if udp_len > buf.len() - udp_offset {
        return Err(EnvelopeError::BogusUdpLength);
    }

    let offset = udp_offset + UDP_HEADER_LEN;
    if offset + MESSAGE_HEADER_LEN > buf.len() {
        return Err(EnvelopeError::MissingMessageHeader);
    }

    Ok(PayloadSpan {
        offset,
        len: udp_len - UDP_HEADER_LEN,
    })
}

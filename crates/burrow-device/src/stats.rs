use std::sync::atomic::{AtomicU64, Ordering};

/// Per-device receive counters.
///
/// Every drop the receive path can take is attributable to exactly one of
/// these, so a device under attack can be diagnosed from counters alone.
/// Updates use relaxed ordering; readers tolerate slightly stale values.
#[derive(Debug, Default)]
pub struct DeviceStats {
    rx_packets: AtomicU64,
    rx_bytes: AtomicU64,
    rx_errors: AtomicU64,
    rx_length_errors: AtomicU64,
    rx_frame_errors: AtomicU64,
    rx_dropped: AtomicU64,
    rx_invalid_frames: AtomicU64,
    rx_invalid_macs: AtomicU64,
    rx_invalid_handshakes: AtomicU64,
    rx_handshake_queue_drops: AtomicU64,
    rx_decrypt_failures: AtomicU64,
}

impl DeviceStats {
    /// One authenticated packet accepted, `bytes` long.
    pub(crate) fn add_rx(&self, bytes: u64) {
        self.rx_packets.fetch_add(1, Ordering::Relaxed);
        self.rx_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Inner packet shorter than its IP header claims.
    pub(crate) fn length_error(&self) {
        self.rx_errors.fetch_add(1, Ordering::Relaxed);
        self.rx_length_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Inner source address not delegated to the sending peer.
    pub(crate) fn frame_error(&self) {
        self.rx_errors.fetch_add(1, Ordering::Relaxed);
        self.rx_frame_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Upper stack refused an otherwise valid packet.
    pub(crate) fn delivery_dropped(&self) {
        self.rx_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Malformed envelope or unknown message type.
    pub(crate) fn invalid_frame(&self) {
        self.rx_invalid_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Handshake message failed the MAC check.
    pub(crate) fn invalid_mac(&self) {
        self.rx_invalid_macs.fetch_add(1, Ordering::Relaxed);
    }

    /// Handshake message rejected by the cryptographic consumer.
    pub(crate) fn invalid_handshake(&self) {
        self.rx_invalid_handshakes.fetch_add(1, Ordering::Relaxed);
    }

    /// Handshake dropped because the admission queue was full.
    pub(crate) fn handshake_queue_drop(&self) {
        self.rx_handshake_queue_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Data packet the decryption pipeline could not authenticate.
    pub(crate) fn decrypt_failure(&self) {
        self.rx_decrypt_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            rx_errors: self.rx_errors.load(Ordering::Relaxed),
            rx_length_errors: self.rx_length_errors.load(Ordering::Relaxed),
            rx_frame_errors: self.rx_frame_errors.load(Ordering::Relaxed),
            rx_dropped: self.rx_dropped.load(Ordering::Relaxed),
            rx_invalid_frames: self.rx_invalid_frames.load(Ordering::Relaxed),
            rx_invalid_macs: self.rx_invalid_macs.load(Ordering::Relaxed),
            rx_invalid_handshakes: self.rx_invalid_handshakes.load(Ordering::Relaxed),
            rx_handshake_queue_drops: self.rx_handshake_queue_drops.load(Ordering::Relaxed),
            rx_decrypt_failures: self.rx_decrypt_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DeviceStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub rx_errors: u64,
    pub rx_length_errors: u64,
    pub rx_frame_errors: u64,
    pub rx_dropped: u64,
    pub rx_invalid_frames: u64,
    pub rx_invalid_macs: u64,
    pub rx_invalid_handshakes: u64,
    pub rx_handshake_queue_drops: u64,
    pub rx_decrypt_failures: u64,
}

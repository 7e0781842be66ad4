use std::time::Duration;

const DEFAULT_MAX_QUEUED_HANDSHAKES: usize = 4096;
const DEFAULT_MAX_BURST_HANDSHAKES: usize = 8;
const DEFAULT_MAX_PEERS: usize = 1 << 20;
const DEFAULT_COOKIE_SECRET_MAX_AGE: Duration = Duration::from_secs(120);
const DEFAULT_COOKIE_SECRET_LATENCY: Duration = Duration::from_secs(5);

/// Builder-style tunables for a tunnel device.
///
/// The static public key is the only mandatory field; it keys MAC1 validation
/// and cookie-reply encryption, so it must match what initiators use when
/// addressing this device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub static_public: [u8; 32],
    /// Capacity of the handshake admission queue.
    pub max_queued_handshakes: usize,
    /// Handshakes processed per worker wakeup before yielding.
    pub max_burst_handshakes: usize,
    pub max_peers: usize,
    /// Age past which the cookie address secret is refreshed.
    pub cookie_secret_max_age: Duration,
    /// Grace window during which the previous address secret still validates.
    pub cookie_secret_latency: Duration,
}

impl DeviceConfig {
    pub fn new(static_public: [u8; 32]) -> Self {
        Self {
            static_public,
            max_queued_handshakes: DEFAULT_MAX_QUEUED_HANDSHAKES,
            max_burst_handshakes: DEFAULT_MAX_BURST_HANDSHAKES,
            max_peers: DEFAULT_MAX_PEERS,
            cookie_secret_max_age: DEFAULT_COOKIE_SECRET_MAX_AGE,
            cookie_secret_latency: DEFAULT_COOKIE_SECRET_LATENCY,
        }
    }

    /// Override the admission queue capacity. Values below 2 are raised to 2
    /// so the under-load threshold (half the capacity) stays meaningful.
    pub fn with_max_queued_handshakes(mut self, capacity: usize) -> Self {
        self.max_queued_handshakes = capacity.max(2);
        self
    }

    pub fn with_max_burst_handshakes(mut self, burst: usize) -> Self {
        self.max_burst_handshakes = burst.max(1);
        self
    }

    pub fn with_max_peers(mut self, limit: usize) -> Self {
        self.max_peers = limit.max(1);
        self
    }

    pub fn with_cookie_secret_max_age(mut self, max_age: Duration) -> Self {
        self.cookie_secret_max_age = max_age;
        self
    }

    pub fn with_cookie_secret_latency(mut self, latency: Duration) -> Self {
        self.cookie_secret_latency = latency;
        self
    }

    /// Queue length at or above which the device considers itself under load.
    pub fn under_load_threshold(&self) -> usize {
        self.max_queued_handshakes / 2
    }
}

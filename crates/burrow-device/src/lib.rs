//! Receive path of the burrow tunnel.
//!
//! A [`Device`] ingests untrusted datagrams, classifies them, and routes them
//! one of three ways: handshake messages go through a bounded admission queue
//! to a single worker that applies the two-tier cookie check before touching
//! any cryptographic state, data messages go to the external decryption
//! pipeline and come back through a completion that enforces cryptokey
//! routing before delivering upward, and everything else is counted and
//! dropped. The cryptographic transforms, the routing table, the timer
//! subsystem, and the send path are collaborators behind the traits in
//! [`stack`], [`noise`], [`pipeline`], [`routing`], and [`timers`].

pub mod config;
pub mod cookie;
pub mod device;
pub mod noise;
pub mod peer;
pub mod pipeline;
pub mod queue;
pub mod routing;
pub mod stack;
pub mod stats;
pub mod timers;

mod receive;
#[cfg(test)]
mod testutil;
mod util;

pub use config::DeviceConfig;
pub use cookie::{mac1_key_for, seal_macs, CookieChecker, CookieError, MacState};
pub use device::Device;
pub use noise::HandshakeDriver;
pub use peer::{HandshakeState, KeypairSet, Peer, PeerCookie, SessionKeypair};
pub use pipeline::{DataDecryptOutcome, DecryptCompletion, DecryptError, DecryptPipeline};
pub use queue::HandshakeQueue;
pub use routing::RoutingTable;
pub use stack::{Delivery, NetStack, SendPath, TunnelStack};
pub use stats::StatsSnapshot;
pub use timers::{NoopTimers, TimerHooks};

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

use burrow_proto::{Datagram, PayloadSpan};

use crate::peer::Peer;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptError {
    #[error("no session for the receiver index")]
    UnknownReceiver,
    #[error("packet failed authentication")]
    Authentication,
    #[error("counter outside the replay window")]
    Replay,
}

/// Completion of one data packet's trip through the decryption pipeline.
///
/// On success the datagram holds the decrypted inner packet with all outer
/// headers stripped (zero-length for a keepalive), `peer` is the
/// authenticated sender carrying one reference, and `used_new_key` reports
/// whether this was the first packet decrypted under the `next` keypair.
pub struct DataDecryptOutcome {
    pub datagram: Datagram,
    pub peer: Option<Arc<Peer>>,
    pub src: Option<SocketAddr>,
    pub used_new_key: bool,
    pub result: Result<(), DecryptError>,
}

pub type DecryptCompletion = Box<dyn FnOnce(DataDecryptOutcome) + Send>;

/// The parallel AEAD pipeline. `submit` transfers buffer ownership to the
/// pipeline; the pipeline transfers it onward to the completion, which may
/// run on any thread.
pub trait DecryptPipeline: Send + Sync {
    fn submit(&self, datagram: Datagram, span: PayloadSpan, completion: DecryptCompletion);
}

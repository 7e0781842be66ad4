use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error};

use burrow_proto::{
    classify, envelope::IPV4_HEADER_MIN, envelope::IPV6_HEADER_LEN, handshake_sender_index,
    parse_envelope, Datagram, MessageKind,
};

use crate::cookie::MacState;
use crate::device::DeviceInner;
use crate::peer::Peer;
use crate::pipeline::DataDecryptOutcome;
use crate::stack::Delivery;
use crate::util::log_limited;

/// Drains the admission queue in bursts until the device shuts down.
///
/// One logical instance runs per device. After `max_burst_handshakes`
/// messages the worker re-pokes itself and goes back to waiting, yielding
/// the executor so a handshake flood cannot starve unrelated tasks.
pub(crate) async fn handshake_worker(inner: Arc<DeviceInner>) {
    loop {
        inner.handshake_queue.poked().await;
        if inner.is_shutting_down() {
            return;
        }
        let mut processed = 0;
        while let Some(datagram) = inner.handshake_queue.pop() {
            inner.process_handshake_datagram(datagram);
            processed += 1;
            if processed == inner.config.max_burst_handshakes {
                inner.handshake_queue.poke();
                break;
            }
        }
    }
}

impl DeviceInner {
    /// Ingress for every inbound datagram: validate the envelope, classify,
    /// and route to the admission queue, the decryption pipeline, or the
    /// floor.
    pub(crate) fn receive(self: Arc<Self>, datagram: Datagram) {
        let src = datagram.src();
        let span = match parse_envelope(datagram.as_slice()) {
            Ok(span) => span,
            Err(err) => {
                self.stats.invalid_frame();
                log_limited!(debug!(
                    target: "burrow::recv",
                    src = %src,
                    error = %err,
                    "dropping datagram with a malformed envelope"
                ));
                return;
            }
        };

        match classify(span.of(datagram.as_slice())) {
            kind if kind.is_handshake() => {
                if let Err(_dropped) = self.handshake_queue.push(datagram) {
                    self.stats.handshake_queue_drop();
                    log_limited!(debug!(
                        target: "burrow::recv",
                        src = %src,
                        "too many handshakes queued, dropping packet"
                    ));
                    return;
                }
                self.handshake_queue.poke();
            }
            MessageKind::Data => {
                // The pipeline owns the buffer from here; it comes back
                // through `receive_data_packet`.
                let completion_device = Arc::clone(&self);
                self.stack.pipeline.submit(
                    datagram,
                    span,
                    Box::new(move |outcome| completion_device.receive_data_packet(outcome)),
                );
            }
            _ => {
                self.stats.invalid_frame();
                log_limited!(debug!(
                    target: "burrow::recv",
                    src = %src,
                    "dropping packet of unknown type"
                ));
            }
        }
    }

    /// One queued handshake datagram, freed on return.
    fn process_handshake_datagram(&self, datagram: Datagram) {
        let src = datagram.src();
        let Ok(span) = parse_envelope(datagram.as_slice()) else {
            return;
        };
        let payload = span.of(datagram.as_slice());

        match classify(payload) {
            MessageKind::CookieReply => {
                log_limited!(debug!(
                    target: "burrow::handshake",
                    src = %src,
                    "receiving cookie response"
                ));
                self.consume_cookie_reply(payload, src);
            }
            kind @ (MessageKind::HandshakeInitiation | MessageKind::HandshakeResponse) => {
                self.process_handshake_message(kind, payload, src);
            }
            MessageKind::Data | MessageKind::Invalid => {
                error!(
                    target: "burrow::handshake",
                    src = %src,
                    "non-handshake message in the handshake queue"
                );
                panic!("non-handshake message in the handshake queue");
            }
        }
    }

    fn consume_cookie_reply(&self, payload: &[u8], src: SocketAddr) {
        let Ok(reply) = burrow_proto::CookieReply::parse(payload) else {
            return;
        };
        let Some(peer) = self.lookup_index(reply.receiver_index) else {
            log_limited!(debug!(
                target: "burrow::cookie",
                src = %src,
                index = reply.receiver_index,
                "cookie reply for an unknown receiver index"
            ));
            return;
        };
        let mut cookie_state = peer.cookie_mut();
        if let Err(err) =
            self.cookie_checker
                .consume_reply(payload, peer.public_key(), &mut cookie_state)
        {
            log_limited!(debug!(
                target: "burrow::cookie",
                src = %src,
                peer = peer.internal_id(),
                error = %err,
                "discarding cookie reply"
            ));
        }
    }

    fn process_handshake_message(&self, kind: MessageKind, payload: &[u8], src: SocketAddr) {
        // Load is sampled at processing time, not enqueue time: a queue that
        // has just drained admits stragglers without a cookie.
        let under_load = self.handshake_queue.len() >= self.config.under_load_threshold();
        let mac_state = self.cookie_checker.validate(payload, src, under_load);
        let needs_cookie = match mac_state {
            MacState::InvalidMac => {
                self.stats.invalid_mac();
                log_limited!(debug!(
                    target: "burrow::handshake",
                    src = %src,
                    "invalid MAC of handshake, dropping packet"
                ));
                return;
            }
            MacState::ValidMacWithCookie => false,
            MacState::ValidMacButNoCookie => under_load,
        };
        if needs_cookie {
            self.send_cookie_reply(payload, src);
            return;
        }

        let peer = match kind {
            MessageKind::HandshakeInitiation => {
                let Some(peer) = self.stack.handshake.consume_initiation(payload) else {
                    self.stats.invalid_handshake();
                    log_limited!(debug!(
                        target: "burrow::handshake",
                        src = %src,
                        "invalid handshake initiation"
                    ));
                    return;
                };
                debug!(
                    target: "burrow::handshake",
                    peer = peer.internal_id(),
                    src = %src,
                    "receiving handshake initiation"
                );
                peer.set_endpoint(src);
                self.stack.send_path.send_handshake_response(&peer);
                peer
            }
            MessageKind::HandshakeResponse => {
                let Some(peer) = self.stack.handshake.consume_response(payload) else {
                    self.stats.invalid_handshake();
                    log_limited!(debug!(
                        target: "burrow::handshake",
                        src = %src,
                        "invalid handshake response"
                    ));
                    return;
                };
                debug!(
                    target: "burrow::handshake",
                    peer = peer.internal_id(),
                    src = %src,
                    "receiving handshake response"
                );
                if peer.begin_session(true) {
                    self.stack.timers.ephemeral_key_created(&peer);
                    self.stack.timers.handshake_complete(&peer);
                    self.stack.send_path.flush_queue(&peer);
                }
                peer
            }
            _ => unreachable!("cookie replies are consumed before the MAC check"),
        };

        peer.record_rx(payload.len() as u64);
        self.stats.add_rx(payload.len() as u64);
        self.stack.timers.any_authorized_packet_received(&peer);
        peer.set_endpoint(src);
    }

    fn send_cookie_reply(&self, payload: &[u8], src: SocketAddr) {
        let Some(sender_index) = handshake_sender_index(payload) else {
            return;
        };
        let Some(reply) = self.cookie_checker.create_reply(payload, sender_index, src) else {
            return;
        };
        log_limited!(debug!(
            target: "burrow::cookie",
            src = %src,
            "handshake lacks a live cookie, sending reply"
        ));
        self.stack.send_path.send_cookie_reply(reply, src);
    }

    /// Completion callback for the decryption pipeline. Exactly one peer
    /// reference is released on every path out of here, and the buffer is
    /// either delivered upward or dropped.
    pub(crate) fn receive_data_packet(&self, outcome: DataDecryptOutcome) {
        let DataDecryptOutcome {
            datagram,
            peer,
            src,
            used_new_key,
            result,
        } = outcome;

        if let Err(err) = result {
            self.stats.decrypt_failure();
            log_limited!(debug!(
                target: "burrow::recv",
                src = %datagram.src(),
                error = %err,
                "dropping undecryptable packet"
            ));
            return;
        }
        let (Some(peer), Some(src)) = (peer, src) else {
            return;
        };

        if used_new_key {
            // First packet under the fresh keypair confirms the peer holds
            // it; anything waiting on the confirmation can go out now.
            self.stack.send_path.flush_queue(&peer);
        }

        if self.validate_inner_packet(&datagram, &peer, src) {
            let len = datagram.len() as u64;
            match self.stack.netstack.deliver(datagram) {
                Delivery::Ok => {
                    peer.record_rx(len);
                    self.stats.add_rx(len);
                }
                Delivery::Dropped => {
                    self.stats.delivery_dropped();
                    log_limited!(debug!(
                        target: "burrow::recv",
                        peer = peer.internal_id(),
                        src = %src,
                        "upper stack refused the packet"
                    ));
                }
            }
        }

        self.stack.timers.any_authorized_packet_received(&peer);
        peer.set_endpoint(src);
    }

    /// Inner-packet checks between decryption and delivery. `false` means
    /// the buffer is dropped, but the packet still counts as authentic
    /// traffic from the peer.
    fn validate_inner_packet(&self, datagram: &Datagram, peer: &Arc<Peer>, src: SocketAddr) -> bool {
        if datagram.is_empty() {
            log_limited!(debug!(
                target: "burrow::recv",
                peer = peer.internal_id(),
                src = %src,
                "receiving keepalive packet"
            ));
            return false;
        }

        if datagram.len() < IPV4_HEADER_MIN || !datagram.pull(1) {
            self.stats.length_error();
            log_limited!(debug!(
                target: "burrow::recv",
                peer = peer.internal_id(),
                src = %src,
                "packet missing an ip header"
            ));
            return false;
        }

        match datagram.as_slice()[0] >> 4 {
            4 => {}
            6 => {
                if datagram.len() < IPV6_HEADER_LEN {
                    self.stats.length_error();
                    log_limited!(debug!(
                        target: "burrow::recv",
                        peer = peer.internal_id(),
                        src = %src,
                        "packet missing an ipv6 header"
                    ));
                    return false;
                }
            }
            _ => {
                self.stats.length_error();
                log_limited!(debug!(
                    target: "burrow::recv",
                    peer = peer.internal_id(),
                    src = %src,
                    "packet neither ipv4 nor ipv6"
                ));
                return false;
            }
        }

        self.stack.timers.data_received(peer);

        let routed = self.stack.routing.lookup_src(datagram.as_slice());
        let authorized = routed.is_some_and(|routed| Arc::ptr_eq(&routed, peer));
        if !authorized {
            self.stats.frame_error();
            log_limited!(debug!(
                target: "burrow::recv",
                peer = peer.internal_id(),
                src = %src,
                "packet has an unallowed inner source address"
            ));
            return false;
        }
        true
    }
}

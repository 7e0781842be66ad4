use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use sha3::{Digest, Sha3_256};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use thiserror::Error;

use burrow_proto::{
    encode_cookie_reply, handshake_macs, CookieReply, AEAD_TAG_LEN, COOKIE_LEN, COOKIE_NONCE_LEN,
    COOKIE_REPLY_LEN, MAC_LEN,
};

use crate::peer::PeerCookie;

type CookieMac = Hmac<Sha3_256>;

const MAC1_KEY_LABEL: &[u8] = b"burrow mac1----";
const REPLY_KEY_LABEL: &[u8] = b"burrow cookie--";

/// Verdict of the two-tier MAC check on an inbound handshake message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacState {
    InvalidMac,
    ValidMacButNoCookie,
    ValidMacWithCookie,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CookieError {
    #[error("cookie reply is malformed")]
    Malformed,
    #[error("no MAC1 on record to authenticate the cookie against")]
    NoMac1OnRecord,
    #[error("cookie reply failed authentication")]
    Decryption,
}

struct AddressSecret {
    bytes: [u8; 32],
    birth: Instant,
}

impl AddressSecret {
    fn fresh() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self {
            bytes,
            birth: Instant::now(),
        }
    }
}

struct SecretPair {
    current: AddressSecret,
    /// Retired secret and the moment it was rotated out.
    previous: Option<(AddressSecret, Instant)>,
}

/// Validates handshake MACs and mints address-bound cookies.
///
/// MAC1 keys to the device's static public key and is required on every
/// handshake message. MAC2 keys to a short-lived cookie derived from the
/// sender's address and is only demanded while the device is under load;
/// validation stays wait-free on the read path.
pub struct CookieChecker {
    mac1_key: [u8; 32],
    reply_key: [u8; 32],
    max_age: Duration,
    latency: Duration,
    secrets: RwLock<SecretPair>,
}

impl CookieChecker {
    pub fn new(static_public: &[u8; 32], max_age: Duration, latency: Duration) -> Self {
        Self {
            mac1_key: mac1_key_for(static_public),
            reply_key: reply_key_for(static_public),
            max_age,
            latency,
            secrets: RwLock::new(SecretPair {
                current: AddressSecret::fresh(),
                previous: None,
            }),
        }
    }

    /// Check the trailing MACs of a handshake message. MAC2 is only examined
    /// when `check_cookie` is set, so an idle device never spends work on it.
    pub fn validate(&self, payload: &[u8], src: SocketAddr, check_cookie: bool) -> MacState {
        let Some(macs) = handshake_macs(payload) else {
            return MacState::InvalidMac;
        };
        let expected = keyed_mac16(&self.mac1_key, macs.mac1_coverage);
        if expected[..].ct_eq(&macs.mac1[..]).unwrap_u8() == 0 {
            return MacState::InvalidMac;
        }
        if !check_cookie {
            return MacState::ValidMacButNoCookie;
        }

        let (current, previous) = self.cookies_for(src);
        if keyed_mac16(&current, macs.mac2_coverage)[..]
            .ct_eq(&macs.mac2[..])
            .unwrap_u8()
            == 1
        {
            return MacState::ValidMacWithCookie;
        }
        if let Some(previous) = previous {
            if keyed_mac16(&previous, macs.mac2_coverage)[..]
                .ct_eq(&macs.mac2[..])
                .unwrap_u8()
                == 1
            {
                return MacState::ValidMacWithCookie;
            }
        }
        MacState::ValidMacButNoCookie
    }

    /// Build the full type-3 reply for a handshake message that arrived
    /// without a live cookie: the address-bound cookie, sealed with the
    /// message's MAC1 as associated data.
    pub fn create_reply(
        &self,
        payload: &[u8],
        sender_index: u32,
        src: SocketAddr,
    ) -> Option<[u8; COOKIE_REPLY_LEN]> {
        let macs = handshake_macs(payload)?;
        let cookie = self.current_cookie(src);
        let mut nonce = [0u8; COOKIE_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.reply_key));
        let sealed = cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &cookie,
                    aad: macs.mac1,
                },
            )
            .ok()?;
        let sealed: [u8; COOKIE_LEN + AEAD_TAG_LEN] = sealed.try_into().ok()?;
        Some(encode_cookie_reply(sender_index, &nonce, &sealed))
    }

    /// Decrypt a cookie reply sent by `peer_public` and store the cookie in
    /// the peer's cookie state. The MAC1 of the handshake message we last
    /// sent to that peer is the associated data.
    pub fn consume_reply(
        &self,
        payload: &[u8],
        peer_public: &[u8; 32],
        state: &mut PeerCookie,
    ) -> Result<(), CookieError> {
        let reply = CookieReply::parse(payload).map_err(|_| CookieError::Malformed)?;
        let mac1 = *state.last_mac1_sent().ok_or(CookieError::NoMac1OnRecord)?;

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&reply_key_for(peer_public)));
        let cookie = cipher
            .decrypt(
                XNonce::from_slice(reply.nonce),
                Payload {
                    msg: reply.encrypted_cookie,
                    aad: &mac1,
                },
            )
            .map_err(|_| CookieError::Decryption)?;
        let cookie: [u8; COOKIE_LEN] = cookie.try_into().map_err(|_| CookieError::Decryption)?;
        state.set_cookie(cookie);
        Ok(())
    }

    /// Retire the current address secret. Called by the timer collaborator on
    /// its rotation schedule; also happens lazily once the secret exceeds its
    /// maximum age.
    pub fn rotate_secret(&self) {
        let mut secrets = self.secrets.write();
        rotate_locked(&mut secrets);
    }

    fn refresh_if_stale(&self) {
        if self.secrets.read().current.birth.elapsed() <= self.max_age {
            return;
        }
        let mut secrets = self.secrets.write();
        if secrets.current.birth.elapsed() > self.max_age {
            rotate_locked(&mut secrets);
        }
    }

    fn current_cookie(&self, src: SocketAddr) -> [u8; COOKIE_LEN] {
        self.refresh_if_stale();
        address_mac(&self.secrets.read().current.bytes, src)
    }

    /// Cookies minted from the current secret and, within the grace window,
    /// the previously retired one.
    fn cookies_for(&self, src: SocketAddr) -> ([u8; COOKIE_LEN], Option<[u8; COOKIE_LEN]>) {
        self.refresh_if_stale();
        let secrets = self.secrets.read();
        let current = address_mac(&secrets.current.bytes, src);
        let previous = secrets
            .previous
            .as_ref()
            .filter(|(_, retired_at)| retired_at.elapsed() <= self.latency)
            .map(|(secret, _)| address_mac(&secret.bytes, src));
        (current, previous)
    }
}

fn rotate_locked(secrets: &mut SecretPair) {
    let retired = std::mem::replace(&mut secrets.current, AddressSecret::fresh());
    secrets.previous = Some((retired, Instant::now()));
}

/// Key under which initiators MAC1 their handshake messages to this device.
pub fn mac1_key_for(static_public: &[u8; 32]) -> [u8; 32] {
    derive_key(MAC1_KEY_LABEL, static_public)
}

fn reply_key_for(static_public: &[u8; 32]) -> [u8; 32] {
    derive_key(REPLY_KEY_LABEL, static_public)
}

fn derive_key(label: &[u8], static_public: &[u8; 32]) -> [u8; 32] {
    let digest = Sha3_256::new()
        .chain_update(label)
        .chain_update(static_public)
        .finalize();
    digest.into()
}

fn keyed_mac16(key: &[u8], data: &[u8]) -> [u8; MAC_LEN] {
    let mut mac = <CookieMac as Mac>::new_from_slice(key).expect("mac init");
    mac.update(data);
    let digest = mac.finalize().into_bytes();
    digest[..MAC_LEN].try_into().unwrap()
}

fn address_mac(secret: &[u8; 32], src: SocketAddr) -> [u8; COOKIE_LEN] {
    let mut mac = <CookieMac as Mac>::new_from_slice(secret).expect("mac init");
    match src.ip() {
        IpAddr::V4(v4) => mac.update(&v4.octets()),
        IpAddr::V6(v6) => mac.update(&v6.octets()),
    }
    mac.update(&src.port().to_be_bytes());
    let digest = mac.finalize().into_bytes();
    digest[..COOKIE_LEN].try_into().unwrap()
}

/// Apply MAC1, and MAC2 when a live cookie is supplied, to an outbound
/// handshake message in place. Returns the MAC1 that was written so the
/// sender can record it for cookie-reply authentication.
pub fn seal_macs(
    msg: &mut [u8],
    mac1_key: &[u8; 32],
    cookie: Option<&[u8; COOKIE_LEN]>,
) -> Option<[u8; MAC_LEN]> {
    if handshake_macs(msg).is_none() {
        return None;
    }
    let len = msg.len();
    let mac1 = keyed_mac16(mac1_key, &msg[..len - 2 * MAC_LEN]);
    msg[len - 2 * MAC_LEN..len - MAC_LEN].copy_from_slice(&mac1);
    if let Some(cookie) = cookie {
        let mac2 = keyed_mac16(cookie, &msg[..len - MAC_LEN]);
        msg[len - MAC_LEN..].copy_from_slice(&mac2);
    }
    Some(mac1)
}

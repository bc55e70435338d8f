//! Authenticated encryption of serialized session bytes.
//!
//! Every sealed payload is bound to a purpose string. The AES-256-GCM key is derived per purpose
//! with HKDF-SHA256 from the master [`Key`], and the purpose is also authenticated as associated
//! data, so a payload sealed for one purpose never opens under another.

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use hkdf::Hkdf;
use sha2::Sha256;
use tower_cookies::Key;

use crate::error::SealError;

/// Purpose label for session cookies.
pub const SESSION_PURPOSE: &str = "Session Data";

const SEAL_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KDF_SALT: &[u8] = b"tower-sessions-cookie-jar/seal/v1";

/// Seals and opens bytes for a given purpose.
///
/// `open` must fail, returning no partial output, for any payload that was altered or sealed for
/// a different purpose or key.
pub trait Sealer: fmt::Debug + Clone + Send + Sync + 'static {
    fn seal(&self, plaintext: &[u8], purpose: &str) -> Result<Vec<u8>, SealError>;
    fn open(&self, sealed: &[u8], purpose: &str) -> Result<Vec<u8>, SealError>;
}

/// AES-256-GCM sealer with a primary key and any number of retired keys.
///
/// Only the primary key seals. Retired keys still open payloads sealed before a rotation; once a
/// retired key is dropped, cookies sealed under it no longer open.
#[derive(Clone)]
pub struct AeadSealer {
    primary: Key,
    retired: Vec<Key>,
}

impl AeadSealer {
    pub fn new(key: Key) -> Self {
        Self {
            primary: key,
            retired: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_retired_key(mut self, key: Key) -> Self {
        self.retired.push(key);
        self
    }

    fn cipher(key: &Key, purpose: &str) -> Result<Aes256Gcm, SealError> {
        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), key.master());
        let mut okm = [0u8; 32];
        hk.expand(purpose.as_bytes(), &mut okm)
            .map_err(|err| SealError::KeyUnavailable(err.to_string()))?;
        Aes256Gcm::new_from_slice(&okm).map_err(|err| SealError::KeyUnavailable(err.to_string()))
    }
}

fn associated_data(purpose: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(1 + purpose.len());
    aad.push(SEAL_VERSION);
    aad.extend_from_slice(purpose.as_bytes());
    aad
}

impl Sealer for AeadSealer {
    fn seal(&self, plaintext: &[u8], purpose: &str) -> Result<Vec<u8>, SealError> {
        let cipher = Self::cipher(&self.primary, purpose)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let aad = associated_data(purpose);
        let ciphertext = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|_| SealError::Encrypt)?;

        let mut sealed = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        sealed.push(SEAL_VERSION);
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, sealed: &[u8], purpose: &str) -> Result<Vec<u8>, SealError> {
        let Some((&version, rest)) = sealed.split_first() else {
            return Err(SealError::Malformed);
        };
        if version != SEAL_VERSION || rest.len() < NONCE_LEN + TAG_LEN {
            return Err(SealError::Malformed);
        }

        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce);
        let aad = associated_data(purpose);

        for key in std::iter::once(&self.primary).chain(&self.retired) {
            let cipher = Self::cipher(key, purpose)?;
            let payload = Payload {
                msg: ciphertext,
                aad: &aad,
            };
            if let Ok(plaintext) = cipher.decrypt(nonce, payload) {
                return Ok(plaintext);
            }
        }

        Err(SealError::Unauthenticated)
    }
}

impl fmt::Debug for AeadSealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadSealer")
            .field("retired_keys", &self.retired.len())
            .finish_non_exhaustive()
    }
}

//! Opaque, tamper-evident state tokens.
//!
//! A token is the JSON state sealed with AES-256-GCM under a key derived
//! from the configured secret:
//!
//! ```text
//! base64url(nonce) "." base64url(ciphertext) "." base64url(tag)
//! ```
//!
//! All three segments are unpadded. Every encode draws a fresh 96-bit
//! nonce, so encoding the same state twice yields different tokens.

use crate::state::SimulationState;
use aes_gcm::aead::{AeadInPlace, KeyInit, Nonce, Tag};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Errors from sealing or opening a state token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid state token format: expected 3 segments, found {0}")]
    Format(usize),

    #[error("Invalid state token encoding: {0}")]
    Encoding(String),

    #[error("State token failed authentication")]
    Tampered,

    #[error("State token payload is not a valid state: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("Failed to serialize state: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to seal state token")]
    Seal,
}

/// Seals and opens state tokens under one key.
#[derive(Clone)]
pub struct TokenCodec {
    cipher: Aes256Gcm,
}

impl TokenCodec {
    /// Derive the key as SHA-256 of `secret`.
    pub fn new(secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    pub fn encode(&self, state: &SimulationState) -> Result<String, TokenError> {
        let mut buffer = serde_json::to_vec(state).map_err(TokenError::Encode)?;
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::<Aes256Gcm>::from_slice(&nonce_bytes);

        let tag = self
            .cipher
            .encrypt_in_place_detached(nonce, b"", &mut buffer)
            .map_err(|_| TokenError::Seal)?;

        Ok(format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(nonce_bytes),
            URL_SAFE_NO_PAD.encode(&buffer),
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }

    /// Checks run in order: segment count, base64url, nonce and tag
    /// lengths, authentication, JSON.
    pub fn decode(&self, token: &str) -> Result<SimulationState, TokenError> {
        let segments: Vec<&str> = token.trim().split('.').collect();
        let [nonce, payload, tag] = segments.as_slice() else {
            return Err(TokenError::Format(segments.len()));
        };

        let nonce = decode_segment("nonce", nonce)?;
        let mut payload = decode_segment("payload", payload)?;
        let tag = decode_segment("tag", tag)?;

        if nonce.len() != NONCE_LEN {
            return Err(TokenError::Encoding(format!(
                "nonce is {} bytes, expected {NONCE_LEN}",
                nonce.len()
            )));
        }
        if tag.len() != TAG_LEN {
            return Err(TokenError::Encoding(format!(
                "tag is {} bytes, expected {TAG_LEN}",
                tag.len()
            )));
        }

        self.cipher
            .decrypt_in_place_detached(
                Nonce::<Aes256Gcm>::from_slice(&nonce),
                b"",
                &mut payload,
                Tag::<Aes256Gcm>::from_slice(&tag),
            )
            .map_err(|_| TokenError::Tampered)?;

        serde_json::from_slice(&payload).map_err(TokenError::Payload)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenCodec")
    }
}

fn decode_segment(name: &str, segment: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Encoding(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new("unit-test-secret")
    }

    fn split(token: &str) -> Vec<Vec<u8>> {
        token
            .split('.')
            .map(|segment| URL_SAFE_NO_PAD.decode(segment).unwrap())
            .collect()
    }

    fn join(parts: &[Vec<u8>]) -> String {
        parts
            .iter()
            .map(|bytes| URL_SAFE_NO_PAD.encode(bytes))
            .collect::<Vec<_>>()
            .join(".")
    }

    #[test]
    fn test_round_trip() {
        let mut state = SimulationState::new();
        state.severity_score = 38.800000000000004;
        state.elapsed_minutes = 6;
        state.infusions.antibiotic.start(0, Some(30));

        let token = codec().encode(&state).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert!(!token.contains('='));
        assert_eq!(codec().decode(&token).unwrap(), state);
    }

    #[test]
    fn test_nonce_is_fresh_per_encode() {
        let state = SimulationState::new();
        let a = codec().encode(&state).unwrap();
        let b = codec().encode(&state).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_any_flipped_ciphertext_byte_is_detected() {
        let token = codec().encode(&SimulationState::new()).unwrap();
        let parts = split(&token);

        for segment in 0..3 {
            for index in 0..parts[segment].len() {
                let mut tampered = parts.clone();
                tampered[segment][index] ^= 0x01;
                let err = codec().decode(&join(&tampered)).unwrap_err();
                assert!(
                    matches!(err, TokenError::Tampered),
                    "segment {segment} byte {index}: {err}"
                );
            }
        }
    }

    #[test]
    fn test_wrong_secret_is_tampered() {
        let token = codec().encode(&SimulationState::new()).unwrap();
        let err = TokenCodec::new("other").decode(&token).unwrap_err();
        assert!(matches!(err, TokenError::Tampered));
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = codec();
        assert!(matches!(codec.decode("abc"), Err(TokenError::Format(1))));
        assert!(matches!(codec.decode("a.b.c.d"), Err(TokenError::Format(4))));
        assert!(matches!(codec.decode("!!.AA.AA"), Err(TokenError::Encoding(_))));

        let token = codec.encode(&SimulationState::new()).unwrap();
        let mut parts = split(&token);
        parts[0].truncate(8);
        assert!(matches!(
            codec.decode(&join(&parts)),
            Err(TokenError::Encoding(_))
        ));

        let mut parts = split(&token);
        parts[2].push(0);
        assert!(matches!(
            codec.decode(&join(&parts)),
            Err(TokenError::Encoding(_))
        ));
    }

    #[test]
    fn test_authentic_non_state_payload() {
        let codec = codec();
        let mut buffer = b"{\"hello\":1}".to_vec();
        let nonce_bytes = [7u8; NONCE_LEN];
        let tag = codec
            .cipher
            .encrypt_in_place_detached(Nonce::<Aes256Gcm>::from_slice(&nonce_bytes), b"", &mut buffer)
            .unwrap();
        let token = join(&[nonce_bytes.to_vec(), buffer, tag.to_vec()]);
        assert!(matches!(codec.decode(&token), Err(TokenError::Payload(_))));
    }
}

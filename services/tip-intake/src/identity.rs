// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Pseudonymous submitter tokens.
//!
//! A token is the AES-256-GCM encryption of the submitter's source address
//! and user agent. It is minted once, handed to the client (cookie or
//! header) and presented on later submissions. The anonymous ID shown next
//! to tips is a hash of the ciphertext, so it is stable exactly as long as
//! the client keeps the same token.
//!
//! Token layout:
//!   [12 bytes: random nonce]
//!   [N bytes:  AES-256-GCM ciphertext (JSON metadata + 16-byte tag)]

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::debug;

/// AES-256 key size (bytes).
pub const KEY_LEN: usize = 32;
/// AES-GCM nonce size (bytes).
pub const NONCE_LEN: usize = 12;
/// GCM authentication tag size (bytes).
pub const TAG_LEN: usize = 16;
/// Prefix of every anonymous ID.
pub const ANON_ID_PREFIX: &str = "user_";

/// Hash bytes kept for the anonymous ID (12 hex characters).
const ANON_ID_BYTES: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("encryption key is not configured")]
    MissingKey,

    #[error("encryption key must be 32 bytes (64 hex characters or 32 raw bytes), got {0} bytes")]
    InvalidKey(usize),

    #[error("token is not valid base64")]
    InvalidEncoding,

    #[error("token too short: need at least {min} bytes, got {got}")]
    TooShort { min: usize, got: usize },

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed: malformed token or rotated key")]
    DecryptionFailed,

    #[error("submitter metadata is malformed: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Raw submitter metadata sealed inside a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitterMetadata {
    pub source_address: String,
    pub user_agent: String,
    pub issued_at: DateTime<Utc>,
}

/// Opaque client-held credential and the anonymous ID derived from it.
#[derive(Clone, PartialEq, Eq)]
pub struct SubmitterToken {
    ciphertext: Vec<u8>,
    anon_id: String,
}

impl SubmitterToken {
    /// Wrap raw token bytes, deriving the anonymous ID.
    pub fn from_ciphertext(ciphertext: Vec<u8>) -> Self {
        let anon_id = derive_anon_id(&ciphertext);
        Self {
            ciphertext,
            anon_id,
        }
    }

    /// Decode the client-facing form (URL-safe base64, no padding).
    pub fn decode(encoded: &str) -> Result<Self, IdentityError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|_| IdentityError::InvalidEncoding)?;
        Ok(Self::from_ciphertext(bytes))
    }

    /// Client-facing form, safe for cookies and headers.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.ciphertext)
    }

    /// Standard base64 of the ciphertext, stored on tips for later reversal.
    pub fn encrypted_metadata(&self) -> String {
        STANDARD.encode(&self.ciphertext)
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn anon_id(&self) -> &str {
        &self.anon_id
    }
}

impl fmt::Debug for SubmitterToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitterToken")
            .field("anon_id", &self.anon_id)
            .finish_non_exhaustive()
    }
}

/// A token resolved for one request.
#[derive(Debug, Clone)]
pub struct ResolvedSubmitter {
    pub token: SubmitterToken,
    /// True when the client presented no usable token and a new one was minted.
    pub minted: bool,
}

/// `"user_" + hex(SHA-256(ciphertext))[..12]`.
pub fn derive_anon_id(ciphertext: &[u8]) -> String {
    let digest = Sha256::digest(ciphertext);
    format!("{}{}", ANON_ID_PREFIX, hex::encode(&digest[..ANON_ID_BYTES]))
}

/// Mints, resolves and reverses submitter tokens under one process-wide key.
#[derive(Clone)]
pub struct IdentityManager {
    cipher: Aes256Gcm,
}

impl IdentityManager {
    /// Create a manager from a raw 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self, IdentityError> {
        if key.len() != KEY_LEN {
            return Err(IdentityError::InvalidKey(key.len()));
        }
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|_| IdentityError::InvalidKey(key.len()))?;
        Ok(Self { cipher })
    }

    /// Create a manager from configured key material: 64 hex characters or
    /// exactly 32 raw bytes.
    pub fn from_key_material(material: &str) -> Result<Self, IdentityError> {
        let material = material.trim();
        if material.is_empty() {
            return Err(IdentityError::MissingKey);
        }
        if material.len() == KEY_LEN * 2 {
            if let Ok(bytes) = hex::decode(material) {
                return Self::new(&bytes);
            }
        }
        Self::new(material.as_bytes())
    }

    /// Seal the submitter's metadata into a fresh token.
    pub fn mint_token(
        &self,
        source_address: &str,
        user_agent: &str,
    ) -> Result<SubmitterToken, IdentityError> {
        let metadata = SubmitterMetadata {
            source_address: source_address.to_string(),
            user_agent: user_agent.to_string(),
            issued_at: Utc::now(),
        };
        let plaintext = serde_json::to_vec(&metadata)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = self
            .cipher
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|_| IdentityError::EncryptionFailed)?;

        let mut ciphertext = Vec::with_capacity(NONCE_LEN + sealed.len());
        ciphertext.extend_from_slice(&nonce_bytes);
        ciphertext.extend_from_slice(&sealed);

        Ok(SubmitterToken::from_ciphertext(ciphertext))
    }

    /// Recover the metadata sealed in a token. Administrative use only.
    pub fn reverse(&self, ciphertext: &[u8]) -> Result<SubmitterMetadata, IdentityError> {
        let min = NONCE_LEN + TAG_LEN;
        if ciphertext.len() < min {
            return Err(IdentityError::TooShort {
                min,
                got: ciphertext.len(),
            });
        }

        let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| IdentityError::DecryptionFailed)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Reuse the presented token when it opens under the current key,
    /// otherwise mint a new one.
    pub fn resolve(
        &self,
        presented: Option<&str>,
        source_address: &str,
        user_agent: &str,
    ) -> Result<ResolvedSubmitter, IdentityError> {
        if let Some(encoded) = presented.filter(|t| !t.trim().is_empty()) {
            match SubmitterToken::decode(encoded)
                .and_then(|token| self.reverse(token.ciphertext()).map(|_| token))
            {
                Ok(token) => {
                    return Ok(ResolvedSubmitter {
                        token,
                        minted: false,
                    })
                }
                Err(err) => debug!(error = %err, "Presented token unusable, minting a new one"),
            }
        }

        let token = self.mint_token(source_address, user_agent)?;
        debug!(anon_id = %token.anon_id(), "Minted submitter token");
        Ok(ResolvedSubmitter {
            token,
            minted: true,
        })
    }
}

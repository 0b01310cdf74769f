//! Room Login Token Issuance
//!
//! Tokens handed to the browser for joining an RTC room are sealed with
//! AES-256-GCM under the server secret and wrapped in a fixed binary envelope:
//!
//! ```text
//! expire (i64 BE) | nonce_len (u16 BE) | nonce | ct_len (u16 BE) | ciphertext ‖ tag | mode (u8)
//! ```
//!
//! The envelope is base64 encoded and prefixed with the two character version
//! tag [`TOKEN_VERSION`]. The media layer opens the token with the same secret,
//! so the layout here must stay byte-for-byte stable.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{ConfigError, CredentialError, CryptoError};

/// Version tag prefixed to every encoded token.
pub const TOKEN_VERSION: &str = "04";
/// Required secret length for AES-256.
pub const KEY_LEN: usize = 32;
/// Length of the per-token cipher nonce.
pub const NONCE_LEN: usize = 12;
/// Length of the GCM authentication tag appended to the ciphertext.
pub const TAG_LEN: usize = 16;
/// Envelope mode byte for AES-GCM.
pub const MODE_AES_GCM: u8 = 1;

/// The sealed token descriptor.
///
/// Field order is part of the wire contract: the JSON is produced by `serde`
/// in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub app_id: u32,
    pub user_id: String,
    /// Replay padding, unrelated to the cipher nonce.
    pub nonce: i32,
    pub ctime: i64,
    pub expire: i64,
    /// Reserved, always empty today.
    pub payload: String,
}

/// Decoded binary envelope of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub expire: i64,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub mode: u8,
}

impl Envelope {
    /// Packs the envelope into its wire layout.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        let nonce_len = u16::try_from(self.nonce.len())
            .map_err(|_| CryptoError::MalformedEnvelope("nonce too long"))?;
        let ct_len = u16::try_from(self.ciphertext.len())
            .map_err(|_| CryptoError::MalformedEnvelope("ciphertext too long"))?;

        let mut buf = Vec::with_capacity(8 + 2 + self.nonce.len() + 2 + self.ciphertext.len() + 1);
        buf.extend_from_slice(&self.expire.to_be_bytes());
        buf.extend_from_slice(&nonce_len.to_be_bytes());
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&ct_len.to_be_bytes());
        buf.extend_from_slice(&self.ciphertext);
        buf.push(self.mode);
        Ok(buf)
    }

    /// Parses the wire layout. Truncated input and trailing bytes are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let mut rest = bytes;

        let expire = i64::from_be_bytes(take_array(&mut rest, "truncated expiry")?);
        let nonce_len = u16::from_be_bytes(take_array(&mut rest, "truncated nonce length")?);
        let nonce = take(&mut rest, nonce_len as usize, "truncated nonce")?.to_vec();
        let ct_len = u16::from_be_bytes(take_array(&mut rest, "truncated ciphertext length")?);
        let ciphertext = take(&mut rest, ct_len as usize, "truncated ciphertext")?.to_vec();
        let [mode] = take_array(&mut rest, "missing mode byte")?;

        if !rest.is_empty() {
            return Err(CryptoError::MalformedEnvelope("trailing bytes"));
        }

        Ok(Self {
            expire,
            nonce,
            ciphertext,
            mode,
        })
    }
}

fn take<'a>(rest: &mut &'a [u8], n: usize, what: &'static str) -> Result<&'a [u8], CryptoError> {
    let (head, tail) = rest
        .split_at_checked(n)
        .ok_or(CryptoError::MalformedEnvelope(what))?;
    *rest = tail;
    Ok(head)
}

fn take_array<const N: usize>(
    rest: &mut &[u8],
    what: &'static str,
) -> Result<[u8; N], CryptoError> {
    let head = take(rest, N, what)?;
    head.try_into()
        .map_err(|_| CryptoError::MalformedEnvelope(what))
}

/// Seals and opens room login tokens for a single application.
///
/// The issuer is built once from provisioned configuration; the secret is
/// consumed into the cipher and never stored as text.
#[derive(Clone)]
pub struct TokenIssuer {
    app_id: u32,
    cipher: Aes256Gcm,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Creates an issuer, validating the app id and the secret length up front.
    pub fn new(app_id: u32, secret: &str) -> Result<Self, ConfigError> {
        if app_id == 0 {
            return Err(ConfigError::MissingAppId);
        }
        if secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        let cipher =
            Aes256Gcm::new_from_slice(secret.as_bytes()).map_err(|_| {
                ConfigError::InvalidSecretLength {
                    expected: KEY_LEN,
                    actual: secret.len(),
                }
            })?;
        Ok(Self { app_id, cipher })
    }

    pub fn app_id(&self) -> u32 {
        self.app_id
    }

    /// Issues a token for `subject_id`, valid for `ttl_seconds` from now.
    pub fn issue(&self, subject_id: &str, ttl_seconds: i64) -> Result<String, CredentialError> {
        self.issue_at(subject_id, ttl_seconds, Utc::now().timestamp())
    }

    /// Issues a token as if the current time were `now` (unix seconds).
    pub fn issue_at(
        &self,
        subject_id: &str,
        ttl_seconds: i64,
        now: i64,
    ) -> Result<String, CredentialError> {
        if subject_id.is_empty() {
            return Err(ConfigError::MissingSubject.into());
        }
        let expire = now
            .checked_add(ttl_seconds)
            .filter(|_| ttl_seconds > 0)
            .ok_or(ConfigError::InvalidTtl(ttl_seconds))?;

        let claims = TokenClaims {
            app_id: self.app_id,
            user_id: subject_id.to_string(),
            nonce: rand::random::<i32>(),
            ctime: now,
            expire,
            payload: String::new(),
        };
        let plaintext = serde_json::to_vec(&claims).map_err(CryptoError::Claims)?;

        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|_| CryptoError::Encrypt)?;

        let envelope = Envelope {
            expire: claims.expire,
            nonce: nonce_bytes.to_vec(),
            ciphertext,
            mode: MODE_AES_GCM,
        };
        let token = format!("{TOKEN_VERSION}{}", BASE64.encode(envelope.to_bytes()?));

        debug!(
            app_id = self.app_id,
            user_id = subject_id,
            expire = claims.expire,
            "Issued room token"
        );
        Ok(token)
    }

    /// Opens and validates a token against the current time.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, CryptoError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Opens and validates a token as if the current time were `now`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<TokenClaims, CryptoError> {
        let encoded =
            token
                .strip_prefix(TOKEN_VERSION)
                .ok_or(CryptoError::UnsupportedVersion {
                    expected: TOKEN_VERSION,
                })?;
        let bytes = BASE64.decode(encoded)?;
        self.open_envelope(&bytes, now)
    }

    /// Validates an already decoded envelope.
    pub fn open_envelope(&self, bytes: &[u8], now: i64) -> Result<TokenClaims, CryptoError> {
        let envelope = Envelope::from_bytes(bytes)?;

        if envelope.mode != MODE_AES_GCM {
            return Err(CryptoError::UnsupportedMode(envelope.mode));
        }
        if envelope.nonce.len() != NONCE_LEN {
            return Err(CryptoError::MalformedEnvelope("unexpected nonce length"));
        }
        if envelope.ciphertext.len() < TAG_LEN {
            return Err(CryptoError::MalformedEnvelope("ciphertext shorter than tag"));
        }

        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(&envelope.nonce),
                envelope.ciphertext.as_slice(),
            )
            .map_err(|_| CryptoError::TagMismatch)?;
        let claims: TokenClaims =
            serde_json::from_slice(&plaintext).map_err(CryptoError::Claims)?;

        if claims.app_id != self.app_id {
            return Err(CryptoError::AppMismatch {
                expected: self.app_id,
                actual: claims.app_id,
            });
        }
        // The envelope expiry sits outside the AEAD, so it must agree with the sealed one.
        if claims.expire != envelope.expire {
            return Err(CryptoError::ExpiryMismatch {
                envelope: envelope.expire,
                sealed: claims.expire,
            });
        }
        if now > claims.expire {
            return Err(CryptoError::Expired {
                expired_at: claims.expire,
                now,
            });
        }
        Ok(claims)
    }
}

/// One-shot issuance from raw provisioned values.
pub fn issue_token(
    app_id: u32,
    subject_id: &str,
    secret: &str,
    ttl_seconds: i64,
) -> Result<String, CredentialError> {
    TokenIssuer::new(app_id, secret)?.issue(subject_id, ttl_seconds)
}

/// One-shot verification, the inverse of [`issue_token`].
pub fn verify_token(
    app_id: u32,
    token: &str,
    secret: &str,
    now: i64,
) -> Result<TokenClaims, CredentialError> {
    Ok(TokenIssuer::new(app_id, secret)?.verify_at(token, now)?)
}

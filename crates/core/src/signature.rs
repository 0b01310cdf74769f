//! Request signing for the agent-management API.
//!
//! Each outbound call carries `Signature = hex(D(app_id ‖ nonce ‖ secret ‖ timestamp))`.
//! The remote verifier currently expects MD5 for `D`; the digest is a type
//! parameter so a different verifier can be targeted without touching callers.

use md5::{Digest, Md5};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::marker::PhantomData;

/// Signature version sent alongside every signed request.
pub const SIGNATURE_VERSION: &str = "2.0";

/// Computes the request signature with the default (MD5) digest.
pub fn sign_request(app_id: u32, nonce: &str, secret: &str, timestamp: i64) -> String {
    sign_request_with::<Md5>(app_id, nonce, secret, timestamp)
}

/// Computes the request signature with an arbitrary digest.
pub fn sign_request_with<D: Digest>(
    app_id: u32,
    nonce: &str,
    secret: &str,
    timestamp: i64,
) -> String {
    let mut hasher = D::new();
    hasher.update(app_id.to_string().as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(secret.as_bytes());
    hasher.update(timestamp.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// A per-request random nonce, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureNonce(String);

impl SignatureNonce {
    /// Draws 8 random bytes (16 hex characters).
    pub fn generate() -> Self {
        let bytes: [u8; 8] = rand::random();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The query parameters attached to every management API call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct SignedQuery {
    pub action: String,
    pub app_id: u32,
    pub signature_nonce: String,
    pub timestamp: i64,
    pub signature: String,
    pub signature_version: &'static str,
}

/// Signs management API requests for one application.
pub struct RequestSigner<D = Md5> {
    app_id: u32,
    secret: SecretString,
    _digest: PhantomData<fn() -> D>,
}

impl<D> std::fmt::Debug for RequestSigner<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("app_id", &self.app_id)
            .field("secret", &self.secret)
            .finish()
    }
}

impl RequestSigner<Md5> {
    pub fn new(app_id: u32, secret: SecretString) -> Self {
        Self::with_digest(app_id, secret)
    }
}

impl<D: Digest> RequestSigner<D> {
    pub fn with_digest(app_id: u32, secret: SecretString) -> Self {
        Self {
            app_id,
            secret,
            _digest: PhantomData,
        }
    }

    pub fn app_id(&self) -> u32 {
        self.app_id
    }

    pub fn sign(&self, nonce: &str, timestamp: i64) -> String {
        sign_request_with::<D>(self.app_id, nonce, self.secret.expose_secret(), timestamp)
    }

    /// Builds the full signed query for `action` with a fresh nonce.
    pub fn signed_query(&self, action: &str, timestamp: i64) -> SignedQuery {
        let nonce = SignatureNonce::generate();
        let signature = self.sign(nonce.as_str(), timestamp);
        SignedQuery {
            action: action.to_string(),
            app_id: self.app_id,
            signature_nonce: nonce.0,
            timestamp,
            signature,
            signature_version: SIGNATURE_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Sha256;

    const APP_ID: u32 = 1_234_567_890;
    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_sign_request_known_vector() {
        assert_eq!(
            sign_request(1, "abc", SECRET, 1_700_000_000),
            "b21523dd5f258d6c5e955f5fdb73fffe"
        );
    }

    #[test]
    fn test_sign_request_is_md5_hex() {
        let sig = sign_request(APP_ID, "deadbeefdeadbeef", SECRET, 1_700_000_000);
        assert_eq!(sig.len(), 32);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_sign_request_is_deterministic() {
        let a = sign_request(APP_ID, "deadbeefdeadbeef", SECRET, 1_700_000_000);
        let b = sign_request(APP_ID, "deadbeefdeadbeef", SECRET, 1_700_000_000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_each_input_changes_signature() {
        let base = sign_request(APP_ID, "deadbeefdeadbeef", SECRET, 1_700_000_000);
        assert_ne!(base, sign_request(APP_ID + 1, "deadbeefdeadbeef", SECRET, 1_700_000_000));
        assert_ne!(base, sign_request(APP_ID, "deadbeefdeadbeee", SECRET, 1_700_000_000));
        assert_ne!(
            base,
            sign_request(APP_ID, "deadbeefdeadbeef", "1123456789abcdef0123456789abcdef", 1_700_000_000)
        );
        assert_ne!(base, sign_request(APP_ID, "deadbeefdeadbeef", SECRET, 1_700_000_001));
    }

    #[test]
    fn test_distinct_timestamps_do_not_collide() {
        let mut seen = std::collections::HashSet::new();
        for ts in 1_700_000_000..1_700_010_000 {
            assert!(seen.insert(sign_request(APP_ID, "deadbeefdeadbeef", SECRET, ts)));
        }
    }

    #[test]
    fn test_pluggable_digest() {
        let sig = sign_request_with::<Sha256>(APP_ID, "deadbeefdeadbeef", SECRET, 1_700_000_000);
        assert_eq!(sig.len(), 64);

        let signer = RequestSigner::<Sha256>::with_digest(APP_ID, SecretString::from(SECRET.to_string()));
        assert_eq!(signer.sign("deadbeefdeadbeef", 1_700_000_000), sig);
    }

    #[test]
    fn test_signature_nonce_shape() {
        let a = SignatureNonce::generate();
        let b = SignatureNonce::generate();
        assert_eq!(a.as_str().len(), 16);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_signed_query_matches_signer() {
        let signer = RequestSigner::new(APP_ID, SecretString::from(SECRET.to_string()));
        let query = signer.signed_query("CreateAgentInstance", 1_700_000_000);

        assert_eq!(query.action, "CreateAgentInstance");
        assert_eq!(query.app_id, APP_ID);
        assert_eq!(query.signature_version, "2.0");
        assert_eq!(
            query.signature,
            sign_request(APP_ID, &query.signature_nonce, SECRET, 1_700_000_000)
        );

        let json = serde_json::to_value(&query).unwrap();
        for key in [
            "Action",
            "AppId",
            "SignatureNonce",
            "Timestamp",
            "Signature",
            "SignatureVersion",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let signer = RequestSigner::new(APP_ID, SecretString::from(SECRET.to_string()));
        assert!(!format!("{signer:?}").contains(SECRET));
    }
}

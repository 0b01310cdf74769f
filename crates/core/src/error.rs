//! Error types shared by the credential and transcript modules.

use thiserror::Error;

/// Missing or unusable identity/secret material.
///
/// Always raised before any cryptographic work starts, so a misconfigured
/// deployment never produces tokens the media layer cannot open.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("app id must be a positive integer")]
    MissingAppId,
    #[error("secret is empty")]
    MissingSecret,
    #[error("secret must be exactly {expected} bytes, got {actual}")]
    InvalidSecretLength { expected: usize, actual: usize },
    #[error("subject id is empty")]
    MissingSubject,
    #[error("token ttl must be positive, got {0}")]
    InvalidTtl(i64),
}

/// A token could not be sealed or was rejected on verification.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("unsupported token version, expected prefix {expected:?}")]
    UnsupportedVersion { expected: &'static str },
    #[error("token is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("malformed token envelope: {0}")]
    MalformedEnvelope(&'static str),
    #[error("unsupported cipher mode {0}")]
    UnsupportedMode(u8),
    #[error("encryption failed")]
    Encrypt,
    #[error("authentication tag mismatch")]
    TagMismatch,
    #[error("token claims are not valid: {0}")]
    Claims(#[source] serde_json::Error),
    #[error("token was issued for app {actual}, expected {expected}")]
    AppMismatch { expected: u32, actual: u32 },
    #[error("envelope expiry {envelope} does not match sealed expiry {sealed}")]
    ExpiryMismatch { envelope: i64, sealed: i64 },
    #[error("token expired at {expired_at}, now {now}")]
    Expired { expired_at: i64, now: i64 },
}

/// Failure of a single token issuance.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// A chunk event from the room channel could not be decoded.
///
/// Non-fatal: the reassembler reports it and keeps accepting chunks.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("chunk is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("chunk for command {cmd} has an invalid data block: {source}")]
    Data {
        cmd: i64,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::InvalidSecretLength {
                expected: 32,
                actual: 5
            }
            .to_string(),
            "secret must be exactly 32 bytes, got 5"
        );
        assert_eq!(
            ConfigError::MissingAppId.to_string(),
            "app id must be a positive integer"
        );
    }

    #[test]
    fn test_credential_error_is_transparent() {
        let err: CredentialError = ConfigError::MissingSecret.into();
        assert_eq!(err.to_string(), "secret is empty");

        let err: CredentialError = CryptoError::TagMismatch.into();
        assert_eq!(err.to_string(), "authentication tag mismatch");
    }
}

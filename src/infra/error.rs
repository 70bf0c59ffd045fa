//! Error types for key-store, envelope and session operations.
//! Every variant is terminal for the operation that raised it; nothing here is retried.

use thiserror::Error;

use crate::domain::session::Phase;

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Comprehensive error types for signing operations
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SigningError {
    #[error("Invalid key-store password")]
    InvalidPassword,

    #[error("Malformed PKCS#12 bundle: {0}")]
    MalformedBundle(String),

    #[error("No leaf certificate found in key-store")]
    NoCertificateFound,

    #[error("Malformed certificate: {0}")]
    MalformedCertificate(String),

    #[error("Digest size mismatch for {algorithm}: expected {expected} bytes, got {actual}")]
    DigestSizeMismatch {
        algorithm: String,
        expected: usize,
        actual: usize,
    },

    #[error("DER encoding failure: {0}")]
    EncodingFailure(String),

    #[error("Invalid session phase transition: cannot {attempted:#} while session is {current}")]
    InvalidPhaseTransition { current: Phase, attempted: Phase },

    #[error("Unsupported algorithm {oid} ({context})")]
    UnsupportedAlgorithm { oid: String, context: String },

    #[error("Signed attributes digest mismatch: remote digest {remote}, computed {computed}")]
    SignedAttributesDigestMismatch { remote: String, computed: String },

    #[error("Unknown signature policy: {0}")]
    UnknownPolicy(String),

    #[error("Remote service rejected the request: {0}")]
    RemoteRejected(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Cryptographic error: {0}")]
    CryptographicError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SigningError {
    /// Whether the failure came from a remote round-trip rather than local input.
    ///
    /// Only these failures may reasonably be retried, and only by the caller.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SigningError::NetworkError(_) | SigningError::RemoteRejected(_)
        )
    }
}

impl From<openssl::error::ErrorStack> for SigningError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        SigningError::CryptographicError(error.to_string())
    }
}

impl From<reqwest::Error> for SigningError {
    fn from(error: reqwest::Error) -> Self {
        SigningError::NetworkError(error.to_string())
    }
}

impl From<std::io::Error> for SigningError {
    fn from(error: std::io::Error) -> Self {
        SigningError::IoError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SigningError::DigestSizeMismatch {
            algorithm: "SHA-256".to_string(),
            expected: 32,
            actual: 20,
        };
        assert_eq!(
            error.to_string(),
            "Digest size mismatch for SHA-256: expected 32 bytes, got 20"
        );

        let error = SigningError::InvalidPhaseTransition {
            current: Phase::Prepared,
            attempted: Phase::Injected,
        };
        assert_eq!(
            error.to_string(),
            "Invalid session phase transition: cannot inject while session is prepared"
        );
    }

    #[test]
    fn test_remote_classification() {
        assert!(SigningError::NetworkError("timeout".into()).is_remote());
        assert!(SigningError::RemoteRejected("field locked".into()).is_remote());
        assert!(!SigningError::InvalidPassword.is_remote());
        assert!(!SigningError::EncodingFailure("x".into()).is_remote());
    }
}

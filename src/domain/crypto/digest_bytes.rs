use std::fmt;

use super::DigestAlgorithm;
use crate::infra::error::{SigningError, SigningResult};

/// Digest bytes paired with the algorithm that produced them.
///
/// Invariant: `bytes.len() == algorithm.digest_size()`.
#[derive(Clone, Eq, PartialEq)]
pub struct DigestBytes {
    algorithm: DigestAlgorithm,
    bytes: Box<[u8]>,
}

impl DigestBytes {
    /// Wrap externally supplied digest bytes.
    ///
    /// # Errors
    /// `DigestSizeMismatch` when the length differs from the algorithm's output size.
    pub fn new(algorithm: DigestAlgorithm, bytes: Vec<u8>) -> SigningResult<Self> {
        if bytes.len() != algorithm.digest_size() {
            return Err(SigningError::DigestSizeMismatch {
                algorithm: algorithm.name().to_string(),
                expected: algorithm.digest_size(),
                actual: bytes.len(),
            });
        }
        Ok(Self::from_trusted(algorithm, bytes))
    }

    /// Decode a hex digest (as returned by the preparation service).
    ///
    /// # Errors
    /// `InvalidInput` for malformed hex, `DigestSizeMismatch` for a wrong length.
    pub fn from_hex(algorithm: DigestAlgorithm, hex_digest: &str) -> SigningResult<Self> {
        let bytes = hex::decode(hex_digest.trim())
            .map_err(|e| SigningError::InvalidInput(format!("digest is not valid hex: {e}")))?;
        Self::new(algorithm, bytes)
    }

    pub(super) fn from_trusted(algorithm: DigestAlgorithm, bytes: Vec<u8>) -> Self {
        Self {
            algorithm,
            bytes: bytes.into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for DigestBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DigestBytes(algorithm={}, len={})",
            self.algorithm,
            self.bytes.len()
        )
    }
}

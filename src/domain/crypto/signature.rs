use std::fmt;

use super::DigestAlgorithm;

/// RSA PKCS#1 v1.5 signature over a `DigestInfo`.
#[derive(Clone, Eq, PartialEq)]
pub struct RawSignature {
    algorithm: DigestAlgorithm,
    bytes: Box<[u8]>,
}

impl RawSignature {
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm, bytes: Vec<u8>) -> Self {
        Self {
            algorithm,
            bytes: bytes.into_boxed_slice(),
        }
    }
    /// Digest algorithm named inside the signed `DigestInfo`.
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

impl fmt::Debug for RawSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RawSignature(algorithm={}, len={})",
            self.algorithm,
            self.bytes.len()
        )
    }
}

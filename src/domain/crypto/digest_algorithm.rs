//! Digest algorithms accepted for remote-prepared hashes.

use std::fmt;

use der::asn1::ObjectIdentifier;
use sha2::{Digest, Sha256, Sha384, Sha512};

use super::DigestBytes;
use crate::domain::oids;
use crate::infra::error::{SigningError, SigningResult};

/// SHA-2 digest algorithms with a fixed output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Resolve an algorithm from its OID.
    ///
    /// # Errors
    /// `UnsupportedAlgorithm` for anything outside the SHA-2 family, including
    /// recognised but retired digests such as SHA-1 and MD5.
    pub fn from_oid(oid: &ObjectIdentifier) -> SigningResult<Self> {
        [Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|algo| algo.oid() == *oid)
            .ok_or_else(|| SigningError::UnsupportedAlgorithm {
                oid: oid.to_string(),
                context: format!("digest algorithm ({})", oids::describe(oid)),
            })
    }

    /// Resolve from a dotted-decimal OID string as sent over the wire.
    ///
    /// # Errors
    /// `UnsupportedAlgorithm` when the string is not an OID or not a SHA-2 digest.
    pub fn from_oid_str(dotted: &str) -> SigningResult<Self> {
        let oid = ObjectIdentifier::new(dotted.trim()).map_err(|e| {
            SigningError::UnsupportedAlgorithm {
                oid: dotted.to_string(),
                context: format!("not a valid object identifier: {e}"),
            }
        })?;
        Self::from_oid(&oid)
    }

    #[must_use]
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            Self::Sha256 => oids::SHA256,
            Self::Sha384 => oids::SHA384,
            Self::Sha512 => oids::SHA512,
        }
    }

    /// Output size in bytes.
    #[must_use]
    pub fn digest_size(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Hash `data` locally.
    #[must_use]
    pub fn digest(self, data: &[u8]) -> DigestBytes {
        let bytes = match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        };
        DigestBytes::from_trusted(self, bytes)
    }

    /// Matching OpenSSL message digest, used only for verification.
    #[must_use]
    pub fn message_digest(self) -> openssl::hash::MessageDigest {
        match self {
            Self::Sha256 => openssl::hash::MessageDigest::sha256(),
            Self::Sha384 => openssl::hash::MessageDigest::sha384(),
            Self::Sha512 => openssl::hash::MessageDigest::sha512(),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//! PKCS#1 `DigestInfo` encoding.

use super::{DigestAlgorithm, DigestBytes};
use crate::domain::asn1::Node;
use crate::infra::error::{SigningError, SigningResult};

/// `DigestInfo ::= SEQUENCE { digestAlgorithm AlgorithmIdentifier, digest OCTET STRING }`
///
/// This is the exact input to RSA PKCS#1 v1.5 padding; signing it with the raw
/// private-key primitive is equivalent to hash-and-sign without a second hash.
#[must_use]
pub fn encode_digest_info(digest: &DigestBytes) -> Vec<u8> {
    Node::Sequence(vec![
        Node::algorithm_identifier(digest.algorithm().oid()),
        Node::OctetString(digest.as_slice().to_vec()),
    ])
    .encode()
}

/// Decode a `DigestInfo`, checking the algorithm and digest length.
///
/// # Errors
/// `EncodingFailure` for a structurally invalid value, `UnsupportedAlgorithm` or
/// `DigestSizeMismatch` for a valid structure with unacceptable content.
pub fn decode_digest_info(der: &[u8]) -> SigningResult<DigestBytes> {
    let node = Node::decode(der)?;
    let malformed = || SigningError::EncodingFailure("malformed DigestInfo".into());
    let fields = node.as_sequence().ok_or_else(malformed)?;
    let [algorithm, digest] = fields else {
        return Err(malformed());
    };
    let oid = algorithm
        .as_sequence()
        .and_then(|alg| alg.first())
        .and_then(Node::as_oid)
        .ok_or_else(malformed)?;
    let bytes = digest.as_octet_string().ok_or_else(malformed)?;
    DigestBytes::new(DigestAlgorithm::from_oid(&oid)?, bytes.to_vec())
}

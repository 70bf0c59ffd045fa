//! RSA signatures over digests computed elsewhere.
//!
//! The digest arrives already computed by the preparation service. Signing it with a
//! "hash then sign" API would hash it a second time and produce a signature over
//! the wrong value, so the signer pads a hand-built `DigestInfo` and applies the
//! raw private-key operation instead.

use der::asn1::ObjectIdentifier;
use openssl::pkey::{HasPublic, PKeyRef};
use openssl::rsa::Padding;

use crate::domain::crypto::{
    decode_digest_info, encode_digest_info, DigestAlgorithm, DigestBytes, RawSignature,
};
use crate::infra::error::{SigningError, SigningResult};
use crate::services::key_store::PrivateKeyHandle;

/// Produces and checks PKCS#1 v1.5 signatures over precomputed digests.
pub struct RawSigner;

impl RawSigner {
    /// Sign `digest`, which was produced by the algorithm named by `digest_algorithm_oid`.
    ///
    /// All input checks happen before the key is touched.
    ///
    /// # Errors
    /// - `UnsupportedAlgorithm` for a digest OID outside the SHA-2 family or a non-RSA key
    /// - `DigestSizeMismatch` when `digest` has the wrong length for the algorithm
    /// - `CryptographicError` when the RSA operation fails
    pub fn sign_digest(
        digest: &[u8],
        digest_algorithm_oid: &ObjectIdentifier,
        key: &PrivateKeyHandle,
    ) -> SigningResult<RawSignature> {
        let algorithm = DigestAlgorithm::from_oid(digest_algorithm_oid)?;
        let digest = DigestBytes::new(algorithm, digest.to_vec())?;
        Self::sign(&digest, key)
    }

    /// Sign an already validated digest.
    ///
    /// # Errors
    /// `UnsupportedAlgorithm` for a non-RSA key, `CryptographicError` when OpenSSL fails.
    pub fn sign(digest: &DigestBytes, key: &PrivateKeyHandle) -> SigningResult<RawSignature> {
        let rsa = key
            .pkey()
            .rsa()
            .map_err(|_| SigningError::UnsupportedAlgorithm {
                oid: format!("{:?}", key.pkey().id()),
                context: "private key type (only RSA keys are supported)".into(),
            })?;

        let digest_info = encode_digest_info(digest);
        let mut signature = vec![0u8; rsa.size() as usize];
        let written = rsa.private_encrypt(&digest_info, &mut signature, Padding::PKCS1)?;
        signature.truncate(written);

        log::debug!(
            "Signed {} DigestInfo ({} bytes) with {}-bit key -> {} byte signature",
            digest.algorithm(),
            digest_info.len(),
            key.bits(),
            signature.len()
        );

        Ok(RawSignature::new(digest.algorithm(), signature))
    }

    /// Check a PKCS#1 v1.5 signature against an expected digest.
    ///
    /// Recovers the signed `DigestInfo` with the public key and compares it field by
    /// field. A signature that does not open under the key yields `Ok(false)`.
    ///
    /// # Errors
    /// `UnsupportedAlgorithm` when the key is not RSA.
    pub fn verify_digest_signature<T: HasPublic>(
        signature: &[u8],
        expected: &DigestBytes,
        public_key: &PKeyRef<T>,
    ) -> SigningResult<bool> {
        let rsa = public_key
            .rsa()
            .map_err(|_| SigningError::UnsupportedAlgorithm {
                oid: format!("{:?}", public_key.id()),
                context: "public key type (only RSA keys are supported)".into(),
            })?;

        let mut recovered = vec![0u8; rsa.size() as usize];
        let Ok(len) = rsa.public_decrypt(signature, &mut recovered, Padding::PKCS1) else {
            return Ok(false);
        };
        recovered.truncate(len);

        Ok(decode_digest_info(&recovered).is_ok_and(|digest| digest == *expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::oids;
    use openssl::pkey::PKey;
    use openssl::rsa::Rsa;

    fn test_key() -> PrivateKeyHandle {
        let rsa = Rsa::generate(2048).unwrap();
        PrivateKeyHandle::new(PKey::from_rsa(rsa).unwrap())
    }

    #[test]
    fn test_wrong_size_rejected_before_signing() {
        let key = test_key();
        for len in [0usize, 20, 31, 33, 64] {
            let err = RawSigner::sign_digest(&vec![0u8; len], &oids::SHA256, &key).unwrap_err();
            assert!(
                matches!(err, SigningError::DigestSizeMismatch { expected: 32, actual, .. } if actual == len),
                "len {len}"
            );
        }
    }

    #[test]
    fn test_unsupported_digest_oid() {
        let key = test_key();
        let err = RawSigner::sign_digest(&[0u8; 20], &oids::SHA1, &key).unwrap_err();
        assert!(matches!(err, SigningError::UnsupportedAlgorithm { .. }));
    }

    #[test]
    fn test_sign_and_verify_sha384() {
        let key = test_key();
        let digest = DigestAlgorithm::Sha384.digest(b"document bytes");
        let signature = RawSigner::sign(&digest, &key).unwrap();
        assert_eq!(signature.as_slice().len(), 256);

        let public = PKey::public_key_from_der(&key.pkey().public_key_to_der().unwrap()).unwrap();
        assert!(RawSigner::verify_digest_signature(signature.as_slice(), &digest, &public).unwrap());

        let other = DigestAlgorithm::Sha384.digest(b"other bytes");
        assert!(!RawSigner::verify_digest_signature(signature.as_slice(), &other, &public).unwrap());
        assert!(!RawSigner::verify_digest_signature(&[0u8; 256], &digest, &public).unwrap());
    }

    #[test]
    fn test_key_handle_debug_is_redacted() {
        let key = test_key();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("bits=2048"));
        assert!(rendered.contains("redacted"));
    }
}

//! Raw RSA signing over externally computed digests.

mod common;

use openssl::hash::MessageDigest;
use openssl::sign::Verifier;
use pades_signer::domain::oids;
use pades_signer::{DigestAlgorithm, KeyStoreReader, RawSigner, SigningError};

#[test]
fn signature_over_hello_digest_verifies_against_the_message() {
    let pki = common::test_pki();
    let bundle = KeyStoreReader::open(&pki.pkcs12(common::PASSWORD), common::PASSWORD).unwrap();

    let digest = DigestAlgorithm::Sha256.digest(b"hello");
    let signature =
        RawSigner::sign_digest(digest.as_slice(), &oids::SHA256, bundle.private_key()).unwrap();
    assert_eq!(signature.as_slice().len(), 256);

    // A standard hash-then-verify over the original message proves the digest was
    // signed as-is and not hashed a second time.
    let mut verifier = Verifier::new(MessageDigest::sha256(), &pki.leaf_key).unwrap();
    verifier.update(b"hello").unwrap();
    assert!(verifier.verify(signature.as_slice()).unwrap());

    assert!(
        RawSigner::verify_digest_signature(signature.as_slice(), &digest, &pki.leaf_key).unwrap()
    );
    let other = DigestAlgorithm::Sha256.digest(b"goodbye");
    assert!(
        !RawSigner::verify_digest_signature(signature.as_slice(), &other, &pki.leaf_key).unwrap()
    );
}

#[test]
fn wrong_digest_length_is_rejected_before_signing() {
    let pki = common::test_pki();
    let bundle = KeyStoreReader::open(&pki.pkcs12(common::PASSWORD), common::PASSWORD).unwrap();

    for len in [0usize, 20, 31, 33, 48] {
        let err = RawSigner::sign_digest(&vec![0xAB; len], &oids::SHA256, bundle.private_key())
            .unwrap_err();
        assert!(
            matches!(
                err,
                SigningError::DigestSizeMismatch { expected: 32, actual, .. } if actual == len
            ),
            "length {len}: {err:?}"
        );
    }
}

#[test]
fn sha512_digest_verifies_with_sha512_verifier() {
    let pki = common::test_pki();
    let bundle = KeyStoreReader::open(&pki.pkcs12(common::PASSWORD), common::PASSWORD).unwrap();

    let digest = DigestAlgorithm::Sha512.digest(b"hello");
    let signature =
        RawSigner::sign_digest(digest.as_slice(), &oids::SHA512, bundle.private_key()).unwrap();

    let mut verifier = Verifier::new(MessageDigest::sha512(), &pki.leaf_key).unwrap();
    verifier.update(b"hello").unwrap();
    assert!(verifier.verify(signature.as_slice()).unwrap());
}

#[test]
fn unsupported_digest_oid() {
    let pki = common::test_pki();
    let bundle = KeyStoreReader::open(&pki.pkcs12(common::PASSWORD), common::PASSWORD).unwrap();
    let err = RawSigner::sign_digest(&[0u8; 16], &oids::MD5, bundle.private_key()).unwrap_err();
    assert!(matches!(
        err,
        SigningError::UnsupportedAlgorithm { oid, .. } if oid == "1.2.840.113549.2.5"
    ));
}

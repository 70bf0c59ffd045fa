//! PKCS#12 opening and scoped key acquisition.

mod common;

use pades_signer::{CertificateInspector, KeyStoreReader, SigningError};

#[test]
fn opens_leaf_key_and_chain() {
    let pki = common::test_pki();
    let bundle = KeyStoreReader::open(&pki.pkcs12(common::PASSWORD), common::PASSWORD).unwrap();

    assert_eq!(bundle.leaf_certificate().as_der(), pki.leaf_der().as_slice());
    assert!(bundle.private_key().is_rsa());
    assert_eq!(bundle.private_key().bits(), 2048);

    let mut chain: Vec<Vec<u8>> = bundle.chain().iter().map(|c| c.as_der().to_vec()).collect();
    let mut expected = pki.chain_der();
    chain.sort();
    expected.sort();
    assert_eq!(chain, expected);
}

#[test]
fn wrong_password_is_invalid_password() {
    let pki = common::test_pki();
    let bytes = pki.pkcs12(common::PASSWORD);
    assert!(matches!(
        KeyStoreReader::open(&bytes, "wrong-password"),
        Err(SigningError::InvalidPassword)
    ));
}

#[test]
fn legacy_encrypted_bundle_opens_with_correct_password() {
    let pki = common::test_pki();
    let bytes = pki.pkcs12_legacy("secret");

    let bundle = KeyStoreReader::open(&bytes, "secret").unwrap();
    assert_eq!(bundle.leaf_certificate().as_der(), pki.leaf_der().as_slice());
    assert_eq!(bundle.chain().len(), 2);
    assert!(bundle.private_key().is_rsa());

    assert!(matches!(
        KeyStoreReader::open(&bytes, "not-the-secret"),
        Err(SigningError::InvalidPassword)
    ));
}

#[test]
fn garbage_is_malformed_bundle() {
    assert!(matches!(
        KeyStoreReader::open(b"definitely not pkcs12", common::PASSWORD),
        Err(SigningError::MalformedBundle(_))
    ));
    assert!(matches!(
        KeyStoreReader::open(&[], common::PASSWORD),
        Err(SigningError::MalformedBundle(_))
    ));
}

#[test]
fn with_bundle_scopes_the_key() {
    let pki = common::test_pki();
    let bytes = pki.pkcs12(common::PASSWORD);

    let subject = KeyStoreReader::with_bundle(&bytes, common::PASSWORD, |bundle| {
        CertificateInspector::inspect(bundle.leaf_certificate().as_der())
            .map(|identity| identity.subject.to_string())
    })
    .unwrap();
    assert!(subject.contains("CN=MARIA SILVA:12345678901"));

    let err = KeyStoreReader::with_bundle::<(), _>(&bytes, common::PASSWORD, |_| {
        Err(SigningError::InvalidInput("caller failed".into()))
    })
    .unwrap_err();
    assert!(matches!(err, SigningError::InvalidInput(_)));

    let err = KeyStoreReader::with_bundle(&bytes, "nope", |_| Ok(())).unwrap_err();
    assert!(matches!(err, SigningError::InvalidPassword));
}

#[test]
fn open_file_reads_from_disk() {
    let pki = common::test_pki();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("signer.pfx");
    std::fs::write(&path, pki.pkcs12(common::PASSWORD)).unwrap();

    let bundle = KeyStoreReader::open_file(&path, common::PASSWORD).unwrap();
    assert_eq!(bundle.chain().len(), 2);

    assert!(matches!(
        KeyStoreReader::open_file(&dir.path().join("missing.pfx"), common::PASSWORD),
        Err(SigningError::IoError(_))
    ));
}

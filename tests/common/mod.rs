//! Shared fixtures: a throwaway three-level PKI and PKCS#12 bundles built with
//! OpenSSL at test time, plus an in-memory signature service.

#![allow(dead_code)]

use std::cell::RefCell;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Builder, X509Name, X509NameBuilder, X509};

use pades_signer::adapters::{
    CmsParameters, FinalizationService, Injection, PrepareOptions, PreparationService,
    PreparedDocument,
};
use pades_signer::{KeyStoreReader, SigningResult};

pub const PASSWORD: &str = "correct horse";
pub const LEAF_CN: &str = "MARIA SILVA:12345678901";

pub struct Pki {
    pub root: X509,
    pub intermediate: X509,
    pub leaf: X509,
    pub leaf_key: PKey<Private>,
}

impl Pki {
    pub fn leaf_der(&self) -> Vec<u8> {
        self.leaf.to_der().unwrap()
    }

    pub fn chain_der(&self) -> Vec<Vec<u8>> {
        vec![
            self.intermediate.to_der().unwrap(),
            self.root.to_der().unwrap(),
        ]
    }

    /// PKCS#12 with the leaf key, the leaf and both CA certificates.
    pub fn pkcs12(&self, password: &str) -> Vec<u8> {
        let mut ca = Stack::new().unwrap();
        ca.push(self.intermediate.clone()).unwrap();
        ca.push(self.root.clone()).unwrap();

        let mut builder = Pkcs12::builder();
        builder
            .name("signer")
            .pkey(&self.leaf_key)
            .cert(&self.leaf)
            .ca(ca);
        builder.build2(password).unwrap().to_der().unwrap()
    }

    /// Bundle in the layout of older exports: RC2-40 certificates, 3DES key,
    /// SHA-1 MAC.
    pub fn pkcs12_legacy(&self, password: &str) -> Vec<u8> {
        assert!(KeyStoreReader::load_legacy_algorithms());
        let mut ca = Stack::new().unwrap();
        ca.push(self.intermediate.clone()).unwrap();
        ca.push(self.root.clone()).unwrap();

        let mut builder = Pkcs12::builder();
        builder
            .name("signer")
            .pkey(&self.leaf_key)
            .cert(&self.leaf)
            .ca(ca)
            .key_algorithm(Nid::PBE_WITHSHA1AND3_KEY_TRIPLEDES_CBC)
            .cert_algorithm(Nid::PBE_WITHSHA1AND40BITRC2_CBC)
            .mac_md(MessageDigest::sha1());
        builder.build2(password).unwrap().to_der().unwrap()
    }
}

pub fn rsa_key(bits: u32) -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(bits).unwrap()).unwrap()
}

fn name(common_name: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder.append_entry_by_text("C", "BR").unwrap();
    builder.append_entry_by_text("O", "Test PKI").unwrap();
    builder.append_entry_by_text("CN", common_name).unwrap();
    builder.build()
}

/// Issue a certificate for `key`; self-signed when `issuer` is `None`.
pub fn issue(
    common_name: &str,
    key: &PKey<Private>,
    issuer: Option<(&X509, &PKey<Private>)>,
    is_ca: bool,
    serial: u32,
) -> X509 {
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();

    let subject = name(common_name);
    builder.set_subject_name(&subject).unwrap();
    match issuer {
        Some((cert, _)) => builder.set_issuer_name(cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&subject).unwrap(),
    }
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();

    if is_ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
    } else {
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .digital_signature()
                    .non_repudiation()
                    .build()
                    .unwrap(),
            )
            .unwrap();
    }

    let signing_key = issuer.map_or(key, |(_, issuer_key)| issuer_key);
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// Root -> intermediate -> RSA-2048 leaf.
pub fn test_pki() -> Pki {
    let root_key = rsa_key(2048);
    let root = issue("Test Root CA", &root_key, None, true, 1);
    let intermediate_key = rsa_key(2048);
    let intermediate = issue(
        "Test Intermediate CA",
        &intermediate_key,
        Some((&root, &root_key)),
        true,
        2,
    );
    let leaf_key = rsa_key(2048);
    let leaf = issue(
        LEAF_CN,
        &leaf_key,
        Some((&intermediate, &intermediate_key)),
        false,
        0x01_02_03,
    );
    Pki {
        root,
        intermediate,
        leaf,
        leaf_key,
    }
}

/// In-memory stand-in for the remote signature service.
#[derive(Default)]
pub struct FakeService {
    pub params: RefCell<Option<CmsParameters>>,
    pub prepared: RefCell<Vec<PrepareOptions>>,
    pub injections: RefCell<Vec<Injection>>,
    pub finalized: RefCell<u32>,
    pub reject_injection: bool,
}

impl FakeService {
    pub fn with_params(params: CmsParameters) -> Self {
        Self {
            params: RefCell::new(Some(params)),
            ..Self::default()
        }
    }
}

impl PreparationService for FakeService {
    fn prepare(
        &self,
        _document: &[u8],
        options: &PrepareOptions,
    ) -> SigningResult<PreparedDocument> {
        self.prepared.borrow_mut().push(options.clone());
        Ok(PreparedDocument {
            document_id: "doc-1".into(),
            field_name: Some("Signature1".into()),
        })
    }

    fn cms_params(
        &self,
        document_id: &str,
        field_name: Option<&str>,
    ) -> SigningResult<CmsParameters> {
        assert_eq!(document_id, "doc-1");
        assert_eq!(field_name, Some("Signature1"));
        Ok(self.params.borrow().clone().unwrap())
    }
}

impl FinalizationService for FakeService {
    fn inject(&self, injection: &Injection) -> SigningResult<bool> {
        self.injections.borrow_mut().push(injection.clone());
        Ok(!self.reject_injection)
    }

    fn finalize(&self, document_id: &str) -> SigningResult<Vec<u8>> {
        *self.finalized.borrow_mut() += 1;
        Ok(format!("%PDF signed {document_id}").into_bytes())
    }
}

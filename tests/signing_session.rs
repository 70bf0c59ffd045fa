//! Full session flows against an in-memory service.

mod common;

use common::FakeService;
use pades_signer::adapters::{text_visual_representation, CmsParameters, SignatureFormat};
use pades_signer::domain::oids;
use pades_signer::services::{parse_envelope, SignedAttributesBuilder};
use pades_signer::{
    DigestAlgorithm, KeyStoreReader, Phase, RawSigner, SessionOptions, SignaturePolicyRegistry,
    SigningError, SigningSession,
};

const SHA256_OID: &str = "2.16.840.1.101.3.4.2.1";

fn pkcs1_params(content: &[u8]) -> CmsParameters {
    CmsParameters {
        to_sign_digest: DigestAlgorithm::Sha256.digest(content).as_slice().to_vec(),
        digest_algorithm_oid: SHA256_OID.into(),
        field_name: "Signature1".into(),
        signed_attributes: None,
    }
}

#[test]
fn pkcs1_flow_runs_every_phase() {
    let pki = common::test_pki();
    let service = FakeService::with_params(pkcs1_params(b"hello"));
    let registry = SignaturePolicyRegistry::shared();
    let mut session =
        SigningSession::new(&service, &service, &registry, SessionOptions::default()).unwrap();

    let signed = KeyStoreReader::with_bundle(
        &pki.pkcs12(common::PASSWORD),
        common::PASSWORD,
        |bundle| session.sign_document(b"%PDF-1.7", bundle),
    )
    .unwrap();
    assert_eq!(signed, b"%PDF signed doc-1");
    assert_eq!(session.phase(), Phase::Finalized);
    assert_eq!(
        session.signer().and_then(|s| s.common_name()),
        Some(common::LEAF_CN)
    );

    let injections = service.injections.borrow();
    assert_eq!(injections.len(), 1);
    let injection = &injections[0];
    assert_eq!(injection.format, SignatureFormat::Pkcs1);
    assert_eq!(injection.field_name, "Signature1");
    assert_eq!(injection.leaf_certificate, pki.leaf_der());
    assert_eq!(injection.chain.len(), 2);

    let digest = DigestAlgorithm::Sha256.digest(b"hello");
    assert!(
        RawSigner::verify_digest_signature(&injection.signature, &digest, &pki.leaf_key).unwrap()
    );

    let prepared = service.prepared.borrow();
    assert_eq!(prepared[0].policy_id.as_deref(), Some("pades-basic"));
    assert!(!prepared[0].visible);
    assert_eq!(prepared[0].policy_oid, None);
    assert!(!prepared[0].requires_timestamp);
    assert_eq!(prepared[0].visual_representation, None);
    assert_eq!(prepared[0].security_context_id, None);
    assert_eq!(prepared[0].callback_argument, None);
}

#[test]
fn prepare_forwards_policy_and_caller_options() {
    let service = FakeService::with_params(pkcs1_params(b"hello"));
    let appearance = text_visual_representation("Signed by {{name}}", 12);
    let options = SessionOptions {
        policy_id: "pades-icpbr-adr-tempo".into(),
        visible: Some(true),
        visual_representation: Some(appearance.clone()),
        security_context_id: Some("ctx-7".into()),
        callback_argument: Some(serde_json::json!({"ticket": 99})),
        ..SessionOptions::default()
    };
    let mut session =
        SigningSession::new(&service, &service, &SignaturePolicyRegistry::shared(), options)
            .unwrap();
    session.prepare(b"%PDF-1.7").unwrap();

    let prepared = service.prepared.borrow();
    assert_eq!(prepared.len(), 1);
    let sent = &prepared[0];
    assert_eq!(sent.policy_id.as_deref(), Some("pades-icpbr-adr-tempo"));
    assert_eq!(sent.policy_oid.as_deref(), Some("2.16.76.1.7.1.11.1.2"));
    assert!(sent.requires_timestamp);
    assert!(sent.visible);
    assert_eq!(sent.visual_representation, Some(appearance));
    assert_eq!(sent.security_context_id.as_deref(), Some("ctx-7"));
    assert_eq!(sent.callback_argument, Some(serde_json::json!({"ticket": 99})));
}

#[test]
fn signed_attributes_produce_a_cms_envelope() {
    let pki = common::test_pki();
    let attributes = SignedAttributesBuilder::new(DigestAlgorithm::Sha256.digest(b"byte ranges"))
        .build()
        .unwrap();
    let service = FakeService::with_params(CmsParameters {
        to_sign_digest: DigestAlgorithm::Sha256.digest(&attributes).as_slice().to_vec(),
        digest_algorithm_oid: SHA256_OID.into(),
        field_name: "Signature1".into(),
        signed_attributes: Some(attributes.clone()),
    });
    let options = SessionOptions {
        embed_chain: false,
        ..SessionOptions::default()
    };
    let mut session =
        SigningSession::new(&service, &service, &SignaturePolicyRegistry::shared(), options)
            .unwrap();

    session.prepare(b"%PDF-1.7").unwrap();
    session.fetch_params().unwrap();
    let bundle = KeyStoreReader::open(&pki.pkcs12(common::PASSWORD), common::PASSWORD).unwrap();
    let local = session.sign_locally(&bundle).unwrap().clone();
    drop(bundle);
    assert_eq!(local.format, SignatureFormat::Cms);
    assert!(local.chain.is_empty());

    let parsed = parse_envelope(&local.payload).unwrap();
    assert_eq!(parsed.certificates, vec![pki.leaf_der()]);
    let signer = &parsed.signer_infos[0];
    assert_eq!(signer.digest_algorithm, oids::SHA256);
    assert_eq!(signer.signed_attributes.as_deref(), Some(attributes.as_slice()));

    session.inject().unwrap();
    session.finalize().unwrap();
    assert_eq!(service.injections.borrow()[0].signature, local.payload);
}

#[test]
fn inject_before_sign_is_rejected() {
    let service = FakeService::with_params(pkcs1_params(b"hello"));
    let mut session = SigningSession::new(
        &service,
        &service,
        &SignaturePolicyRegistry::shared(),
        SessionOptions::default(),
    )
    .unwrap();
    session.prepare(b"%PDF").unwrap();
    session.fetch_params().unwrap();

    let err = session.inject().unwrap_err();
    assert!(matches!(
        err,
        SigningError::InvalidPhaseTransition {
            current: Phase::ParamsFetched,
            attempted: Phase::Injected
        }
    ));
    assert!(err.to_string().contains("cannot inject while session is params-fetched"));
    assert!(service.injections.borrow().is_empty());
}

#[test]
fn second_finalize_fails() {
    let pki = common::test_pki();
    let service = FakeService::with_params(pkcs1_params(b"hello"));
    let mut session = SigningSession::new(
        &service,
        &service,
        &SignaturePolicyRegistry::shared(),
        SessionOptions::default(),
    )
    .unwrap();
    let bundle = KeyStoreReader::open(&pki.pkcs12(common::PASSWORD), common::PASSWORD).unwrap();
    session.sign_document(b"%PDF", &bundle).unwrap();

    assert!(matches!(
        session.finalize(),
        Err(SigningError::InvalidPhaseTransition {
            current: Phase::Finalized,
            attempted: Phase::Finalized
        })
    ));
    assert_eq!(*service.finalized.borrow(), 1);
}

#[test]
fn rejected_injection_keeps_session_signed() {
    let pki = common::test_pki();
    let service = FakeService {
        reject_injection: true,
        ..FakeService::with_params(pkcs1_params(b"hello"))
    };
    let mut session = SigningSession::new(
        &service,
        &service,
        &SignaturePolicyRegistry::shared(),
        SessionOptions {
            policy_id: "pades-adobe-compatible".into(),
            ..SessionOptions::default()
        },
    )
    .unwrap();
    let bundle = KeyStoreReader::open(&pki.pkcs12(common::PASSWORD), common::PASSWORD).unwrap();

    session.prepare(b"%PDF").unwrap();
    session.fetch_params().unwrap();
    session.sign_locally(&bundle).unwrap();
    let err = session.inject().unwrap_err();
    assert!(matches!(err, SigningError::RemoteRejected(_)));
    assert!(err.is_remote());
    assert_eq!(session.phase(), Phase::LocallySigned);

    // the adobe-compatible policy asks for a visible appearance by default
    assert!(service.prepared.borrow()[0].visible);
}

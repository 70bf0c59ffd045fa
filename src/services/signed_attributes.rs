//! CMS signed attributes for PAdES/CAdES signatures.
//!
//! The DER encoding of this SET (tagged `0x31`) is what gets hashed and signed; the
//! envelope builder re-tags the identical bytes as `[0] IMPLICIT` inside `SignerInfo`.

use std::time::SystemTime;

use der::asn1::{GeneralizedTime, ObjectIdentifier, UtcTime};
use der::{DateTime, Encode};

use crate::domain::asn1::Node;
use crate::domain::crypto::{DigestAlgorithm, DigestBytes};
use crate::domain::oids;
use crate::infra::error::{SigningError, SigningResult};
use crate::services::cert_inspector::CertificateInspector;

/// Builder for the authenticated attribute set of one signer.
#[derive(Debug, Clone)]
pub struct SignedAttributesBuilder {
    content_type: ObjectIdentifier,
    message_digest: DigestBytes,
    signing_time: Option<SystemTime>,
    signing_certificate: Option<Vec<u8>>,
}

impl SignedAttributesBuilder {
    /// Start from the digest of the signed content (for PDFs, the byte ranges).
    #[must_use]
    pub fn new(message_digest: DigestBytes) -> Self {
        Self {
            content_type: oids::ID_DATA,
            message_digest,
            signing_time: None,
            signing_certificate: None,
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: ObjectIdentifier) -> Self {
        self.content_type = content_type;
        self
    }

    #[must_use]
    pub fn with_signing_time(mut self, time: SystemTime) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// Bind the signature to this certificate through an ESS `signingCertificateV2`.
    #[must_use]
    pub fn with_signing_certificate(mut self, certificate_der: Vec<u8>) -> Self {
        self.signing_certificate = Some(certificate_der);
        self
    }

    /// Encode the attributes as a DER `SET OF Attribute`.
    ///
    /// # Errors
    /// `MalformedCertificate` if the signing certificate cannot be parsed,
    /// `EncodingFailure` if the signing time predates 1970.
    pub fn build(&self) -> SigningResult<Vec<u8>> {
        let mut attributes = vec![
            attribute(oids::CONTENT_TYPE, Node::ObjectIdentifier(self.content_type)),
            attribute(
                oids::MESSAGE_DIGEST,
                Node::OctetString(self.message_digest.as_slice().to_vec()),
            ),
        ];
        if let Some(time) = self.signing_time {
            attributes.push(attribute(oids::SIGNING_TIME, encode_time(time)?));
        }
        if let Some(cert) = &self.signing_certificate {
            attributes.push(attribute(
                oids::SIGNING_CERTIFICATE_V2,
                signing_certificate_v2(cert)?,
            ));
        }
        let der = Node::Set(attributes).encode();
        log::debug!("Built {} byte signed attribute set", der.len());
        Ok(der)
    }
}

fn attribute(oid: ObjectIdentifier, value: Node) -> Node {
    Node::Sequence(vec![Node::ObjectIdentifier(oid), Node::Set(vec![value])])
}

/// `SigningCertificateV2 ::= SEQUENCE { certs SEQUENCE OF ESSCertIDv2 }` with one
/// `ESSCertIDv2 { certHash, issuerSerial }`. The hash algorithm is SHA-256, the
/// ASN.1 default, so DER leaves it out.
fn signing_certificate_v2(certificate_der: &[u8]) -> SigningResult<Node> {
    let (issuer, serial) = CertificateInspector::issuer_and_serial(certificate_der)?;
    let cert_hash = DigestAlgorithm::Sha256.digest(certificate_der);
    let issuer_serial = Node::Sequence(vec![
        // GeneralNames { directoryName [4] Name }
        Node::Sequence(vec![Node::ContextTag(4, vec![Node::Raw(issuer)])]),
        Node::Integer(serial),
    ]);
    let ess_cert_id = Node::Sequence(vec![
        Node::OctetString(cert_hash.as_slice().to_vec()),
        issuer_serial,
    ]);
    Ok(Node::Sequence(vec![Node::Sequence(vec![ess_cert_id])]))
}

/// `Time`: UTCTime for 1950..2049, GeneralizedTime otherwise.
fn encode_time(time: SystemTime) -> SigningResult<Node> {
    let date_time = DateTime::from_system_time(time)
        .map_err(|e| SigningError::EncodingFailure(format!("signing time: {e}")))?;
    let der = if (1950..2050).contains(&date_time.year()) {
        UtcTime::from_date_time(date_time).and_then(|utc| utc.to_der())
    } else {
        GeneralizedTime::from_date_time(date_time).to_der()
    }
    .map_err(|e| SigningError::EncodingFailure(format!("signing time: {e}")))?;
    Ok(Node::Raw(der))
}

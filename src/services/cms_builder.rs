//! CMS `SignedData` envelope assembly and parsing.
//!
//! Produces the detached signature container embedded in a PDF signature
//! dictionary (`/SubFilter /ETSI.CAdES.detached` or `adbe.pkcs7.detached`):
//!
//! ```text
//! ContentInfo ::= SEQUENCE {
//!   contentType   signedData,
//!   content   [0] EXPLICIT SignedData }
//!
//! SignedData ::= SEQUENCE {
//!   version            1,
//!   digestAlgorithms   SET OF AlgorithmIdentifier,
//!   encapContentInfo   SEQUENCE { id-data },          -- detached
//!   certificates   [0] IMPLICIT leaf, chain...,
//!   signerInfos        SET OF SignerInfo }
//!
//! SignerInfo ::= SEQUENCE {
//!   version            1,
//!   sid                IssuerAndSerialNumber,
//!   digestAlgorithm    AlgorithmIdentifier,
//!   signedAttrs    [0] IMPLICIT SET OF Attribute,
//!   signatureAlgorithm AlgorithmIdentifier,
//!   signature          OCTET STRING }
//! ```
//!
//! Output is DER throughout. Pre-encoded inputs (certificates, signed attributes)
//! are spliced in byte for byte.

use der::asn1::ObjectIdentifier;

use crate::domain::asn1::{Element, Node, TAG_INTEGER, TAG_OCTET_STRING, TAG_SEQUENCE, TAG_SET};
use crate::domain::oids;
use crate::domain::policy::{EnvelopeAlgorithms, SignaturePolicy};
use crate::infra::error::{SigningError, SigningResult};
use crate::services::cert_inspector::CertificateInspector;

const SIGNED_DATA_VERSION: u32 = 1;
const SIGNER_INFO_VERSION: u32 = 1;
const TAG_CONTEXT_0: u8 = 0xA0;
const TAG_CONTEXT_1: u8 = 0xA1;

/// Builds single-signer CMS `SignedData` envelopes.
#[derive(Debug, Clone, Default)]
pub struct CmsEnvelopeBuilder {
    algorithms: EnvelopeAlgorithms,
}

impl CmsEnvelopeBuilder {
    /// SHA-256 with `rsaEncryption`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_algorithms(algorithms: EnvelopeAlgorithms) -> Self {
        Self { algorithms }
    }

    #[must_use]
    pub fn for_policy(policy: &SignaturePolicy) -> Self {
        Self::with_algorithms(policy.envelope_algorithms())
    }

    #[must_use]
    pub fn algorithms(&self) -> EnvelopeAlgorithms {
        self.algorithms
    }

    /// Assemble a `ContentInfo` wrapping `SignedData`.
    ///
    /// `signed_attributes` is the exact DER that was hashed and signed, tagged either
    /// as a universal SET (`0x31`) or already as `[0] IMPLICIT` (`0xA0`). The leaf
    /// certificate comes first in `certificates`, followed by `chain` in the given
    /// order. Identical inputs always produce identical bytes.
    ///
    /// # Errors
    /// `EncodingFailure` when any input cannot be used: unparseable leaf or chain
    /// certificate, signed attributes that are not a non-empty SET, or an empty
    /// signature.
    pub fn build<C: AsRef<[u8]>>(
        &self,
        signed_attributes: &[u8],
        signature: &[u8],
        leaf_certificate: &[u8],
        chain: &[C],
    ) -> SigningResult<Vec<u8>> {
        if signature.is_empty() {
            return Err(SigningError::EncodingFailure("signature is empty".into()));
        }
        let (issuer, serial) = CertificateInspector::issuer_and_serial(leaf_certificate)
            .map_err(|e| SigningError::EncodingFailure(format!("leaf certificate: {e}")))?;
        let implicit_attributes = Self::implicit_signed_attributes(signed_attributes)?;

        let mut certificates = Vec::with_capacity(1 + chain.len());
        certificates.push(Node::Raw(leaf_certificate.to_vec()));
        for (idx, cert) in chain.iter().enumerate() {
            let cert = cert.as_ref();
            CertificateInspector::issuer_and_serial(cert).map_err(|e| {
                SigningError::EncodingFailure(format!("chain certificate {idx}: {e}"))
            })?;
            certificates.push(Node::Raw(cert.to_vec()));
        }

        let digest_algorithm = Node::algorithm_identifier(self.algorithms.digest.oid());
        let signer_info = Node::Sequence(vec![
            Node::small_integer(SIGNER_INFO_VERSION),
            Node::Sequence(vec![Node::Raw(issuer), Node::Integer(serial)]),
            digest_algorithm.clone(),
            Node::Raw(implicit_attributes),
            Node::algorithm_identifier(self.algorithms.signature),
            Node::OctetString(signature.to_vec()),
        ]);

        let signed_data = Node::Sequence(vec![
            Node::small_integer(SIGNED_DATA_VERSION),
            Node::Set(vec![digest_algorithm]),
            Node::Sequence(vec![Node::ObjectIdentifier(oids::ID_DATA)]),
            Node::ContextTag(0, certificates),
            Node::Set(vec![signer_info]),
        ]);

        let content_info = Node::Sequence(vec![
            Node::ObjectIdentifier(oids::ID_SIGNED_DATA),
            Node::ContextTag(0, vec![signed_data]),
        ])
        .encode();

        log::debug!(
            "Built CMS SignedData: {} bytes, {} certificate(s), {} byte signature",
            content_info.len(),
            1 + chain.len(),
            signature.len()
        );
        Ok(content_info)
    }

    /// Re-tag signed attributes from `SET` to `[0] IMPLICIT` without touching content.
    fn implicit_signed_attributes(signed_attributes: &[u8]) -> SigningResult<Vec<u8>> {
        let element = Element::parse(signed_attributes)
            .map_err(|e| SigningError::EncodingFailure(format!("signed attributes: {e}")))?;
        if element.tag != TAG_SET && element.tag != TAG_CONTEXT_0 {
            return Err(SigningError::EncodingFailure(format!(
                "signed attributes must be a SET, found tag 0x{:02X}",
                element.tag
            )));
        }
        if element.children()?.is_empty() {
            return Err(SigningError::EncodingFailure(
                "signed attributes are empty".into(),
            ));
        }
        let mut implicit = signed_attributes.to_vec();
        implicit[0] = TAG_CONTEXT_0;
        Ok(implicit)
    }
}

/// Fields of a `SignerInfo` recovered from an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSignerInfo {
    pub version: u32,
    /// DER of the issuer `Name`.
    pub issuer: Vec<u8>,
    /// Content octets of the serial number INTEGER.
    pub serial_number: Vec<u8>,
    pub digest_algorithm: ObjectIdentifier,
    /// Signed attributes re-tagged as a universal SET, i.e. the bytes that were signed.
    pub signed_attributes: Option<Vec<u8>>,
    pub signature_algorithm: ObjectIdentifier,
    pub signature: Vec<u8>,
}

/// Fields of a `ContentInfo`/`SignedData` recovered from an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSignedData {
    pub content_type: ObjectIdentifier,
    pub version: u32,
    pub digest_algorithms: Vec<ObjectIdentifier>,
    pub encapsulated_content_type: ObjectIdentifier,
    /// Certificate DER exactly as embedded, in envelope order.
    pub certificates: Vec<Vec<u8>>,
    pub signer_infos: Vec<ParsedSignerInfo>,
}

/// Take a DER `ContentInfo` carrying `SignedData` apart.
///
/// # Errors
/// `EncodingFailure` for anything that is not a well-formed DER `SignedData` envelope.
pub fn parse_envelope(der: &[u8]) -> SigningResult<ParsedSignedData> {
    let content_info = Element::parse(der)?.expect_tag(TAG_SEQUENCE, "ContentInfo")?;
    let [content_type, content] = exactly::<2>(content_info.children()?, "ContentInfo")?;
    let content_type = oid_of(&content_type)?;
    if content_type != oids::ID_SIGNED_DATA {
        return Err(SigningError::EncodingFailure(format!(
            "content type is {}, not signedData",
            oids::describe(&content_type)
        )));
    }
    let [signed_data] = exactly::<1>(
        content.expect_tag(TAG_CONTEXT_0, "ContentInfo.content")?.children()?,
        "ContentInfo.content",
    )?;

    let mut fields = signed_data
        .expect_tag(TAG_SEQUENCE, "SignedData")?
        .children()?
        .into_iter()
        .peekable();
    let mut next = |what: &str| {
        fields
            .next()
            .ok_or_else(|| SigningError::EncodingFailure(format!("SignedData: missing {what}")))
    };

    let version = small_integer(&next("version")?)?;
    let digest_algorithms = next("digestAlgorithms")?
        .expect_tag(TAG_SET, "digestAlgorithms")?
        .children()?
        .iter()
        .map(algorithm_oid)
        .collect::<SigningResult<Vec<_>>>()?;
    let encapsulated = next("encapContentInfo")?.expect_tag(TAG_SEQUENCE, "encapContentInfo")?;
    let encapsulated_content_type = encapsulated
        .children()?
        .first()
        .ok_or_else(|| SigningError::EncodingFailure("encapContentInfo is empty".into()))
        .and_then(oid_of)?;

    let mut certificates = Vec::new();
    let mut element = next("signerInfos")?;
    if element.tag == TAG_CONTEXT_0 {
        certificates = element.children()?.iter().map(|c| c.raw.to_vec()).collect();
        element = next("signerInfos")?;
    }
    if element.tag == TAG_CONTEXT_1 {
        // revocation data is carried through untouched
        element = next("signerInfos")?;
    }
    let signer_infos = element
        .expect_tag(TAG_SET, "signerInfos")?
        .children()?
        .iter()
        .map(parse_signer_info)
        .collect::<SigningResult<Vec<_>>>()?;
    if fields.peek().is_some() {
        return Err(SigningError::EncodingFailure(
            "unexpected fields after signerInfos".into(),
        ));
    }

    Ok(ParsedSignedData {
        content_type,
        version,
        digest_algorithms,
        encapsulated_content_type,
        certificates,
        signer_infos,
    })
}

fn parse_signer_info(element: &Element<'_>) -> SigningResult<ParsedSignerInfo> {
    let mut fields = element
        .expect_tag(TAG_SEQUENCE, "SignerInfo")?
        .children()?
        .into_iter();
    let mut next = |what: &str| {
        fields
            .next()
            .ok_or_else(|| SigningError::EncodingFailure(format!("SignerInfo: missing {what}")))
    };

    let version = small_integer(&next("version")?)?;
    let sid = next("sid")?.expect_tag(TAG_SEQUENCE, "IssuerAndSerialNumber")?;
    let [issuer, serial] = exactly::<2>(sid.children()?, "IssuerAndSerialNumber")?;
    let serial = serial.expect_tag(TAG_INTEGER, "serialNumber")?;
    let digest_algorithm = algorithm_oid(&next("digestAlgorithm")?)?;

    let mut element = next("signatureAlgorithm")?;
    let mut signed_attributes = None;
    if element.tag == TAG_CONTEXT_0 {
        let mut as_set = element.raw.to_vec();
        as_set[0] = TAG_SET;
        signed_attributes = Some(as_set);
        element = next("signatureAlgorithm")?;
    }
    let signature_algorithm = algorithm_oid(&element)?;
    let signature = next("signature")?.expect_tag(TAG_OCTET_STRING, "signature")?;

    Ok(ParsedSignerInfo {
        version,
        issuer: issuer.raw.to_vec(),
        serial_number: serial.content.to_vec(),
        digest_algorithm,
        signed_attributes,
        signature_algorithm,
        signature: signature.content.to_vec(),
    })
}

fn exactly<'a, const N: usize>(
    children: Vec<Element<'a>>,
    what: &str,
) -> SigningResult<[Element<'a>; N]> {
    let found = children.len();
    children.try_into().map_err(|_| {
        SigningError::EncodingFailure(format!("{what}: expected {N} fields, found {found}"))
    })
}

fn oid_of(element: &Element<'_>) -> SigningResult<ObjectIdentifier> {
    element
        .to_node()?
        .as_oid()
        .ok_or_else(|| SigningError::EncodingFailure("expected OBJECT IDENTIFIER".into()))
}

fn algorithm_oid(element: &Element<'_>) -> SigningResult<ObjectIdentifier> {
    element
        .expect_tag(TAG_SEQUENCE, "AlgorithmIdentifier")?
        .children()?
        .first()
        .ok_or_else(|| SigningError::EncodingFailure("empty AlgorithmIdentifier".into()))
        .and_then(oid_of)
}

fn small_integer(element: &Element<'_>) -> SigningResult<u32> {
    element
        .to_node()?
        .as_small_integer()
        .ok_or_else(|| SigningError::EncodingFailure("expected small INTEGER".into()))
}

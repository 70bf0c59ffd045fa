//! X.509 certificate inspection and certificate input decoding.

use std::time::SystemTime;

use base64::Engine;
use der::{Decode, Tag, Tagged};
use x509_cert::name::Name;
use x509_cert::Certificate;

use crate::domain::identity::{
    AttributeValue, CertificateIdentity, DistinguishedName, DnAttribute, NationalId, COMMON_NAME,
};
use crate::infra::error::{SigningError, SigningResult};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";
const PEM_LINE_WIDTH: usize = 64;
const EXPIRY_WARNING_DAYS: i64 = 30;

/// Reads identity fields out of certificates.
pub struct CertificateInspector;

impl CertificateInspector {
    /// Parse a DER certificate into its identity fields.
    ///
    /// Attribute types this crate does not know are kept as they were encoded.
    ///
    /// # Errors
    /// `MalformedCertificate` when the bytes are not a DER X.509 certificate.
    pub fn inspect(certificate_der: &[u8]) -> SigningResult<CertificateIdentity> {
        let certificate = Certificate::from_der(certificate_der)
            .map_err(|e| SigningError::MalformedCertificate(e.to_string()))?;
        let tbs = &certificate.tbs_certificate;

        let subject = Self::distinguished_name(&tbs.subject);
        let issuer = Self::distinguished_name(&tbs.issuer);
        let national_id = subject
            .get(&COMMON_NAME)
            .and_then(NationalId::from_common_name);

        let identity = CertificateIdentity {
            serial_number_hex: Self::serial_hex(tbs.serial_number.as_bytes()),
            not_before: tbs.validity.not_before.to_system_time(),
            not_after: tbs.validity.not_after.to_system_time(),
            subject,
            issuer,
            national_id,
        };

        let days = identity.days_until_expiry(SystemTime::now());
        if days < 0 {
            log::warn!("Certificate {} expired {} day(s) ago", identity.serial_number_hex, -days);
        } else if days <= EXPIRY_WARNING_DAYS {
            log::warn!("Certificate {} expires in {days} day(s)", identity.serial_number_hex);
        }
        log::debug!("Inspected certificate: subject='{}'", identity.subject);

        Ok(identity)
    }

    fn distinguished_name(name: &Name) -> DistinguishedName {
        let attributes = name
            .0
            .iter()
            .flat_map(|rdn| rdn.0.iter())
            .map(|atv| DnAttribute {
                oid: atv.oid,
                value: Self::attribute_value(atv.value.tag(), atv.value.value()),
            })
            .collect();
        DistinguishedName::new(attributes)
    }

    fn attribute_value(tag: Tag, bytes: &[u8]) -> AttributeValue {
        let text = match tag {
            Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::VisibleString => {
                std::str::from_utf8(bytes).ok().map(str::to_string)
            }
            // T.61 in practice carries Latin-1.
            Tag::TeletexString => Some(bytes.iter().map(|b| char::from(*b)).collect()),
            Tag::BmpString => Self::decode_bmp(bytes),
            _ => None,
        };
        text.map_or_else(
            || AttributeValue::Opaque {
                tag: u8::from(tag),
                bytes: bytes.to_vec(),
            },
            AttributeValue::Text,
        )
    }

    fn decode_bmp(bytes: &[u8]) -> Option<String> {
        if bytes.len() % 2 != 0 {
            return None;
        }
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).ok()
    }

    /// Uppercase hex without the sign octet DER adds to high-bit serials.
    fn serial_hex(serial: &[u8]) -> String {
        let trimmed = match serial {
            [0x00, rest @ ..] if !rest.is_empty() => rest,
            other => other,
        };
        hex::encode_upper(trimmed)
    }

    /// Issuer DN and serial INTEGER content of a certificate, as used by a CMS
    /// `IssuerAndSerialNumber`.
    ///
    /// # Errors
    /// `MalformedCertificate` when the bytes are not a DER X.509 certificate.
    pub fn issuer_and_serial(certificate_der: &[u8]) -> SigningResult<(Vec<u8>, Vec<u8>)> {
        use der::Encode;

        let certificate = Certificate::from_der(certificate_der)
            .map_err(|e| SigningError::MalformedCertificate(e.to_string()))?;
        let tbs = &certificate.tbs_certificate;
        let issuer = tbs
            .issuer
            .to_der()
            .map_err(|e| SigningError::MalformedCertificate(format!("issuer: {e}")))?;
        Ok((issuer, tbs.serial_number.as_bytes().to_vec()))
    }
}

/// Accept a certificate as DER or as PEM / bare base64 text.
///
/// For PEM input the first `CERTIFICATE` block is used.
///
/// # Errors
/// `MalformedCertificate` when nothing decodes to a DER certificate.
pub fn decode_certificate(input: &[u8]) -> SigningResult<Vec<u8>> {
    let der = if input.first() == Some(&0x30) {
        input.to_vec()
    } else {
        let text = std::str::from_utf8(input).map_err(|_| {
            SigningError::MalformedCertificate("input is neither DER nor text".into())
        })?;
        if text.contains(PEM_BEGIN) {
            pem_blocks(text)?
                .into_iter()
                .next()
                .ok_or_else(|| SigningError::MalformedCertificate("empty PEM input".into()))?
        } else {
            decode_base64(text)?
        }
    };
    Certificate::from_der(&der).map_err(|e| SigningError::MalformedCertificate(e.to_string()))?;
    Ok(der)
}

/// Decode every PEM certificate block in `input` (or a single DER certificate).
///
/// # Errors
/// `MalformedCertificate` when any block fails to decode.
pub fn decode_certificate_chain(input: &[u8]) -> SigningResult<Vec<Vec<u8>>> {
    if input.first() == Some(&0x30) {
        return decode_certificate(input).map(|der| vec![der]);
    }
    let text = std::str::from_utf8(input)
        .map_err(|_| SigningError::MalformedCertificate("chain input is not text".into()))?;
    let blocks = pem_blocks(text)?;
    for der in &blocks {
        Certificate::from_der(der)
            .map_err(|e| SigningError::MalformedCertificate(e.to_string()))?;
    }
    Ok(blocks)
}

/// Render DER as a PEM `CERTIFICATE` block with 64-column lines.
#[must_use]
pub fn encode_pem(der: &[u8]) -> String {
    let body = base64::engine::general_purpose::STANDARD.encode(der);
    let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    pem.push_str(PEM_BEGIN);
    pem.push('\n');
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(PEM_END);
    pem.push('\n');
    pem
}

fn pem_blocks(text: &str) -> SigningResult<Vec<Vec<u8>>> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(PEM_BEGIN) {
        let after_begin = &rest[start + PEM_BEGIN.len()..];
        let end = after_begin
            .find(PEM_END)
            .ok_or_else(|| SigningError::MalformedCertificate("unterminated PEM block".into()))?;
        blocks.push(decode_base64(&after_begin[..end])?);
        rest = &after_begin[end + PEM_END.len()..];
    }
    Ok(blocks)
}

fn decode_base64(text: &str) -> SigningResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| SigningError::MalformedCertificate(format!("invalid base64: {e}")))
}

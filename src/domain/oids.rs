//! Object identifiers used by CMS envelopes, signed attributes and signature policies.
//!
//! The table is a `const` slice: it is fixed at compile time and shared by reference.

use der::asn1::ObjectIdentifier;

// === Digest algorithms ===

pub const MD5: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.2.5");
pub const SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
pub const SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
pub const SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
pub const SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

// === Signature algorithms ===

pub const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
pub const SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
pub const SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
pub const SHA384_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
pub const SHA512_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

// === CMS content types ===

pub const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
pub const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
pub const ID_ENVELOPED_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.3");
pub const ID_DIGESTED_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.5");
pub const ID_ENCRYPTED_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.6");

// === Signed attributes ===

pub const CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
pub const MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
pub const SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
pub const SIGNING_CERTIFICATE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.12");
pub const SIGNING_CERTIFICATE_V2: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.47");

// === Distinguished name attributes not covered by x509-cert's short names ===

pub const EMAIL_ADDRESS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

// === ICP-Brasil signature policies ===

pub const ICP_BRASIL_AD_RB: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.76.1.7.1.1.1");
pub const ICP_BRASIL_AD_RT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.76.1.7.1.1.2");
pub const ICP_BRASIL_AD_RV: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.76.1.7.1.2.1");
pub const ICP_BRASIL_AD_RC: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.76.1.7.1.2.2");
pub const PADES_ICPBR_AD_RB: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.76.1.7.1.11.1.1");
pub const PADES_ICPBR_AD_RT: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.76.1.7.1.11.1.2");
pub const CADES_ICPBR_AD_RB: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.76.1.7.1.1.2.1");
pub const CADES_ICPBR_AD_RT: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.76.1.7.1.2.2.1");

/// Arc shared by every ICP-Brasil signature policy.
const ICP_BRASIL_POLICY_ARC: &str = "2.16.76.1.7.1.";

// === Adobe ===

pub const ADOBE_PPKLITE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113583.1.1.8");
pub const ADOBE_REVOCATION_INFO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113583.1.1.8.1");
pub const ADOBE_TIMESTAMP: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113583.1.1.9.2");

/// Every known identifier paired with its display name.
pub const KNOWN_OIDS: &[(ObjectIdentifier, &str)] = &[
    (MD5, "md5"),
    (SHA1, "sha1"),
    (SHA256, "sha256"),
    (SHA384, "sha384"),
    (SHA512, "sha512"),
    (RSA_ENCRYPTION, "rsaEncryption"),
    (SHA1_WITH_RSA, "sha1WithRSAEncryption"),
    (SHA256_WITH_RSA, "sha256WithRSAEncryption"),
    (SHA384_WITH_RSA, "sha384WithRSAEncryption"),
    (SHA512_WITH_RSA, "sha512WithRSAEncryption"),
    (ID_DATA, "data"),
    (ID_SIGNED_DATA, "signedData"),
    (ID_ENVELOPED_DATA, "envelopedData"),
    (ID_DIGESTED_DATA, "digestedData"),
    (ID_ENCRYPTED_DATA, "encryptedData"),
    (CONTENT_TYPE, "contentType"),
    (MESSAGE_DIGEST, "messageDigest"),
    (SIGNING_TIME, "signingTime"),
    (SIGNING_CERTIFICATE, "signingCertificate"),
    (SIGNING_CERTIFICATE_V2, "signingCertificateV2"),
    (EMAIL_ADDRESS, "emailAddress"),
    (ICP_BRASIL_AD_RB, "ICP-Brasil AD-RB"),
    (ICP_BRASIL_AD_RT, "ICP-Brasil AD-RT"),
    (ICP_BRASIL_AD_RV, "ICP-Brasil AD-RV"),
    (ICP_BRASIL_AD_RC, "ICP-Brasil AD-RC"),
    (PADES_ICPBR_AD_RB, "PAdES ICP-Brasil AD-RB"),
    (PADES_ICPBR_AD_RT, "PAdES ICP-Brasil AD-RT"),
    (CADES_ICPBR_AD_RB, "CAdES ICP-Brasil AD-RB"),
    (CADES_ICPBR_AD_RT, "CAdES ICP-Brasil AD-RT"),
    (ADOBE_PPKLITE, "adbe.pkcs7.detached"),
    (ADOBE_REVOCATION_INFO, "adbe-revocationInfoArchival"),
    (ADOBE_TIMESTAMP, "adbe-timestamp"),
];

/// Display name for a known identifier.
#[must_use]
pub fn name_of(oid: &ObjectIdentifier) -> Option<&'static str> {
    KNOWN_OIDS
        .iter()
        .find(|(known, _)| known == oid)
        .map(|(_, name)| *name)
}

/// Name when known, dotted form otherwise.
#[must_use]
pub fn describe(oid: &ObjectIdentifier) -> String {
    name_of(oid).map_or_else(|| oid.to_string(), str::to_string)
}

#[must_use]
pub fn is_digest_algorithm(oid: &ObjectIdentifier) -> bool {
    [MD5, SHA1, SHA256, SHA384, SHA512].contains(oid)
}

/// Whether the identifier lives under the ICP-Brasil signature-policy arc.
#[must_use]
pub fn is_certified_policy_oid(oid: &ObjectIdentifier) -> bool {
    oid.to_string().starts_with(ICP_BRASIL_POLICY_ARC)
}

/// Digest OID for an algorithm name such as `sha256` or `SHA-256`.
#[must_use]
pub fn digest_oid_for_name(name: &str) -> Option<ObjectIdentifier> {
    match normalise(name).as_str() {
        "md5" => Some(MD5),
        "sha1" => Some(SHA1),
        "sha256" => Some(SHA256),
        "sha384" => Some(SHA384),
        "sha512" => Some(SHA512),
        _ => None,
    }
}

/// Signature OID for a name such as `sha256WithRSA` or `rsa`.
#[must_use]
pub fn signature_oid_for_name(name: &str) -> Option<ObjectIdentifier> {
    match normalise(name).as_str() {
        "rsa" | "rsaencryption" => Some(RSA_ENCRYPTION),
        "sha1withrsa" | "sha1withrsaencryption" => Some(SHA1_WITH_RSA),
        "sha256withrsa" | "sha256withrsaencryption" => Some(SHA256_WITH_RSA),
        "sha384withrsa" | "sha384withrsaencryption" => Some(SHA384_WITH_RSA),
        "sha512withrsa" | "sha512withrsaencryption" => Some(SHA512_WITH_RSA),
        _ => None,
    }
}

fn normalise(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_data_oid_encoding() {
        assert_eq!(
            ID_SIGNED_DATA.as_bytes(),
            &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x02]
        );
        assert_eq!(
            SHA256.as_bytes(),
            &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01]
        );
    }

    #[test]
    fn test_name_lookup() {
        assert_eq!(name_of(&SHA256), Some("sha256"));
        assert_eq!(name_of(&ID_SIGNED_DATA), Some("signedData"));
        let unknown = ObjectIdentifier::new_unwrap("1.2.3.4");
        assert_eq!(name_of(&unknown), None);
        assert_eq!(describe(&unknown), "1.2.3.4");
    }

    #[test]
    fn test_algorithm_lookup_by_name() {
        assert_eq!(digest_oid_for_name("SHA-256"), Some(SHA256));
        assert_eq!(digest_oid_for_name("sha512"), Some(SHA512));
        assert_eq!(digest_oid_for_name("whirlpool"), None);
        assert_eq!(signature_oid_for_name("sha256WithRSA"), Some(SHA256_WITH_RSA));
        assert_eq!(signature_oid_for_name("rsa"), Some(RSA_ENCRYPTION));
    }

    #[test]
    fn test_classification() {
        assert!(is_digest_algorithm(&SHA1));
        assert!(!is_digest_algorithm(&RSA_ENCRYPTION));
        assert!(is_certified_policy_oid(&PADES_ICPBR_AD_RB));
        assert!(!is_certified_policy_oid(&ADOBE_PPKLITE));
    }
}

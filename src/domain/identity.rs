//! Identity fields read out of an X.509 certificate.

use std::fmt;
use std::time::{Duration, SystemTime};

use der::asn1::ObjectIdentifier;

use crate::domain::oids;

pub const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
pub const SERIAL_NUMBER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.5");
pub const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
pub const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
pub const STATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
pub const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
pub const ORGANIZATIONAL_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");

const SHORT_NAMES: &[(ObjectIdentifier, &str)] = &[
    (COMMON_NAME, "CN"),
    (SERIAL_NUMBER, "serialNumber"),
    (COUNTRY, "C"),
    (LOCALITY, "L"),
    (STATE, "ST"),
    (ORGANIZATION, "O"),
    (ORGANIZATIONAL_UNIT, "OU"),
    (oids::EMAIL_ADDRESS, "emailAddress"),
];

const SECONDS_PER_DAY: u64 = 86_400;

/// Value of one distinguished-name attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// A directory string decoded to text.
    Text(String),
    /// Any other encoding, preserved as the universal tag and raw content octets.
    Opaque { tag: u8, bytes: Vec<u8> },
}

impl AttributeValue {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text),
            AttributeValue::Opaque { .. } => None,
        }
    }
}

/// One `(attributeType, value)` pair, in certificate order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnAttribute {
    pub oid: ObjectIdentifier,
    pub value: AttributeValue,
}

impl DnAttribute {
    /// Short label (`CN`, `O`, ...) or the dotted OID when the type is not known.
    #[must_use]
    pub fn label(&self) -> String {
        SHORT_NAMES
            .iter()
            .find(|(oid, _)| *oid == self.oid)
            .map_or_else(|| self.oid.to_string(), |(_, name)| (*name).to_string())
    }
}

/// Flattened distinguished name; attributes keep their encoded order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    attributes: Vec<DnAttribute>,
}

impl DistinguishedName {
    #[must_use]
    pub fn new(attributes: Vec<DnAttribute>) -> Self {
        Self { attributes }
    }

    #[must_use]
    pub fn attributes(&self) -> &[DnAttribute] {
        &self.attributes
    }

    /// First text value for the attribute type.
    #[must_use]
    pub fn get(&self, oid: &ObjectIdentifier) -> Option<&str> {
        self.attributes
            .iter()
            .filter(|attr| attr.oid == *oid)
            .find_map(|attr| attr.value.as_text())
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, attr) in self.attributes.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            match &attr.value {
                AttributeValue::Text(text) => write!(f, "{}={text}", attr.label())?,
                AttributeValue::Opaque { bytes, .. } => {
                    write!(f, "{}=#{}", attr.label(), hex::encode(bytes))?;
                }
            }
        }
        Ok(())
    }
}

/// National tax identifier found at the end of a common name.
///
/// Some certificate profiles append the holder's tax number after a colon, e.g.
/// `CN=JOHN DOE:12345678901`. Extraction is a string heuristic: it is a display
/// convenience and says nothing about whether the issuer vouched for the number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NationalId {
    /// 11-digit natural-person identifier.
    Natural(String),
    /// 14-digit organisation identifier.
    Organization(String),
}

impl NationalId {
    #[must_use]
    pub fn from_common_name(common_name: &str) -> Option<Self> {
        let (_, suffix) = common_name.rsplit_once(':')?;
        let digits = suffix.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match digits.len() {
            11 => Some(NationalId::Natural(digits.to_string())),
            14 => Some(NationalId::Organization(digits.to_string())),
            _ => None,
        }
    }

    #[must_use]
    pub fn digits(&self) -> &str {
        match self {
            NationalId::Natural(digits) | NationalId::Organization(digits) => digits,
        }
    }
}

/// Read-only view of a certificate's identity, recomputed per certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateIdentity {
    pub subject: DistinguishedName,
    pub issuer: DistinguishedName,
    /// Uppercase hex of the serial number content octets.
    pub serial_number_hex: String,
    pub not_before: SystemTime,
    pub not_after: SystemTime,
    pub national_id: Option<NationalId>,
}

impl CertificateIdentity {
    /// `not_before <= now <= not_after`. No revocation check.
    #[must_use]
    pub fn is_currently_valid(&self, now: SystemTime) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// Whole days until `not_after`; negative once expired.
    #[must_use]
    pub fn days_until_expiry(&self, now: SystemTime) -> i64 {
        let whole_days =
            |d: Duration| i64::try_from(d.as_secs() / SECONDS_PER_DAY).unwrap_or(i64::MAX);
        match self.not_after.duration_since(now) {
            Ok(remaining) => whole_days(remaining),
            Err(past) => -whole_days(past.duration()),
        }
    }

    #[must_use]
    pub fn common_name(&self) -> Option<&str> {
        self.subject.get(&COMMON_NAME)
    }
    #[must_use]
    pub fn organization(&self) -> Option<&str> {
        self.subject.get(&ORGANIZATION)
    }
    #[must_use]
    pub fn organizational_unit(&self) -> Option<&str> {
        self.subject.get(&ORGANIZATIONAL_UNIT)
    }
    #[must_use]
    pub fn country(&self) -> Option<&str> {
        self.subject.get(&COUNTRY)
    }
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.subject.get(&STATE)
    }
    #[must_use]
    pub fn locality(&self) -> Option<&str> {
        self.subject.get(&LOCALITY)
    }
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.subject.get(&oids::EMAIL_ADDRESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(oid: ObjectIdentifier, value: &str) -> DnAttribute {
        DnAttribute {
            oid,
            value: AttributeValue::Text(value.to_string()),
        }
    }

    fn identity(not_before: u64, not_after: u64) -> CertificateIdentity {
        CertificateIdentity {
            subject: DistinguishedName::new(vec![
                text(COUNTRY, "BR"),
                text(ORGANIZATION, "ICP-Brasil"),
                text(COMMON_NAME, "MARIA SILVA:12345678901"),
            ]),
            issuer: DistinguishedName::default(),
            serial_number_hex: "0A1B".into(),
            not_before: SystemTime::UNIX_EPOCH + Duration::from_secs(not_before),
            not_after: SystemTime::UNIX_EPOCH + Duration::from_secs(not_after),
            national_id: None,
        }
    }

    #[test]
    fn test_national_id_heuristic() {
        assert_eq!(
            NationalId::from_common_name("MARIA SILVA:12345678901"),
            Some(NationalId::Natural("12345678901".into()))
        );
        assert_eq!(
            NationalId::from_common_name("ACME LTDA:12345678000199"),
            Some(NationalId::Organization("12345678000199".into()))
        );
        assert_eq!(NationalId::from_common_name("MARIA SILVA"), None);
        assert_eq!(NationalId::from_common_name("X:1234567890"), None);
        assert_eq!(NationalId::from_common_name("X:1234567890a"), None);
        assert_eq!(NationalId::from_common_name("X:"), None);
    }

    #[test]
    fn test_validity_window_is_inclusive() {
        let id = identity(1_000, 2_000);
        let at = |secs| SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
        assert!(!id.is_currently_valid(at(999)));
        assert!(id.is_currently_valid(at(1_000)));
        assert!(id.is_currently_valid(at(2_000)));
        assert!(!id.is_currently_valid(at(2_001)));
    }

    #[test]
    fn test_days_until_expiry() {
        let id = identity(0, 10 * SECONDS_PER_DAY);
        let at = |days: u64| SystemTime::UNIX_EPOCH + Duration::from_secs(days * SECONDS_PER_DAY);
        assert_eq!(id.days_until_expiry(at(3)), 7);
        assert_eq!(id.days_until_expiry(at(12)), -2);
    }

    #[test]
    fn test_dn_rendering_keeps_unknown_attributes() {
        let mut attrs = identity(0, 1).subject.attributes().to_vec();
        attrs.push(DnAttribute {
            oid: ObjectIdentifier::new_unwrap("2.16.76.1.3.3"),
            value: AttributeValue::Opaque {
                tag: 0x04,
                bytes: vec![0xCA, 0xFE],
            },
        });
        let dn = DistinguishedName::new(attrs);
        assert_eq!(
            dn.to_string(),
            "C=BR, O=ICP-Brasil, CN=MARIA SILVA:12345678901, 2.16.76.1.3.3=#cafe"
        );
        assert_eq!(dn.get(&ORGANIZATION), Some("ICP-Brasil"));
    }
}

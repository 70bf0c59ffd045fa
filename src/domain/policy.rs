//! Signature policies selectable for a signing session.
//!
//! The registry is built once (see [`SignaturePolicyRegistry::shared`]) and handed
//! to consumers behind an `Arc`; entries are never mutated afterwards.

use std::fmt;
use std::sync::Arc;

use der::asn1::ObjectIdentifier;

use crate::domain::crypto::DigestAlgorithm;
use crate::domain::oids;
use crate::infra::error::{SigningError, SigningResult};

/// Signature container family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// Signature embedded in a PDF.
    PAdES,
    /// Detached CMS signature over arbitrary content.
    CAdES,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::PAdES => f.write_str("PAdES"),
            PolicyKind::CAdES => f.write_str("CAdES"),
        }
    }
}

/// Algorithms written into a CMS `SignerInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeAlgorithms {
    pub digest: DigestAlgorithm,
    /// `signatureAlgorithm` OID, `rsaEncryption` unless a policy says otherwise.
    pub signature: ObjectIdentifier,
}

impl Default for EnvelopeAlgorithms {
    fn default() -> Self {
        Self {
            digest: DigestAlgorithm::Sha256,
            signature: oids::RSA_ENCRYPTION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePolicy {
    pub id: &'static str,
    pub name: &'static str,
    /// Registered policy OID; only jurisdiction-certified policies have one.
    pub oid: Option<ObjectIdentifier>,
    pub requires_timestamp: bool,
    pub is_jurisdiction_certified: bool,
    pub kind: PolicyKind,
    /// Whether the preparation service should draw a visible appearance unless told otherwise.
    pub visible_by_default: bool,
}

impl SignaturePolicy {
    const fn certified(
        id: &'static str,
        name: &'static str,
        oid: ObjectIdentifier,
        requires_timestamp: bool,
        kind: PolicyKind,
    ) -> Self {
        Self {
            id,
            name,
            oid: Some(oid),
            requires_timestamp,
            is_jurisdiction_certified: true,
            kind,
            visible_by_default: false,
        }
    }

    const fn generic(id: &'static str, name: &'static str, requires_timestamp: bool) -> Self {
        Self {
            id,
            name,
            oid: None,
            requires_timestamp,
            is_jurisdiction_certified: false,
            kind: PolicyKind::PAdES,
            visible_by_default: false,
        }
    }

    /// Algorithms this policy signs with. Every standard policy uses SHA-256 with RSA.
    #[must_use]
    pub fn envelope_algorithms(&self) -> EnvelopeAlgorithms {
        EnvelopeAlgorithms::default()
    }
}

pub const DEFAULT_POLICY_ID: &str = "pades-basic";

/// Immutable lookup table of signature policies keyed by id.
#[derive(Debug, Clone)]
pub struct SignaturePolicyRegistry {
    policies: Vec<SignaturePolicy>,
}

impl SignaturePolicyRegistry {
    /// The standard policy set.
    #[must_use]
    pub fn standard() -> Self {
        let adobe = SignaturePolicy {
            visible_by_default: true,
            ..SignaturePolicy::generic(
                "pades-adobe-compatible",
                "PAdES Adobe Reader compatible",
                false,
            )
        };
        Self::from_policies(vec![
            SignaturePolicy::certified(
                "pades-icpbr-adr-basica",
                "PAdES ICP-Brasil AD-RB (basic references)",
                oids::PADES_ICPBR_AD_RB,
                false,
                PolicyKind::PAdES,
            ),
            SignaturePolicy::certified(
                "pades-icpbr-adr-tempo",
                "PAdES ICP-Brasil AD-RT (time references)",
                oids::PADES_ICPBR_AD_RT,
                true,
                PolicyKind::PAdES,
            ),
            SignaturePolicy::certified(
                "cades-icpbr-adr-basica",
                "CAdES ICP-Brasil AD-RB (basic references)",
                oids::CADES_ICPBR_AD_RB,
                false,
                PolicyKind::CAdES,
            ),
            SignaturePolicy::certified(
                "cades-icpbr-adr-tempo",
                "CAdES ICP-Brasil AD-RT (time references)",
                oids::CADES_ICPBR_AD_RT,
                true,
                PolicyKind::CAdES,
            ),
            SignaturePolicy::generic(DEFAULT_POLICY_ID, "PAdES basic", false),
            SignaturePolicy::generic("pades-with-timestamp", "PAdES with timestamp", true),
            adobe,
        ])
    }

    /// Build a registry from explicit entries; later duplicates of an id are ignored.
    #[must_use]
    pub fn from_policies(policies: Vec<SignaturePolicy>) -> Self {
        let mut unique: Vec<SignaturePolicy> = Vec::with_capacity(policies.len());
        for policy in policies {
            if unique.iter().any(|p| p.id == policy.id) {
                log::warn!("Ignoring duplicate signature policy id {}", policy.id);
                continue;
            }
            unique.push(policy);
        }
        Self { policies: unique }
    }

    /// The standard registry behind shared ownership.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::standard())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SignaturePolicy> {
        self.policies.iter().find(|p| p.id == id)
    }

    /// # Errors
    /// `UnknownPolicy` when no entry has this id.
    pub fn lookup(&self, id: &str) -> SigningResult<&SignaturePolicy> {
        self.get(id)
            .ok_or_else(|| SigningError::UnknownPolicy(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignaturePolicy> {
        self.policies.iter()
    }

    pub fn pades(&self) -> impl Iterator<Item = &SignaturePolicy> {
        self.of_kind(PolicyKind::PAdES)
    }

    pub fn cades(&self) -> impl Iterator<Item = &SignaturePolicy> {
        self.of_kind(PolicyKind::CAdES)
    }

    pub fn certified(&self) -> impl Iterator<Item = &SignaturePolicy> {
        self.policies.iter().filter(|p| p.is_jurisdiction_certified)
    }

    fn of_kind(&self, kind: PolicyKind) -> impl Iterator<Item = &SignaturePolicy> {
        self.policies.iter().filter(move |p| p.kind == kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Default for SignaturePolicyRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

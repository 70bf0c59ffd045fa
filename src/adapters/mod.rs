//! Interfaces to the remote preparation/finalization service.
//!
//! The signing core never talks HTTP itself. It sees two blocking traits:
//! [`PreparationService`] hashes and prepares the document, [`FinalizationService`]
//! accepts the signature and returns the signed document. [`remote`] implements
//! both over HTTPS.

pub mod remote;

use std::fmt;

use crate::infra::error::SigningResult;

/// Options forwarded to the preparation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Draw a visible signature appearance.
    pub visible: bool,
    /// Signature policy id the service should apply.
    pub policy_id: Option<String>,
    /// Dotted OID of the policy, for policies that carry one.
    pub policy_oid: Option<String>,
    /// The policy asks the service to add a timestamp.
    pub requires_timestamp: bool,
    /// Appearance description, passed to the service as-is.
    pub visual_representation: Option<serde_json::Value>,
    pub security_context_id: Option<String>,
    /// Opaque value the service hands back unchanged.
    pub callback_argument: Option<serde_json::Value>,
}

/// Text-only appearance on a new last page, with the signing time included.
#[must_use]
pub fn text_visual_representation(text: &str, font_size: u32) -> serde_json::Value {
    serde_json::json!({
        "text": {
            "text": text,
            "fontSize": font_size,
            "includeSigningTime": true,
        },
        "position": {
            "pageNumber": -1,
            "auto": "newPage",
        },
    })
}

/// Result of preparing a document for signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedDocument {
    pub document_id: String,
    /// Signature field reserved by the service, when it already chose one.
    pub field_name: Option<String>,
}

/// What the service wants signed.
#[derive(Clone, PartialEq, Eq)]
pub struct CmsParameters {
    pub to_sign_digest: Vec<u8>,
    /// Dotted OID of the algorithm that produced `to_sign_digest`.
    pub digest_algorithm_oid: String,
    pub field_name: String,
    /// DER signed attributes whose digest is `to_sign_digest`, when the service
    /// expects a full CMS envelope back.
    pub signed_attributes: Option<Vec<u8>>,
}

impl fmt::Debug for CmsParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmsParameters")
            .field("digest_len", &self.to_sign_digest.len())
            .field("digest_algorithm_oid", &self.digest_algorithm_oid)
            .field("field_name", &self.field_name)
            .field(
                "signed_attributes_len",
                &self.signed_attributes.as_ref().map(Vec::len),
            )
            .finish()
    }
}

/// Shape of the signature handed back for injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFormat {
    /// DER CMS `SignedData` envelope.
    Cms,
    /// Bare PKCS#1 v1.5 signature value.
    Pkcs1,
}

impl SignatureFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureFormat::Cms => "cms",
            SignatureFormat::Pkcs1 => "pkcs1",
        }
    }
}

/// Signature plus the certificates the service needs to embed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub document_id: String,
    pub field_name: String,
    pub format: SignatureFormat,
    pub signature: Vec<u8>,
    pub leaf_certificate: Vec<u8>,
    pub chain: Vec<Vec<u8>>,
}

/// Remote side of the first two session phases.
pub trait PreparationService {
    /// Upload a document and reserve a signature field.
    ///
    /// Every call creates a new remote document.
    ///
    /// # Errors
    /// `NetworkError` or `RemoteRejected` on transport or service failure.
    fn prepare(&self, document: &[u8], options: &PrepareOptions) -> SigningResult<PreparedDocument>;

    /// Fetch the digest to sign for a prepared document.
    ///
    /// # Errors
    /// `NetworkError` or `RemoteRejected` on transport or service failure,
    /// `InvalidInput` when the response payload cannot be decoded.
    fn cms_params(&self, document_id: &str, field_name: Option<&str>)
        -> SigningResult<CmsParameters>;
}

/// Remote side of the last two session phases.
pub trait FinalizationService {
    /// Hand the signature over; returns whether the service accepted it.
    ///
    /// # Errors
    /// `NetworkError` or `RemoteRejected` on transport or service failure.
    fn inject(&self, injection: &Injection) -> SigningResult<bool>;

    /// Close the document and download the signed result.
    ///
    /// # Errors
    /// `NetworkError` or `RemoteRejected` on transport or service failure,
    /// `InvalidInput` when the document payload cannot be decoded.
    fn finalize(&self, document_id: &str) -> SigningResult<Vec<u8>>;
}

//! JSON messages exchanged with the document signature service.
//!
//! Binary payloads travel as base64 (documents, certificates) or hex (digests,
//! signed attributes, signatures).

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::adapters::{CmsParameters, Injection, PrepareOptions, PreparedDocument};
use crate::infra::error::{SigningError, SigningResult};

/// `POST pades/prepare`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareRequest {
    /// Base64 document bytes.
    pub pdf_base64: String,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_policy_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_policy_oid: Option<String>,
    #[serde(default)]
    pub requires_timestamp: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_representation: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_argument: Option<serde_json::Value>,
}

impl PrepareRequest {
    #[must_use]
    pub fn new(document: &[u8], options: &PrepareOptions) -> Self {
        Self {
            pdf_base64: base64::engine::general_purpose::STANDARD.encode(document),
            visible: options.visible,
            signature_policy_id: options.policy_id.clone(),
            signature_policy_oid: options.policy_oid.clone(),
            requires_timestamp: options.requires_timestamp,
            visual_representation: options.visual_representation.clone(),
            security_context_id: options.security_context_id.clone(),
            callback_argument: options.callback_argument.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareResponse {
    pub document_id: String,
    #[serde(default)]
    pub field_name: Option<String>,
}

impl From<PrepareResponse> for PreparedDocument {
    fn from(response: PrepareResponse) -> Self {
        Self {
            document_id: response.document_id,
            field_name: response.field_name,
        }
    }
}

/// `POST pades/cms-params`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsParamsRequest {
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsParamsResponse {
    /// Hex digest to sign.
    pub to_sign_hash_hex: String,
    pub digest_algorithm_oid: String,
    pub field_name: String,
    /// Hex DER of the signed attributes the digest was computed over.
    #[serde(default)]
    pub to_be_signed_der_hex: Option<String>,
}

impl CmsParamsResponse {
    /// Decode the hex payloads.
    ///
    /// # Errors
    /// `InvalidInput` when a hex field is malformed.
    pub fn into_parameters(self) -> SigningResult<CmsParameters> {
        let to_sign_digest = decode_hex("to_sign_hash_hex", &self.to_sign_hash_hex)?;
        let signed_attributes = self
            .to_be_signed_der_hex
            .as_deref()
            .map(|hex_der| decode_hex("to_be_signed_der_hex", hex_der))
            .transpose()?;
        Ok(CmsParameters {
            to_sign_digest,
            digest_algorithm_oid: self.digest_algorithm_oid,
            field_name: self.field_name,
            signed_attributes,
        })
    }
}

/// `POST pades/inject`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectRequest {
    pub document_id: String,
    pub field_name: String,
    /// `cms` or `pkcs1`.
    pub signature_format: String,
    pub signature_hex: String,
    pub certificate_base64: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub chain_base64: Vec<String>,
}

impl From<&Injection> for InjectRequest {
    fn from(injection: &Injection) -> Self {
        let b64 = base64::engine::general_purpose::STANDARD;
        Self {
            document_id: injection.document_id.clone(),
            field_name: injection.field_name.clone(),
            signature_format: injection.format.as_str().to_string(),
            signature_hex: hex::encode(&injection.signature),
            certificate_base64: b64.encode(&injection.leaf_certificate),
            chain_base64: injection.chain.iter().map(|der| b64.encode(der)).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectResponse {
    pub accepted: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST pades/finalize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub document_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub pdf_base64: String,
}

impl FinalizeResponse {
    /// # Errors
    /// `InvalidInput` when the document is not valid base64.
    pub fn decode_document(&self) -> SigningResult<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.pdf_base64.trim())
            .map_err(|e| SigningError::InvalidInput(format!("pdf_base64 is not base64: {e}")))
    }
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error_code: Option<String>,
    pub message: String,
}

/// Error codes the service is known to send.
pub mod error_codes {
    pub const AUTH_FAILED: &str = "AUTH_FAILED";
    pub const DOCUMENT_NOT_FOUND: &str = "DOCUMENT_NOT_FOUND";
    pub const INVALID_SIGNATURE: &str = "INVALID_SIGNATURE";
    pub const FIELD_LOCKED: &str = "FIELD_LOCKED";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
}

fn decode_hex(field: &str, value: &str) -> SigningResult<Vec<u8>> {
    hex::decode(value.trim())
        .map_err(|e| SigningError::InvalidInput(format!("{field} is not valid hex: {e}")))
}

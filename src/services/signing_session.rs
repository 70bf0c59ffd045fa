//! Multi-phase signing session against the remote document service.
//!
//! ```text
//! Created --prepare--> Prepared --fetch_params--> ParamsFetched
//!     --sign_locally--> LocallySigned --inject--> Injected --finalize--> Finalized
//! ```
//!
//! Every transition takes `&mut self`, so one session can only be advanced by one
//! caller at a time. A transition that fails leaves the phase where it was; the
//! caller may repeat a failed remote call or drop the session. Nothing is retried
//! here.

use std::sync::Arc;
use std::time::SystemTime;

use crate::adapters::{
    FinalizationService, Injection, PrepareOptions, PreparationService, SignatureFormat,
};
use crate::domain::crypto::{DigestAlgorithm, DigestBytes, RawSignature};
use crate::domain::identity::CertificateIdentity;
use crate::domain::policy::{EnvelopeAlgorithms, SignaturePolicy, SignaturePolicyRegistry};
use crate::domain::session::Phase;
use crate::infra::error::{SigningError, SigningResult};
use crate::services::cert_inspector::CertificateInspector;
use crate::services::cms_builder::CmsEnvelopeBuilder;
use crate::services::key_store::KeyStoreBundle;
use crate::services::raw_signer::RawSigner;

const TOKEN_BYTES: usize = 16;
const TOKEN_LOG_PREFIX: usize = 8;

/// Per-session options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Signature policy id, resolved against the registry.
    pub policy_id: String,
    /// Override the policy's default appearance.
    pub visible: Option<bool>,
    /// Ship the key-store's issuing certificates with the signature.
    pub embed_chain: bool,
    /// Appearance description forwarded to the service untouched.
    pub visual_representation: Option<serde_json::Value>,
    pub security_context_id: Option<String>,
    /// Returned by the service unchanged.
    pub callback_argument: Option<serde_json::Value>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            policy_id: crate::domain::policy::DEFAULT_POLICY_ID.to_string(),
            visible: None,
            embed_chain: true,
            visual_representation: None,
            security_context_id: None,
            callback_argument: None,
        }
    }
}

/// Signature produced by [`SigningSession::sign_locally`], ready for injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSignature {
    pub format: SignatureFormat,
    /// CMS DER or bare PKCS#1 signature, depending on `format`.
    pub payload: Vec<u8>,
    pub leaf_certificate: Vec<u8>,
    pub chain: Vec<Vec<u8>>,
}

/// One document signature, driven phase by phase.
pub struct SigningSession<'s> {
    preparer: &'s dyn PreparationService,
    finalizer: &'s dyn FinalizationService,
    policy: SignaturePolicy,
    options: SessionOptions,
    session_token: String,
    phase: Phase,
    document_id: Option<String>,
    field_name: Option<String>,
    digest: Option<DigestBytes>,
    signed_attributes: Option<Vec<u8>>,
    signer: Option<CertificateIdentity>,
    local_signature: Option<LocalSignature>,
}

impl<'s> SigningSession<'s> {
    /// Start a session in phase `Created`.
    ///
    /// # Errors
    /// `UnknownPolicy` when `options.policy_id` is not registered,
    /// `CryptographicError` if no session token can be generated.
    pub fn new(
        preparer: &'s dyn PreparationService,
        finalizer: &'s dyn FinalizationService,
        registry: &Arc<SignaturePolicyRegistry>,
        options: SessionOptions,
    ) -> SigningResult<Self> {
        let policy = registry.lookup(&options.policy_id)?.clone();
        let mut token = [0u8; TOKEN_BYTES];
        openssl::rand::rand_bytes(&mut token)?;
        let session = Self {
            preparer,
            finalizer,
            policy,
            options,
            session_token: hex::encode(token),
            phase: Phase::Created,
            document_id: None,
            field_name: None,
            digest: None,
            signed_attributes: None,
            signer: None,
            local_signature: None,
        };
        log::info!(
            "Session {}: created with policy {}",
            session.short_token(),
            session.policy.id
        );
        Ok(session)
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }
    #[must_use]
    pub fn session_token(&self) -> &str {
        &self.session_token
    }
    #[must_use]
    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        self.field_name.as_deref()
    }
    #[must_use]
    pub fn policy(&self) -> &SignaturePolicy {
        &self.policy
    }
    /// Algorithm of the digest returned by `fetch_params`.
    #[must_use]
    pub fn digest_algorithm(&self) -> Option<DigestAlgorithm> {
        self.digest.as_ref().map(DigestBytes::algorithm)
    }
    /// Identity of the signing certificate, known after `sign_locally`.
    #[must_use]
    pub fn signer(&self) -> Option<&CertificateIdentity> {
        self.signer.as_ref()
    }

    /// Upload the document. Allowed once, from `Created`.
    ///
    /// # Errors
    /// `InvalidPhaseTransition` out of order, otherwise errors from the service.
    pub fn prepare(&mut self, document: &[u8]) -> SigningResult<()> {
        self.check_transition(Phase::Prepared)?;
        let options = PrepareOptions {
            visible: self.options.visible.unwrap_or(self.policy.visible_by_default),
            policy_id: Some(self.policy.id.to_string()),
            policy_oid: self.policy.oid.map(|oid| oid.to_string()),
            requires_timestamp: self.policy.requires_timestamp,
            visual_representation: self.options.visual_representation.clone(),
            security_context_id: self.options.security_context_id.clone(),
            callback_argument: self.options.callback_argument.clone(),
        };
        let prepared = self.preparer.prepare(document, &options)?;
        log::debug!(
            "Session {}: document {} prepared ({} bytes)",
            self.short_token(),
            prepared.document_id,
            document.len()
        );
        self.document_id = Some(prepared.document_id);
        self.field_name = prepared.field_name;
        self.advance(Phase::Prepared);
        Ok(())
    }

    /// Fetch the digest to sign.
    ///
    /// When the service also returns the signed attributes, their digest must equal
    /// the digest to sign; the signature is then delivered as a CMS envelope.
    ///
    /// # Errors
    /// `InvalidPhaseTransition` out of order; `UnsupportedAlgorithm`,
    /// `DigestSizeMismatch` or `SignedAttributesDigestMismatch` for unusable
    /// parameters; otherwise errors from the service.
    pub fn fetch_params(&mut self) -> SigningResult<()> {
        self.check_transition(Phase::ParamsFetched)?;
        let document_id = self.require_document_id()?;
        let params = self
            .preparer
            .cms_params(&document_id, self.field_name.as_deref())?;

        let algorithm = DigestAlgorithm::from_oid_str(&params.digest_algorithm_oid)?;
        let digest = DigestBytes::new(algorithm, params.to_sign_digest)?;
        if let Some(attributes) = &params.signed_attributes {
            let computed = algorithm.digest(attributes);
            if computed != digest {
                return Err(SigningError::SignedAttributesDigestMismatch {
                    remote: digest.to_hex(),
                    computed: computed.to_hex(),
                });
            }
        }

        log::debug!(
            "Session {}: {} digest for field {}",
            self.short_token(),
            algorithm,
            params.field_name
        );
        self.field_name = Some(params.field_name);
        self.digest = Some(digest);
        self.signed_attributes = params.signed_attributes;
        self.advance(Phase::ParamsFetched);
        Ok(())
    }

    /// Sign the fetched digest with the bundle's key.
    ///
    /// The bundle is only borrowed for this call; pair it with
    /// [`KeyStoreReader::with_bundle`](crate::services::KeyStoreReader::with_bundle)
    /// so the key is released straight after.
    ///
    /// # Errors
    /// `InvalidPhaseTransition` out of order, `MalformedCertificate` for an
    /// unreadable leaf, signing or envelope errors otherwise.
    pub fn sign_locally(&mut self, bundle: &KeyStoreBundle) -> SigningResult<&LocalSignature> {
        self.check_transition(Phase::LocallySigned)?;
        let digest = self.digest.as_ref().ok_or_else(|| {
            SigningError::InvalidInput("session has no digest to sign".into())
        })?;

        let leaf = bundle.leaf_certificate().as_der();
        let identity = CertificateInspector::inspect(leaf)?;
        if !identity.is_currently_valid(SystemTime::now()) {
            log::warn!(
                "Session {}: signing certificate {} is outside its validity window",
                self.short_token(),
                identity.serial_number_hex
            );
        }

        let chain: Vec<Vec<u8>> = if self.options.embed_chain {
            bundle.chain().iter().map(|c| c.as_der().to_vec()).collect()
        } else {
            Vec::new()
        };

        let signature: RawSignature = RawSigner::sign(digest, bundle.private_key())?;
        let (format, payload) = match &self.signed_attributes {
            Some(attributes) => {
                let builder = CmsEnvelopeBuilder::with_algorithms(EnvelopeAlgorithms {
                    digest: digest.algorithm(),
                    ..self.policy.envelope_algorithms()
                });
                let envelope =
                    builder.build(attributes, signature.as_slice(), leaf, chain.as_slice())?;
                (SignatureFormat::Cms, envelope)
            }
            None => (SignatureFormat::Pkcs1, signature.as_slice().to_vec()),
        };

        log::info!(
            "Session {}: signed locally as {} ({} bytes) for {}",
            self.short_token(),
            format.as_str(),
            payload.len(),
            identity.subject
        );
        self.signer = Some(identity);
        self.advance(Phase::LocallySigned);
        Ok(self.local_signature.insert(LocalSignature {
            format,
            payload,
            leaf_certificate: leaf.to_vec(),
            chain,
        }))
    }

    /// Hand the local signature to the service.
    ///
    /// # Errors
    /// `InvalidPhaseTransition` out of order, `RemoteRejected` when the service
    /// declines the signature, otherwise errors from the service.
    pub fn inject(&mut self) -> SigningResult<()> {
        self.check_transition(Phase::Injected)?;
        let document_id = self.require_document_id()?;
        let (Some(local), Some(field_name)) = (&self.local_signature, &self.field_name) else {
            return Err(SigningError::InvalidInput(
                "session has no signature to inject".into(),
            ));
        };
        let injection = Injection {
            document_id,
            field_name: field_name.clone(),
            format: local.format,
            signature: local.payload.clone(),
            leaf_certificate: local.leaf_certificate.clone(),
            chain: local.chain.clone(),
        };
        if !self.finalizer.inject(&injection)? {
            return Err(SigningError::RemoteRejected(format!(
                "signature for field {field_name} was not accepted"
            )));
        }
        self.advance(Phase::Injected);
        Ok(())
    }

    /// Close the document and return the signed bytes.
    ///
    /// # Errors
    /// `InvalidPhaseTransition` out of order (including a second call), otherwise
    /// errors from the service.
    pub fn finalize(&mut self) -> SigningResult<Vec<u8>> {
        self.check_transition(Phase::Finalized)?;
        let document_id = self.require_document_id()?;
        let signed = self.finalizer.finalize(&document_id)?;
        log::info!(
            "Session {}: finalized, signed document is {} bytes",
            self.short_token(),
            signed.len()
        );
        self.local_signature = None;
        self.advance(Phase::Finalized);
        Ok(signed)
    }

    /// Run every phase in order for one document.
    ///
    /// # Errors
    /// The first error raised by any phase.
    pub fn sign_document(
        &mut self,
        document: &[u8],
        bundle: &KeyStoreBundle,
    ) -> SigningResult<Vec<u8>> {
        self.prepare(document)?;
        self.fetch_params()?;
        self.sign_locally(bundle)?;
        self.inject()?;
        self.finalize()
    }

    fn check_transition(&self, attempted: Phase) -> SigningResult<()> {
        if attempted.predecessor() == Some(self.phase) {
            Ok(())
        } else {
            Err(SigningError::InvalidPhaseTransition {
                current: self.phase,
                attempted,
            })
        }
    }

    fn advance(&mut self, next: Phase) {
        log::info!("Session {}: {} -> {}", self.short_token(), self.phase, next);
        self.phase = next;
    }

    fn require_document_id(&self) -> SigningResult<String> {
        self.document_id
            .clone()
            .ok_or_else(|| SigningError::InvalidInput("session has no document id".into()))
    }

    fn short_token(&self) -> &str {
        &self.session_token[..TOKEN_LOG_PREFIX]
    }
}

impl std::fmt::Debug for SigningSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSession")
            .field("token", &format_args!("{}...", self.short_token()))
            .field("phase", &self.phase)
            .field("policy", &self.policy.id)
            .field("document_id", &self.document_id)
            .field("field_name", &self.field_name)
            .finish_non_exhaustive()
    }
}

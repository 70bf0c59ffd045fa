//! PAdES Signer Library
//!
//! Client-side half of a split PAdES/CAdES signing flow. A remote service prepares
//! the PDF and hands back the digest to sign; this crate opens the signer's PKCS#12
//! bundle, signs that digest with raw RSA, wraps the result in a DER CMS
//! `SignedData` envelope and hands it back for injection.
//!
//! ```text
//! SigningSession
//!   -> PreparationService::prepare / cms_params   (remote)
//!   -> RawSigner + CmsEnvelopeBuilder             (local)
//!   -> FinalizationService::inject / finalize     (remote)
//! ```

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod services;

pub use adapters::remote::{RemoteServiceConfig, RemoteSigningClient};
pub use adapters::{FinalizationService, PreparationService, SignatureFormat};
pub use domain::crypto::{DigestAlgorithm, DigestBytes, RawSignature};
pub use domain::identity::{CertificateIdentity, DistinguishedName, NationalId};
pub use domain::policy::{PolicyKind, SignaturePolicy, SignaturePolicyRegistry};
pub use domain::session::Phase;
pub use infra::config::{ClientConfiguration, ConfigManager};
pub use infra::error::{SigningError, SigningResult};
pub use services::{
    CertificateInspector, CmsEnvelopeBuilder, KeyStoreBundle, KeyStoreReader, RawSigner,
    SessionOptions, SigningSession,
};

//! Signing services: key-store access, certificate inspection, raw signing,
//! CMS assembly and the session state machine.

pub mod cert_inspector;
pub mod cms_builder;
pub mod key_store;
pub mod raw_signer;
pub mod signed_attributes;
pub mod signing_session;

pub use cert_inspector::{
    decode_certificate, decode_certificate_chain, encode_pem, CertificateInspector,
};
pub use cms_builder::{parse_envelope, CmsEnvelopeBuilder, ParsedSignedData, ParsedSignerInfo};
pub use key_store::{KeyStoreBundle, KeyStoreReader, PrivateKeyHandle};
pub use raw_signer::RawSigner;
pub use signed_attributes::SignedAttributesBuilder;
pub use signing_session::{LocalSignature, SessionOptions, SigningSession};

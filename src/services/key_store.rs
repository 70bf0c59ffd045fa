//! PKCS#12 key-store reader.
//!
//! Decrypts a password-protected bundle into the leaf certificate, its private key
//! and any issuing certificates. The decrypted key lives inside a
//! [`PrivateKeyHandle`]; dropping the handle frees it through OpenSSL, which clears
//! the private components before releasing their memory. Prefer
//! [`KeyStoreReader::with_bundle`] so the key never outlives the signing call.

use std::fmt;
use std::path::Path;

use der::asn1::ObjectIdentifier;
use openssl::error::ErrorStack;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use zeroize::Zeroizing;

use crate::domain::asn1::{Element, TAG_OCTET_STRING, TAG_OID, TAG_SEQUENCE};
use crate::domain::crypto::{ChainCertificate, LeafCertificate};
use crate::domain::oids;
use crate::infra::error::{SigningError, SigningResult};

const ENCRYPTED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.6");
const SHROUDED_KEY_BAG: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.10.1.2");
const PBES2: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.5.13");
const TAG_CONTEXT_0: u8 = 0xA0;

/// Legacy PKCS#12 PBE schemes, by OID.
const LEGACY_PBE: &[(&str, &str)] = &[
    ("1.2.840.113549.1.12.1.1", "pbeWithSHAAnd128BitRC4"),
    ("1.2.840.113549.1.12.1.2", "pbeWithSHAAnd40BitRC4"),
    ("1.2.840.113549.1.12.1.3", "pbeWithSHAAnd3-KeyTripleDES-CBC"),
    ("1.2.840.113549.1.12.1.4", "pbeWithSHAAnd2-KeyTripleDES-CBC"),
    ("1.2.840.113549.1.12.1.5", "pbeWithSHAAnd128BitRC2-CBC"),
    ("1.2.840.113549.1.12.1.6", "pbeWithSHAAnd40BitRC2-CBC"),
];

/// Decrypted private key. Deliberately neither `Clone` nor printable.
pub struct PrivateKeyHandle {
    key: PKey<Private>,
}

impl PrivateKeyHandle {
    pub(crate) fn new(key: PKey<Private>) -> Self {
        Self { key }
    }

    pub(crate) fn pkey(&self) -> &PKey<Private> {
        &self.key
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> u32 {
        self.key.bits()
    }

    #[must_use]
    pub fn is_rsa(&self) -> bool {
        self.key.rsa().is_ok()
    }
}

impl fmt::Debug for PrivateKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKeyHandle(bits={}, <redacted>)", self.key.bits())
    }
}

/// Contents of a decrypted key-store.
#[derive(Debug)]
pub struct KeyStoreBundle {
    leaf: LeafCertificate,
    private_key: PrivateKeyHandle,
    chain: Vec<ChainCertificate>,
}

impl KeyStoreBundle {
    #[must_use]
    pub fn leaf_certificate(&self) -> &LeafCertificate {
        &self.leaf
    }

    #[must_use]
    pub fn private_key(&self) -> &PrivateKeyHandle {
        &self.private_key
    }

    /// Issuing certificates in the order stored in the bundle.
    #[must_use]
    pub fn chain(&self) -> &[ChainCertificate] {
        &self.chain
    }
}

/// Opens PKCS#12 bundles.
pub struct KeyStoreReader;

impl KeyStoreReader {
    /// Make the RC2/RC4/3DES PBE schemes of older exports available.
    ///
    /// OpenSSL 3 keeps them in the `legacy` provider, which is loaded once into the
    /// default library context and kept for the life of the process. Returns
    /// `false` when the provider could not be loaded; modern bundles still open.
    #[cfg(ossl300)]
    pub fn load_legacy_algorithms() -> bool {
        use std::sync::OnceLock;

        use openssl::provider::Provider;

        static LEGACY: OnceLock<Option<Provider>> = OnceLock::new();
        LEGACY
            .get_or_init(|| match Provider::try_load(None, "legacy", true) {
                Ok(provider) => {
                    log::debug!("Loaded OpenSSL legacy provider");
                    Some(provider)
                }
                Err(e) => {
                    log::debug!("OpenSSL legacy provider unavailable: {e}");
                    None
                }
            })
            .is_some()
    }

    /// Older OpenSSL builds ship the legacy PBE schemes in the default set.
    #[cfg(not(ossl300))]
    pub fn load_legacy_algorithms() -> bool {
        true
    }

    /// Decrypt a PKCS#12 bundle.
    ///
    /// # Errors
    /// - `MalformedBundle` when the bytes are not PKCS#12 or carry no usable key
    /// - `InvalidPassword` when decryption or MAC verification fails
    /// - `UnsupportedAlgorithm` when the bundle is encrypted with a scheme this
    ///   OpenSSL build cannot run
    /// - `NoCertificateFound` when the bundle has no leaf certificate
    pub fn open(bundle: &[u8], password: &str) -> SigningResult<KeyStoreBundle> {
        log::debug!("Opening PKCS#12 bundle ({} bytes)", bundle.len());

        let pkcs12 = Pkcs12::from_der(bundle)
            .map_err(|e| SigningError::MalformedBundle(format!("not a PKCS#12 structure: {e}")))?;

        Self::load_legacy_algorithms();
        let parsed = pkcs12
            .parse2(password)
            .map_err(|e| classify_parse_error(&e, bundle))?;

        let cert = parsed.cert.ok_or(SigningError::NoCertificateFound)?;
        let key = parsed
            .pkey
            .ok_or_else(|| SigningError::MalformedBundle("bundle has no private key".into()))?;

        let cert_public = cert.public_key()?;
        if !cert_public.public_eq(&key) {
            return Err(SigningError::MalformedBundle(
                "private key does not match the leaf certificate".into(),
            ));
        }

        let leaf_der = cert
            .to_der()
            .map_err(|e| SigningError::MalformedBundle(format!("leaf certificate: {e}")))?;
        let leaf = LeafCertificate::from_der(leaf_der)
            .map_err(|e| SigningError::MalformedBundle(e.to_string()))?;

        let mut chain = Vec::new();
        for ca in parsed.ca.iter().flatten() {
            let der = ca
                .to_der()
                .map_err(|e| SigningError::MalformedBundle(format!("chain certificate: {e}")))?;
            chain.push(
                ChainCertificate::from_der(der)
                    .map_err(|e| SigningError::MalformedBundle(e.to_string()))?,
            );
        }

        log::info!(
            "Opened key-store: {}-bit key, {} chain certificate(s)",
            key.bits(),
            chain.len()
        );

        Ok(KeyStoreBundle {
            leaf,
            private_key: PrivateKeyHandle::new(key),
            chain,
        })
    }

    /// Read and decrypt a bundle from disk. The raw file bytes are wiped after parsing.
    ///
    /// # Errors
    /// `IoError` when the file cannot be read, otherwise as [`KeyStoreReader::open`].
    pub fn open_file(path: &Path, password: &str) -> SigningResult<KeyStoreBundle> {
        let bytes = Zeroizing::new(std::fs::read(path).map_err(|e| {
            SigningError::IoError(format!("failed to read key-store {}: {e}", path.display()))
        })?);
        Self::open(&bytes, password)
    }

    /// Scoped acquisition: decrypt, hand the bundle to `f`, then release the key.
    ///
    /// The bundle is dropped when `f` returns, whether it succeeded, failed, or
    /// panicked, so the decrypted key cannot escape the closure.
    ///
    /// # Errors
    /// Errors from [`KeyStoreReader::open`] or from `f`.
    pub fn with_bundle<T, F>(bundle: &[u8], password: &str, f: F) -> SigningResult<T>
    where
        F: FnOnce(&KeyStoreBundle) -> SigningResult<T>,
    {
        let opened = Self::open(bundle, password)?;
        let result = f(&opened);
        drop(opened);
        log::debug!("Released decrypted key-store");
        result
    }
}

/// Map a `parse2` failure to the cause the caller can act on.
fn classify_parse_error(error: &ErrorStack, bundle: &[u8]) -> SigningError {
    log::debug!("PKCS#12 decryption failed: {error}");
    let reasons: Vec<&str> = error.errors().iter().filter_map(|e| e.reason()).collect();

    if mentions(&reasons, &["mac verify failure", "bad decrypt", "cipherfinal"]) {
        return SigningError::InvalidPassword;
    }
    if mentions(&reasons, &["unsupported", "unknown cipher", "fetch failed"]) {
        return SigningError::UnsupportedAlgorithm {
            oid: unsupported_scheme(bundle),
            context: "PKCS#12 encryption".into(),
        };
    }
    if reasons.is_empty() {
        return SigningError::InvalidPassword;
    }
    SigningError::MalformedBundle(error.to_string())
}

fn mentions(reasons: &[&str], needles: &[&str]) -> bool {
    reasons
        .iter()
        .any(|reason| needles.iter().any(|needle| reason.contains(needle)))
}

/// Name the first non-PBES2 encryption scheme in the bundle.
fn unsupported_scheme(bundle: &[u8]) -> String {
    let schemes = encryption_schemes(bundle).unwrap_or_default();
    let Some(scheme) = schemes.iter().find(|s| **s != PBES2).or(schemes.first()) else {
        return "unknown".into();
    };
    let dotted = scheme.to_string();
    match LEGACY_PBE.iter().find(|(oid, _)| *oid == dotted) {
        Some((_, name)) => format!("{dotted} ({name})"),
        None => dotted,
    }
}

/// Encryption algorithm OIDs of the encrypted bags and shrouded keys.
///
/// Walks `PFX.authSafe`, which is plaintext in password-integrity mode:
/// `EncryptedData` content carries its algorithm directly, and `data` content
/// holds `SafeBag`s whose shrouded keys name theirs in `EncryptedPrivateKeyInfo`.
fn encryption_schemes(bundle: &[u8]) -> SigningResult<Vec<ObjectIdentifier>> {
    let pfx = Element::parse(bundle)?.expect_tag(TAG_SEQUENCE, "PFX")?.children()?;
    let auth_safe = pfx
        .get(1)
        .ok_or_else(|| SigningError::MalformedBundle("PFX without authSafe".into()))?;
    let safe_contents = explicit_octets(auth_safe)?;

    let mut schemes = Vec::new();
    for content_info in Element::parse(safe_contents)?.children()? {
        let fields = content_info.children()?;
        let (Some(content_type), Some(content)) = (fields.first(), fields.get(1)) else {
            continue;
        };
        let content_type = oid(content_type)?;
        if content_type == ENCRYPTED_DATA {
            // [0] { EncryptedData { version, EncryptedContentInfo { type, alg, .. } } }
            let encrypted = content.expect_tag(TAG_CONTEXT_0, "EncryptedData")?.children()?;
            if let Some(info) = encrypted
                .first()
                .map(Element::children)
                .transpose()?
                .and_then(|fields| fields.get(1).copied())
                .and_then(|eci| eci.children().ok())
            {
                if let Some(algorithm) = info.get(1) {
                    schemes.push(algorithm_oid(algorithm)?);
                }
            }
        } else if content_type == oids::ID_DATA {
            for bag in Element::parse(explicit_octets(&content_info)?)?.children()? {
                let bag_fields = bag.children()?;
                if bag_fields.first().map(oid).transpose()? != Some(SHROUDED_KEY_BAG) {
                    continue;
                }
                let Some(value) = bag_fields.get(1) else {
                    continue;
                };
                // [0] { EncryptedPrivateKeyInfo { alg, data } }
                if let Some(key_info) = value.children()?.first() {
                    if let Some(algorithm) = key_info.children()?.first() {
                        schemes.push(algorithm_oid(algorithm)?);
                    }
                }
            }
        }
    }
    Ok(schemes)
}

/// `ContentInfo { data, [0] { OCTET STRING } }` -> the octets.
fn explicit_octets<'a>(content_info: &Element<'a>) -> SigningResult<&'a [u8]> {
    let fields = content_info.children()?;
    let wrapped = fields
        .get(1)
        .ok_or_else(|| SigningError::MalformedBundle("ContentInfo without content".into()))?
        .expect_tag(TAG_CONTEXT_0, "ContentInfo.content")?
        .children()?;
    let octets = wrapped
        .first()
        .ok_or_else(|| SigningError::MalformedBundle("empty ContentInfo content".into()))?
        .expect_tag(TAG_OCTET_STRING, "ContentInfo.content")?;
    Ok(octets.content)
}

fn oid(element: &Element<'_>) -> SigningResult<ObjectIdentifier> {
    let element = element.expect_tag(TAG_OID, "OBJECT IDENTIFIER")?;
    ObjectIdentifier::from_bytes(element.content)
        .map_err(|e| SigningError::MalformedBundle(format!("invalid OBJECT IDENTIFIER: {e}")))
}

fn algorithm_oid(algorithm: &Element<'_>) -> SigningResult<ObjectIdentifier> {
    algorithm
        .children()?
        .first()
        .ok_or_else(|| SigningError::MalformedBundle("empty AlgorithmIdentifier".into()))
        .and_then(oid)
}

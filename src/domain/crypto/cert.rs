use std::fmt;

use x509_cert::der::Decode;
use x509_cert::Certificate;

use crate::infra::error::{SigningError, SigningResult};

/// DER of the certificate whose key produces the signature.
#[derive(Clone, PartialEq, Eq)]
pub struct LeafCertificate {
    der: Box<[u8]>,
}

/// DER of an issuing certificate shipped alongside the leaf.
#[derive(Clone, PartialEq, Eq)]
pub struct ChainCertificate {
    der: Box<[u8]>,
}

fn check_certificate(der: &[u8]) -> SigningResult<()> {
    Certificate::from_der(der)
        .map(|_| ())
        .map_err(|e| SigningError::MalformedCertificate(e.to_string()))
}

impl LeafCertificate {
    /// # Errors
    /// `MalformedCertificate` when the bytes are not a DER X.509 certificate.
    pub fn from_der(der: Vec<u8>) -> SigningResult<Self> {
        check_certificate(&der)?;
        Ok(Self {
            der: der.into_boxed_slice(),
        })
    }
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }
}

impl ChainCertificate {
    /// # Errors
    /// `MalformedCertificate` when the bytes are not a DER X.509 certificate.
    pub fn from_der(der: Vec<u8>) -> SigningResult<Self> {
        check_certificate(&der)?;
        Ok(Self {
            der: der.into_boxed_slice(),
        })
    }
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }
}

impl fmt::Debug for LeafCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LeafCertificate(len={})", self.der.len())
    }
}
impl fmt::Debug for ChainCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainCertificate(len={})", self.der.len())
    }
}

//! Cryptographic value types.
//!
//! Digest bytes always carry their algorithm and are length-checked on
//! construction; certificate wrappers are only built from parseable DER.

mod cert;
mod digest_algorithm;
mod digest_bytes;
mod digest_info;
mod signature;

pub use cert::{ChainCertificate, LeafCertificate};
pub use digest_algorithm::DigestAlgorithm;
pub use digest_bytes::DigestBytes;
pub use digest_info::{decode_digest_info, encode_digest_info};
pub use signature::RawSignature;

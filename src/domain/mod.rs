//! Pure domain types: DER tree, OIDs, digests, identities, policies and session phases.

pub mod asn1;
pub mod crypto;
pub mod identity;
pub mod oids;
pub mod policy;
pub mod session;

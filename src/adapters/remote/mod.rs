//! HTTPS client for the document signature service.
//!
//! Implements [`PreparationService`](super::PreparationService) and
//! [`FinalizationService`](super::FinalizationService) with blocking JSON calls
//! to `pades/prepare`, `pades/cms-params`, `pades/inject` and `pades/finalize`.

pub mod client;
pub mod protocol;

pub use client::{RemoteServiceConfig, RemoteSigningClient};

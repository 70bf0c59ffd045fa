//! Infrastructure: error taxonomy and configuration files.

pub mod config;
pub mod error;

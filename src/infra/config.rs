//! Configuration file support.
//!
//! Holds the service endpoint and signing preferences. Secrets never live in the
//! file: the API key and the key-store password are read from the environment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::domain::policy::{SignaturePolicyRegistry, DEFAULT_POLICY_ID};
use crate::infra::error::{SigningError, SigningResult};

/// Environment variable holding the service API key.
pub const API_KEY_ENV: &str = "PADES_API_KEY";
/// Environment variable holding the PKCS#12 password.
pub const PFX_PASSWORD_ENV: &str = "PADES_PFX_PASSWORD";

/// Client preferences persisted as TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfiguration {
    /// Remote signature service
    pub service: ServiceSettings,

    /// Policy id used when the command line does not name one
    pub default_policy: String,

    /// Ask the service for a visible signature appearance
    pub visible_signature: bool,

    /// Embed the intermediate chain in CMS envelopes
    pub embed_chain: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Only disable against local test servers.
    pub verify_tls: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:8443/api".to_string(),
            timeout_seconds: 60,
            verify_tls: true,
        }
    }
}

impl Default for ClientConfiguration {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            default_policy: DEFAULT_POLICY_ID.to_string(),
            visible_signature: false,
            embed_chain: true,
        }
    }
}

/// Loads, validates and saves [`ClientConfiguration`] files.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for the per-user default location.
    pub fn new() -> SigningResult<Self> {
        Ok(Self {
            config_path: Self::default_config_path()?,
        })
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// `<config dir>/pades-signer/config.toml`, or the working directory when the
    /// platform has no config directory.
    pub fn default_config_path() -> SigningResult<PathBuf> {
        Ok(match dirs::config_dir() {
            Some(dir) => dir.join("pades-signer").join("config.toml"),
            None => PathBuf::from("pades-signer-config.toml"),
        })
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load_or_create_default(&self) -> SigningResult<ClientConfiguration> {
        if self.config_path.exists() {
            return self.load();
        }
        log::info!(
            "Configuration file not found, creating default: {}",
            self.config_path.display()
        );
        let config = ClientConfiguration::default();
        self.save(&config)?;
        Ok(config)
    }

    /// # Errors
    /// `ConfigurationError` when the file cannot be read, parsed or validated.
    pub fn load(&self) -> SigningResult<ClientConfiguration> {
        log::info!("Loading configuration from: {}", self.config_path.display());
        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to read config file {}: {e}",
                self.config_path.display()
            ))
        })?;
        let config: ClientConfiguration = toml::from_str(&content).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;
        Self::validate_config(&config)?;
        Ok(config)
    }

    pub fn save(&self, config: &ClientConfiguration) -> SigningResult<()> {
        Self::validate_config(config)?;
        if let Some(parent) = self.config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                SigningError::ConfigurationError(format!(
                    "Failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let content = toml::to_string_pretty(config).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;
        fs::write(&self.config_path, content).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to write config file {}: {e}",
                self.config_path.display()
            ))
        })?;
        log::info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Checks the URL scheme, the timeout and that the default policy exists.
    pub fn validate_config(config: &ClientConfiguration) -> SigningResult<()> {
        let url = config.service.base_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(SigningError::ConfigurationError(format!(
                "Service URL must use http or https: {url}"
            )));
        }
        if config.service.timeout_seconds == 0 {
            return Err(SigningError::ConfigurationError(
                "Service timeout must be greater than 0".to_string(),
            ));
        }
        if SignaturePolicyRegistry::standard()
            .get(&config.default_policy)
            .is_none()
        {
            return Err(SigningError::ConfigurationError(format!(
                "Unknown default policy: {}",
                config.default_policy
            )));
        }
        Ok(())
    }
}

/// Read a secret from the environment.
///
/// # Errors
/// `ConfigurationError` when the variable is unset or empty.
pub fn secret_from_env(name: &str) -> SigningResult<Zeroizing<String>> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(Zeroizing::new(value)),
        _ => Err(SigningError::ConfigurationError(format!(
            "Environment variable {name} is not set"
        ))),
    }
}

pub fn api_key_from_env() -> SigningResult<Zeroizing<String>> {
    secret_from_env(API_KEY_ENV)
}

pub fn pfx_password_from_env() -> SigningResult<Zeroizing<String>> {
    secret_from_env(PFX_PASSWORD_ENV)
}

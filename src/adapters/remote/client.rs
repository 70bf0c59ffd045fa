//! Blocking HTTPS client for the document signature service.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroizing;

use super::protocol::{
    error_codes, CmsParamsRequest, CmsParamsResponse, ErrorResponse, FinalizeRequest,
    FinalizeResponse, InjectRequest, InjectResponse, PrepareRequest, PrepareResponse,
};
use crate::adapters::{
    CmsParameters, FinalizationService, Injection, PrepareOptions, PreparationService,
    PreparedDocument,
};
use crate::infra::error::{SigningError, SigningResult};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the signature service.
#[derive(Clone)]
pub struct RemoteServiceConfig {
    /// Base URL of the API, e.g. `https://ged.example.com/api`.
    pub base_url: String,
    /// API key sent as a bearer token.
    pub api_key: Zeroizing<String>,
    pub timeout_secs: u64,
    /// Verify the server certificate; only disable against local test servers.
    pub verify_tls: bool,
}

impl RemoteServiceConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Zeroizing<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verify_tls: true,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }
}

impl std::fmt::Debug for RemoteServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteServiceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

/// Talks to the service's `pades/*` endpoints. No retries: a failed call is
/// reported to the caller, which decides whether to try again.
pub struct RemoteSigningClient {
    config: RemoteServiceConfig,
    client: reqwest::blocking::Client,
}

impl RemoteSigningClient {
    /// # Errors
    /// `NetworkError` if the HTTP client cannot be built.
    pub fn new(config: RemoteServiceConfig) -> SigningResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| SigningError::NetworkError(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        request: &Req,
    ) -> SigningResult<Resp> {
        let url = self.endpoint(path);
        log::debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.as_str())
            .header("Accept", "application/json")
            .json(request)
            .send()
            .map_err(|e| SigningError::NetworkError(format!("Failed to reach {url}: {e}")))?;
        Self::handle_response(response)
    }

    fn handle_response<T: DeserializeOwned>(
        response: reqwest::blocking::Response,
    ) -> SigningResult<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .map_err(|e| SigningError::NetworkError(format!("Failed to parse response: {e}")));
        }

        let body = response.text().unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(error) => Err(Self::map_error(status, &error)),
            Err(_) => Err(SigningError::NetworkError(format!(
                "Server error {status}: {body}"
            ))),
        }
    }

    fn map_error(status: reqwest::StatusCode, error: &ErrorResponse) -> SigningError {
        match error.error_code.as_deref() {
            Some(error_codes::AUTH_FAILED) => SigningError::ConfigurationError(format!(
                "Authentication failed: {}",
                error.message
            )),
            Some(error_codes::RATE_LIMITED) => {
                SigningError::NetworkError(format!("Rate limited: {}", error.message))
            }
            Some(code) => SigningError::RemoteRejected(format!("[{code}] {}", error.message)),
            None if status.is_server_error() => {
                SigningError::NetworkError(format!("Server error {status}: {}", error.message))
            }
            None => SigningError::RemoteRejected(error.message.clone()),
        }
    }
}

impl PreparationService for RemoteSigningClient {
    fn prepare(
        &self,
        document: &[u8],
        options: &PrepareOptions,
    ) -> SigningResult<PreparedDocument> {
        let response: PrepareResponse =
            self.post("pades/prepare", &PrepareRequest::new(document, options))?;
        Ok(response.into())
    }

    fn cms_params(
        &self,
        document_id: &str,
        field_name: Option<&str>,
    ) -> SigningResult<CmsParameters> {
        let request = CmsParamsRequest {
            document_id: document_id.to_string(),
            field_name: field_name.map(str::to_string),
        };
        let response: CmsParamsResponse = self.post("pades/cms-params", &request)?;
        response.into_parameters()
    }
}

impl FinalizationService for RemoteSigningClient {
    fn inject(&self, injection: &Injection) -> SigningResult<bool> {
        let response: InjectResponse =
            self.post("pades/inject", &InjectRequest::from(injection))?;
        if let Some(message) = response.message.as_deref().filter(|_| !response.accepted) {
            log::warn!("Signature not accepted: {message}");
        }
        Ok(response.accepted)
    }

    fn finalize(&self, document_id: &str) -> SigningResult<Vec<u8>> {
        let request = FinalizeRequest {
            document_id: document_id.to_string(),
        };
        let response: FinalizeResponse = self.post("pades/finalize", &request)?;
        response.decode_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(code: Option<&str>) -> ErrorResponse {
        ErrorResponse {
            success: Some(false),
            error_code: code.map(str::to_string),
            message: "nope".into(),
        }
    }

    #[test]
    fn test_error_mapping() {
        let bad_request = reqwest::StatusCode::BAD_REQUEST;
        assert!(matches!(
            RemoteSigningClient::map_error(bad_request, &error(Some(error_codes::AUTH_FAILED))),
            SigningError::ConfigurationError(_)
        ));
        assert!(matches!(
            RemoteSigningClient::map_error(bad_request, &error(Some(error_codes::FIELD_LOCKED))),
            SigningError::RemoteRejected(msg) if msg.contains("FIELD_LOCKED")
        ));
        assert!(matches!(
            RemoteSigningClient::map_error(bad_request, &error(None)),
            SigningError::RemoteRejected(_)
        ));
        assert!(matches!(
            RemoteSigningClient::map_error(reqwest::StatusCode::BAD_GATEWAY, &error(None)),
            SigningError::NetworkError(_)
        ));
    }

    #[test]
    fn test_endpoint_and_redaction() {
        let config = RemoteServiceConfig::new(
            "https://ged.example.com/api/",
            Zeroizing::new("secret-key".to_string()),
        )
        .with_timeout(5);
        assert!(!format!("{config:?}").contains("secret-key"));
        let client = RemoteSigningClient::new(config).unwrap();
        assert_eq!(
            client.endpoint("pades/prepare"),
            "https://ged.example.com/api/pades/prepare"
        );
    }
}

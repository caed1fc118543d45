//! ARM Client
//!
//! Main client for the Azure Resource Manager, combining authentication
//! and HTTP functionality.

use super::auth::{provider_for, AzureCredentials, CredentialSource, StaticToken};
use super::http::{ApiError, ArmHttpClient};
use crate::resource::model::DiagnosticSettingsResource;
use crate::resource::DiagnosticSettingsApi;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

pub use super::http::format_arm_error;

/// API version of the `microsoft.aadiam` provider
pub const AAD_DIAGNOSTIC_SETTINGS_API_VERSION: &str = "2017-04-01";

pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";

/// Main ARM client
#[derive(Clone)]
pub struct AzureClient {
    pub credentials: AzureCredentials,
    pub http: ArmHttpClient,
    management_endpoint: String,
}

impl AzureClient {
    /// Create a new ARM client for the given credentials and endpoints
    pub fn new(
        source: &CredentialSource,
        management_endpoint: &str,
        login_endpoint: &str,
    ) -> Result<Self> {
        let http = ArmHttpClient::new().context("Failed to build HTTP client")?;
        let management_endpoint = normalize_endpoint(management_endpoint)?;
        let provider = provider_for(
            source,
            &management_endpoint,
            login_endpoint.trim_end_matches('/'),
            http.inner().clone(),
        );

        Ok(Self {
            credentials: AzureCredentials::new(provider),
            http,
            management_endpoint,
        })
    }

    /// Client authenticating with a fixed bearer token
    pub fn with_static_token(token: &str, management_endpoint: &str) -> Result<Self> {
        let http = ArmHttpClient::new().context("Failed to build HTTP client")?;

        Ok(Self {
            credentials: AzureCredentials::new(Arc::new(StaticToken(token.to_string()))),
            http,
            management_endpoint: normalize_endpoint(management_endpoint)?,
        })
    }

    pub fn management_endpoint(&self) -> &str {
        &self.management_endpoint
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String, ApiError> {
        self.credentials.get_token().await
    }

    /// Make a GET request to an ARM API
    pub async fn get(&self, url: &str) -> Result<Value, ApiError> {
        let token = self.get_token().await?;
        match self.http.get(url, &token).await {
            Err(e) if e.status() == Some(401) => {
                let token = self.credentials.refresh_token().await?;
                self.http.get(url, &token).await
            }
            other => other,
        }
    }

    /// Make a PUT request to an ARM API
    pub async fn put(&self, url: &str, body: &Value) -> Result<Value, ApiError> {
        let token = self.get_token().await?;
        match self.http.put(url, &token, body).await {
            Err(e) if e.status() == Some(401) => {
                let token = self.credentials.refresh_token().await?;
                self.http.put(url, &token, body).await
            }
            other => other,
        }
    }

    /// Make a DELETE request to an ARM API
    pub async fn delete(&self, url: &str) -> Result<Value, ApiError> {
        let token = self.get_token().await?;
        match self.http.delete(url, &token).await {
            Err(e) if e.status() == Some(401) => {
                let token = self.credentials.refresh_token().await?;
                self.http.delete(url, &token).await
            }
            other => other,
        }
    }

    /// Build the URL of a tenant-level AAD diagnostic setting
    pub fn aad_diagnostic_setting_url(&self, name: &str) -> String {
        format!(
            "{}/providers/microsoft.aadiam/diagnosticSettings/{}?api-version={}",
            self.management_endpoint,
            urlencoding::encode(name),
            AAD_DIAGNOSTIC_SETTINGS_API_VERSION
        )
    }
}

#[async_trait]
impl DiagnosticSettingsApi for AzureClient {
    async fn get(&self, name: &str) -> Result<DiagnosticSettingsResource, ApiError> {
        let url = self.aad_diagnostic_setting_url(name);
        let response = AzureClient::get(self, &url).await?;
        Ok(serde_json::from_value(response)?)
    }

    async fn create_or_update(
        &self,
        name: &str,
        parameters: &DiagnosticSettingsResource,
    ) -> Result<DiagnosticSettingsResource, ApiError> {
        let url = self.aad_diagnostic_setting_url(name);
        let body = serde_json::to_value(parameters)?;
        let response = self.put(&url, &body).await?;
        if response.is_null() {
            return Ok(parameters.clone());
        }
        Ok(serde_json::from_value(response)?)
    }

    async fn delete(&self, name: &str) -> Result<(), ApiError> {
        let url = self.aad_diagnostic_setting_url(name);
        AzureClient::delete(self, &url).await?;
        Ok(())
    }
}

fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let parsed = Url::parse(endpoint)
        .with_context(|| format!("Invalid management endpoint: {}", endpoint))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("Management endpoint must be http(s): {}", endpoint);
    }
    Ok(endpoint.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let client = AzureClient::with_static_token("t", "https://management.azure.com/").unwrap();
        assert_eq!(
            client.aad_diagnostic_setting_url("audit"),
            "https://management.azure.com/providers/microsoft.aadiam/diagnosticSettings/audit?api-version=2017-04-01"
        );
    }

    #[test]
    fn test_url_encodes_name() {
        let client = AzureClient::with_static_token("t", DEFAULT_MANAGEMENT_ENDPOINT).unwrap();
        assert!(client
            .aad_diagnostic_setting_url("aad logs")
            .contains("/diagnosticSettings/aad%20logs?"));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        assert!(AzureClient::with_static_token("t", "not a url").is_err());
        assert!(AzureClient::with_static_token("t", "ftp://example.com").is_err());
    }
}

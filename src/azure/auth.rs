//! Azure Authentication
//!
//! Acquires bearer tokens for Azure Resource Manager from a static token,
//! a service principal (client credentials grant) or the Azure CLI, and
//! caches them until shortly before they expire.

use super::http::ApiError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// OAuth2 scope for tokens accepted by the given management endpoint
pub fn management_scope(management_endpoint: &str) -> String {
    format!("{}/.default", management_endpoint.trim_end_matches('/'))
}

/// Resource the Azure CLI is asked to mint tokens for
pub fn management_resource(management_endpoint: &str) -> String {
    format!("{}/", management_endpoint.trim_end_matches('/'))
}

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if the issuer does not tell us (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// A freshly issued token
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    /// Lifetime reported by the issuer, if any
    pub expires_in: Option<Duration>,
}

/// Source of ARM bearer tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<AccessToken, ApiError>;
}

/// Where credentials come from, resolved from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Pre-issued bearer token (`ARM_ACCESS_TOKEN`)
    StaticToken(String),
    /// Client credentials grant
    ServicePrincipal {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    /// `az account get-access-token`
    AzureCli,
}

/// A token handed in from outside; never expires from our point of view
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<AccessToken, ApiError> {
        Ok(AccessToken {
            token: self.0.clone(),
            expires_in: None,
        })
    }
}

/// Service principal secret credential against the Microsoft identity platform
pub struct ServicePrincipal {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    login_endpoint: String,
    scope: String,
    client: reqwest::Client,
}

impl ServicePrincipal {
    pub fn new(
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
        login_endpoint: &str,
        management_endpoint: &str,
        client: reqwest::Client,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            login_endpoint: login_endpoint.trim_end_matches('/').to_string(),
            scope: management_scope(management_endpoint),
            client,
        }
    }
}

#[async_trait]
impl TokenProvider for ServicePrincipal {
    async fn token(&self) -> Result<AccessToken, ApiError> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_endpoint, self.tenant_id
        );
        tracing::debug!("Requesting service principal token from {}", url);

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self.client.post(&url).form(&params).send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let description = body
                .get("error_description")
                .and_then(|v| v.as_str())
                .unwrap_or("no error description");
            return Err(ApiError::Auth(format!(
                "token endpoint returned {}: {}",
                status, description
            )));
        }

        parse_token_response(&body)
    }
}

/// Extract token and lifetime from an OAuth2 token response
fn parse_token_response(body: &Value) -> Result<AccessToken, ApiError> {
    let token = body
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::Auth("no access_token in token response".to_string()))?
        .to_string();

    // expires_in is a number on v2.0 endpoints and a string on v1.0 ones
    let expires_in = match body.get("expires_in") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .map(Duration::from_secs);

    Ok(AccessToken { token, expires_in })
}

/// Tokens minted by a logged-in Azure CLI
pub struct AzureCli {
    resource: String,
}

impl AzureCli {
    pub fn new(management_endpoint: &str) -> Self {
        Self {
            resource: management_resource(management_endpoint),
        }
    }
}

#[async_trait]
impl TokenProvider for AzureCli {
    async fn token(&self) -> Result<AccessToken, ApiError> {
        tracing::debug!("Requesting token from Azure CLI");

        let output = tokio::process::Command::new("az")
            .args([
                "account",
                "get-access-token",
                "--resource",
                self.resource.as_str(),
                "--output",
                "json",
            ])
            .output()
            .await
            .map_err(|e| ApiError::Auth(format!("failed to run az: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ApiError::Auth(format!(
                "az account get-access-token failed: {}",
                stderr.trim()
            )));
        }

        let body: Value = serde_json::from_slice(&output.stdout)?;
        parse_cli_token(&body, chrono::Utc::now().timestamp())
    }
}

/// Parse `az account get-access-token` output
///
/// Newer CLIs report `expires_on` as a unix timestamp; older ones only
/// carry the local-time `expiresOn` string, in which case the default TTL
/// applies.
fn parse_cli_token(body: &Value, now_unix: i64) -> Result<AccessToken, ApiError> {
    let token = body
        .get("accessToken")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::Auth("no accessToken in az output".to_string()))?
        .to_string();

    let expires_in = body
        .get("expires_on")
        .and_then(|v| v.as_i64())
        .and_then(|expires_on| u64::try_from(expires_on - now_unix).ok())
        .map(Duration::from_secs);

    Ok(AccessToken { token, expires_in })
}

/// Build the provider matching a credential source, minting tokens for
/// `management_endpoint`
pub fn provider_for(
    source: &CredentialSource,
    management_endpoint: &str,
    login_endpoint: &str,
    client: reqwest::Client,
) -> Arc<dyn TokenProvider> {
    match source {
        CredentialSource::StaticToken(token) => Arc::new(StaticToken(token.clone())),
        CredentialSource::ServicePrincipal {
            tenant_id,
            client_id,
            client_secret,
        } => Arc::new(ServicePrincipal::new(
            tenant_id,
            client_id,
            client_secret,
            login_endpoint,
            management_endpoint,
            client,
        )),
        CredentialSource::AzureCli => Arc::new(AzureCli::new(management_endpoint)),
    }
}

/// Azure credentials holder with token caching
#[derive(Clone)]
pub struct AzureCredentials {
    provider: Arc<dyn TokenProvider>,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl AzureCredentials {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token for API calls
    pub async fn get_token(&self) -> Result<String, ApiError> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let issued = self.provider.token().await?;
        let ttl = issued.expires_in.unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: issued.token.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(issued.token)
    }

    /// Force refresh the token
    pub async fn refresh_token(&self) -> Result<String, ApiError> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }

        self.get_token().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        expires_in: Option<Duration>,
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn token(&self) -> Result<AccessToken, ApiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken {
                token: format!("token-{}", n),
                expires_in: self.expires_in,
            })
        }
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            expires_in: Some(Duration::from_secs(3600)),
        });
        let creds = AzureCredentials::new(provider.clone());

        assert_eq!(creds.get_token().await.unwrap(), "token-0");
        assert_eq!(creds.get_token().await.unwrap(), "token-0");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_short_lived_token_is_not_reused() {
        // Lifetime shorter than the expiry buffer is treated as already expired
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            expires_in: Some(Duration::from_secs(30)),
        });
        let creds = AzureCredentials::new(provider.clone());

        creds.get_token().await.unwrap();
        creds.get_token().await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_token_bypasses_cache() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            expires_in: None,
        });
        let creds = AzureCredentials::new(provider.clone());

        creds.get_token().await.unwrap();
        assert_eq!(creds.refresh_token().await.unwrap(), "token-1");
    }

    #[test]
    fn test_parse_token_response_number_and_string() {
        let v2 = parse_token_response(&json!({"access_token": "a", "expires_in": 3599})).unwrap();
        assert_eq!(v2.expires_in, Some(Duration::from_secs(3599)));

        let v1 = parse_token_response(&json!({"access_token": "b", "expires_in": "3600"})).unwrap();
        assert_eq!(v1.expires_in, Some(Duration::from_secs(3600)));

        assert!(parse_token_response(&json!({"token_type": "Bearer"})).is_err());
    }

    #[test]
    fn test_audience_follows_management_endpoint() {
        assert_eq!(
            management_scope("https://management.azure.com"),
            "https://management.azure.com/.default"
        );
        assert_eq!(
            management_scope("https://management.usgovcloudapi.net/"),
            "https://management.usgovcloudapi.net/.default"
        );
        assert_eq!(
            management_resource("https://management.chinacloudapi.cn"),
            "https://management.chinacloudapi.cn/"
        );
        assert_eq!(
            AzureCli::new("https://management.usgovcloudapi.net").resource,
            "https://management.usgovcloudapi.net/"
        );
    }

    #[test]
    fn test_parse_cli_token() {
        let body = json!({"accessToken": "cli", "expires_on": 1_700_003_600});
        let token = parse_cli_token(&body, 1_700_000_000).unwrap();
        assert_eq!(token.token, "cli");
        assert_eq!(token.expires_in, Some(Duration::from_secs(3600)));

        let legacy = json!({"accessToken": "cli", "expiresOn": "2023-11-14 23:13:20.000000"});
        assert_eq!(parse_cli_token(&legacy, 0).unwrap().expires_in, None);
    }
}

//! HTTP utilities for Azure Resource Manager REST calls

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use uuid::Uuid;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header ARM echoes back in its own logs, useful when raising support tickets
const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Errors returned by the management API layer
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The API answered 404
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Any other non-success status
    #[error("API request failed with status {status} ({code}): {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },

    #[error("failed to send request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to parse response JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl ApiError {
    /// Whether this error only signals the absence of the resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// HTTP status, when the request got as far as a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound { .. } => Some(404),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            ApiError::Decode(_) | ApiError::Auth(_) => None,
        }
    }
}

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let char_count = body.chars().count();
    let truncated = if char_count > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Extract `(code, message)` from an ARM error envelope
///
/// ARM answers `{"error": {"code": "...", "message": "..."}}`; a few older
/// services capitalise the envelope key.
pub fn parse_arm_error(body: &str) -> (String, String) {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let err = parsed
        .get("error")
        .or_else(|| parsed.get("Error"))
        .unwrap_or(&parsed);

    let code = err
        .get("code")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string();
    let message = err
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error")
        .to_string();

    (code, message)
}

/// HTTP client wrapper for ARM API calls
#[derive(Clone)]
pub struct ArmHttpClient {
    client: Client,
}

impl ArmHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("aadds/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Access the underlying reqwest client (shared with token providers)
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Make a GET request to an ARM API
    pub async fn get(&self, url: &str, token: &str) -> Result<Value, ApiError> {
        tracing::debug!("GET {}", url);
        self.execute(self.client.get(url).bearer_auth(token)).await
    }

    /// Make a PUT request with a JSON body to an ARM API
    pub async fn put(&self, url: &str, token: &str, body: &Value) -> Result<Value, ApiError> {
        tracing::debug!("PUT {}", url);
        self.execute(self.client.put(url).bearer_auth(token).json(body))
            .await
    }

    /// Make a DELETE request to an ARM API
    pub async fn delete(&self, url: &str, token: &str) -> Result<Value, ApiError> {
        tracing::debug!("DELETE {}", url);
        self.execute(self.client.delete(url).bearer_auth(token))
            .await
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let request_id = Uuid::new_v4().to_string();
        let response = request
            .header(CLIENT_REQUEST_ID_HEADER, &request_id)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            let (_, message) = parse_arm_error(&body);
            tracing::debug!("404 for request {}", request_id);
            return Err(ApiError::NotFound { message });
        }

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!(
                "API error: {} (request {}) - {}",
                status,
                request_id,
                sanitize_for_log(&body)
            );
            let (code, message) = parse_arm_error(&body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                code,
                message,
            });
        }

        // DELETE answers 200 or 204 with an empty body
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Format an API error for display on the terminal
pub fn format_arm_error(error: &ApiError) -> String {
    match error.status() {
        Some(401) => {
            "Authentication failed. Run 'az login' or set ARM_ACCESS_TOKEN.".to_string()
        }
        Some(403) => {
            "Permission denied. Diagnostic settings need the Security Administrator or Global Administrator role in the tenant.".to_string()
        }
        Some(404) => "Diagnostic setting not found.".to_string(),
        Some(409) => "Conflict. The diagnostic setting may be changing concurrently.".to_string(),
        Some(429) => "Rate limit exceeded. Please try again later.".to_string(),
        Some(400) => match error {
            ApiError::Status { message, .. } => format!("Invalid request: {}", message),
            _ => "Invalid request. Check your parameters.".to_string(),
        },
        Some(s) if s >= 500 => {
            "Azure Resource Manager temporarily unavailable. Please try again.".to_string()
        }
        _ => error.to_string(),
    }
}

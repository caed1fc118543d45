//! Integration tests for the ARM client using wiremock
//!
//! These tests verify the client behavior against mocked endpoints,
//! ensuring proper handling of various response codes and edge cases.

use aadds::azure::auth::{provider_for, AzureCredentials, CredentialSource};
use aadds::azure::http::ApiError;
use aadds::azure::AzureClient;
use aadds::resource::model::{DiagnosticSettings, DiagnosticSettingsResource, LogSettings};
use aadds::resource::DiagnosticSettingsApi;
use serde_json::json;
use wiremock::matchers::{
    bearer_token, body_partial_json, body_string_contains, header_exists, method, path,
    query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SETTING_PATH: &str = "/providers/microsoft.aadiam/diagnosticSettings/audit";
const PUBLIC_MANAGEMENT: &str = "https://management.azure.com";

fn setting_body() -> serde_json::Value {
    json!({
        "id": "/providers/microsoft.aadiam/diagnosticSettings/audit",
        "name": "audit",
        "type": "microsoft.aadiam/diagnosticSettings",
        "properties": {
            "workspaceId": "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.OperationalInsights/workspaces/law",
            "logs": [
                {
                    "category": "AuditLogs",
                    "enabled": true,
                    "retentionPolicy": {"enabled": false, "days": 0}
                }
            ]
        }
    })
}

/// Test module for the diagnostic settings API client
mod diagnostic_settings_client_tests {
    use super::*;

    /// Test successful GET request decodes the ARM payload
    #[tokio::test]
    async fn test_get_success_decodes_setting() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(SETTING_PATH))
            .and(query_param("api-version", "2017-04-01"))
            .and(bearer_token("test-token"))
            .and(header_exists("x-ms-client-request-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(setting_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = AzureClient::with_static_token("test-token", &server.uri()).unwrap();
        let setting = DiagnosticSettingsApi::get(&client, "audit").await.unwrap();

        assert_eq!(setting.name.as_deref(), Some("audit"));
        let logs = setting.properties.logs.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].category, "AuditLogs");
        assert_eq!(logs[0].enabled, Some(true));
        assert!(setting.properties.workspace_id.unwrap().ends_with("/workspaces/law"));
    }

    /// Test 404 response maps to the not-found error
    #[tokio::test]
    async fn test_404_returns_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(SETTING_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {
                    "code": "ResourceNotFound",
                    "message": "The diagnostic setting 'audit' doesn't exist."
                }
            })))
            .mount(&server)
            .await;

        let client = AzureClient::with_static_token("test-token", &server.uri()).unwrap();
        let err = DiagnosticSettingsApi::get(&client, "audit").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("doesn't exist"));
    }

    /// Test 403 response carries the ARM error code and message
    #[tokio::test]
    async fn test_403_returns_status_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(SETTING_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": "AuthorizationFailed",
                    "message": "The client does not have authorization to perform action."
                }
            })))
            .mount(&server)
            .await;

        let client = AzureClient::with_static_token("test-token", &server.uri()).unwrap();
        let err = DiagnosticSettingsApi::get(&client, "audit").await.unwrap_err();

        match err {
            ApiError::Status {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 403);
                assert_eq!(code, "AuthorizationFailed");
                assert!(message.contains("authorization"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    /// Test 500 with a non-JSON body still produces a status error
    #[tokio::test]
    async fn test_500_with_html_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(SETTING_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = AzureClient::with_static_token("test-token", &server.uri()).unwrap();
        let err = DiagnosticSettingsApi::get(&client, "audit").await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert!(matches!(err, ApiError::Status { ref code, .. } if code == "Unknown"));
    }

    /// Test PUT sends the camelCase payload and decodes the answer
    #[tokio::test]
    async fn test_put_sends_payload() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(SETTING_PATH))
            .and(query_param("api-version", "2017-04-01"))
            .and(body_partial_json(json!({
                "properties": {
                    "workspaceId": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.OperationalInsights/workspaces/law",
                    "logs": [{"category": "AuditLogs", "enabled": true}]
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(setting_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = AzureClient::with_static_token("test-token", &server.uri()).unwrap();
        let payload = DiagnosticSettingsResource {
            properties: DiagnosticSettings {
                workspace_id: Some(
                    "/subscriptions/s/resourceGroups/rg/providers/Microsoft.OperationalInsights/workspaces/law"
                        .into(),
                ),
                logs: Some(vec![LogSettings {
                    category: "AuditLogs".into(),
                    enabled: Some(true),
                    retention_policy: None,
                }]),
                ..Default::default()
            },
            ..Default::default()
        };

        let saved = client.create_or_update("audit", &payload).await.unwrap();
        assert_eq!(saved.name.as_deref(), Some("audit"));
    }

    /// Test a 401 is retried once with a refreshed token, then surfaced
    #[tokio::test]
    async fn test_401_is_retried_once() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(SETTING_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {
                    "code": "ExpiredAuthenticationToken",
                    "message": "The access token expiry UTC time is earlier than current UTC time."
                }
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = AzureClient::with_static_token("test-token", &server.uri()).unwrap();
        let err = DiagnosticSettingsApi::get(&client, "audit").await.unwrap_err();

        match err {
            ApiError::Status { status, code, .. } => {
                assert_eq!(status, 401);
                assert_eq!(code, "ExpiredAuthenticationToken");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    /// Test DELETE accepts an empty 204 answer
    #[tokio::test]
    async fn test_delete_204_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(SETTING_PATH))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = AzureClient::with_static_token("test-token", &server.uri()).unwrap();
        DiagnosticSettingsApi::delete(&client, "audit").await.unwrap();
    }

    /// Test DELETE of a missing setting surfaces not-found
    #[tokio::test]
    async fn test_delete_404_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(SETTING_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = AzureClient::with_static_token("test-token", &server.uri()).unwrap();
        let err = DiagnosticSettingsApi::delete(&client, "audit").await.unwrap_err();
        assert!(err.is_not_found());
    }
}

/// Test module for token acquisition
mod auth_tests {
    use super::*;

    /// Test the client-credentials grant and that the token is reused
    #[tokio::test]
    async fn test_service_principal_token_is_cached() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app-1"))
            .and(body_string_contains(
                "scope=https%3A%2F%2Fmanagement.azure.com%2F.default",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "sp-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = CredentialSource::ServicePrincipal {
            tenant_id: "tenant-1".into(),
            client_id: "app-1".into(),
            client_secret: "secret".into(),
        };
        let credentials =
            AzureCredentials::new(provider_for(
            &source,
            PUBLIC_MANAGEMENT,
            &server.uri(),
            reqwest::Client::new(),
        ));

        assert_eq!(credentials.get_token().await.unwrap(), "sp-token");
        assert_eq!(credentials.get_token().await.unwrap(), "sp-token");
    }

    /// Test token endpoint failures become auth errors
    #[tokio::test]
    async fn test_service_principal_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided."
            })))
            .mount(&server)
            .await;

        let source = CredentialSource::ServicePrincipal {
            tenant_id: "tenant-1".into(),
            client_id: "app-1".into(),
            client_secret: "wrong".into(),
        };
        let credentials =
            AzureCredentials::new(provider_for(
            &source,
            PUBLIC_MANAGEMENT,
            &server.uri(),
            reqwest::Client::new(),
        ));

        let err = credentials.get_token().await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(ref m) if m.contains("AADSTS7000215")));
    }

    /// Test ARM calls authenticate with the service principal token
    #[tokio::test]
    async fn test_client_uses_service_principal_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "expires_in": 3599,
                "access_token": "sp-token"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(SETTING_PATH))
            .and(bearer_token("sp-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(setting_body()))
            .expect(1)
            .mount(&server)
            .await;

        let source = CredentialSource::ServicePrincipal {
            tenant_id: "tenant-1".into(),
            client_id: "app-1".into(),
            client_secret: "secret".into(),
        };
        let client = AzureClient::new(&source, &server.uri(), &server.uri()).unwrap();
        DiagnosticSettingsApi::get(&client, "audit").await.unwrap();
    }

    /// Test the token scope follows a sovereign cloud endpoint
    #[tokio::test]
    async fn test_service_principal_scope_follows_management_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains(
                "scope=https%3A%2F%2Fmanagement.usgovcloudapi.net%2F.default",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "expires_in": 3599,
                "access_token": "gov-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = CredentialSource::ServicePrincipal {
            tenant_id: "tenant-1".into(),
            client_id: "app-1".into(),
            client_secret: "secret".into(),
        };
        let credentials = AzureCredentials::new(provider_for(
            &source,
            "https://management.usgovcloudapi.net/",
            &server.uri(),
            reqwest::Client::new(),
        ));

        assert_eq!(credentials.get_token().await.unwrap(), "gov-token");
    }

    /// Test the client asks for tokens scoped to its own endpoint
    #[tokio::test]
    async fn test_client_scope_matches_endpoint() {
        let server = MockServer::start().await;
        let audience = format!("{}/.default", server.uri());
        let scope = format!("scope={}", urlencoding::encode(&audience));

        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains(scope.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "expires_in": 3599,
                "access_token": "sp-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(SETTING_PATH))
            .and(bearer_token("sp-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(setting_body()))
            .expect(1)
            .mount(&server)
            .await;

        let source = CredentialSource::ServicePrincipal {
            tenant_id: "tenant-1".into(),
            client_id: "app-1".into(),
            client_secret: "secret".into(),
        };
        let client = AzureClient::new(&source, &server.uri(), &server.uri()).unwrap();
        DiagnosticSettingsApi::get(&client, "audit").await.unwrap();
    }
}

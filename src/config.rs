//! Configuration Management
//!
//! Handles persistent configuration storage for aadds and the `ARM_*`
//! environment overrides.

use crate::azure::auth::CredentialSource;
use crate::azure::client::{DEFAULT_LOGIN_ENDPOINT, DEFAULT_MANAGEMENT_ENDPOINT};
use crate::resource::{Features, Timeouts};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-operation timeout overrides, in seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TimeoutOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<u64>,
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Resource Manager endpoint (defaults to the public cloud)
    #[serde(default)]
    pub management_endpoint: Option<String>,
    /// Login endpoint for the client-credentials grant
    #[serde(default)]
    pub login_endpoint: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    /// Secrets are only ever read from the environment
    #[serde(skip)]
    pub client_secret: Option<String>,
    #[serde(skip)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub timeouts: TimeoutOverrides,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("aadds").join("config.json"))
    }

    /// Load configuration from disk, then apply environment overrides
    pub fn load() -> Self {
        let mut config = Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load configuration from a file; a missing or unreadable file yields defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Override file values with `ARM_*` variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("ARM_ACCESS_TOKEN") {
            self.access_token = Some(v);
        }
        if let Some(v) = get("ARM_TENANT_ID") {
            self.tenant_id = Some(v);
        }
        if let Some(v) = get("ARM_CLIENT_ID") {
            self.client_id = Some(v);
        }
        if let Some(v) = get("ARM_CLIENT_SECRET") {
            self.client_secret = Some(v);
        }
        if let Some(v) = get("ARM_RESOURCE_MANAGER_ENDPOINT") {
            self.management_endpoint = Some(v);
        }
        if let Some(v) = get("ARM_LOGIN_ENDPOINT") {
            self.login_endpoint = Some(v);
        }
        if let Some(v) = get("ARM_FOURPOINTZERO_BETA") {
            self.features.four_point_oh_beta = matches!(v.as_str(), "1" | "true" | "TRUE");
        }
    }

    /// Get effective management endpoint (CLI > env > config > public cloud)
    pub fn effective_management_endpoint(&self) -> String {
        self.management_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_MANAGEMENT_ENDPOINT.to_string())
    }

    pub fn effective_login_endpoint(&self) -> String {
        self.login_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_LOGIN_ENDPOINT.to_string())
    }

    /// Static token first, then a complete service principal, then the Azure CLI
    pub fn credential_source(&self) -> CredentialSource {
        if let Some(token) = &self.access_token {
            return CredentialSource::StaticToken(token.clone());
        }

        match (&self.tenant_id, &self.client_id, &self.client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                CredentialSource::ServicePrincipal {
                    tenant_id: tenant_id.clone(),
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                }
            }
            _ => CredentialSource::AzureCli,
        }
    }

    /// Apply timeout overrides on top of the resource defaults
    pub fn timeouts(&self, defaults: Timeouts) -> Timeouts {
        let pick = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_secs).unwrap_or(default)
        };

        Timeouts {
            create: pick(self.timeouts.create, defaults.create),
            read: pick(self.timeouts.read, defaults.read),
            update: pick(self.timeouts.update, defaults.update),
            delete: pick(self.timeouts.delete, defaults.delete),
        }
    }
}

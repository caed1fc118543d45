//! Resource data shapes
//!
//! Three families of types live here: the ARM payload (`DiagnosticSettingsResource`
//! and friends, camelCase on the wire), the desired configuration as written
//! by the user, and the state recorded after each read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// ARM payload
// =============================================================================

/// `microsoft.aadiam/diagnosticSettings` resource envelope
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSettingsResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub properties: DiagnosticSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_bus_rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_hub_authorization_rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_hub_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<LogSettings>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSettings {
    /// e.g. `AuditLogs`, `SignInLogs`, `NonInteractiveUserSignInLogs`
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_policy: Option<RetentionPolicySettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<i32>,
}

// =============================================================================
// Configuration / state
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub enabled: bool,
    pub days: i32,
}

/// Entry of the `enabled_log` set; always sent as enabled
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnabledLog {
    pub category: String,
    pub retention_policy: Option<RetentionPolicy>,
}

/// Entry of the deprecated `log` set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Log {
    pub category: String,
    pub enabled: bool,
    pub retention_policy: Option<RetentionPolicy>,
}

/// Desired configuration, after schema validation and defaults
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticSettingConfig {
    pub name: String,
    #[serde(default)]
    pub eventhub_name: Option<String>,
    #[serde(default)]
    pub eventhub_authorization_rule_id: Option<String>,
    #[serde(default)]
    pub log_analytics_workspace_id: Option<String>,
    #[serde(default)]
    pub storage_account_id: Option<String>,
    /// `None` when not written in the configuration
    #[serde(default)]
    pub enabled_log: Option<Vec<EnabledLog>>,
    #[serde(default)]
    pub log: Option<Vec<Log>>,
}

impl DiagnosticSettingConfig {
    pub fn eventhub_name(&self) -> &str {
        self.eventhub_name.as_deref().unwrap_or_default()
    }

    pub fn eventhub_authorization_rule_id(&self) -> &str {
        self.eventhub_authorization_rule_id
            .as_deref()
            .unwrap_or_default()
    }

    pub fn log_analytics_workspace_id(&self) -> &str {
        self.log_analytics_workspace_id.as_deref().unwrap_or_default()
    }

    pub fn storage_account_id(&self) -> &str {
        self.storage_account_id.as_deref().unwrap_or_default()
    }
}

/// Recorded state, as produced by a read
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiagnosticSettingState {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub eventhub_name: String,
    #[serde(default)]
    pub eventhub_authorization_rule_id: String,
    #[serde(default)]
    pub log_analytics_workspace_id: String,
    #[serde(default)]
    pub storage_account_id: String,
    #[serde(default)]
    pub enabled_log: Vec<EnabledLog>,
    /// Absent under the 4.0 feature set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Vec<Log>>,
}

/// Compare two collections with set semantics (order and duplicates ignored)
pub fn same_set<T: Ord>(a: &[T], b: &[T]) -> bool {
    let a: BTreeSet<&T> = a.iter().collect();
    let b: BTreeSet<&T> = b.iter().collect();
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_uses_arm_field_names() {
        let resource = DiagnosticSettingsResource {
            properties: DiagnosticSettings {
                workspace_id: Some("/ws".into()),
                event_hub_authorization_rule_id: Some("/rule".into()),
                event_hub_name: Some(String::new()),
                logs: Some(vec![LogSettings {
                    category: "AuditLogs".into(),
                    enabled: Some(true),
                    retention_policy: Some(RetentionPolicySettings {
                        enabled: Some(false),
                        days: Some(0),
                    }),
                }]),
                ..Default::default()
            },
            ..Default::default()
        };

        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(
            value,
            json!({
                "properties": {
                    "workspaceId": "/ws",
                    "eventHubAuthorizationRuleId": "/rule",
                    "eventHubName": "",
                    "logs": [{
                        "category": "AuditLogs",
                        "enabled": true,
                        "retentionPolicy": {"enabled": false, "days": 0}
                    }]
                }
            })
        );
    }

    #[test]
    fn test_payload_tolerates_sparse_response() {
        let resource: DiagnosticSettingsResource = serde_json::from_value(json!({
            "id": "/providers/microsoft.aadiam/diagnosticSettings/x",
            "name": "x",
            "type": "microsoft.aadiam/diagnosticSettings",
            "properties": {"logs": [{"category": "SignInLogs"}]}
        }))
        .unwrap();

        let logs = resource.properties.logs.unwrap();
        assert_eq!(logs[0].category, "SignInLogs");
        assert_eq!(logs[0].enabled, None);
        assert!(resource.properties.workspace_id.is_none());
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        let err = serde_json::from_value::<DiagnosticSettingConfig>(json!({
            "name": "x",
            "metric": []
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_same_set_ignores_order_and_duplicates() {
        assert!(same_set(&[1, 2, 2, 3], &[3, 1, 2]));
        assert!(!same_set(&[1, 2], &[1, 2, 4]));
        assert!(same_set::<u8>(&[], &[]));
    }
}

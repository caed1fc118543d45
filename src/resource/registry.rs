//! Schema Registry - Load resource schemas from JSON
//!
//! This module loads resource schema definitions from embedded JSON files
//! and provides lookup functions for the validator and the lifecycle
//! handlers.

use super::{Features, Timeouts};
use crate::azure::ids::{self, IdFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use std::time::Duration;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[include_str!(
    "../resources/monitor_aad_diagnostic_setting.json"
)];

/// Registry key of the AAD diagnostic setting resource
pub const AAD_DIAGNOSTIC_SETTING: &str = "monitor_aad_diagnostic_setting";

/// Field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Int,
    Bool,
    /// Unordered collection of nested blocks
    Set,
    /// Single nested block (list with at most one item)
    Block,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Bool => "bool",
            FieldType::Set => "set",
            FieldType::Block => "block",
        }
    }
}

/// Resource ID shapes a string field may be validated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    EventhubAuthorizationRule,
    LogAnalyticsWorkspace,
    StorageAccount,
}

impl IdKind {
    pub fn format(&self) -> &'static IdFormat {
        match self {
            IdKind::EventhubAuthorizationRule => &ids::EVENTHUB_AUTHORIZATION_RULE,
            IdKind::LogAnalyticsWorkspace => &ids::LOG_ANALYTICS_WORKSPACE,
            IdKind::StorageAccount => &ids::STORAGE_ACCOUNT,
        }
    }
}

/// Per-field validation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidationRule {
    DiagnosticSettingName,
    StringMatch { pattern: String, message: String },
    IntAtLeast { min: i64 },
    ResourceId { kind: IdKind },
}

/// Field definition from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    /// Value may be filled in from the remote side when not configured
    #[serde(default)]
    pub computed: bool,
    /// Changing the value requires replacing the resource
    #[serde(default)]
    pub force_new: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub at_least_one_of: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exactly_one_of: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRule>,
    /// Nested fields for `set` and `block`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub elem: BTreeMap<String, FieldSchema>,
}

/// Operation timeouts in seconds, as written in JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutsDef {
    pub create: u64,
    pub read: u64,
    pub update: u64,
    pub delete: u64,
}

impl From<TimeoutsDef> for Timeouts {
    fn from(def: TimeoutsDef) -> Self {
        Self {
            create: Duration::from_secs(def.create),
            read: Duration::from_secs(def.read),
            update: Duration::from_secs(def.update),
            delete: Duration::from_secs(def.delete),
        }
    }
}

/// Resource schema from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSchema {
    pub description: String,
    pub timeouts: TimeoutsDef,
    pub schema: BTreeMap<String, FieldSchema>,
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.schema.get(name)
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceSchema>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a resource schema by key, as written in JSON
pub fn get_resource(key: &str) -> Option<&'static ResourceSchema> {
    get_registry().resources.get(key)
}

/// Get all resource keys
pub fn get_all_resource_keys() -> Vec<&'static str> {
    get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect()
}

/// Get a resource schema adjusted for the active feature set
///
/// The JSON describes the pre-4.0 shape. Under the 4.0 feature set the
/// deprecated `log` block disappears and `enabled_log` stops being computed.
pub fn effective_schema(key: &str, features: Features) -> Option<ResourceSchema> {
    let mut resource = get_resource(key)?.clone();

    if features.four_point_oh_beta {
        resource.schema.remove("log");
        if let Some(enabled_log) = resource.schema.get_mut("enabled_log") {
            enabled_log.computed = false;
            enabled_log.exactly_one_of.clear();
        }
    }

    Some(resource)
}

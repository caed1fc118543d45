//! Create / Read / Update / Delete handlers
//!
//! Each handler is a self-contained request/response sequence against the
//! management API, bounded by its operation timeout. Create and Update read
//! the setting back so the returned state always reflects the remote side.

use super::api::DiagnosticSettingsApi;
use super::error::ResourceError;
use super::mapping::{
    any_enabled, expand_enabled_logs, expand_logs, flatten_enabled_logs, flatten_logs,
};
use super::model::{
    same_set, DiagnosticSettingConfig, DiagnosticSettingState, DiagnosticSettings,
    DiagnosticSettingsResource, LogSettings,
};
use super::poll::{BoxError, PollError, RefreshFunc, StateChangeConf};
use super::registry::{effective_schema, get_resource, ResourceSchema, AAD_DIAGNOSTIC_SETTING};
use super::validate::{decode_config, Validated};
use super::{Features, Timeouts};
use crate::azure::ids::{
    AadDiagnosticSettingId, IdFormat, EVENTHUB_AUTHORIZATION_RULE, LOG_ANALYTICS_WORKSPACE,
    STORAGE_ACCOUNT,
};
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Interval between existence checks after a delete
pub const DELETE_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Consecutive not-found observations required to consider a delete done
pub const DELETE_CONFIRMATIONS: u32 = 5;

const STATE_EXISTS: &str = "Exists";
const STATE_NOT_FOUND: &str = "NotFound";

/// Handlers for one AAD diagnostic setting resource type
pub struct AadDiagnosticSettingResource<A> {
    api: A,
    features: Features,
    timeouts: Timeouts,
    delete_poll_interval: Duration,
}

impl<A: DiagnosticSettingsApi> AadDiagnosticSettingResource<A> {
    pub fn new(api: A, features: Features) -> Self {
        let timeouts = get_resource(AAD_DIAGNOSTIC_SETTING)
            .map(|r| Timeouts::from(r.timeouts))
            .unwrap_or_default();

        Self {
            api,
            features,
            timeouts,
            delete_poll_interval: DELETE_POLL_INTERVAL,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Schema for the active feature set
    pub fn schema(&self) -> Option<ResourceSchema> {
        effective_schema(AAD_DIAGNOSTIC_SETTING, self.features)
    }

    /// Validate a raw configuration document and decode it
    pub fn decode(
        &self,
        document: &Value,
    ) -> Result<Validated<DiagnosticSettingConfig>, ResourceError> {
        let schema = self.schema().ok_or_else(|| {
            ResourceError::Config(format!("no schema registered for {}", AAD_DIAGNOSTIC_SETTING))
        })?;
        Ok(decode_config(&schema, document)?)
    }

    pub async fn create(
        &self,
        config: &DiagnosticSettingConfig,
    ) -> Result<DiagnosticSettingState, ResourceError> {
        tracing::info!("preparing arguments for AAD Diagnostic Setting {:?}", config.name);
        let id = AadDiagnosticSettingId::new(&config.name);

        self.bounded("create", &id, self.timeouts.create, async {
            match self.api.get(&id.name).await {
                Ok(_) => return Err(ResourceError::AlreadyExists { id: id.id() }),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    return Err(ResourceError::api(
                        format!("checking for presence of existing {}", id),
                        e,
                    ))
                }
            }

            let logs = self.logs_for_create(config);
            self.ensure_enabled(&id, &logs)?;

            let payload = build_payload(config, logs);
            self.api
                .create_or_update(&id.name, &payload)
                .await
                .map_err(|e| ResourceError::api(format!("creating {}", id), e))?;
            tracing::info!("created {}", id);
            Ok(())
        })
        .await?;

        self.read_back(&id).await
    }

    pub async fn update(
        &self,
        id: &str,
        prior: &DiagnosticSettingState,
        config: &DiagnosticSettingConfig,
    ) -> Result<DiagnosticSettingState, ResourceError> {
        tracing::info!("preparing arguments for AAD Diagnostic Setting {:?}", config.name);
        let id = AadDiagnosticSettingId::parse(id)?;

        self.bounded("update", &id, self.timeouts.update, async {
            let existing = self
                .api
                .get(&id.name)
                .await
                .map_err(|e| ResourceError::api(format!("retrieving {}", id), e))?;

            let mut logs: Vec<LogSettings> = Vec::new();
            let mut logs_changed = false;

            if !self.features.four_point_oh_beta && self.log_changed(prior, config) {
                logs_changed = true;
                logs = expand_logs(config.log.as_deref().unwrap_or_default());
            }

            if self.enabled_log_changed(prior, config) {
                logs_changed = true;
                logs.extend(expand_enabled_logs(
                    config.enabled_log.as_deref().unwrap_or_default(),
                ));
            }

            if !logs_changed {
                logs = existing.properties.logs.unwrap_or_default();
            }

            self.ensure_enabled(&id, &logs)?;

            let payload = build_payload(config, logs);
            self.api
                .create_or_update(&id.name, &payload)
                .await
                .map_err(|e| ResourceError::api(format!("creating {}", id), e))?;
            tracing::info!("updated {}", id);
            Ok(())
        })
        .await?;

        self.read_back(&id).await
    }

    /// Read the remote setting; `None` when it no longer exists
    pub async fn read(&self, id: &str) -> Result<Option<DiagnosticSettingState>, ResourceError> {
        let id = AadDiagnosticSettingId::parse(id)?;
        self.bounded("read", &id, self.timeouts.read, self.read_id(&id))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ResourceError> {
        let id = AadDiagnosticSettingId::parse(id)?;
        let deadline = Instant::now() + self.timeouts.delete;

        match tokio::time::timeout_at(deadline, self.api.delete(&id.name)).await {
            Err(_) => {
                return Err(ResourceError::OperationTimeout {
                    operation: "delete",
                    id: id.id(),
                    timeout: self.timeouts.delete,
                })
            }
            Ok(Err(e)) if e.is_not_found() => {
                tracing::debug!("{} was already gone", id);
            }
            Ok(Err(e)) => return Err(ResourceError::api(format!("deleting {}", id), e)),
            Ok(Ok(())) => {}
        }

        // The API is eventually consistent: a GET right after DELETE may
        // still return the setting, and a single 404 is not conclusive.
        tracing::debug!("Waiting for {} to disappear", id);
        let remaining = deadline.saturating_duration_since(Instant::now());
        StateChangeConf::new(&[STATE_EXISTS], &[STATE_NOT_FOUND], self.deleted_refresh(&id.name))
            .poll_interval(self.delete_poll_interval)
            .continuous_target_occurrence(DELETE_CONFIRMATIONS)
            .timeout(remaining)
            .wait_for_state()
            .await
            .map_err(|e| match e {
                PollError::Timeout { .. } => ResourceError::DidNotDisappear {
                    id: id.id(),
                    timeout: self.timeouts.delete,
                },
                other => ResourceError::Wait {
                    id: id.id(),
                    source: other,
                },
            })?;

        tracing::info!("deleted {}", id);
        Ok(())
    }

    /// Validate an ID and read the setting it points at into state
    pub async fn import(&self, id: &str) -> Result<DiagnosticSettingState, ResourceError> {
        let parsed = AadDiagnosticSettingId::parse(id)?;
        match self.read(id).await? {
            Some(state) => Ok(state),
            None => Err(ResourceError::NotFound { id: parsed.to_string() }),
        }
    }

    /// Force-new fields whose desired value differs from the prior state
    pub fn replacement_fields(
        &self,
        prior: &DiagnosticSettingState,
        config: &DiagnosticSettingConfig,
    ) -> Vec<String> {
        let Some(schema) = self.schema() else {
            return Vec::new();
        };

        schema
            .schema
            .iter()
            .filter(|(_, field)| field.force_new)
            .filter(|(key, _)| {
                match key.as_str() {
                    "name" => config.name != prior.name,
                    "eventhub_name" => config.eventhub_name() != prior.eventhub_name,
                    // IDs in state are normalized, so casing alone is no change
                    "eventhub_authorization_rule_id" => !config
                        .eventhub_authorization_rule_id()
                        .eq_ignore_ascii_case(&prior.eventhub_authorization_rule_id),
                    "storage_account_id" => !config
                        .storage_account_id()
                        .eq_ignore_ascii_case(&prior.storage_account_id),
                    _ => false,
                }
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn deleted_refresh(&self, name: &str) -> RefreshFunc<'_, ()> {
        let api = &self.api;
        let name = name.to_string();
        Box::new(move || {
            let name = name.clone();
            async move {
                match api.get(&name).await {
                    Ok(_) => Ok((Some(()), STATE_EXISTS.to_string())),
                    Err(e) if e.is_not_found() => Ok((Some(()), STATE_NOT_FOUND.to_string())),
                    Err(e) => Err(Box::new(e) as BoxError),
                }
            }
            .boxed()
        })
    }

    async fn read_back(
        &self,
        id: &AadDiagnosticSettingId,
    ) -> Result<DiagnosticSettingState, ResourceError> {
        let state = self
            .bounded("read", id, self.timeouts.read, self.read_id(id))
            .await?;
        state.ok_or_else(|| ResourceError::NotFound { id: id.to_string() })
    }

    async fn read_id(
        &self,
        id: &AadDiagnosticSettingId,
    ) -> Result<Option<DiagnosticSettingState>, ResourceError> {
        let resp = match self.api.get(&id.name).await {
            Ok(resp) => resp,
            Err(e) if e.is_not_found() => {
                tracing::warn!("{} was not found - removing from state!", id);
                return Ok(None);
            }
            Err(e) => return Err(ResourceError::api(format!("retrieving {}", id), e)),
        };

        let props = resp.properties;
        let logs = props.logs.as_deref();

        Ok(Some(DiagnosticSettingState {
            id: id.id(),
            name: id.name.clone(),
            eventhub_name: props.event_hub_name.clone().unwrap_or_default(),
            eventhub_authorization_rule_id: normalize_id(
                &EVENTHUB_AUTHORIZATION_RULE,
                props.event_hub_authorization_rule_id.as_deref(),
            )?,
            log_analytics_workspace_id: normalize_id(
                &LOG_ANALYTICS_WORKSPACE,
                props.workspace_id.as_deref(),
            )?,
            storage_account_id: normalize_id(
                &STORAGE_ACCOUNT,
                props.storage_account_id.as_deref(),
            )?,
            enabled_log: flatten_enabled_logs(logs),
            log: if self.features.four_point_oh_beta {
                None
            } else {
                Some(flatten_logs(logs))
            },
        }))
    }

    fn logs_for_create(&self, config: &DiagnosticSettingConfig) -> Vec<LogSettings> {
        let mut logs = Vec::new();

        if !self.features.four_point_oh_beta {
            if let Some(log) = config.log.as_deref().filter(|l| !l.is_empty()) {
                logs = expand_logs(log);
            }
        }

        if let Some(enabled) = config.enabled_log.as_deref().filter(|l| !l.is_empty()) {
            logs = expand_enabled_logs(enabled);
        }

        logs
    }

    /// `log` is computed: leaving it out of the configuration keeps the
    /// prior value
    fn log_changed(
        &self,
        prior: &DiagnosticSettingState,
        config: &DiagnosticSettingConfig,
    ) -> bool {
        match &config.log {
            None => false,
            Some(desired) => !same_set(desired, prior.log.as_deref().unwrap_or_default()),
        }
    }

    /// `enabled_log` is only computed outside the 4.0 feature set
    fn enabled_log_changed(
        &self,
        prior: &DiagnosticSettingState,
        config: &DiagnosticSettingConfig,
    ) -> bool {
        match &config.enabled_log {
            None if self.features.four_point_oh_beta => !prior.enabled_log.is_empty(),
            None => false,
            Some(desired) => !same_set(desired, &prior.enabled_log),
        }
    }

    /// With no enabled log the PUT succeeds but the next GET returns 404
    fn ensure_enabled(
        &self,
        id: &AadDiagnosticSettingId,
        logs: &[LogSettings],
    ) -> Result<(), ResourceError> {
        if any_enabled(logs) {
            Ok(())
        } else {
            Err(ResourceError::Config(format!(
                "at least one of the `log` of the {} should be enabled",
                id
            )))
        }
    }

    async fn bounded<T, F>(
        &self,
        operation: &'static str,
        id: &AadDiagnosticSettingId,
        timeout: Duration,
        fut: F,
    ) -> Result<T, ResourceError>
    where
        F: Future<Output = Result<T, ResourceError>>,
    {
        tokio::time::timeout(timeout, fut)
            .await
            .unwrap_or_else(|_| {
                Err(ResourceError::OperationTimeout {
                    operation,
                    id: id.id(),
                    timeout,
                })
            })
    }
}

#[cfg(test)]
impl<A: DiagnosticSettingsApi> AadDiagnosticSettingResource<A> {
    fn with_delete_poll_interval(mut self, interval: Duration) -> Self {
        self.delete_poll_interval = interval;
        self
    }
}

/// Parse a destination ID insensitively and re-format it canonically;
/// absent and empty IDs both become the empty string
fn normalize_id(format: &'static IdFormat, raw: Option<&str>) -> Result<String, ResourceError> {
    match raw {
        Some(raw) if !raw.is_empty() => Ok(format.parse_insensitively(raw)?.id()),
        _ => Ok(String::new()),
    }
}

/// Assemble the PUT body from configuration and the chosen log entries
fn build_payload(
    config: &DiagnosticSettingConfig,
    logs: Vec<LogSettings>,
) -> DiagnosticSettingsResource {
    let mut properties = DiagnosticSettings {
        logs: Some(logs),
        ..Default::default()
    };

    let rule_id = config.eventhub_authorization_rule_id();
    if !rule_id.is_empty() {
        properties.event_hub_authorization_rule_id = Some(rule_id.to_string());
        properties.event_hub_name = Some(config.eventhub_name().to_string());
    }

    let workspace_id = config.log_analytics_workspace_id();
    if !workspace_id.is_empty() {
        properties.workspace_id = Some(workspace_id.to_string());
    }

    let storage_account_id = config.storage_account_id();
    if !storage_account_id.is_empty() {
        properties.storage_account_id = Some(storage_account_id.to_string());
    }

    DiagnosticSettingsResource {
        properties,
        ..Default::default()
    }
}

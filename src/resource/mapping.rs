//! Expand / flatten
//!
//! Conversion between the flat configuration blocks and the nested ARM
//! `logs` payload.

use super::model::{EnabledLog, Log, LogSettings, RetentionPolicy, RetentionPolicySettings};

fn expand_retention_policy(policy: &RetentionPolicy) -> RetentionPolicySettings {
    RetentionPolicySettings {
        days: Some(policy.days),
        enabled: Some(policy.enabled),
    }
}

fn flatten_retention_policy(policy: Option<&RetentionPolicySettings>) -> Option<RetentionPolicy> {
    policy.map(|p| RetentionPolicy {
        days: p.days.unwrap_or_default(),
        enabled: p.enabled.unwrap_or_default(),
    })
}

/// Expand the deprecated `log` blocks, keeping each block's own enabled flag
///
/// Blocks without a retention policy cannot be expressed and are skipped.
pub fn expand_logs(input: &[Log]) -> Vec<LogSettings> {
    input
        .iter()
        .filter_map(|log| {
            let policy = log.retention_policy.as_ref()?;
            Some(LogSettings {
                category: log.category.clone(),
                enabled: Some(log.enabled),
                retention_policy: Some(expand_retention_policy(policy)),
            })
        })
        .collect()
}

/// Expand `enabled_log` blocks; every entry is sent as enabled
pub fn expand_enabled_logs(input: &[EnabledLog]) -> Vec<LogSettings> {
    input
        .iter()
        .filter_map(|log| {
            let policy = log.retention_policy.as_ref()?;
            Some(LogSettings {
                category: log.category.clone(),
                enabled: Some(true),
                retention_policy: Some(expand_retention_policy(policy)),
            })
        })
        .collect()
}

/// Flatten every remote log entry into deprecated `log` blocks
pub fn flatten_logs(input: Option<&[LogSettings]>) -> Vec<Log> {
    let Some(input) = input else {
        return Vec::new();
    };

    input
        .iter()
        .map(|v| Log {
            category: v.category.clone(),
            enabled: v.enabled.unwrap_or_default(),
            retention_policy: flatten_retention_policy(v.retention_policy.as_ref()),
        })
        .collect()
}

/// Flatten only the enabled remote log entries into `enabled_log` blocks
pub fn flatten_enabled_logs(input: Option<&[LogSettings]>) -> Vec<EnabledLog> {
    let Some(input) = input else {
        return Vec::new();
    };

    input
        .iter()
        .filter(|v| v.enabled.unwrap_or_default())
        .map(|v| EnabledLog {
            category: v.category.clone(),
            retention_policy: flatten_retention_policy(v.retention_policy.as_ref()),
        })
        .collect()
}

/// Whether any log entry is enabled
pub fn any_enabled(logs: &[LogSettings]) -> bool {
    logs.iter().any(|l| l.enabled == Some(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(enabled: bool, days: i32) -> Option<RetentionPolicy> {
        Some(RetentionPolicy { enabled, days })
    }

    fn remote(category: &str, enabled: Option<bool>) -> LogSettings {
        LogSettings {
            category: category.into(),
            enabled,
            retention_policy: Some(RetentionPolicySettings {
                enabled: Some(true),
                days: Some(30),
            }),
        }
    }

    #[test]
    fn test_expand_enabled_logs_forces_enabled() {
        let out = expand_enabled_logs(&[EnabledLog {
            category: "AuditLogs".into(),
            retention_policy: policy(true, 7),
        }]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].enabled, Some(true));
        assert_eq!(
            out[0].retention_policy,
            Some(RetentionPolicySettings {
                enabled: Some(true),
                days: Some(7)
            })
        );
    }

    #[test]
    fn test_expand_logs_keeps_flag_and_skips_missing_policy() {
        let out = expand_logs(&[
            Log {
                category: "AuditLogs".into(),
                enabled: false,
                retention_policy: policy(false, 0),
            },
            Log {
                category: "SignInLogs".into(),
                enabled: true,
                retention_policy: None,
            },
        ]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].category, "AuditLogs");
        assert_eq!(out[0].enabled, Some(false));
    }

    #[test]
    fn test_flatten_enabled_logs_drops_disabled_and_unset() {
        let input = vec![
            remote("AuditLogs", Some(true)),
            remote("SignInLogs", Some(false)),
            remote("ProvisioningLogs", None),
        ];

        let out = flatten_enabled_logs(Some(input.as_slice()));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].category, "AuditLogs");
        assert_eq!(out[0].retention_policy, policy(true, 30));
    }

    #[test]
    fn test_flatten_logs_keeps_everything() {
        let input = vec![remote("AuditLogs", Some(true)), remote("SignInLogs", None)];
        let out = flatten_logs(Some(input.as_slice()));
        assert_eq!(out.len(), 2);
        assert!(!out[1].enabled);
    }

    #[test]
    fn test_flatten_missing_retention_policy() {
        let input = vec![LogSettings {
            category: "AuditLogs".into(),
            enabled: Some(true),
            retention_policy: None,
        }];
        assert_eq!(flatten_enabled_logs(Some(input.as_slice()))[0].retention_policy, None);
    }

    #[test]
    fn test_flatten_none() {
        assert!(flatten_logs(None).is_empty());
        assert!(flatten_enabled_logs(None).is_empty());
    }

    #[test]
    fn test_any_enabled() {
        assert!(!any_enabled(&[]));
        assert!(!any_enabled(&[remote("AuditLogs", None)]));
        assert!(any_enabled(&[remote("AuditLogs", Some(false)), remote("SignInLogs", Some(true))]));
    }
}

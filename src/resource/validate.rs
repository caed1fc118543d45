//! Schema validation
//!
//! Walks a raw configuration document (parsed from YAML or JSON) against a
//! [`ResourceSchema`], applying defaults and collecting every problem before
//! failing, then decodes the typed [`DiagnosticSettingConfig`].

use super::model::DiagnosticSettingConfig;
use super::registry::{FieldSchema, FieldType, ResourceSchema, ValidationRule};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Mutex, OnceLock};

/// Longest diagnostic setting name ARM accepts
const MAX_NAME_LENGTH: usize = 260;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation finding, attached to a field path such as
/// `enabled_log.0.retention_policy.days`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.to_string(),
            message: message.into(),
        }
    }

    fn warning(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        if self.path.is_empty() {
            write!(f, "{}: {}", label, self.message)
        } else {
            write!(f, "{}: {}: {}", label, self.path, self.message)
        }
    }
}

/// Every error found in a configuration document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid configuration ({} error(s)):\n{}", .diagnostics.len(), render(.diagnostics))]
pub struct SchemaDiagnostics {
    pub diagnostics: Vec<Diagnostic>,
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("  {}", d))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A decoded configuration plus the warnings raised while validating it
#[derive(Debug, Clone)]
pub struct Validated<T> {
    pub value: T,
    pub warnings: Vec<Diagnostic>,
}

/// Validate a document and decode it into a typed configuration
pub fn decode_config(
    schema: &ResourceSchema,
    document: &Value,
) -> Result<Validated<DiagnosticSettingConfig>, SchemaDiagnostics> {
    let Validated {
        value: normalized,
        warnings,
    } = validate_document(schema, document)?;

    match serde_json::from_value::<DiagnosticSettingConfig>(normalized) {
        Ok(config) => Ok(Validated {
            value: config,
            warnings,
        }),
        Err(e) => Err(SchemaDiagnostics {
            diagnostics: vec![Diagnostic::error("", format!("decoding configuration: {}", e))],
        }),
    }
}

/// Validate a document, returning it with defaults applied
pub fn validate_document(
    schema: &ResourceSchema,
    document: &Value,
) -> Result<Validated<Value>, SchemaDiagnostics> {
    let mut diagnostics = Vec::new();

    let normalized = match document.as_object() {
        Some(object) => {
            let normalized = walk_object(&schema.schema, object, "", &mut diagnostics);
            check_cross_field(schema, &normalized, &mut diagnostics);
            Value::Object(normalized)
        }
        None => {
            diagnostics.push(Diagnostic::error("", "expected a mapping of arguments"));
            Value::Null
        }
    };

    let (errors, warnings): (Vec<_>, Vec<_>) = diagnostics
        .into_iter()
        .partition(|d| d.severity == Severity::Error);

    if !errors.is_empty() {
        return Err(SchemaDiagnostics {
            diagnostics: errors,
        });
    }

    Ok(Validated {
        value: normalized,
        warnings,
    })
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

fn is_set(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

fn walk_object(
    fields: &std::collections::BTreeMap<String, FieldSchema>,
    object: &Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Map<String, Value> {
    let mut out = Map::new();

    for key in object.keys() {
        if !fields.contains_key(key) {
            diagnostics.push(Diagnostic::error(
                &join_path(path, key),
                "an argument with this name is not expected here",
            ));
        }
    }

    for (name, field) in fields {
        let field_path = join_path(path, name);
        let raw = object.get(name);

        if !is_set(raw) {
            if field.required {
                diagnostics.push(Diagnostic::error(&field_path, "the argument is required"));
            } else if let Some(default) = &field.default {
                out.insert(name.clone(), default.clone());
            }
            continue;
        }

        let Some(raw) = raw else { continue };
        if let Some(message) = &field.deprecated {
            diagnostics.push(Diagnostic::warning(&field_path, message.clone()));
        }
        if let Some(value) = walk_value(field, raw, &field_path, diagnostics) {
            out.insert(name.clone(), value);
        }
    }

    out
}

fn walk_value(
    field: &FieldSchema,
    raw: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Value> {
    let type_error = |diagnostics: &mut Vec<Diagnostic>| {
        diagnostics.push(Diagnostic::error(
            path,
            format!("expected a value of type {}", field.field_type.as_str()),
        ));
    };

    match field.field_type {
        FieldType::String => {
            let Some(s) = raw.as_str() else {
                type_error(diagnostics);
                return None;
            };
            if let Some(rule) = &field.validation {
                if let Err(message) = check_string_rule(rule, s) {
                    diagnostics.push(Diagnostic::error(path, message));
                }
            }
            Some(raw.clone())
        }
        FieldType::Int => {
            let Some(n) = raw.as_i64() else {
                type_error(diagnostics);
                return None;
            };
            if let Some(ValidationRule::IntAtLeast { min }) = &field.validation {
                if n < *min {
                    diagnostics.push(Diagnostic::error(
                        path,
                        format!("expected to be at least ({}), got {}", min, n),
                    ));
                }
            }
            Some(raw.clone())
        }
        FieldType::Bool => {
            if !raw.is_boolean() {
                type_error(diagnostics);
                return None;
            }
            Some(raw.clone())
        }
        FieldType::Block => {
            // Accept both `block: {..}` and the list form `block: [{..}]`
            let object = match raw {
                Value::Object(o) => Some(o),
                Value::Array(items) => {
                    let max = field.max_items.unwrap_or(1);
                    if items.len() > max {
                        diagnostics.push(Diagnostic::error(
                            path,
                            format!("at most {} item(s) are allowed, got {}", max, items.len()),
                        ));
                        return None;
                    }
                    match items.first() {
                        Some(Value::Object(o)) => Some(o),
                        Some(_) => {
                            type_error(diagnostics);
                            return None;
                        }
                        None => None,
                    }
                }
                _ => {
                    type_error(diagnostics);
                    return None;
                }
            };

            match object {
                Some(o) => Some(Value::Object(walk_object(&field.elem, o, path, diagnostics))),
                None => {
                    if field.required {
                        diagnostics.push(Diagnostic::error(path, "the block is required"));
                    }
                    None
                }
            }
        }
        FieldType::Set => {
            let Some(items) = raw.as_array() else {
                type_error(diagnostics);
                return None;
            };

            let mut seen = BTreeSet::new();
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                let item_path = join_path(path, &i.to_string());
                let Some(object) = item.as_object() else {
                    diagnostics.push(Diagnostic::error(&item_path, "expected a block"));
                    continue;
                };
                let normalized =
                    Value::Object(walk_object(&field.elem, object, &item_path, diagnostics));
                // set semantics: identical blocks collapse into one
                if seen.insert(normalized.to_string()) {
                    out.push(normalized);
                }
            }

            if let Some(max) = field.max_items {
                if out.len() > max {
                    diagnostics.push(Diagnostic::error(
                        path,
                        format!("at most {} item(s) are allowed, got {}", max, out.len()),
                    ));
                }
            }
            Some(Value::Array(out))
        }
    }
}

fn check_string_rule(rule: &ValidationRule, value: &str) -> Result<(), String> {
    match rule {
        ValidationRule::DiagnosticSettingName => validate_diagnostic_setting_name(value),
        ValidationRule::StringMatch { pattern, message } => {
            let re = compiled_pattern(pattern)
                .map_err(|e| format!("invalid pattern {:?}: {}", pattern, e))?;
            if re.is_match(value) {
                Ok(())
            } else {
                Err(message.clone())
            }
        }
        ValidationRule::ResourceId { kind } => kind
            .format()
            .parse(value)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        ValidationRule::IntAtLeast { .. } => Err("int rule applied to a string".to_string()),
    }
}

fn pattern_cache() -> &'static Mutex<HashMap<String, Regex>> {
    static PATTERNS: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();
    PATTERNS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Compile a registry pattern once per process
fn compiled_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let mut cache = pattern_cache()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern)?;
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// Validate the name of a monitor diagnostic setting
pub fn validate_diagnostic_setting_name(value: &str) -> Result<(), String> {
    static NAME: OnceLock<Regex> = OnceLock::new();
    let re = NAME.get_or_init(|| {
        Regex::new(r"^[^*&%:\\/?<>+]*[^*&%:\\/?<>+.\s]$")
            .unwrap_or_else(|e| panic!("invalid built-in name pattern: {}", e))
    });

    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(format!(
            "the name must be at most {} characters, got {}",
            MAX_NAME_LENGTH,
            value.chars().count()
        ));
    }
    if !re.is_match(value) {
        return Err(format!(
            "the name must not be empty, must not contain any of the characters *&%:\\/?<>+ and must not end with a period or whitespace, got {:?}",
            value
        ));
    }
    Ok(())
}

/// `at_least_one_of` / `exactly_one_of` across top-level arguments
fn check_cross_field(
    schema: &ResourceSchema,
    normalized: &Map<String, Value>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let present = |name: &str| match normalized.get(name) {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    };

    let mut reported = BTreeSet::new();
    for field in schema.schema.values() {
        if !field.at_least_one_of.is_empty() {
            let mut group = field.at_least_one_of.clone();
            group.sort();
            let count = group.iter().filter(|n| present(n)).count();
            if count == 0 && reported.insert(("at_least_one_of", group.clone())) {
                diagnostics.push(Diagnostic::error(
                    "",
                    format!("one of `{}` must be specified", group.join(",")),
                ));
            }
        }

        if !field.exactly_one_of.is_empty() {
            let mut group = field.exactly_one_of.clone();
            group.sort();
            let count = group.iter().filter(|n| present(n)).count();
            if count != 1 && reported.insert(("exactly_one_of", group.clone())) {
                let message = if count == 0 {
                    format!("one of `{}` must be specified", group.join(","))
                } else {
                    format!("only one of `{}` can be specified", group.join(","))
                };
                diagnostics.push(Diagnostic::error("", message));
            }
        }
    }
}

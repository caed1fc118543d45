//! ARM resource IDs
//!
//! Minimal parsing and formatting for the handful of resource ID shapes the
//! diagnostic setting references. Strict parsing is used to validate user
//! input; insensitive parsing normalises the casing ARM sends back.

use std::fmt;

/// One path component of a resource ID
#[derive(Debug, PartialEq, Eq)]
pub enum Segment {
    /// Literal component, e.g. `resourceGroups`
    Static(&'static str),
    /// User-supplied value, named for error messages and lookups
    Value(&'static str),
}

/// Shape of a resource ID
#[derive(Debug, PartialEq, Eq)]
pub struct IdFormat {
    pub kind: &'static str,
    pub segments: &'static [Segment],
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("parsing {kind} ID {input:?}: expected an ID starting with '/'")]
    NotRooted { kind: &'static str, input: String },

    #[error("parsing {kind} ID {input:?}: expected {expected} segments but got {actual}")]
    SegmentCount {
        kind: &'static str,
        input: String,
        expected: usize,
        actual: usize,
    },

    #[error("parsing {kind} ID {input:?}: expected the segment {expected:?} but got {actual:?}")]
    StaticMismatch {
        kind: &'static str,
        input: String,
        expected: &'static str,
        actual: String,
    },

    #[error("parsing {kind} ID {input:?}: the segment {name:?} was empty")]
    EmptyValue {
        kind: &'static str,
        input: String,
        name: &'static str,
    },
}

pub static EVENTHUB_AUTHORIZATION_RULE: IdFormat = IdFormat {
    kind: "Authorization Rule",
    segments: &[
        Segment::Static("subscriptions"),
        Segment::Value("subscriptionId"),
        Segment::Static("resourceGroups"),
        Segment::Value("resourceGroupName"),
        Segment::Static("providers"),
        Segment::Static("Microsoft.EventHub"),
        Segment::Static("namespaces"),
        Segment::Value("namespaceName"),
        Segment::Static("authorizationRules"),
        Segment::Value("authorizationRuleName"),
    ],
};

pub static LOG_ANALYTICS_WORKSPACE: IdFormat = IdFormat {
    kind: "Workspace",
    segments: &[
        Segment::Static("subscriptions"),
        Segment::Value("subscriptionId"),
        Segment::Static("resourceGroups"),
        Segment::Value("resourceGroupName"),
        Segment::Static("providers"),
        Segment::Static("Microsoft.OperationalInsights"),
        Segment::Static("workspaces"),
        Segment::Value("workspaceName"),
    ],
};

pub static STORAGE_ACCOUNT: IdFormat = IdFormat {
    kind: "Storage Account",
    segments: &[
        Segment::Static("subscriptions"),
        Segment::Value("subscriptionId"),
        Segment::Static("resourceGroups"),
        Segment::Value("resourceGroupName"),
        Segment::Static("providers"),
        Segment::Static("Microsoft.Storage"),
        Segment::Static("storageAccounts"),
        Segment::Value("storageAccountName"),
    ],
};

pub static AAD_DIAGNOSTIC_SETTING: IdFormat = IdFormat {
    kind: "AAD Diagnostic Setting",
    segments: &[
        Segment::Static("providers"),
        Segment::Static("Microsoft.AADIAM"),
        Segment::Static("diagnosticSettings"),
        Segment::Value("name"),
    ],
};

/// A parsed resource ID, re-formattable in canonical casing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedId {
    format: &'static IdFormat,
    values: Vec<(&'static str, String)>,
}

impl ParsedId {
    /// Canonical string form
    pub fn id(&self) -> String {
        let mut values = self.values.iter();
        let mut out = String::new();
        for segment in self.format.segments {
            out.push('/');
            match segment {
                Segment::Static(s) => out.push_str(s),
                Segment::Value(_) => {
                    if let Some((_, v)) = values.next() {
                        out.push_str(v);
                    }
                }
            }
        }
        out
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for ParsedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.format.kind, self.id())
    }
}

impl IdFormat {
    /// Parse with exact casing of the literal segments
    pub fn parse(&'static self, input: &str) -> Result<ParsedId, IdParseError> {
        self.parse_with(input, false)
    }

    /// Parse accepting any casing of the literal segments
    pub fn parse_insensitively(&'static self, input: &str) -> Result<ParsedId, IdParseError> {
        self.parse_with(input, true)
    }

    fn parse_with(&'static self, input: &str, insensitive: bool) -> Result<ParsedId, IdParseError> {
        let Some(rest) = input.strip_prefix('/') else {
            return Err(IdParseError::NotRooted {
                kind: self.kind,
                input: input.to_string(),
            });
        };

        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() != self.segments.len() {
            return Err(IdParseError::SegmentCount {
                kind: self.kind,
                input: input.to_string(),
                expected: self.segments.len(),
                actual: parts.len(),
            });
        }

        let mut values = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Static(expected) => {
                    let matches = if insensitive {
                        expected.eq_ignore_ascii_case(part)
                    } else {
                        *expected == part
                    };
                    if !matches {
                        return Err(IdParseError::StaticMismatch {
                            kind: self.kind,
                            input: input.to_string(),
                            expected: *expected,
                            actual: part.to_string(),
                        });
                    }
                }
                Segment::Value(name) => {
                    if part.is_empty() {
                        return Err(IdParseError::EmptyValue {
                            kind: self.kind,
                            input: input.to_string(),
                            name: *name,
                        });
                    }
                    values.push((*name, part.to_string()));
                }
            }
        }

        Ok(ParsedId {
            format: self,
            values,
        })
    }
}

/// ID of an AAD diagnostic setting (tenant scoped, so only a name)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AadDiagnosticSettingId {
    pub name: String,
}

impl AadDiagnosticSettingId {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, IdParseError> {
        let parsed = AAD_DIAGNOSTIC_SETTING.parse(input)?;
        Ok(Self {
            name: parsed.value("name").unwrap_or_default().to_string(),
        })
    }

    pub fn id(&self) -> String {
        format!("/providers/Microsoft.AADIAM/diagnosticSettings/{}", self.name)
    }
}

impl fmt::Display for AadDiagnosticSettingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AAD Diagnostic Setting (Name {:?})", self.name)
    }
}

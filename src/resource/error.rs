use super::poll::PollError;
use super::validate::SchemaDiagnostics;
use crate::azure::http::ApiError;
use crate::azure::ids::IdParseError;
use std::time::Duration;

/// Failures of the lifecycle handlers
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error(transparent)]
    Schema(#[from] SchemaDiagnostics),

    /// Configuration the schema accepts but the API would silently mishandle
    #[error("{0}")]
    Config(String),

    #[error("a resource with the ID {id:?} already exists - to be managed via this tool it needs to be imported")]
    AlreadyExists { id: String },

    #[error("{id} was not found")]
    NotFound { id: String },

    #[error(transparent)]
    InvalidId(#[from] IdParseError),

    #[error("{context}: {source}")]
    Api {
        context: String,
        #[source]
        source: ApiError,
    },

    #[error("{operation} of {id} did not complete within {timeout:?}")]
    OperationTimeout {
        operation: &'static str,
        id: String,
        timeout: Duration,
    },

    #[error("{id} still exists {timeout:?} after it was deleted")]
    DidNotDisappear { id: String, timeout: Duration },

    #[error("waiting for {id} to be deleted: {source}")]
    Wait {
        id: String,
        #[source]
        source: PollError,
    },
}

impl ResourceError {
    pub(crate) fn api(context: impl Into<String>, source: ApiError) -> Self {
        ResourceError::Api {
            context: context.into(),
            source,
        }
    }

    /// The underlying API error, if this failure came from the remote side
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ResourceError::Api { source, .. } => Some(source),
            _ => None,
        }
    }
}

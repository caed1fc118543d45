//! AAD diagnostic setting resource
//!
//! This module binds the `monitor_aad_diagnostic_setting` resource type:
//! its schema, validation, the mapping between configuration and ARM
//! payload, and the Create/Read/Update/Delete handlers.
//!
//! # Architecture
//!
//! - [`registry`] - Loads resource schemas from embedded JSON
//! - [`validate`] - Checks configuration documents against a schema
//! - [`model`] - ARM payload, configuration and state types
//! - [`mapping`] - Expand/flatten between configuration and payload
//! - [`lifecycle`] - The CRUD handlers
//! - [`poll`] - Waits for a remote state transition
//!
//! # Example
//!
//! ```ignore
//! use aadds::resource::{AadDiagnosticSettingResource, Features};
//!
//! async fn apply(
//!     client: aadds::azure::client::AzureClient,
//!     doc: serde_json::Value,
//! ) -> anyhow::Result<()> {
//!     let resource = AadDiagnosticSettingResource::new(client, Features::default());
//!     let config = resource.decode(&doc)?.value;
//!     let state = resource.create(&config).await?;
//!     println!("{}", state.id);
//!     Ok(())
//! }
//! ```

mod api;
mod error;
pub mod lifecycle;
pub mod mapping;
pub mod model;
pub mod poll;
pub mod registry;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use api::DiagnosticSettingsApi;
pub use error::ResourceError;
pub use lifecycle::AadDiagnosticSettingResource;
pub use model::{
    DiagnosticSettingConfig, DiagnosticSettingState, EnabledLog, Log, RetentionPolicy,
};

/// Provider feature toggles that change the resource shape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    /// Opt into the 4.0 shape: no `log` block, `enabled_log` not computed
    #[serde(default)]
    pub four_point_oh_beta: bool,
}

/// Per-operation timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        let five_minutes = Duration::from_secs(5 * 60);
        Self {
            create: five_minutes,
            read: five_minutes,
            update: five_minutes,
            delete: five_minutes,
        }
    }
}

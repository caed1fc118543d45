//! Remote API seam
//!
//! The lifecycle handlers only ever talk to the management API through this
//! trait, so they can be driven by the real ARM client or by a fake.

use super::model::DiagnosticSettingsResource;
use crate::azure::http::ApiError;
use async_trait::async_trait;
use std::sync::Arc;

/// Get / CreateOrUpdate / Delete of AAD diagnostic settings by name
#[async_trait]
pub trait DiagnosticSettingsApi: Send + Sync {
    async fn get(&self, name: &str) -> Result<DiagnosticSettingsResource, ApiError>;

    async fn create_or_update(
        &self,
        name: &str,
        parameters: &DiagnosticSettingsResource,
    ) -> Result<DiagnosticSettingsResource, ApiError>;

    /// Succeeds on 200 and 204; a 404 surfaces as [`ApiError::NotFound`]
    async fn delete(&self, name: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl<T: DiagnosticSettingsApi + ?Sized> DiagnosticSettingsApi for Arc<T> {
    async fn get(&self, name: &str) -> Result<DiagnosticSettingsResource, ApiError> {
        (**self).get(name).await
    }

    async fn create_or_update(
        &self,
        name: &str,
        parameters: &DiagnosticSettingsResource,
    ) -> Result<DiagnosticSettingsResource, ApiError> {
        (**self).create_or_update(name, parameters).await
    }

    async fn delete(&self, name: &str) -> Result<(), ApiError> {
        (**self).delete(name).await
    }
}
